//! Environment checks run before any pair is processed.
//!
//! Every external tool is resolved to an executable up front; a missing tool
//! aborts the run instead of failing every pair one by one.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use vinaflow_common::VinaflowError;

/// An external command: a program plus fixed leading arguments, e.g.
/// `pythonsh /opt/mgltools/prepare_receptor4.py`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new<P: AsRef<Path>>(program: P) -> Self {
        Self { program: program.as_ref().to_path_buf(), args: Vec::new() }
    }

    /// Split a whitespace-separated command line. Paths containing spaces
    /// must be configured through [`ToolCommand::new`] instead.
    pub fn parse(command_line: &str) -> Result<Self, VinaflowError> {
        let mut parts = command_line.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| VinaflowError::Config("empty tool command".to_string()))?;
        Ok(Self {
            program: PathBuf::from(program),
            args: parts.map(str::to_string).collect(),
        })
    }

    /// A `tokio` command with the fixed arguments already applied.
    pub fn command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args);
        cmd.kill_on_drop(true);
        cmd
    }

    /// Resolve the program to an executable file, searching `PATH` for bare names.
    /// Script arguments (`pythonsh prepare_receptor4.py`) must exist as well.
    pub fn resolve(&self) -> Result<ToolCommand, VinaflowError> {
        let program = resolve_executable(&self.program)?;
        for script in self.args.iter().filter(|a| is_script_arg(a)) {
            if !Path::new(script).is_file() {
                return Err(VinaflowError::Environment(format!(
                    "script '{}' for '{}' does not exist",
                    script,
                    self.program.display()
                )));
            }
        }
        Ok(ToolCommand { program, args: self.args.clone() })
    }
}

/// An argument that names a file the program runs, rather than an option.
fn is_script_arg(arg: &str) -> bool {
    if arg.starts_with('-') {
        return false;
    }
    let path = Path::new(arg);
    path.components().count() > 1
        || matches!(path.extension().and_then(|e| e.to_str()), Some("py" | "pl" | "sh"))
}

impl std::fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

fn candidates(dir: &Path, name: &Path) -> Vec<PathBuf> {
    let mut out = vec![dir.join(name)];
    if cfg!(windows) && name.extension().is_none() {
        out.push(dir.join(name).with_extension("exe"));
    }
    out
}

/// Find `program` on disk. Names containing a path separator are checked
/// as-is; bare names are looked up in each `PATH` entry.
pub fn resolve_executable(program: &Path) -> Result<PathBuf, VinaflowError> {
    if program.as_os_str().is_empty() {
        return Err(VinaflowError::Environment("empty executable path".to_string()));
    }

    if program.components().count() > 1 || program.is_absolute() {
        let dir = program.parent().unwrap_or_else(|| Path::new(""));
        let name = program.file_name().map(Path::new).unwrap_or(program);
        for candidate in candidates(dir, name) {
            if is_executable(&candidate) {
                return Ok(candidate);
            }
        }
        return Err(VinaflowError::Environment(format!(
            "executable '{}' does not exist or is not executable",
            program.display()
        )));
    }

    let path_var = std::env::var_os("PATH").unwrap_or_else(OsString::new);
    for dir in std::env::split_paths(&path_var) {
        for candidate in candidates(&dir, program) {
            if is_executable(&candidate) {
                debug!(program = %program.display(), found = %candidate.display(), "Resolved executable");
                return Ok(candidate);
            }
        }
    }

    Err(VinaflowError::Environment(format!(
        "executable '{}' not found on PATH",
        program.display()
    )))
}

/// The three external tools a run needs.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub vina: ToolCommand,
    pub obabel: ToolCommand,
    pub prepare_receptor: ToolCommand,
}

impl Toolchain {
    /// Resolve every tool, returning the first failure as an environment error.
    pub fn verify(&self) -> Result<Toolchain, VinaflowError> {
        let resolved = Toolchain {
            vina: self.vina.resolve()?,
            obabel: self.obabel.resolve()?,
            prepare_receptor: self.prepare_receptor.resolve()?,
        };
        info!(
            vina = %resolved.vina,
            obabel = %resolved.obabel,
            prepare_receptor = %resolved.prepare_receptor,
            "External tools resolved"
        );
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_line() {
        let cmd = ToolCommand::parse("pythonsh  /opt/mgl/prepare_receptor4.py").unwrap();
        assert_eq!(cmd.program, PathBuf::from("pythonsh"));
        assert_eq!(cmd.args, vec!["/opt/mgl/prepare_receptor4.py".to_string()]);
        assert_eq!(cmd.to_string(), "pythonsh /opt/mgl/prepare_receptor4.py");
        assert!(ToolCommand::parse("   ").is_err());
    }

    #[test]
    fn test_missing_explicit_path_is_environment_error() {
        let err = resolve_executable(Path::new("/no/such/dir/vina")).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_missing_bare_name_is_environment_error() {
        let err = resolve_executable(Path::new("vinaflow-no-such-tool-xyz")).unwrap_err();
        assert!(matches!(err, VinaflowError::Environment(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolves_explicit_executable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("fake-vina");
        std::fs::write(&tool, "#!/bin/sh\nexit 0\n").unwrap();
        assert!(resolve_executable(&tool).is_err(), "non-executable file must not resolve");

        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert_eq!(resolve_executable(&tool).unwrap(), tool);
    }

    #[test]
    fn test_script_args_are_recognised() {
        assert!(is_script_arg("prepare_receptor4.py"));
        assert!(is_script_arg("/opt/mgl/Utilities24/prepare_receptor4"));
        assert!(!is_script_arg("-u"));
        assert!(!is_script_arg("--gen3d"));
        assert!(!is_script_arg("waters"));
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_interpreter_script_is_environment_error() {
        let cmd = ToolCommand::parse("/bin/sh /no/such/mgltools/prepare_receptor4.py").unwrap();
        let err = cmd.resolve().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("prepare_receptor4.py"));

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("prepare_receptor4.py");
        std::fs::write(&script, "print('ok')\n").unwrap();
        let cmd = ToolCommand::parse(&format!("/bin/sh {}", script.display())).unwrap();
        let resolved = cmd.resolve().unwrap();
        assert_eq!(resolved.args, vec![script.display().to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn test_toolchain_reports_first_missing_tool() {
        let toolchain = Toolchain {
            vina: ToolCommand::new("/bin/sh"),
            obabel: ToolCommand::new("/no/such/obabel"),
            prepare_receptor: ToolCommand::new("/bin/sh"),
        };
        let err = toolchain.verify().unwrap_err();
        assert!(err.to_string().contains("obabel"));
    }
}
