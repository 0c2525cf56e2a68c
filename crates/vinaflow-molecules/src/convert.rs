//! Conversion of downloaded structures to PDBQT using external tools.
//!
//! Ligands go through Open Babel (`obabel in.sdf -O out.pdbqt -h --gen3d`),
//! receptors through MGLTools (`prepare_receptor4.py -r in.pdb -o out.pdbqt
//! -A hydrogens -U waters`).

use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info, instrument};
use vinaflow_common::VinaflowError;

use crate::pairs::StructureKind;
use crate::preflight::ToolCommand;

/// Converts a downloaded structure file into the engine's input format.
#[async_trait]
pub trait StructureConverter: Send + Sync {
    async fn convert(&self, kind: StructureKind, source: &Path, target: &Path) -> anyhow::Result<()>;
}

/// Wrapper around the Open Babel and MGLTools command-line converters.
pub struct ExternalConverter {
    obabel: ToolCommand,
    prepare_receptor: ToolCommand,
}

impl ExternalConverter {
    pub fn new(obabel: ToolCommand, prepare_receptor: ToolCommand) -> Self {
        Self { obabel, prepare_receptor }
    }

    fn command_for(&self, kind: StructureKind, source: &Path, target: &Path) -> tokio::process::Command {
        match kind {
            StructureKind::Ligand => {
                let mut cmd = self.obabel.command();
                cmd.arg(source).arg("-O").arg(target).arg("-h").arg("--gen3d");
                cmd
            }
            StructureKind::Receptor => {
                let mut cmd = self.prepare_receptor.command();
                cmd.arg("-r")
                    .arg(source)
                    .arg("-o")
                    .arg(target)
                    .arg("-A")
                    .arg("hydrogens")
                    .arg("-U")
                    .arg("waters");
                cmd
            }
        }
    }
}

#[async_trait]
impl StructureConverter for ExternalConverter {
    #[instrument(skip(self))]
    async fn convert(&self, kind: StructureKind, source: &Path, target: &Path) -> anyhow::Result<()> {
        info!("Converting {} {:?} -> {:?}", kind, source, target);

        let output = self.command_for(kind, source, target).output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VinaflowError::Conversion {
                input: source.display().to_string(),
                reason: format!("converter exited with {}: {}", output.status, stderr.trim()),
            }
            .into());
        }

        // obabel exits 0 even when it could not read a single molecule
        let written = tokio::fs::metadata(target).await.map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VinaflowError::Conversion {
                input: source.display().to_string(),
                reason: format!("converter produced no output: {}", stderr.trim()),
            }
            .into());
        }

        debug!("Conversion completed successfully. Output in {:?}", target);
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, name: &str, body: &str) -> ToolCommand {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        ToolCommand::new(path)
    }

    #[tokio::test]
    async fn test_ligand_conversion_arguments() {
        let dir = tempfile::tempdir().unwrap();
        // fake obabel: echo its arguments into the -O target
        let obabel = script(dir.path(), "obabel", r#"echo "$@" > "$3""#);
        let prep = script(dir.path(), "prep", "exit 1");
        let converter = ExternalConverter::new(obabel, prep);

        let src = dir.path().join("2244.sdf");
        let dst = dir.path().join("2244.pdbqt");
        std::fs::write(&src, "sdf").unwrap();
        converter.convert(StructureKind::Ligand, &src, &dst).await.unwrap();

        let args = std::fs::read_to_string(&dst).unwrap();
        assert_eq!(args.trim(), format!("{} -O {} -h --gen3d", src.display(), dst.display()));
    }

    #[tokio::test]
    async fn test_receptor_conversion_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let obabel = script(dir.path(), "obabel", "exit 1");
        let prep = script(dir.path(), "prep", r#"echo "$@" > "$4""#);
        let converter = ExternalConverter::new(obabel, prep);

        let src = dir.path().join("P1.pdb");
        let dst = dir.path().join("P1.pdbqt");
        converter.convert(StructureKind::Receptor, &src, &dst).await.unwrap();

        let args = std::fs::read_to_string(&dst).unwrap();
        assert_eq!(
            args.trim(),
            format!("-r {} -o {} -A hydrogens -U waters", src.display(), dst.display())
        );
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_conversion_error() {
        let dir = tempfile::tempdir().unwrap();
        let obabel = script(dir.path(), "obabel", "echo 'cannot read input' >&2; exit 1");
        let converter = ExternalConverter::new(obabel, ToolCommand::new("/bin/false"));

        let err = converter
            .convert(StructureKind::Ligand, &dir.path().join("a.sdf"), &dir.path().join("a.pdbqt"))
            .await
            .unwrap_err();
        let err = err.downcast::<VinaflowError>().unwrap();
        assert!(matches!(err, VinaflowError::Conversion { .. }));
        assert!(err.to_string().contains("cannot read input"));
    }

    #[tokio::test]
    async fn test_empty_output_is_conversion_error() {
        let dir = tempfile::tempdir().unwrap();
        let obabel = script(dir.path(), "obabel", r#": > "$3""#);
        let converter = ExternalConverter::new(obabel, ToolCommand::new("/bin/false"));

        let result = converter
            .convert(StructureKind::Ligand, &dir.path().join("a.sdf"), &dir.path().join("a.pdbqt"))
            .await;
        assert!(result.is_err());
    }
}
