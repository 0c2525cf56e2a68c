//! Molecular docking using AutoDock Vina.

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use vinaflow_common::VinaflowError;

use crate::preflight::ToolCommand;

/// Search space and engine parameters shared by every pair in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockingParams {
    pub center_x: f64,
    pub center_y: f64,
    pub center_z: f64,
    pub size_x: f64,
    pub size_y: f64,
    pub size_z: f64,
    pub energy_range: u32,
    pub exhaustiveness: u32,
    pub num_modes: Option<u32>,
    pub cpu: Option<u32>,
    pub seed: Option<i64>,
}

impl Default for DockingParams {
    fn default() -> Self {
        Self {
            center_x: 10.819,
            center_y: 2.607,
            center_z: -53.797,
            size_x: 60.0,
            size_y: 60.0,
            size_z: 60.0,
            energy_range: 4,
            exhaustiveness: 8,
            num_modes: None,
            cpu: None,
            seed: None,
        }
    }
}

impl DockingParams {
    /// Reject parameters the engine would refuse for every pair.
    pub fn validate(&self) -> Result<(), VinaflowError> {
        let centre = [self.center_x, self.center_y, self.center_z];
        if centre.iter().any(|c| !c.is_finite()) {
            return Err(VinaflowError::Config("box centre must be finite".to_string()));
        }
        let size = [self.size_x, self.size_y, self.size_z];
        if size.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(VinaflowError::Config(format!(
                "box size must be positive, got {} x {} x {}",
                self.size_x, self.size_y, self.size_z
            )));
        }
        if self.exhaustiveness == 0 {
            return Err(VinaflowError::Config("exhaustiveness must be at least 1".to_string()));
        }
        if self.num_modes == Some(0) {
            return Err(VinaflowError::Config("num_modes must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Configuration for a single docking run.
#[derive(Debug, Clone)]
pub struct DockingConfig {
    pub receptor: PathBuf,
    pub ligand: PathBuf,
    pub params: DockingParams,
}

impl DockingConfig {
    /// Render the Vina `key = value` config file.
    pub fn render(&self) -> String {
        let p = &self.params;
        let mut out = String::new();
        let _ = writeln!(out, "receptor = {}", self.receptor.display());
        let _ = writeln!(out, "ligand = {}", self.ligand.display());
        let _ = writeln!(out);
        let _ = writeln!(out, "center_x = {}", p.center_x);
        let _ = writeln!(out, "center_y = {}", p.center_y);
        let _ = writeln!(out, "center_z = {}", p.center_z);
        let _ = writeln!(out);
        let _ = writeln!(out, "size_x = {}", p.size_x);
        let _ = writeln!(out, "size_y = {}", p.size_y);
        let _ = writeln!(out, "size_z = {}", p.size_z);
        let _ = writeln!(out);
        let _ = writeln!(out, "energy_range = {}", p.energy_range);
        let _ = writeln!(out, "exhaustiveness = {}", p.exhaustiveness);
        if let Some(n) = p.num_modes {
            let _ = writeln!(out, "num_modes = {}", n);
        }
        if let Some(cpu) = p.cpu {
            let _ = writeln!(out, "cpu = {}", cpu);
        }
        if let Some(seed) = p.seed {
            let _ = writeln!(out, "seed = {}", seed);
        }
        out
    }

    pub async fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        tokio::fs::write(path, self.render())
            .await
            .with_context(|| format!("writing docking config {}", path.display()))
    }
}

/// One row of the engine's result table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingMode {
    pub mode: u32,
    /// kcal/mol; more negative is stronger binding.
    pub affinity: f64,
    pub rmsd_lb: f64,
    pub rmsd_ub: f64,
}

/// Parse the mode table Vina prints after a successful run:
///
/// ```text
/// mode |   affinity | dist from best mode
///      | (kcal/mol) | rmsd l.b.| rmsd u.b.
/// -----+------------+----------+----------
///    1       -7.452          0          0
///    2       -7.123      1.874      2.564
/// ```
pub fn parse_vina_output(stdout: &str) -> Vec<BindingMode> {
    let mut modes = Vec::new();
    let mut in_table = false;

    for line in stdout.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("-----+") {
            in_table = true;
            continue;
        }
        if !in_table {
            continue;
        }

        let cols: Vec<&str> = trimmed.split_whitespace().collect();
        let parsed = match cols.as_slice() {
            [mode, affinity, lb, ub] => (|| {
                Some(BindingMode {
                    mode: mode.parse().ok()?,
                    affinity: affinity.parse().ok()?,
                    rmsd_lb: lb.parse().ok()?,
                    rmsd_ub: ub.parse().ok()?,
                })
            })(),
            _ => None,
        };

        match parsed {
            Some(m) => modes.push(m),
            None => break,
        }
    }

    modes
}

/// Runs one docking job described by a config file.
#[async_trait]
pub trait DockingEngine: Send + Sync {
    /// Dock using `config_path`, writing poses to `out` and engine output to `log`.
    async fn dock(&self, config_path: &Path, out: &Path, log: &Path) -> anyhow::Result<Vec<BindingMode>>;
}

/// Wrapper for AutoDock Vina execution.
pub struct VinaRunner {
    executable: ToolCommand,
}

impl VinaRunner {
    /// Create a new VinaRunner.
    pub fn new(executable: ToolCommand) -> Self {
        Self { executable }
    }
}

#[async_trait]
impl DockingEngine for VinaRunner {
    async fn dock(&self, config_path: &Path, out: &Path, log: &Path) -> anyhow::Result<Vec<BindingMode>> {
        info!("Running AutoDock Vina with {:?}", config_path);

        // a pose or log from an earlier run must not pass for this one
        for stale in [out, log] {
            match tokio::fs::remove_file(stale).await {
                Ok(()) => debug!("Removed previous {:?}", stale),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("removing previous {}", stale.display()));
                }
            }
        }

        let output = self
            .executable
            .command()
            .arg("--config")
            .arg(config_path)
            .arg("--out")
            .arg(out)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut log_text = stdout.to_string();
        if !stderr.trim().is_empty() {
            log_text.push_str("\n--- stderr ---\n");
            log_text.push_str(&stderr);
        }
        tokio::fs::write(log, log_text)
            .await
            .with_context(|| format!("writing engine log {}", log.display()))?;

        let pair = config_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        if !output.status.success() {
            return Err(VinaflowError::Docking {
                pair,
                reason: format!("AutoDock Vina exited with {}: {}", output.status, stderr.trim()),
            }
            .into());
        }

        let modes = parse_vina_output(&stdout);
        if modes.is_empty() {
            return Err(VinaflowError::Docking {
                pair,
                reason: "AutoDock Vina reported no binding modes".to_string(),
            }
            .into());
        }
        if !out.exists() {
            return Err(VinaflowError::Docking {
                pair,
                reason: format!("pose file {} was not written", out.display()),
            }
            .into());
        }

        debug!("AutoDock Vina completed successfully. Output in {:?}", out);
        Ok(modes)
    }
}
