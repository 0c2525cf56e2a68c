//! Configuration loading for vinaflow.
//! Reads vinaflow.toml from the current directory or the path in VINAFLOW_CONFIG.
//! Every field has a default, so the file (and any section of it) is optional.

use serde::{Deserialize, Serialize};
use std::path::Path;
use vinaflow_molecules::DockingParams;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub docking: DockingSection,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_vina")]
    pub vina: String,
    #[serde(default = "default_obabel")]
    pub obabel: String,
    /// May carry an interpreter, e.g. "pythonsh /opt/mgltools/.../prepare_receptor4.py".
    #[serde(default = "default_prepare_receptor")]
    pub prepare_receptor: String,
}

fn default_vina()             -> String { "vina".to_string() }
fn default_obabel()           -> String { "obabel".to_string() }
fn default_prepare_receptor() -> String { "prepare_receptor4.py".to_string() }

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            vina: default_vina(),
            obabel: default_obabel(),
            prepare_receptor: default_prepare_receptor(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockingSection {
    #[serde(default = "default_center_x")]
    pub center_x: f64,
    #[serde(default = "default_center_y")]
    pub center_y: f64,
    #[serde(default = "default_center_z")]
    pub center_z: f64,
    #[serde(default = "default_box_size")]
    pub size_x: f64,
    #[serde(default = "default_box_size")]
    pub size_y: f64,
    #[serde(default = "default_box_size")]
    pub size_z: f64,
    #[serde(default = "default_energy_range")]
    pub energy_range: u32,
    #[serde(default = "default_exhaustiveness")]
    pub exhaustiveness: u32,
    pub num_modes: Option<u32>,
    pub cpu: Option<u32>,
    pub seed: Option<i64>,
}

fn default_center_x()       -> f64 { 10.819 }
fn default_center_y()       -> f64 { 2.607 }
fn default_center_z()       -> f64 { -53.797 }
fn default_box_size()       -> f64 { 60.0 }
fn default_energy_range()   -> u32 { 4 }
fn default_exhaustiveness() -> u32 { 8 }

impl Default for DockingSection {
    fn default() -> Self {
        Self {
            center_x: default_center_x(),
            center_y: default_center_y(),
            center_z: default_center_z(),
            size_x: default_box_size(),
            size_y: default_box_size(),
            size_z: default_box_size(),
            energy_range: default_energy_range(),
            exhaustiveness: default_exhaustiveness(),
            num_modes: None,
            cpu: None,
            seed: None,
        }
    }
}

impl DockingSection {
    pub fn to_params(&self) -> DockingParams {
        DockingParams {
            center_x: self.center_x,
            center_y: self.center_y,
            center_z: self.center_z,
            size_x: self.size_x,
            size_y: self.size_y,
            size_z: self.size_z,
            energy_range: self.energy_range,
            exhaustiveness: self.exhaustiveness,
            num_modes: self.num_modes,
            cpu: self.cpu,
            seed: self.seed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub pairs_csv: Option<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Concurrent pairs; defaults to the number of available cores.
    pub workers: Option<usize>,
}

fn default_output_dir() -> String { "vina_result".to_string() }

impl Default for RunConfig {
    fn default() -> Self {
        Self { pairs_csv: None, output_dir: default_output_dir(), workers: None }
    }
}

impl RunConfig {
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or_else(default_workers).max(1)
    }
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_alphafold_version")]
    pub alphafold_version: u32,
}

fn default_timeout_secs()      -> u64 { 60 }
fn default_alphafold_version() -> u32 { 4 }

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            alphafold_version: default_alphafold_version(),
        }
    }
}


impl Config {
    /// Load configuration.
    /// An explicit VINAFLOW_CONFIG must exist; a missing ./vinaflow.toml means built-in defaults.
    pub fn load() -> anyhow::Result<Self> {
        match std::env::var("VINAFLOW_CONFIG") {
            Ok(path) => Self::load_from(Path::new(&path)),
            Err(_) => {
                let path = Path::new("vinaflow.toml");
                if path.exists() {
                    Self::load_from(path)
                } else {
                    tracing::debug!("No vinaflow.toml found, using built-in defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "Config file not found: {}\n\
                 Copy vinaflow.example.toml to vinaflow.toml and edit it.",
                path.display()
            );
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}
