//! Interactive collection of run inputs.
//! Every prompt is pre-filled from the config file, so pressing enter keeps it.

use anyhow::Context;
use dialoguer::{theme::ColorfulTheme, Input};
use std::path::PathBuf;
use vinaflow_molecules::DockingParams;

use crate::config::Config;

/// Everything a run needs beyond the tool paths in `[tools]`.
#[derive(Debug, Clone)]
pub struct RunInputs {
    pub pairs_csv: PathBuf,
    pub vina: String,
    pub output_dir: PathBuf,
    pub params: DockingParams,
    pub workers: usize,
}

/// Take every value from the config (and `--pairs`) without prompting.
pub fn from_config(config: &Config, pairs: Option<PathBuf>) -> anyhow::Result<RunInputs> {
    let pairs_csv = pairs
        .or_else(|| config.run.pairs_csv.as_ref().map(PathBuf::from))
        .context("No pairs CSV given: pass --pairs or set run.pairs_csv in vinaflow.toml")?;

    Ok(RunInputs {
        pairs_csv,
        vina: config.tools.vina.clone(),
        output_dir: PathBuf::from(&config.run.output_dir),
        params: config.docking.to_params(),
        workers: config.run.effective_workers(),
    })
}

/// Ask for each value in turn.
pub fn interactive(config: &Config, pairs: Option<PathBuf>) -> anyhow::Result<RunInputs> {
    let theme = ColorfulTheme::default();
    let defaults = config.docking.to_params();

    let pairs_csv = match pairs {
        Some(path) => path,
        None => {
            let mut prompt = Input::<String>::with_theme(&theme)
                .with_prompt("Ligand-receptor pairs CSV");
            if let Some(ref p) = config.run.pairs_csv {
                prompt = prompt.default(p.clone());
            }
            PathBuf::from(prompt.interact_text()?)
        }
    };

    let vina: String = Input::with_theme(&theme)
        .with_prompt("AutoDock Vina executable")
        .default(config.tools.vina.clone())
        .interact_text()?;

    let output_dir: String = Input::with_theme(&theme)
        .with_prompt("Output directory")
        .default(config.run.output_dir.clone())
        .interact_text()?;

    let number = |label: &str, default: f64| -> anyhow::Result<f64> {
        Ok(Input::<f64>::with_theme(&theme)
            .with_prompt(label)
            .default(default)
            .interact_text()?)
    };
    let count = |label: &str, default: u32| -> anyhow::Result<u32> {
        Ok(Input::<u32>::with_theme(&theme)
            .with_prompt(label)
            .default(default)
            .interact_text()?)
    };

    let params = DockingParams {
        center_x: number("Center X", defaults.center_x)?,
        center_y: number("Center Y", defaults.center_y)?,
        center_z: number("Center Z", defaults.center_z)?,
        size_x: number("Size X", defaults.size_x)?,
        size_y: number("Size Y", defaults.size_y)?,
        size_z: number("Size Z", defaults.size_z)?,
        energy_range: count("Energy range", defaults.energy_range)?,
        exhaustiveness: count("Exhaustiveness", defaults.exhaustiveness)?,
        ..defaults
    };

    let workers: usize = Input::with_theme(&theme)
        .with_prompt("Concurrent pairs")
        .default(config.run.effective_workers())
        .interact_text()?;

    Ok(RunInputs {
        pairs_csv,
        vina,
        output_dir: PathBuf::from(output_dir),
        params,
        workers: workers.max(1),
    })
}
