//! Per-pair result records and the end-of-run summary.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::docking::BindingMode;
use crate::pairs::RejectedRow;

/// Pipeline stage at which a pair failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Fetch,
    Convert,
    Configure,
    Dock,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureStage::Fetch => "fetch",
            FailureStage::Convert => "convert",
            FailureStage::Configure => "configure",
            FailureStage::Dock => "dock",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageFailure {
    pub stage: FailureStage,
    pub message: String,
}

impl StageFailure {
    pub fn new(stage: FailureStage, message: impl Into<String>) -> Self {
        Self { stage, message: message.into() }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DockingOutcome {
    Docked { modes: Vec<BindingMode> },
    Failed(StageFailure),
}

/// Everything known about one pair after the run.
#[derive(Debug, Clone, Serialize)]
pub struct PairResult {
    pub receptor: String,
    pub ligand: String,
    pub config_path: PathBuf,
    pub output_path: PathBuf,
    pub log_path: PathBuf,
    pub outcome: DockingOutcome,
    pub duration_ms: u64,
}

impl PairResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, DockingOutcome::Docked { .. })
    }

    /// Affinity of the top-ranked mode, in kcal/mol.
    pub fn best_affinity(&self) -> Option<f64> {
        match &self.outcome {
            DockingOutcome::Docked { modes } => modes.first().map(|m| m.affinity),
            DockingOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&StageFailure> {
        match &self.outcome {
            DockingOutcome::Failed(f) => Some(f),
            DockingOutcome::Docked { .. } => None,
        }
    }
}

#[derive(Serialize)]
struct ResultRow<'a> {
    #[serde(rename = "Receptor")]
    receptor: &'a str,
    #[serde(rename = "Ligand")]
    ligand: &'a str,
    #[serde(rename = "Config File")]
    config_file: String,
    #[serde(rename = "Output File")]
    output_file: String,
    #[serde(rename = "Log File")]
    log_file: String,
    #[serde(rename = "Best Affinity (kcal/mol)")]
    best_affinity: Option<f64>,
    /// Every mode's affinity in rank order, `;`-separated.
    #[serde(rename = "Affinities (kcal/mol)")]
    affinities: String,
    #[serde(rename = "Modes")]
    modes: usize,
    #[serde(rename = "Status")]
    status: &'static str,
    #[serde(rename = "Error")]
    error: String,
}

impl<'a> From<&'a PairResult> for ResultRow<'a> {
    fn from(r: &'a PairResult) -> Self {
        let (modes, affinities, status, error) = match &r.outcome {
            DockingOutcome::Docked { modes } => {
                let affinities = modes
                    .iter()
                    .map(|m| m.affinity.to_string())
                    .collect::<Vec<_>>()
                    .join(";");
                (modes.len(), affinities, "docked", String::new())
            }
            DockingOutcome::Failed(f) => (0, String::new(), "failed", format!("{}: {}", f.stage, f.message)),
        };
        Self {
            receptor: &r.receptor,
            ligand: &r.ligand,
            config_file: r.config_path.display().to_string(),
            output_file: r.output_path.display().to_string(),
            log_file: r.log_path.display().to_string(),
            best_affinity: r.best_affinity(),
            affinities,
            modes,
            status,
            error,
        }
    }
}

/// Write one CSV row per pair, in the given order.
pub fn write_results_csv(path: &Path, results: &[PairResult]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for result in results {
        writer.serialize(ResultRow::from(result))?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub receptor: String,
    pub ligand: String,
    pub stage: FailureStage,
    pub message: String,
}

/// Totals and failures for a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_pairs: usize,
    pub docked: usize,
    pub failed: usize,
    pub duplicates_dropped: usize,
    pub structures_downloaded: usize,
    pub structures_converted: usize,
    pub best: Option<BestPair>,
    pub failures: Vec<FailureRecord>,
    pub rejected_rows: Vec<RejectedRow>,
    pub results_csv: PathBuf,
    /// Per-pair records with every binding mode and the engine log path.
    pub pairs: Vec<PairResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BestPair {
    pub receptor: String,
    pub ligand: String,
    pub affinity: f64,
}

impl RunSummary {
    pub fn from_results(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        results: &[PairResult],
        rejected_rows: Vec<RejectedRow>,
        duplicates_dropped: usize,
        results_csv: PathBuf,
    ) -> Self {
        let failures: Vec<FailureRecord> = results
            .iter()
            .filter_map(|r| {
                r.failure().map(|f| FailureRecord {
                    receptor: r.receptor.clone(),
                    ligand: r.ligand.clone(),
                    stage: f.stage,
                    message: f.message.clone(),
                })
            })
            .collect();

        let best = results
            .iter()
            .filter_map(|r| r.best_affinity().map(|a| (r, a)))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(r, affinity)| BestPair {
                receptor: r.receptor.clone(),
                ligand: r.ligand.clone(),
                affinity,
            });

        Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            total_pairs: results.len(),
            docked: results.len() - failures.len(),
            failed: failures.len(),
            duplicates_dropped,
            structures_downloaded: 0,
            structures_converted: 0,
            best,
            failures,
            rejected_rows,
            results_csv,
            pairs: results.to_vec(),
        }
    }

    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
    }
}
