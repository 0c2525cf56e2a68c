//! Orchestrator for the docking pipeline.
//!
//! Runs in two bounded-concurrency phases:
//!   1. Prepare every distinct input structure once (fetch + convert)
//!   2. Dock every pair (configure → dock → collect)
//!
//! Preparing inputs up front means a ligand shared by several pairs is
//! fetched and converted by exactly one task. Each docking task writes only
//! files named after its own pair. A failure is recorded against the pairs it
//! affects and never stops the others.

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::docking::{DockingConfig, DockingEngine, DockingParams};
use crate::layout::WorkspaceLayout;
use crate::pairs::{InputStructure, PairSpec, PairTable};
use crate::results::{
    write_results_csv, DockingOutcome, FailureStage, PairResult, RunSummary, StageFailure,
};
use crate::store::{PreparedStructure, StructureStore};

// ── Progress events ───────────────────────────────────────────────────────────

/// Progress event emitted during a run (cloneable for broadcast).
#[derive(Debug, Clone, Serialize)]
pub struct PipelineProgress {
    pub run_id: Uuid,
    pub stage: String,
    pub message: String,
    pub completed: usize,
    pub total: usize,
    pub failed: bool,
}

// ── Run report ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RunReport {
    /// One result per pair, in pair-table order.
    pub results: Vec<PairResult>,
    pub summary: RunSummary,
}

// ── Pipeline orchestrator ─────────────────────────────────────────────────────

pub struct DockingPipeline {
    layout: WorkspaceLayout,
    store: Arc<StructureStore>,
    engine: Arc<dyn DockingEngine>,
    params: DockingParams,
    workers: usize,
    progress_tx: Option<broadcast::Sender<PipelineProgress>>,
}

impl DockingPipeline {
    pub fn new(
        layout: WorkspaceLayout,
        store: Arc<StructureStore>,
        engine: Arc<dyn DockingEngine>,
        params: DockingParams,
        workers: usize,
    ) -> Self {
        Self {
            layout,
            store,
            engine,
            params,
            workers: workers.max(1),
            progress_tx: None,
        }
    }

    /// Send progress events to `tx` while running.
    pub fn with_progress(mut self, tx: broadcast::Sender<PipelineProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    fn emit(&self, progress: PipelineProgress) {
        if let Some(ref tx) = self.progress_tx {
            let _ = tx.send(progress);
        }
    }

    /// Runs the pipeline over every pair in `table`.
    ///
    /// Only failures that affect the whole run (the output directory or the
    /// result files cannot be written) are returned as errors.
    #[instrument(skip_all, fields(pairs = table.pairs.len(), workers = self.workers))]
    pub async fn run(&self, table: &PairTable) -> anyhow::Result<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(run_id = %run_id, "Starting docking pipeline");

        self.layout.create_dirs().await?;

        // ── 1. Prepare distinct inputs ────────────────────────────────────────
        let inputs = table.unique_inputs();
        let total_inputs = inputs.len();
        info!("Preparing {} input structures", total_inputs);

        let mut prepared: HashMap<InputStructure, Result<PreparedStructure, StageFailure>> =
            HashMap::with_capacity(total_inputs);
        let mut done = 0usize;
        let mut prep_stream = stream::iter(inputs)
            .map(|input| {
                let store = self.store.clone();
                async move {
                    let outcome = store.prepare(&input).await;
                    (input, outcome)
                }
            })
            .buffer_unordered(self.workers);

        while let Some((input, outcome)) = prep_stream.next().await {
            done += 1;
            let failed = outcome.is_err();
            let message = match &outcome {
                Ok(_) => format!("{} ready", input),
                Err(f) => {
                    warn!("{} failed at {}: {}", input, f.stage, f.message);
                    format!("{} failed: {}", input, f.message)
                }
            };
            self.emit(PipelineProgress {
                run_id,
                stage: "prepare".to_string(),
                message,
                completed: done,
                total: total_inputs,
                failed,
            });
            prepared.insert(input, outcome);
        }
        drop(prep_stream);

        let downloaded = prepared.values().filter(|p| matches!(p, Ok(s) if s.downloaded)).count();
        let converted = prepared.values().filter(|p| matches!(p, Ok(s) if s.converted_now)).count();

        // ── 2. Dock pairs ─────────────────────────────────────────────────────
        let total_pairs = table.pairs.len();
        info!("Docking {} pairs with {} workers", total_pairs, self.workers);

        let prepared = &prepared;
        let mut indexed: Vec<(usize, PairResult)> = Vec::with_capacity(total_pairs);
        let mut dock_stream = stream::iter(table.pairs.iter().enumerate())
            .map(|(idx, pair)| async move { (idx, self.dock_pair(pair, prepared).await) })
            .buffer_unordered(self.workers);

        while let Some((idx, result)) = dock_stream.next().await {
            let message = match (&result.outcome, result.best_affinity()) {
                (DockingOutcome::Docked { .. }, Some(best)) => {
                    format!("{} vs {}: {:.2} kcal/mol", result.ligand, result.receptor, best)
                }
                (DockingOutcome::Failed(f), _) => {
                    format!("{} vs {} failed at {}", result.ligand, result.receptor, f.stage)
                }
                _ => format!("{} vs {}", result.ligand, result.receptor),
            };
            self.emit(PipelineProgress {
                run_id,
                stage: "dock".to_string(),
                message,
                completed: indexed.len() + 1,
                total: total_pairs,
                failed: !result.is_success(),
            });
            indexed.push((idx, result));
        }
        drop(dock_stream);

        indexed.sort_by_key(|(idx, _)| *idx);
        let results: Vec<PairResult> = indexed.into_iter().map(|(_, r)| r).collect();

        // ── 3. Collect ────────────────────────────────────────────────────────
        let results_csv = self.layout.results_csv();
        write_results_csv(&results_csv, &results)?;

        let mut summary = RunSummary::from_results(
            run_id,
            started_at,
            &results,
            table.rejected.clone(),
            table.duplicates,
            results_csv,
        );
        summary.structures_downloaded = downloaded;
        summary.structures_converted = converted;
        summary.write_json(&self.layout.summary_json())?;

        info!(
            run_id = %run_id,
            docked = summary.docked,
            failed = summary.failed,
            "Docking pipeline finished"
        );
        Ok(RunReport { results, summary })
    }

    /// Configure and dock one pair whose inputs have already been prepared.
    async fn dock_pair(
        &self,
        pair: &PairSpec,
        prepared: &HashMap<InputStructure, Result<PreparedStructure, StageFailure>>,
    ) -> PairResult {
        let t0 = Instant::now();
        let config_path = self.layout.config_path(pair);
        let output_path = self.layout.pose_path(pair);
        let log_path = self.layout.log_path(pair);

        let outcome = match self.dock_prepared(pair, prepared, &config_path, &output_path, &log_path).await {
            Ok(modes) => DockingOutcome::Docked { modes },
            Err(failure) => {
                error!(pair = %pair, stage = %failure.stage, "{}", failure.message);
                DockingOutcome::Failed(failure)
            }
        };

        PairResult {
            receptor: pair.receptor.to_string(),
            ligand: pair.ligand.to_string(),
            config_path,
            output_path,
            log_path,
            outcome,
            duration_ms: t0.elapsed().as_millis() as u64,
        }
    }

    async fn dock_prepared(
        &self,
        pair: &PairSpec,
        prepared: &HashMap<InputStructure, Result<PreparedStructure, StageFailure>>,
        config_path: &std::path::Path,
        output_path: &std::path::Path,
        log_path: &std::path::Path,
    ) -> Result<Vec<crate::docking::BindingMode>, StageFailure> {
        let lookup = |input: InputStructure| -> Result<PreparedStructure, StageFailure> {
            match prepared.get(&input) {
                Some(Ok(p)) => Ok(p.clone()),
                Some(Err(f)) => Err(f.clone()),
                None => Err(StageFailure::new(FailureStage::Fetch, format!("{} was never prepared", input))),
            }
        };
        let ligand = lookup(InputStructure::Ligand(pair.ligand.clone()))?;
        let receptor = lookup(InputStructure::Receptor(pair.receptor.clone()))?;

        let config = DockingConfig {
            receptor: receptor.converted,
            ligand: ligand.converted,
            params: self.params.clone(),
        };
        config
            .write_to(config_path)
            .await
            .map_err(|e| StageFailure::new(FailureStage::Configure, format!("{:#}", e)))?;

        info!(pair = %pair, "Docking");
        self.engine
            .dock(config_path, output_path, log_path)
            .await
            .map_err(|e| StageFailure::new(FailureStage::Dock, format!("{:#}", e)))
    }
}
