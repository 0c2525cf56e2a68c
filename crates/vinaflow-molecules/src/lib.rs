//! vinaflow Molecules - Structure preparation and docking pipeline.
//!
//! This crate handles every stage between a table of ligand/receptor pairs
//! and a directory of docking results:
//! 1. Reading and validating the pair table (`pairs`)
//! 2. Fetching ligand (PubChem) and receptor (AlphaFold) structures (`sources`)
//! 3. Converting them to PDBQT with external tools (`convert`, `store`)
//! 4. Writing a per-pair Vina configuration and docking it (`docking`)
//! 5. Collecting scores and poses into the output directory (`results`)
//!
//! `pipeline` runs stages 2-5 with a bounded number of concurrent tasks.

pub mod pairs;
pub mod layout;
pub mod sources;
pub mod convert;
pub mod store;
pub mod docking;
pub mod preflight;
pub mod results;
pub mod pipeline;

pub type Result<T> = anyhow::Result<T>;

pub use pairs::{InputStructure, LigandId, PairSpec, PairTable, ReceptorId, StructureKind};
pub use layout::WorkspaceLayout;
pub use docking::{BindingMode, DockingConfig, DockingEngine, DockingParams, VinaRunner};
pub use pipeline::{DockingPipeline, PipelineProgress, RunReport};
pub use results::{DockingOutcome, FailureStage, PairResult, RunSummary};
