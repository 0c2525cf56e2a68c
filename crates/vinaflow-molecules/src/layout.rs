//! Output directory layout.
//!
//! ```text
//! <root>/
//!   ligands/    {ligand}.sdf, {ligand}.pdbqt
//!   receptors/  {receptor}.pdb, {receptor}.pdbqt
//!   configs/    {ligand}__{receptor}.txt
//!   docking/    {ligand}__{receptor}.pdbqt
//!   logs/       {ligand}__{receptor}.log
//!   docking_results.csv
//!   run_summary.json
//! ```

use anyhow::Context;
use std::path::{Path, PathBuf};

use crate::pairs::{InputStructure, PairSpec};

pub const RESULTS_CSV: &str = "docking_results.csv";
pub const SUMMARY_JSON: &str = "run_summary.json";

#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    root: PathBuf,
}

impl WorkspaceLayout {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ligands_dir(&self) -> PathBuf { self.root.join("ligands") }
    pub fn receptors_dir(&self) -> PathBuf { self.root.join("receptors") }
    pub fn configs_dir(&self) -> PathBuf { self.root.join("configs") }
    pub fn docking_dir(&self) -> PathBuf { self.root.join("docking") }
    pub fn logs_dir(&self) -> PathBuf { self.root.join("logs") }

    pub fn results_csv(&self) -> PathBuf { self.root.join(RESULTS_CSV) }
    pub fn summary_json(&self) -> PathBuf { self.root.join(SUMMARY_JSON) }

    /// Create the root and every sub-directory.
    pub async fn create_dirs(&self) -> anyhow::Result<()> {
        for dir in [
            self.ligands_dir(),
            self.receptors_dir(),
            self.configs_dir(),
            self.docking_dir(),
            self.logs_dir(),
        ] {
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        Ok(())
    }

    fn structure_dir(&self, input: &InputStructure) -> PathBuf {
        match input {
            InputStructure::Ligand(_) => self.ligands_dir(),
            InputStructure::Receptor(_) => self.receptors_dir(),
        }
    }

    /// Downloaded structure (`.sdf` for ligands, `.pdb` for receptors).
    pub fn source_path(&self, input: &InputStructure) -> PathBuf {
        self.structure_dir(input)
            .join(format!("{}.{}", input.file_stem(), input.kind().source_extension()))
    }

    /// Engine-ready structure.
    pub fn converted_path(&self, input: &InputStructure) -> PathBuf {
        self.structure_dir(input).join(format!("{}.pdbqt", input.file_stem()))
    }

    pub fn config_path(&self, pair: &PairSpec) -> PathBuf {
        self.configs_dir().join(format!("{}.txt", pair.file_stem()))
    }

    pub fn pose_path(&self, pair: &PairSpec) -> PathBuf {
        self.docking_dir().join(format!("{}.pdbqt", pair.file_stem()))
    }

    pub fn log_path(&self, pair: &PairSpec) -> PathBuf {
        self.logs_dir().join(format!("{}.log", pair.file_stem()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairs::{LigandId, ReceptorId};

    fn pair() -> PairSpec {
        PairSpec {
            receptor: ReceptorId::parse("P00533").unwrap(),
            ligand: LigandId::parse("aspirin").unwrap(),
        }
    }

    #[test]
    fn test_structure_paths() {
        let layout = WorkspaceLayout::new("/out");
        let lig = InputStructure::Ligand(LigandId::Cid(2244));
        let rec = InputStructure::Receptor(ReceptorId::parse("P00533").unwrap());
        assert_eq!(layout.source_path(&lig), PathBuf::from("/out/ligands/2244.sdf"));
        assert_eq!(layout.converted_path(&lig), PathBuf::from("/out/ligands/2244.pdbqt"));
        assert_eq!(layout.source_path(&rec), PathBuf::from("/out/receptors/P00533.pdb"));
        assert_eq!(layout.converted_path(&rec), PathBuf::from("/out/receptors/P00533.pdbqt"));
    }

    #[test]
    fn test_pair_paths_share_stem() {
        let layout = WorkspaceLayout::new("/out");
        let p = pair();
        assert_eq!(layout.config_path(&p), PathBuf::from("/out/configs/aspirin__P00533.txt"));
        assert_eq!(layout.pose_path(&p), PathBuf::from("/out/docking/aspirin__P00533.pdbqt"));
        assert_eq!(layout.log_path(&p), PathBuf::from("/out/logs/aspirin__P00533.log"));
    }

    #[tokio::test]
    async fn test_create_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::new(dir.path().join("run"));
        layout.create_dirs().await.unwrap();
        for d in ["ligands", "receptors", "configs", "docking", "logs"] {
            assert!(dir.path().join("run").join(d).is_dir(), "{d} missing");
        }
    }
}
