//! Idempotent fetch + freshness-checked conversion of input structures.
//!
//! A structure is downloaded only when no non-empty file is already present,
//! and converted only when the PDBQT is missing or older than its source.

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, instrument, warn};
use vinaflow_common::VinaflowError;

use crate::convert::StructureConverter;
use crate::layout::WorkspaceLayout;
use crate::pairs::{InputStructure, StructureKind};
use crate::results::{FailureStage, StageFailure};
use crate::sources::StructureSource;

/// A structure that is ready to be docked.
#[derive(Debug, Clone)]
pub struct PreparedStructure {
    pub input: InputStructure,
    pub converted: PathBuf,
    /// True if this run downloaded the source file.
    pub downloaded: bool,
    /// True if this run (re)generated the converted file.
    pub converted_now: bool,
}

async fn non_empty_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

async fn modified(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}

/// True if `converted` exists and is not older than `source`.
/// With no source on disk an existing converted file is taken as-is.
pub async fn is_fresh(source: &Path, converted: &Path) -> bool {
    if !non_empty_file(converted).await {
        return false;
    }
    match (modified(source).await, modified(converted).await) {
        (Some(src), Some(dst)) => dst >= src,
        (None, _) => true,
        (Some(_), None) => false,
    }
}

/// Minimal sanity check that a download is the kind of file we asked for.
/// Both databases answer some bad identifiers with a 200 and an error page.
pub fn validate_payload(kind: StructureKind, body: &[u8]) -> Result<(), String> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Err("empty response body".to_string());
    }
    let text = String::from_utf8_lossy(body);
    match kind {
        StructureKind::Ligand if !text.contains("M  END") => {
            Err("response is not an SDF record".to_string())
        }
        StructureKind::Receptor if !text.lines().any(|l| l.starts_with("ATOM") || l.starts_with("HETATM")) => {
            Err("response contains no ATOM records".to_string())
        }
        _ => Ok(()),
    }
}

pub struct StructureStore {
    layout: WorkspaceLayout,
    ligand_source: Arc<dyn StructureSource>,
    receptor_source: Arc<dyn StructureSource>,
    converter: Arc<dyn StructureConverter>,
}

impl StructureStore {
    pub fn new(
        layout: WorkspaceLayout,
        ligand_source: Arc<dyn StructureSource>,
        receptor_source: Arc<dyn StructureSource>,
        converter: Arc<dyn StructureConverter>,
    ) -> Self {
        Self { layout, ligand_source, receptor_source, converter }
    }

    fn source_for(&self, input: &InputStructure) -> &dyn StructureSource {
        match input.kind() {
            StructureKind::Ligand => self.ligand_source.as_ref(),
            StructureKind::Receptor => self.receptor_source.as_ref(),
        }
    }

    /// Download `input` unless a non-empty source file is already present.
    /// Returns whether a download happened.
    pub async fn ensure_downloaded(&self, input: &InputStructure) -> anyhow::Result<bool> {
        let path = self.layout.source_path(input);
        if non_empty_file(&path).await {
            debug!("{} found in input directory", input);
            return Ok(false);
        }

        let source = self.source_for(input);
        info!("Fetching {} from {}", input, source.name());
        let body = source.download(input).await?;
        validate_payload(input.kind(), &body).map_err(|reason| VinaflowError::Download {
            id: input.to_string(),
            reason,
        })?;

        // write-then-rename so an interrupted download never looks complete
        let partial = path.with_extension(format!("{}.part", input.kind().source_extension()));
        tokio::fs::write(&partial, &body)
            .await
            .with_context(|| format!("writing {}", partial.display()))?;
        tokio::fs::rename(&partial, &path)
            .await
            .with_context(|| format!("moving download into {}", path.display()))?;

        info!("Downloaded {} -> {:?}", input, path);
        Ok(true)
    }

    /// Convert `input` unless its PDBQT is already fresh.
    /// Returns whether a conversion happened.
    pub async fn ensure_converted(&self, input: &InputStructure) -> anyhow::Result<bool> {
        let source = self.layout.source_path(input);
        let converted = self.layout.converted_path(input);
        if is_fresh(&source, &converted).await {
            debug!("{} already converted", input);
            return Ok(false);
        }

        if non_empty_file(&converted).await {
            warn!("{} changed since its last conversion, regenerating", input);
        }

        // the converters pick the output format from the extension, so keep .pdbqt last
        let partial = converted.with_extension("part.pdbqt");
        if let Err(e) = self.converter.convert(input.kind(), &source, &partial).await {
            let _ = tokio::fs::remove_file(&partial).await;
            let _ = tokio::fs::remove_file(&converted).await;
            return Err(e);
        }
        tokio::fs::rename(&partial, &converted)
            .await
            .with_context(|| format!("moving conversion into {}", converted.display()))?;
        Ok(true)
    }

    /// Fetch (if needed) and convert (if needed) one input structure.
    #[instrument(skip(self), fields(input = %input))]
    pub async fn prepare(&self, input: &InputStructure) -> Result<PreparedStructure, StageFailure> {
        let converted = self.layout.converted_path(input);
        let source = self.layout.source_path(input);

        // a converted file with no source on disk is reused as-is
        let downloaded = if non_empty_file(&converted).await && !non_empty_file(&source).await {
            false
        } else {
            self.ensure_downloaded(input)
                .await
                .map_err(|e| StageFailure::new(FailureStage::Fetch, format!("{}: {:#}", input, e)))?
        };

        let converted_now = self
            .ensure_converted(input)
            .await
            .map_err(|e| StageFailure::new(FailureStage::Convert, format!("{}: {:#}", input, e)))?;

        Ok(PreparedStructure { input: input.clone(), converted, downloaded, converted_now })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairs::{LigandId, ReceptorId};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SDF: &str = "2244\n  fake\n\n  0  0  0  0  0  0  0  0  0  0999 V2000\nM  END\n$$$$\n";
    const PDB: &str = "ATOM      1  N   MET A   1      0.000   0.000   0.000  1.00 90.00           N\nEND\n";

    struct CountingSource {
        calls: AtomicUsize,
        body: &'static str,
    }

    #[async_trait]
    impl StructureSource for CountingSource {
        fn name(&self) -> &str { "counting" }
        async fn download(&self, _input: &InputStructure) -> anyhow::Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.as_bytes().to_vec())
        }
    }

    struct CopyConverter {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StructureConverter for CopyConverter {
        async fn convert(&self, _kind: StructureKind, source: &Path, target: &Path) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::fs::copy(source, target).await?;
            Ok(())
        }
    }

    fn store(root: &Path) -> (StructureStore, Arc<CountingSource>, Arc<CopyConverter>) {
        let ligands = Arc::new(CountingSource { calls: AtomicUsize::new(0), body: SDF });
        let receptors = Arc::new(CountingSource { calls: AtomicUsize::new(0), body: PDB });
        let converter = Arc::new(CopyConverter { calls: AtomicUsize::new(0) });
        let store = StructureStore::new(
            WorkspaceLayout::new(root),
            ligands.clone(),
            receptors,
            converter.clone(),
        );
        (store, ligands, converter)
    }

    #[test]
    fn test_payload_validation() {
        assert!(validate_payload(StructureKind::Ligand, SDF.as_bytes()).is_ok());
        assert!(validate_payload(StructureKind::Receptor, PDB.as_bytes()).is_ok());
        assert!(validate_payload(StructureKind::Ligand, b"  \n").is_err());
        assert!(validate_payload(StructureKind::Receptor, b"<html>not found</html>").is_err());
    }

    #[tokio::test]
    async fn test_fetch_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (store, ligands, converter) = store(dir.path());
        WorkspaceLayout::new(dir.path()).create_dirs().await.unwrap();
        let input = InputStructure::Ligand(LigandId::Cid(2244));

        let first = store.prepare(&input).await.unwrap();
        assert!(first.downloaded && first.converted_now);
        let second = store.prepare(&input).await.unwrap();
        assert!(!second.downloaded && !second.converted_now);

        assert_eq!(ligands.calls.load(Ordering::SeqCst), 1);
        assert_eq!(converter.calls.load(Ordering::SeqCst), 1);
        assert!(!dir.path().join("ligands/2244.sdf.part").exists());
    }

    #[tokio::test]
    async fn test_stale_conversion_is_regenerated() {
        let dir = tempfile::tempdir().unwrap();
        let (store, ligands, converter) = store(dir.path());
        let layout = WorkspaceLayout::new(dir.path());
        layout.create_dirs().await.unwrap();
        let input = InputStructure::Receptor(ReceptorId::parse("P00533").unwrap());

        store.prepare(&input).await.unwrap();

        // make the converted file older than its source
        let converted = std::fs::File::options().write(true).open(layout.converted_path(&input)).unwrap();
        converted.set_modified(SystemTime::UNIX_EPOCH).unwrap();
        drop(converted);

        let again = store.prepare(&input).await.unwrap();
        assert!(!again.downloaded);
        assert!(again.converted_now);
        assert_eq!(converter.calls.load(Ordering::SeqCst), 2);
        assert_eq!(ligands.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_converted_file_without_source_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _, converter) = store(dir.path());
        let layout = WorkspaceLayout::new(dir.path());
        layout.create_dirs().await.unwrap();
        let input = InputStructure::Ligand(LigandId::Name("aspirin".into()));
        std::fs::write(layout.converted_path(&input), "REMARK prepared elsewhere\n").unwrap();

        let prepared = store.prepare(&input).await.unwrap();
        assert!(!prepared.downloaded && !prepared.converted_now);
        assert_eq!(converter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bad_payload_is_fetch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::new(dir.path());
        layout.create_dirs().await.unwrap();
        let bad = Arc::new(CountingSource { calls: AtomicUsize::new(0), body: "Status: 404" });
        let store = StructureStore::new(
            layout.clone(),
            bad.clone(),
            bad,
            Arc::new(CopyConverter { calls: AtomicUsize::new(0) }),
        );
        let input = InputStructure::Ligand(LigandId::Cid(1));

        let failure = store.prepare(&input).await.unwrap_err();
        assert_eq!(failure.stage, FailureStage::Fetch);
        assert!(!layout.source_path(&input).exists());
    }

    /// Writes part of the output, then fails like a crashed converter.
    struct CrashingConverter;

    #[async_trait]
    impl StructureConverter for CrashingConverter {
        async fn convert(&self, _kind: StructureKind, _source: &Path, target: &Path) -> anyhow::Result<()> {
            tokio::fs::write(target, "ATOM  truncated").await?;
            anyhow::bail!("converter killed")
        }
    }

    #[tokio::test]
    async fn test_failed_conversion_leaves_nothing_to_reuse() {
        let dir = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::new(dir.path());
        layout.create_dirs().await.unwrap();
        let receptors = Arc::new(CountingSource { calls: AtomicUsize::new(0), body: PDB });
        let input = InputStructure::Receptor(ReceptorId::parse("P00533").unwrap());

        let crashing = StructureStore::new(
            layout.clone(),
            receptors.clone(),
            receptors.clone(),
            Arc::new(CrashingConverter),
        );
        let failure = crashing.prepare(&input).await.unwrap_err();
        assert_eq!(failure.stage, FailureStage::Convert);
        assert!(!layout.converted_path(&input).exists());
        assert!(!layout.converted_path(&input).with_extension("part.pdbqt").exists());

        let converter = Arc::new(CopyConverter { calls: AtomicUsize::new(0) });
        let store = StructureStore::new(layout.clone(), receptors.clone(), receptors, converter.clone());
        let prepared = store.prepare(&input).await.unwrap();
        assert!(prepared.converted_now);
        assert_eq!(converter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(std::fs::read_to_string(layout.converted_path(&input)).unwrap(), PDB);
    }
}
