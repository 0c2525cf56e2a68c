//! Ligand/receptor pair table.
//!
//! The input is a CSV with (at least) `receptor` and `ligand` columns, one
//! docking pair per row. Column order does not matter and extra columns are
//! ignored. Rows that cannot be docked are kept as [`RejectedRow`]s so the run
//! summary can report them.

use anyhow::Context;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info, warn};
use vinaflow_common::VinaflowError;

fn cid_regex() -> &'static Regex {
    static CID: OnceLock<Regex> = OnceLock::new();
    CID.get_or_init(|| Regex::new(r"^(?:[1-9]\d*|0)$").unwrap())
}

fn accession_regex() -> &'static Regex {
    static ACCESSION: OnceLock<Regex> = OnceLock::new();
    ACCESSION.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").unwrap())
}

/// True if `s` looks like a PubChem CID: a positive integer without leading
/// zeros, or exactly "0".
pub fn is_pubchem_cid(s: &str) -> bool {
    cid_regex().is_match(s)
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
fn sanitize_stem(raw: &str) -> String {
    let stem: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    // never produce hidden files or "." / ".."
    let trimmed = stem.trim_start_matches('.');
    if trimmed.is_empty() { "_".to_string() } else { trimmed.to_string() }
}

// ── Identifiers ───────────────────────────────────────────────────────────────

/// A PubChem compound, addressed either by CID or by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LigandId {
    Cid(u64),
    Name(String),
}

impl LigandId {
    pub fn parse(raw: &str) -> Result<Self, VinaflowError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(VinaflowError::InvalidIdentifier(raw.to_string()));
        }
        if is_pubchem_cid(raw) {
            // CIDs beyond u64 are not real compounds; let PubChem reject them by name
            if let Ok(cid) = raw.parse::<u64>() {
                return Ok(LigandId::Cid(cid));
            }
        }
        Ok(LigandId::Name(raw.to_string()))
    }

    /// PubChem PUG REST namespace for this identifier.
    pub fn namespace(&self) -> &'static str {
        match self {
            LigandId::Cid(_) => "cid",
            LigandId::Name(_) => "name",
        }
    }

    /// The identifier as sent to PubChem.
    pub fn query(&self) -> String {
        match self {
            LigandId::Cid(cid) => cid.to_string(),
            LigandId::Name(name) => name.clone(),
        }
    }

    pub fn file_stem(&self) -> String {
        match self {
            LigandId::Cid(cid) => cid.to_string(),
            LigandId::Name(name) => sanitize_stem(name),
        }
    }
}

impl fmt::Display for LigandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.query())
    }
}

/// A UniProt accession, used to address AlphaFold models.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReceptorId(String);

impl ReceptorId {
    /// Accessions are upper-cased, so `p00533` and `P00533` share one file.
    pub fn parse(raw: &str) -> Result<Self, VinaflowError> {
        let raw = raw.trim();
        if !accession_regex().is_match(raw) {
            return Err(VinaflowError::InvalidIdentifier(raw.to_string()));
        }
        Ok(ReceptorId(raw.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_stem(&self) -> String {
        sanitize_stem(&self.0)
    }
}

impl fmt::Display for ReceptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which side of a pair a structure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    Ligand,
    Receptor,
}

impl StructureKind {
    /// Extension of the downloaded (unconverted) file.
    pub fn source_extension(&self) -> &'static str {
        match self {
            StructureKind::Ligand => "sdf",
            StructureKind::Receptor => "pdb",
        }
    }
}

impl fmt::Display for StructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructureKind::Ligand => f.write_str("ligand"),
            StructureKind::Receptor => f.write_str("receptor"),
        }
    }
}

/// One structure that has to be fetched and converted before docking.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InputStructure {
    Ligand(LigandId),
    Receptor(ReceptorId),
}

impl InputStructure {
    pub fn kind(&self) -> StructureKind {
        match self {
            InputStructure::Ligand(_) => StructureKind::Ligand,
            InputStructure::Receptor(_) => StructureKind::Receptor,
        }
    }

    pub fn file_stem(&self) -> String {
        match self {
            InputStructure::Ligand(id) => id.file_stem(),
            InputStructure::Receptor(id) => id.file_stem(),
        }
    }
}

impl fmt::Display for InputStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputStructure::Ligand(id) => write!(f, "ligand '{}'", id),
            InputStructure::Receptor(id) => write!(f, "receptor '{}'", id),
        }
    }
}

// ── Pairs ─────────────────────────────────────────────────────────────────────

/// A single ligand–receptor docking pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairSpec {
    pub receptor: ReceptorId,
    pub ligand: LigandId,
}

impl PairSpec {
    /// Stem shared by every per-pair artifact (config, pose, log).
    pub fn file_stem(&self) -> String {
        format!("{}__{}", self.ligand.file_stem(), self.receptor.file_stem())
    }
}

impl fmt::Display for PairSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} vs {}", self.ligand, self.receptor)
    }
}

/// A CSV row that will not be docked.
#[derive(Debug, Clone, Serialize)]
pub struct RejectedRow {
    /// 1-based line number in the CSV (the header is line 1).
    pub line: u64,
    pub receptor: String,
    pub ligand: String,
    pub reason: String,
}

/// Ordered, de-duplicated set of pairs read from the input table.
#[derive(Debug, Clone, Default)]
pub struct PairTable {
    pub pairs: Vec<PairSpec>,
    pub rejected: Vec<RejectedRow>,
    pub duplicates: usize,
}

impl PairTable {
    /// Read the pair table from a CSV file.
    ///
    /// A missing file or a header without `receptor`/`ligand` columns is an
    /// environment error: nothing can be processed.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        if !path.is_file() {
            return Err(VinaflowError::Environment(format!(
                "Input CSV file '{}' does not exist",
                path.display()
            ))
            .into());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading pair table {}", path.display()))?;
        let table = Self::from_csv_str(&content)?;
        info!(
            path = %path.display(),
            pairs = table.pairs.len(),
            rejected = table.rejected.len(),
            duplicates = table.duplicates,
            "Loaded pair table"
        );
        Ok(table)
    }

    pub fn from_csv_str(content: &str) -> anyhow::Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers = reader.headers().map_err(VinaflowError::from)?.clone();
        let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
        let (Some(rec_col), Some(lig_col)) = (column("receptor"), column("ligand")) else {
            return Err(VinaflowError::Environment(format!(
                "pair table must have 'receptor' and 'ligand' columns, found: {}",
                headers.iter().collect::<Vec<_>>().join(", ")
            ))
            .into());
        };

        let mut table = PairTable::default();
        let mut seen: HashSet<PairSpec> = HashSet::new();
        // stem -> identifier, so two different ids never share a file
        let mut ligand_stems: HashMap<String, LigandId> = HashMap::new();
        let mut receptor_stems: HashMap<String, ReceptorId> = HashMap::new();
        let mut pair_stems: HashSet<String> = HashSet::new();

        for (idx, record) in reader.records().enumerate() {
            let line = idx as u64 + 2;
            let record = record.map_err(VinaflowError::from)?;
            let receptor_raw = record.get(rec_col).unwrap_or("").to_string();
            let ligand_raw = record.get(lig_col).unwrap_or("").to_string();

            if receptor_raw.is_empty() && ligand_raw.is_empty() {
                debug!(line, "Skipping blank row");
                continue;
            }

            let reject = |reason: String| RejectedRow {
                line,
                receptor: receptor_raw.clone(),
                ligand: ligand_raw.clone(),
                reason,
            };

            let receptor = match ReceptorId::parse(&receptor_raw) {
                Ok(r) => r,
                Err(e) => {
                    warn!(line, "Rejecting row: {}", e);
                    table.rejected.push(reject(format!("receptor: {}", e)));
                    continue;
                }
            };
            let ligand = match LigandId::parse(&ligand_raw) {
                Ok(l) => l,
                Err(e) => {
                    warn!(line, "Rejecting row: {}", e);
                    table.rejected.push(reject(format!("ligand: {}", e)));
                    continue;
                }
            };

            let pair = PairSpec { receptor, ligand };
            if seen.contains(&pair) {
                warn!(line, pair = %pair, "Dropping duplicate pair");
                table.duplicates += 1;
                continue;
            }

            if let Some(other) = ligand_stems.get(&pair.ligand.file_stem()) {
                if other != &pair.ligand {
                    table.rejected.push(reject(format!(
                        "ligand '{}' maps to the same file name as '{}'",
                        pair.ligand, other
                    )));
                    continue;
                }
            }
            if let Some(other) = receptor_stems.get(&pair.receptor.file_stem()) {
                if other != &pair.receptor {
                    table.rejected.push(reject(format!(
                        "receptor '{}' maps to the same file name as '{}'",
                        pair.receptor, other
                    )));
                    continue;
                }
            }
            if pair_stems.contains(&pair.file_stem()) {
                table.rejected.push(reject(format!(
                    "pair output name '{}' is already used by another pair",
                    pair.file_stem()
                )));
                continue;
            }

            ligand_stems.insert(pair.ligand.file_stem(), pair.ligand.clone());
            receptor_stems.insert(pair.receptor.file_stem(), pair.receptor.clone());
            pair_stems.insert(pair.file_stem());
            seen.insert(pair.clone());
            table.pairs.push(pair);
        }

        Ok(table)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Every distinct structure referenced by the table, in first-use order.
    pub fn unique_inputs(&self) -> Vec<InputStructure> {
        let mut seen = HashSet::new();
        let mut inputs = Vec::new();
        for pair in &self.pairs {
            for input in [
                InputStructure::Ligand(pair.ligand.clone()),
                InputStructure::Receptor(pair.receptor.clone()),
            ] {
                if seen.insert(input.clone()) {
                    inputs.push(input);
                }
            }
        }
        inputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cid_detection() {
        assert!(is_pubchem_cid("2244"));
        assert!(is_pubchem_cid("0"));
        assert!(!is_pubchem_cid("02244"));
        assert!(!is_pubchem_cid("aspirin"));
        assert!(!is_pubchem_cid("-5"));
        assert!(!is_pubchem_cid(""));
    }

    #[test]
    fn test_ligand_id_parsing() {
        assert_eq!(LigandId::parse(" 2244 ").unwrap(), LigandId::Cid(2244));
        assert_eq!(LigandId::parse("aspirin").unwrap(), LigandId::Name("aspirin".into()));
        assert_eq!(LigandId::parse("007").unwrap(), LigandId::Name("007".into()));
        assert!(LigandId::parse("   ").is_err());
        assert_eq!(LigandId::Cid(5).namespace(), "cid");
        assert_eq!(LigandId::Name("x".into()).namespace(), "name");
    }

    #[test]
    fn test_ligand_names_get_safe_file_stems() {
        let id = LigandId::parse("acetylsalicylic acid").unwrap();
        assert_eq!(id.file_stem(), "acetylsalicylic_acid");
        assert_eq!(LigandId::parse("../etc/passwd").unwrap().file_stem(), "_etc_passwd");
    }

    #[test]
    fn test_receptor_accession_validation() {
        assert_eq!(ReceptorId::parse("P00533").unwrap().as_str(), "P00533");
        assert!(ReceptorId::parse("P12345-2").is_ok());
        assert!(ReceptorId::parse("P005 33").is_err());
        assert!(ReceptorId::parse("a/b").is_err());
        assert!(ReceptorId::parse("").is_err());
    }

    #[test]
    fn test_table_reads_columns_in_any_order() {
        let csv = "ligand,notes,receptor\n2244,x,P00533\naspirin,y,P04637\n";
        let table = PairTable::from_csv_str(csv).unwrap();
        assert_eq!(table.pairs.len(), 2);
        assert_eq!(table.pairs[0].ligand, LigandId::Cid(2244));
        assert_eq!(table.pairs[1].receptor.as_str(), "P04637");
    }

    #[test]
    fn test_table_requires_both_columns() {
        let err = PairTable::from_csv_str("protein,compound\nP00533,2244\n").unwrap_err();
        let err = err.downcast::<VinaflowError>().unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_duplicates_and_bad_rows() {
        let csv = "receptor,ligand\n\
                   P00533,2244\n\
                   P00533, 2244 \n\
                   ,\n\
                   bad id,2244\n\
                   P04637,\n\
                   P04637,2244\n";
        let table = PairTable::from_csv_str(csv).unwrap();
        assert_eq!(table.pairs.len(), 2);
        assert_eq!(table.duplicates, 1);
        let lines: Vec<u64> = table.rejected.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![5, 6]);
    }

    #[test]
    fn test_receptor_case_variants_are_one_structure() {
        assert_eq!(ReceptorId::parse("p00533").unwrap().as_str(), "P00533");

        let csv = "receptor,ligand\nP00533,2244\np00533,2244\np00533,3672\n";
        let table = PairTable::from_csv_str(csv).unwrap();
        assert_eq!(table.pairs.len(), 2);
        assert_eq!(table.duplicates, 1);
        let receptors = table
            .unique_inputs()
            .into_iter()
            .filter(|i| i.kind() == StructureKind::Receptor)
            .count();
        assert_eq!(receptors, 1);
    }

    #[test]
    fn test_stem_collisions_are_rejected() {
        let csv = "receptor,ligand\nP00533,a b\nP00533,a_b\n";
        let table = PairTable::from_csv_str(csv).unwrap();
        assert_eq!(table.pairs.len(), 1);
        assert_eq!(table.rejected.len(), 1);
        assert!(table.rejected[0].reason.contains("same file name"));
    }

    #[test]
    fn test_unique_inputs_are_deduplicated_in_order() {
        let csv = "receptor,ligand\nP1,2244\nP2,2244\nP1,3672\n";
        let table = PairTable::from_csv_str(csv).unwrap();
        let inputs = table.unique_inputs();
        assert_eq!(
            inputs,
            vec![
                InputStructure::Ligand(LigandId::Cid(2244)),
                InputStructure::Receptor(ReceptorId::parse("P1").unwrap()),
                InputStructure::Receptor(ReceptorId::parse("P2").unwrap()),
                InputStructure::Ligand(LigandId::Cid(3672)),
            ]
        );
    }

    #[test]
    fn test_missing_file_is_environment_error() {
        let err = PairTable::from_path(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(err.downcast_ref::<VinaflowError>().map(|e| e.is_fatal()).unwrap_or(false));
    }
}
