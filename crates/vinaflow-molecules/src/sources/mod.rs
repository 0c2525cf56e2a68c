//! Structure database clients.

pub mod pubchem;
pub mod alphafold;

use async_trait::async_trait;
use crate::pairs::InputStructure;

pub use alphafold::AlphaFoldClient;
pub use pubchem::PubChemClient;

/// Common interface for the databases structures are downloaded from.
#[async_trait]
pub trait StructureSource: Send + Sync {
    /// Short name used in logs ("pubchem", "alphafold").
    fn name(&self) -> &str;

    /// Download the raw structure file for `input`.
    async fn download(&self, input: &InputStructure) -> anyhow::Result<Vec<u8>>;
}
