//! AlphaFold DB structure fetching.

use async_trait::async_trait;
use tracing::{debug, instrument};
use vinaflow_common::sandbox::SandboxClient as Client;
use vinaflow_common::VinaflowError;

use super::StructureSource;
use crate::pairs::{InputStructure, ReceptorId};

const ALPHAFOLD_FILES_URL: &str = "https://alphafold.ebi.ac.uk/files";

/// Model version served by the AlphaFold DB file endpoint.
pub const DEFAULT_MODEL_VERSION: u32 = 4;

/// Client for fetching predicted receptor structures by UniProt accession.
pub struct AlphaFoldClient {
    client: Client,
    model_version: u32,
}

impl AlphaFoldClient {
    pub fn new(client: Client) -> Self {
        Self { client, model_version: DEFAULT_MODEL_VERSION }
    }

    pub fn with_model_version(mut self, version: u32) -> Self {
        self.model_version = version;
        self
    }

    pub fn model_url(&self, receptor: &ReceptorId) -> String {
        format!(
            "{}/AF-{}-F1-model_v{}.pdb",
            ALPHAFOLD_FILES_URL,
            receptor.as_str(),
            self.model_version
        )
    }
}

#[async_trait]
impl StructureSource for AlphaFoldClient {
    fn name(&self) -> &str {
        "alphafold"
    }

    #[instrument(skip(self), fields(source = "alphafold"))]
    async fn download(&self, input: &InputStructure) -> anyhow::Result<Vec<u8>> {
        let InputStructure::Receptor(receptor) = input else {
            anyhow::bail!("AlphaFold only serves receptors, got {}", input);
        };

        let url = self.model_url(receptor);
        debug!(%url, "Requesting AlphaFold model");

        let response = self.client.get(&url)?.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(VinaflowError::Download {
                id: receptor.to_string(),
                reason: format!("AlphaFold returned HTTP {}", status),
            }
            .into());
        }

        Ok(response.bytes().await?.to_vec())
    }
}
