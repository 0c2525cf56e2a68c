//! PubChem PUG REST client for 3-D ligand structures.
//!
//! Endpoint: https://pubchem.ncbi.nlm.nih.gov/rest/pug/compound/{cid|name}/{id}/SDF?record_type=3d

use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, instrument};
use url::Url;
use vinaflow_common::sandbox::SandboxClient as Client;
use vinaflow_common::VinaflowError;

use super::StructureSource;
use crate::pairs::{InputStructure, LigandId};

const PUBCHEM_COMPOUND_URL: &str = "https://pubchem.ncbi.nlm.nih.gov/rest/pug/compound";

pub struct PubChemClient {
    client: Client,
}

impl PubChemClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build the SDF download URL. Names are percent-encoded as a single path segment.
    pub fn sdf_url(ligand: &LigandId) -> anyhow::Result<String> {
        let mut url = Url::parse(PUBCHEM_COMPOUND_URL)?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("PubChem base URL cannot be a base"))?
            .push(ligand.namespace())
            .push(&ligand.query())
            .push("SDF");
        url.query_pairs_mut().append_pair("record_type", "3d");
        Ok(url.into())
    }
}

#[async_trait]
impl StructureSource for PubChemClient {
    fn name(&self) -> &str {
        "pubchem"
    }

    #[instrument(skip(self), fields(source = "pubchem"))]
    async fn download(&self, input: &InputStructure) -> anyhow::Result<Vec<u8>> {
        let InputStructure::Ligand(ligand) = input else {
            anyhow::bail!("PubChem only serves ligands, got {}", input);
        };

        let url = Self::sdf_url(ligand)?;
        debug!(%url, "Requesting 3D SDF");

        let response = self.client.get(&url)?.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(VinaflowError::Download {
                id: ligand.query(),
                reason: format!("PubChem returned HTTP {}", status),
            }
            .into());
        }

        let body = response
            .bytes()
            .await
            .with_context(|| format!("reading PubChem response for '{}'", ligand))?;
        Ok(body.to_vec())
    }
}
