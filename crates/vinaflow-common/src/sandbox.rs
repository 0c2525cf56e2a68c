use reqwest::{Client, ClientBuilder};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;
use crate::error::VinaflowError;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// An HTTP client that only allows requests to approved domains.
/// vinaflow only ever talks to the structure databases it downloads from.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    allowlist: HashSet<String>,
}

impl SandboxClient {
    /// Creates a new SandboxClient with the default allowlist and timeout.
    pub fn new() -> Result<Self, VinaflowError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a new SandboxClient with the default allowlist and a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, VinaflowError> {
        let mut allowlist = HashSet::new();
        let domains = vec![
            "pubchem.ncbi.nlm.nih.gov", // PubChem PUG REST
            "alphafold.ebi.ac.uk",      // AlphaFold DB
            "files.rcsb.org",           // RCSB PDB
        ];

        for d in domains {
            allowlist.insert(d.to_string());
        }

        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("vinaflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| VinaflowError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, allowlist })
    }

    /// Appends an exact hostname to the allowlist.
    pub fn allow_domain(&mut self, domain: &str) {
        self.allowlist.insert(domain.to_string());
    }

    /// Validates if a URL is permitted under the current sandbox policy.
    pub fn is_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        // Exact match or a subdomain of an allowed domain
        self.allowlist
            .iter()
            .any(|allowed| host == allowed || host.ends_with(&format!(".{}", allowed)))
    }

    /// Exposes the inner `reqwest::Client` builder for GET requests on allowed URLs.
    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, VinaflowError> {
        if !self.is_allowed(url) {
            tracing::warn!(url, "Blocked request outside the download allowlist");
            return Err(VinaflowError::Security(format!(
                "Network capabilities capped: domain not in allowlist for URL {}",
                url
            )));
        }

        Ok(self.client.get(url))
    }
}
