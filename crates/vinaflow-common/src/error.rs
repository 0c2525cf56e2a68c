use thiserror::Error;

#[derive(Debug, Error)]
pub enum VinaflowError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unrecoverable setup problem (missing engine, missing input table).
    /// Raised before any pair is processed.
    #[error("Environment error: {0}")]
    Environment(String),

    #[error("Download failed for '{id}': {reason}")]
    Download { id: String, reason: String },

    #[error("Conversion failed for '{input}': {reason}")]
    Conversion { input: String, reason: String },

    #[error("Docking failed for {pair}: {reason}")]
    Docking { pair: String, reason: String },

    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Security error: {0}")]
    Security(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VinaflowError {
    /// True for failures that must abort the whole run rather than skip a pair.
    pub fn is_fatal(&self) -> bool {
        matches!(self, VinaflowError::Environment(_) | VinaflowError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, VinaflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_errors_are_fatal() {
        assert!(VinaflowError::Environment("vina not found".into()).is_fatal());
        assert!(!VinaflowError::Download { id: "2244".into(), reason: "404".into() }.is_fatal());
    }

    #[test]
    fn test_download_message_names_identifier() {
        let err = VinaflowError::Download { id: "P00533".into(), reason: "HTTP 404".into() };
        assert_eq!(err.to_string(), "Download failed for 'P00533': HTTP 404");
    }
}
