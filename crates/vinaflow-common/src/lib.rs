//! vinaflow-common — Shared error type and the network-capped HTTP client used across vinaflow crates.

pub mod error;
pub mod sandbox;

// Re-export commonly used types
pub use error::{Result, VinaflowError};
pub use sandbox::SandboxClient;
