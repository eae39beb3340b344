use thiserror::Error;

/// Failures of a remediation cycle
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed configuration
    #[error("Config: {0}")]
    Config(String),

    /// Analysis backend request failed
    #[error("Analysis backend: {0}")]
    Backend(String),

    /// Model call failed or returned nothing usable (recovered per file)
    #[error("Model: {0}")]
    Model(String),

    /// A git command failed
    #[error("Git: {0}")]
    Git(String),

    /// Hosting API request failed
    #[error("Hosting API: {0}")]
    Hosting(String),

    /// The fix pass left the working tree unchanged
    #[error("The model failed to produce any fix: no changes to commit")]
    NoChanges,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
