use thiserror::Error;

/// Top-level error type for the Strata persistence facade.
///
/// Write-side `Store` errors are always paired with an implicit rollback of
/// the failed write context before they are surfaced. `NotFound` is not a
/// variant on purpose: absence is represented as an empty collection or
/// `None`, which is unambiguous because fetch failures propagate as `Store`
/// errors instead of being collapsed into empty results.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StrataError {
    /// The backing store could not be opened or bootstrapped.
    #[error("Store open failed: {0}")]
    Open(String),

    /// Conversion between a domain item and a record failed.
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// The engine rejected a fetch, commit, or delete.
    #[error("Store error: {0}")]
    Store(String),

    /// The write executor is gone or a completion channel was severed.
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// A configuration file could not be read, parsed, or written.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for StrataError {
    fn from(err: toml::de::Error) -> Self {
        StrataError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for StrataError {
    fn from(err: toml::ser::Error) -> Self {
        StrataError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for StrataError {
    fn from(err: serde_json::Error) -> Self {
        StrataError::Mapping(err.to_string())
    }
}

/// A specialized `Result` type for Strata operations.
pub type Result<T> = std::result::Result<T, StrataError>;
