//! Error types for loadwire-core

use thiserror::Error;

/// Core error type
///
/// Every variant is fatal for the run: these are raised before the load
/// generator is launched.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A request body that is neither text nor a key-value map
    #[error("cannot handle 'body' option of type {kind}: {value}")]
    UnsupportedBody {
        /// Name of the offending value type
        kind: &'static str,
        /// Rendering of the offending value
        value: String,
    },

    /// Unknown result codec requested
    #[error("unsupported output format: {0}")]
    UnsupportedOutput(String),

    /// Records target more than one address while a single target is required
    #[error("inconsistent target address: expected {expected}, found {found}")]
    InconsistentTarget {
        /// Address of the first record
        expected: String,
        /// Conflicting address
        found: String,
    },

    /// Compilation produced zero records
    #[error("no requests were generated, check the 'requests' section of the scenario")]
    NoRequests,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML (de)serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
