//! Error types for dataset registry loading.

use thiserror::Error;

/// Result type alias using RegistryError.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors raised while loading or validating the dataset registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to read registry file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse registry: {0}")]
    Parse(String),

    #[error("Invalid descriptor for dataset '{dataset}': {message}")]
    InvalidDescriptor { dataset: String, message: String },

    #[error("Unknown datatype: {0}")]
    UnknownDatatype(String),
}

impl RegistryError {
    pub fn invalid(dataset: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            dataset: dataset.into(),
            message: message.into(),
        }
    }
}

impl From<serde_yaml::Error> for RegistryError {
    fn from(err: serde_yaml::Error) -> Self {
        RegistryError::Parse(err.to_string())
    }
}
