//! Azure provider error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AzureError {
    #[error("az not found. Please install the Azure CLI: https://aka.ms/azure-cli")]
    AzNotFound,

    #[error("az authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("az {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Unexpected az output for {0}")]
    UnexpectedOutput(String),

    #[error("Value not available yet: {0}")]
    MissingOutput(String),

    #[error("Invalid resource ID: {0}")]
    InvalidResourceId(String),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("Boot script template error: {0}")]
    Template(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cloud error: {0}")]
    CloudError(#[from] cumulus_cloud::CloudError),
}

/// stderr fragments of failures that go away on their own
const TRANSIENT_MARKERS: &[&str] = &[
    "AnotherOperationInProgress",
    "TooManyRequests",
    "RetryableError",
    "throttl",
    "Conflict: Operation",
];

impl AzureError {
    /// Whether retrying the same command may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            AzureError::CommandFailed { stderr, .. } => {
                TRANSIENT_MARKERS.iter().any(|m| stderr.contains(m))
            }
            _ => false,
        }
    }
}

impl From<AzureError> for cumulus_cloud::CloudError {
    fn from(err: AzureError) -> Self {
        use cumulus_cloud::CloudError;
        match err {
            AzureError::CloudError(e) => e,
            AzureError::AzNotFound | AzureError::AuthenticationFailed(_) => {
                CloudError::AuthenticationFailed(err.to_string())
            }
            AzureError::CommandFailed { .. } => CloudError::CommandFailed(err.to_string()),
            AzureError::UnknownResource(key) => CloudError::ResourceNotFound(key),
            AzureError::InvalidResourceId(_) | AzureError::Template(_) => {
                CloudError::InvalidConfig(err.to_string())
            }
            AzureError::IoError(e) => CloudError::Io(e),
            AzureError::JsonError(e) => CloudError::Json(e),
            other => CloudError::ApiError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AzureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let busy = AzureError::CommandFailed {
            command: "network vnet subnet create".to_string(),
            stderr: "(AnotherOperationInProgress) Another operation on this resource is in progress"
                .to_string(),
        };
        let invalid = AzureError::CommandFailed {
            command: "storage account create".to_string(),
            stderr: "(AccountNameInvalid) name is not valid".to_string(),
        };

        assert!(busy.is_transient());
        assert!(!invalid.is_transient());
        assert!(!AzureError::AzNotFound.is_transient());
    }

    #[test]
    fn test_maps_to_cloud_error() {
        let err: cumulus_cloud::CloudError = AzureError::AzNotFound.into();
        assert!(matches!(
            err,
            cumulus_cloud::CloudError::AuthenticationFailed(_)
        ));
    }
}
