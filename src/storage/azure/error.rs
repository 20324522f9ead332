use thiserror::Error;

/// Azure-specific errors from the management or blob endpoints.
///
/// SECURITY: messages must NEVER contain the bearer token or account keys.
#[derive(Debug, Error)]
pub enum AzureError {
    /// Token rejected by the management plane
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// Non-success response with the service's error code, if any
    #[error("API error ({status}) {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("no storage account keys found for '{account}'")]
    NoAccountKeys { account: String },

    #[error("storage account key for '{account}' is not valid base64")]
    InvalidKey { account: String },

    #[error("failed to parse response: {message}")]
    Parse { message: String },
}

impl From<AzureError> for crate::storage::StorageError {
    fn from(err: AzureError) -> Self {
        crate::storage::StorageError::Azure(err.to_string())
    }
}
