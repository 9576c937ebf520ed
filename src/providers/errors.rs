use thiserror::Error;

/// Errors raised while talking to an external survey or mapping
/// service. All of these describe upstream trouble: the caller's own
/// input is validated before a provider is ever contacted.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Transport failure calling {url}: {message}")]
    Transport { url: String, message: String },
    #[error("Provider returned HTTP {status} for {url}")]
    Status { status: u16, url: String },
    #[error("Cannot decode provider payload from {url}: {message}")]
    Payload { url: String, message: String },
    #[error("Provider record {record_id} is missing required field `{field}`")]
    MissingField { record_id: String, field: String },
}

/// Helper methods for creating errors with context information
impl ProviderError {
    pub fn transport_with_context(url: impl Into<String>, err: impl std::fmt::Display) -> Self {
        ProviderError::Transport {
            url: url.into(),
            message: err.to_string(),
        }
    }

    pub fn payload_with_context(url: impl Into<String>, err: impl std::fmt::Display) -> Self {
        ProviderError::Payload {
            url: url.into(),
            message: err.to_string(),
        }
    }
}
