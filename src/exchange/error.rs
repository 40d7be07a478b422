use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExchangeError {
    /// Network failure, non-2xx status, or an unreadable body.
    /// `endpoint` is `"METHOD path"`.
    #[error("{endpoint} failed: {detail}")]
    Transport { endpoint: String, detail: String },
    #[error("Signing error: {0}")]
    Signing(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ExchangeError {
    pub fn transport(endpoint: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Transport {
            endpoint: endpoint.into(),
            detail: detail.into(),
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Transport { endpoint, .. } => Some(endpoint),
            _ => None,
        }
    }
}
