use thiserror::Error;

/// Coarse classification used by callers to decide how an error propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    UpstreamUnavailable,
    DeliveryFailure,
    ConfigError,
}

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Unknown sector: '{0}'")]
    UnknownSector(String),

    #[error("News source unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Notification delivery failed: {0}")]
    DeliveryFailure(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl AnalyzerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalyzerError::UnknownSector(_) => ErrorKind::InvalidInput,
            AnalyzerError::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            AnalyzerError::DeliveryFailure(_) => ErrorKind::DeliveryFailure,
            AnalyzerError::Config(_) => ErrorKind::ConfigError,
        }
    }
}
