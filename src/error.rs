//! Error types for the QVR Pro client and camera adapter

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QvrError {
    #[error("Must provide {0}.")]
    ConfigurationMissing(&'static str),

    #[error("auth failed: {0}")]
    AuthenticationFailed(String),

    #[error("API call failed: {0}")]
    ApiCallFailed(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("camera not found: {0}")]
    CameraNotFound(String),

    #[error("camera {0} has no configured streams")]
    NoStreams(String),
}

impl From<serde_json::Error> for QvrError {
    fn from(err: serde_json::Error) -> Self {
        QvrError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, QvrError>;
