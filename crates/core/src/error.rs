use thiserror::Error;

pub type Result<T> = std::result::Result<T, PatrolError>;

#[derive(Debug, Error)]
pub enum PatrolError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("navigation failed: {url}")]
    Navigation {
        url: String,
        #[source]
        source: chromiumoxide::error::CdpError,
    },

    #[error("script injection failed: {0}")]
    Injection(String),

    #[error("queue request failed")]
    Queue(#[from] reqwest::Error),

    #[error("invalid queue endpoint: {0}")]
    QueueEndpoint(#[from] url::ParseError),

    #[error("timeout after {ms}ms waiting for: {condition}")]
    Timeout { ms: u64, condition: String },

    #[error(transparent)]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
