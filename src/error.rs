use thiserror::Error;
use tracing::error;

#[derive(Debug)]
pub struct AppError(pub &'static str);

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for AppError {}

pub async fn handle_error(e: impl std::error::Error) {
    error!("ERROR: {e}")
}

/// Failure outcomes of the side-effecting actions the dialogue engine can invoke.  None of these
/// ever reach the caller verbatim; see `actions::booking_apology` and `actions::transfer_apology`.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("precondition unmet: {0}")]
    PreconditionUnmet(&'static str),

    #[error("remote rejected request with status {0}")]
    RemoteRejected(reqwest::StatusCode),

    #[error("transport failure: {0}")]
    TransportFailure(#[from] reqwest::Error),

    #[error("call already terminated")]
    AlreadyTerminated,

    #[error("invalid tool arguments: {0}")]
    InvalidArguments(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("failed to read prompt file {path}: {source}")]
    PromptFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
