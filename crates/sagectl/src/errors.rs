//! Error codes and exit status for sagectl

use reqwest::StatusCode;
use thiserror::Error;

/// Exit code for success
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code for general errors
pub const EXIT_GENERAL_ERROR: i32 = 1;

/// Exit code when a progress command runs without --user
pub const EXIT_USAGE: i32 = 64;

/// Exit code when daemon returns invalid JSON
pub const EXIT_INVALID_RESPONSE: i32 = 65;

/// Exit code when a topic, path or puzzle does not exist
pub const EXIT_NOT_FOUND: i32 = 66;

/// Exit code when daemon is unavailable/unreachable
pub const EXIT_DAEMON_UNAVAILABLE: i32 = 70;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no user given (use --user or SAGE_USER)")]
    MissingUser,

    #[error("cannot reach saged at {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("saged returned {status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error("invalid response from saged: {0}")]
    InvalidResponse(String),
}

/// Exit status for a failed command
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<ClientError>() {
        Some(ClientError::MissingUser) => EXIT_USAGE,
        Some(ClientError::Unreachable { .. }) => EXIT_DAEMON_UNAVAILABLE,
        Some(ClientError::InvalidResponse(_)) => EXIT_INVALID_RESPONSE,
        Some(ClientError::Api { status, .. }) => match *status {
            StatusCode::NOT_FOUND => EXIT_NOT_FOUND,
            StatusCode::UNAUTHORIZED | StatusCode::BAD_REQUEST => EXIT_USAGE,
            StatusCode::SERVICE_UNAVAILABLE => EXIT_DAEMON_UNAVAILABLE,
            _ => EXIT_GENERAL_ERROR,
        },
        None => EXIT_GENERAL_ERROR,
    }
}
