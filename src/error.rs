use thiserror::Error;

/// Errors surfaced by the photo-library service client.
#[derive(Debug, Error)]
pub enum Error {
    /// The request never produced a response (DNS, TLS, connection reset, ...).
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("photo service returned {status} for {endpoint}")]
    Status {
        endpoint: String,
        status: reqwest::StatusCode,
    },

    /// The response body did not match the expected payload.
    #[error("malformed photo service payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// No bearer token is available; the caller is signed out.
    #[error("not signed in")]
    SignedOut,
}

pub type ServiceResult<T> = std::result::Result<T, Error>;
