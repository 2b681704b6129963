//! Errors raised while talking to the Orka image API.

use std::sync::Arc;

use reqwest::StatusCode;
use thiserror::Error;

/// Failure of an image commit or save request.
///
/// The transport error is reference counted so the same value can be recorded
/// both in the step outcome and in the pipeline's error slot.
#[derive(Debug, Clone, Error)]
pub enum ImageError {
    /// Connection failure, timeout or any other error issuing the request.
    #[error("Orka API request failed [{0}]")]
    Transport(#[source] Arc<reqwest::Error>),

    /// The API answered with something other than `200 OK`.
    #[error("Orka API response error [{0}]")]
    Status(StatusCode),
}

impl From<reqwest::Error> for ImageError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(Arc::new(e))
    }
}

impl ImageError {
    /// HTTP status returned by the API, if the request got that far.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ImageError::Transport(e) => e.status(),
            ImageError::Status(s) => Some(*s),
        }
    }
}
