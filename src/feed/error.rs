use crate::remote::RemoteError;
use thiserror::Error;

/// Classified reason a fetch session did not produce a page.
///
/// Produced at the session boundary; the controller never sees a raw
/// [`RemoteError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    /// The session was superseded or aborted. Never shown to the user.
    #[error("Request cancelled")]
    Cancelled,
    /// The server could not be reached.
    #[error("Network failure: {0}")]
    Network(String),
    /// The server answered with a structured error message.
    #[error("Remote error: {0}")]
    Remote(String),
    /// Anything else.
    #[error("Unexpected failure: {0}")]
    Unclassified(String),
}

impl FetchFailure {
    pub fn classify(error: &RemoteError) -> Self {
        match error {
            RemoteError::Network(e) if e.is_decode() || e.is_body() => {
                FetchFailure::Unclassified(error.to_string())
            }
            RemoteError::Network(_) | RemoteError::Timeout(_) => {
                FetchFailure::Network(error.to_string())
            }
            RemoteError::Api { message, .. } => FetchFailure::Remote(message.clone()),
            RemoteError::HttpStatus(_)
            | RemoteError::Decode(_)
            | RemoteError::ResponseTooLarge(_)
            | RemoteError::InvalidBaseUrl(_)
            | RemoteError::InsecureBaseUrl
            | RemoteError::InvalidCollection(_)
            | RemoteError::Realtime(_) => FetchFailure::Unclassified(error.to_string()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchFailure::Cancelled)
    }

    /// Message suitable for the error banner.
    ///
    /// Returns `None` for [`FetchFailure::Cancelled`].
    pub fn user_message(&self) -> Option<String> {
        match self {
            FetchFailure::Cancelled => None,
            FetchFailure::Network(_) => {
                Some("Could not reach the server. Please check your connection.".to_string())
            }
            FetchFailure::Remote(message) => Some(format!("Server error: {}", message)),
            FetchFailure::Unclassified(_) => {
                Some("Could not load prompts. Please try again later.".to_string())
            }
        }
    }
}

impl From<RemoteError> for FetchFailure {
    fn from(error: RemoteError) -> Self {
        FetchFailure::classify(&error)
    }
}
