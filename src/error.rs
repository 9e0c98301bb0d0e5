use std::fmt;

use thiserror::Error;

/// Message shown when stepping back past the oldest cached photo.
pub const NO_MORE_IMAGES: &str = "No more images!";

/// Failure of a single [`ImageSource`](crate::source::ImageSource) fetch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// No access key was configured, so no request can be made.
    #[error("Missing Unsplash API key. Set access-key in the config or UNSPLASH_ACCESS_KEY.")]
    MissingAccessKey,

    /// The API answered with a non-success status.
    #[error("Failed to fetch image: {reason}")]
    Status { status: u16, reason: String },

    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("{0}")]
    Transport(String),

    /// The response body did not match the photo schema.
    #[error("Invalid API response format: {0}")]
    Validation(#[from] ValidationError),

    /// Anything else, e.g. a body that is not JSON at all.
    #[error("{0}")]
    Unexpected(String),
}

impl SourceError {
    /// HTTP status attached to the failure, if the server answered.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// One problem found while checking a photo payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    /// Dotted path of the offending field, e.g. `urls.regular`.
    pub path: String,
    pub message: String,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// All issues found in a payload; never empty when returned as an error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{}", join_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// The error slot of a slideshow snapshot.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// `previous` was requested at the oldest cached photo.
    #[error("{}", NO_MORE_IMAGES)]
    NoMoreImages,

    /// A fetch failed; the cache was left untouched.
    #[error("{message}")]
    Fetch {
        message: String,
        status: Option<u16>,
    },
}

impl SessionError {
    /// Informational conditions are styled differently from real failures.
    pub fn is_informational(&self) -> bool {
        matches!(self, Self::NoMoreImages)
    }
}

impl From<&SourceError> for SessionError {
    fn from(err: &SourceError) -> Self {
        Self::Fetch {
            message: err.to_string(),
            status: err.status_code(),
        }
    }
}
