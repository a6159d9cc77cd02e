//! Error types for rulegate.

use thiserror::Error;

use crate::types::{FilterEngineStatus, RulesetType};

/// Error type for rulegate operations.
///
/// Every public operation returns errors from this taxonomy only. Failures
/// raised by storage and object-store collaborators are translated into
/// these variants at the API boundary via the `From` conversions below.
#[derive(Error, Debug)]
pub enum Error {
    /// A required configuration item is missing or malformed
    #[error("configuration error: {0}")]
    Configuration(String),

    /// `check_url` was called while the filter engine was not ready
    #[error("filter engine not ready, status is {0}")]
    FilterEngineNotReady(FilterEngineStatus),

    /// Malformed ruleset metadata was encountered while listing rulesets
    #[error("malformed ruleset metadata: {0}")]
    DataFormat(String),

    /// A URL supplied for a blocking exception has no extractable host
    #[error("URL format error: {0}")]
    UrlFormat(String),

    /// The identity or session backing the object store rejected the request
    #[error("user is not authorized: {0}")]
    UnauthorizedUser(String),

    /// An active ruleset has no locally cached rules
    #[error("ruleset {0} has not been downloaded, call update_rulesets first")]
    NoSuchRuleset(RulesetType),

    /// Generic I/O failure from storage or a remote download
    #[error("storage or download operation failed")]
    Failed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Any unrecognized failure, original cause preserved
    #[error("unexpected error")]
    Unknown(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Result type alias for rulegate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for object store operations.
///
/// Implementations of [`crate::store::ObjectStore`] report failures with
/// this enum; the client maps them onto [`Error`] at its API boundary.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The requested object does not exist
    #[error("object not found: {0}")]
    NotFound(String),

    /// Object metadata could not be parsed
    #[error("malformed object metadata: {0}")]
    Metadata(String),

    /// The store rejected the caller's identity or session
    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other store failure
    #[error("store error: {0}")]
    Other(String),
}

// Central translation step: collaborator failures funnel through these two
// conversions, so no collaborator-specific error type leaks to callers.
impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Metadata(m) => Error::DataFormat(m),
            StoreError::Unauthorized(m) => Error::UnauthorizedUser(m),
            StoreError::NotFound(_) | StoreError::Io(_) => Error::Failed(Box::new(e)),
            StoreError::Other(_) => Error::Unknown(Box::new(e)),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Failed(Box::new(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_translation() {
        let e: Error = StoreError::Metadata("bad blob".to_string()).into();
        assert!(matches!(e, Error::DataFormat(_)));

        let e: Error = StoreError::Unauthorized("no session".to_string()).into();
        assert!(matches!(e, Error::UnauthorizedUser(_)));

        let e: Error = StoreError::NotFound("easylist.txt".to_string()).into();
        assert!(matches!(e, Error::Failed(_)));

        let e: Error = StoreError::Other("boom".to_string()).into();
        assert!(matches!(e, Error::Unknown(_)));
    }

    #[test]
    fn test_io_error_translation() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let e: Error = io.into();
        assert!(matches!(e, Error::Failed(_)));
    }

    #[test]
    fn test_not_ready_message_names_status() {
        let e = Error::FilterEngineNotReady(FilterEngineStatus::Preparing);
        assert!(e.to_string().contains("PREPARING"));
    }
}
