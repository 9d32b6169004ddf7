//! Error types for organizer-core
//!
//! Item-scoped failures (one recipe, one taxonomy item) are recorded in run
//! reports and never abort a run. Resource-scoped failures (store or provider
//! unreachable) abort the current run.

use thiserror::Error;

/// Organizer error taxonomy
#[derive(Debug, Error)]
pub enum OrganizerError {
    /// Invalid option combination; raised before any remote call
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Recipe store or provider cannot be reached
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// Timeout or rate limit that survived every retry
    #[error("Provider transient failure: {0}")]
    ProviderTransient(String),

    /// Authentication failure or unusable provider response
    #[error("Provider failure: {0}")]
    ProviderPermanent(String),

    /// Provider returned names outside the allowed taxonomy
    #[error("Validation failure: {0}")]
    ValidationFailure(String),

    /// Result cache could not be read
    #[error("Cache corruption: {0}")]
    CacheCorruption(String),

    /// Recipe store rejected a single item
    #[error("Store rejected request: {0}")]
    StoreRejected(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// organizer-common error
    #[error("Common error: {0}")]
    Common(#[from] organizer_common::Error),
}

impl OrganizerError {
    /// Whether the error ends the current run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            OrganizerError::Configuration(_) | OrganizerError::RemoteUnavailable(_)
        )
    }

    /// Whether the error concerns a single recipe or taxonomy item
    pub fn is_item_scoped(&self) -> bool {
        matches!(
            self,
            OrganizerError::ProviderTransient(_)
                | OrganizerError::ProviderPermanent(_)
                | OrganizerError::ValidationFailure(_)
                | OrganizerError::StoreRejected(_)
        )
    }
}

/// Result type for organizer operations
pub type OrganizerResult<T> = Result<T, OrganizerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality_follows_scope() {
        assert!(OrganizerError::Configuration("x".into()).is_fatal());
        assert!(OrganizerError::RemoteUnavailable("x".into()).is_fatal());
        assert!(!OrganizerError::ProviderTransient("x".into()).is_fatal());
        assert!(!OrganizerError::ProviderPermanent("x".into()).is_fatal());
        assert!(!OrganizerError::ValidationFailure("x".into()).is_fatal());
        assert!(!OrganizerError::CacheCorruption("x".into()).is_fatal());
        assert!(!OrganizerError::StoreRejected("x".into()).is_fatal());

        assert!(OrganizerError::StoreRejected("x".into()).is_item_scoped());
        assert!(!OrganizerError::RemoteUnavailable("x".into()).is_item_scoped());
    }

    #[test]
    fn test_common_config_error_converts() {
        let err: OrganizerError = organizer_common::Error::Config("bad".into()).into();
        assert!(matches!(err, OrganizerError::Common(_)));
    }
}
