//! Error types for the memoization layer
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Errors raised by the cache itself, never by the wrapped computation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Configuration rejected at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Call arguments could not be encoded into a fingerprint
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::KeyDerivation(err.to_string())
    }
}

// == Call Error Enum ==
/// Outcome of a failed call through a fallible wrapper.
///
/// `Compute` carries the target's own error untouched.
#[derive(Error, Debug)]
pub enum CallError<E> {
    /// The cache refused the call before the target ran
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The wrapped computation failed; nothing was cached
    #[error("Computation failed: {0}")]
    Compute(E),
}

impl<E> CallError<E> {
    /// Returns the target's error, if that is what failed.
    pub fn into_compute(self) -> Option<E> {
        match self {
            CallError::Compute(err) => Some(err),
            CallError::Cache(_) => None,
        }
    }

    /// True if the failure came from the wrapped computation.
    pub fn is_compute(&self) -> bool {
        matches!(self, CallError::Compute(_))
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_error_maps_to_key_derivation() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        let cache_err: CacheError = err.into();
        assert!(matches!(cache_err, CacheError::KeyDerivation(_)));
    }

    #[test]
    fn test_call_error_into_compute() {
        let err: CallError<&str> = CallError::Compute("boom");
        assert!(err.is_compute());
        assert_eq!(err.into_compute(), Some("boom"));

        let err: CallError<&str> = CacheError::InvalidConfig("x".into()).into();
        assert!(!err.is_compute());
        assert_eq!(err.into_compute(), None);
    }

    #[test]
    fn test_error_messages() {
        let err = CacheError::InvalidConfig("ttl must be positive".into());
        assert_eq!(err.to_string(), "Invalid configuration: ttl must be positive");

        let err: CallError<CacheError> = CallError::Compute(CacheError::KeyDerivation("k".into()));
        assert_eq!(err.to_string(), "Computation failed: Key derivation failed: k");
    }
}
