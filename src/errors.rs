//! Error types for the resource pool

use crate::record::ResourceId;
use thiserror::Error;

/// Rejected pool construction.
///
/// Returned synchronously from [`Pool::new`](crate::Pool::new); no pool and no
/// reaper exist when this is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("a create callback is required")]
    MissingCreate,

    #[error("a destroy callback is required")]
    MissingDestroy,

    #[error("max ({max}) must be greater than or equal to min ({min})")]
    MaxBelowMin { min: usize, max: usize },

    #[error("failed to start the idle reaper: {0}")]
    ReaperSpawn(String),
}

/// Errors returned by pool operations.
///
/// `E` is the error type of the caller's create/destroy callbacks. Callback
/// errors are carried unchanged; see [`PoolError::into_callback_error`].
#[derive(Error, Debug)]
pub enum PoolError<E> {
    #[error("the pool has been destroyed")]
    Destroyed,

    #[error("the pool is saturated and no resource can be reused")]
    Exhausted,

    #[error("failed to create resource: {0}")]
    CreateFailed(#[source] E),

    #[error("failed to destroy resource {id}: {source}")]
    DestroyFailed {
        id: ResourceId,
        #[source]
        source: E,
    },

    #[error("operation was cancelled")]
    Cancelled,
}

impl<E> PoolError<E> {
    /// The callback error behind `CreateFailed` or `DestroyFailed`, if any.
    pub fn into_callback_error(self) -> Option<E> {
        match self {
            PoolError::CreateFailed(err) => Some(err),
            PoolError::DestroyFailed { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_destroyed(&self) -> bool {
        matches!(self, PoolError::Destroyed)
    }
}

pub type PoolResult<T, E> = Result<T, PoolError<E>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_error_is_returned_verbatim() {
        let err: PoolError<&str> = PoolError::DestroyFailed {
            id: ResourceId::new(3),
            source: "socket busy",
        };
        assert_eq!(err.to_string(), "failed to destroy resource 3: socket busy");
        assert_eq!(err.into_callback_error(), Some("socket busy"));

        let err: PoolError<&str> = PoolError::Destroyed;
        assert!(err.is_destroyed());
        assert_eq!(err.into_callback_error(), None);
    }

    #[test]
    fn test_config_error_message() {
        let err = ConfigError::MaxBelowMin { min: 5, max: 1 };
        assert_eq!(
            err.to_string(),
            "max (1) must be greater than or equal to min (5)"
        );
    }
}
