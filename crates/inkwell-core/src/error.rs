use crate::models::RelationshipKind;

/// Failure reported by a [`RemoteDataService`](crate::remote::RemoteDataService) call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// Transient transport failure; the call may be retried.
    #[error("Network error: {message}")]
    Network { message: String },
    /// Insert collided with an existing row under a uniqueness constraint.
    #[error("Unique constraint violation in {collection}")]
    UniqueViolation { collection: String },
    /// Non-retryable failure reported by the remote store.
    #[error("Remote error: {message}")]
    Remote { message: String },
}

impl RemoteError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }
}

/// One aggregation or search source failed; the remaining sources still produced results.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Source {collection} failed: {error}")]
pub struct SourceFailure {
    pub collection: String,
    pub error: RemoteError,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// The remote write behind a toggle failed and local state was rolled back.
    #[error("{kind} toggle on {target_id} failed: {source}")]
    ToggleFailed {
        kind: RelationshipKind,
        target_id: String,
        #[source]
        source: RemoteError,
    },
    #[error("Toggle task ended before it settled")]
    ToggleDropped,
    /// A read-state write was aborted before it reported back.
    #[error("Read-state write ended before completing")]
    PersistAborted,
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl CoreError {
    /// The underlying remote failure, if any.
    pub fn remote_error(&self) -> Option<&RemoteError> {
        match self {
            Self::ToggleFailed { source, .. } => Some(source),
            Self::Remote(error) => Some(error),
            Self::ToggleDropped | Self::PersistAborted => None,
        }
    }
}
