use thiserror::Error;

use crate::db::DbLockErrorExt;

pub type Result<T> = std::result::Result<T, ClusterError>;

/// Failures surfaced by the clustering core.
///
/// The retry classes (`TransientStore`, `ConcurrencyConflict`) leave the item unassigned so
/// the ingestion driver can try again; everything else is final for that call.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("cluster store unavailable: {0}")]
    TransientStore(String),

    #[error("malformed news item {item_id}: {reason}")]
    MalformedItem { item_id: i64, reason: String },

    #[error("concurrent assignment conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("invalid stored record: {0}")]
    InvalidRecord(String),
}

impl ClusterError {
    /// Whether the whole operation can safely be attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClusterError::TransientStore(_) | ClusterError::ConcurrencyConflict(_)
        )
    }
}

impl From<sqlx::Error> for ClusterError {
    fn from(err: sqlx::Error) -> Self {
        if err.is_database_lock_error() {
            return ClusterError::ConcurrencyConflict(err.to_string());
        }
        match err {
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                ClusterError::InvalidRecord(err.to_string())
            }
            other => ClusterError::TransientStore(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ClusterError {
    fn from(err: serde_json::Error) -> Self {
        ClusterError::InvalidRecord(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_classes() {
        assert!(ClusterError::TransientStore("db gone".into()).is_retryable());
        assert!(ClusterError::ConcurrencyConflict("lock".into()).is_retryable());
        assert!(!ClusterError::Configuration("bad".into()).is_retryable());
        assert!(!ClusterError::MalformedItem {
            item_id: 3,
            reason: "empty".into()
        }
        .is_retryable());
    }

    #[test]
    fn pool_timeouts_are_transient() {
        let err: ClusterError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, ClusterError::TransientStore(_)));
    }
}
