use vmdash_alert::error::AlertError;

/// Errors that can occur within the storage layer.
///
/// # Examples
///
/// ```rust
/// use vmdash_storage::error::StorageError;
///
/// let err = StorageError::Corrupt {
///     column: "alerts.status",
///     value: "pending".to_string(),
/// };
/// assert!(err.to_string().contains("alerts.status"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A required record was not found in the database.
    #[error("Storage: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// An underlying database error (connection, query or migration).
    #[error("Storage: database error: {0}")]
    Db(#[from] sea_orm::DbErr),

    /// A stored value could not be mapped back onto its domain type.
    #[error("Storage: unexpected value '{value}' in column '{column}'")]
    Corrupt { column: &'static str, value: String },
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

impl From<StorageError> for AlertError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound { id, .. } => AlertError::NotFound(id),
            other => AlertError::TransientIo(other.to_string()),
        }
    }
}
