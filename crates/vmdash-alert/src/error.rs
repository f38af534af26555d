use vmdash_common::types::AlertStatus;

/// Errors reported by the alert lifecycle.
///
/// State-machine violations are always surfaced to the caller; none of these
/// are retried inside this crate.
///
/// # Examples
///
/// ```rust
/// use vmdash_alert::error::AlertError;
/// use vmdash_common::types::AlertStatus;
///
/// let err = AlertError::InvalidTransition {
///     id: "42".to_string(),
///     from: AlertStatus::Resolved,
///     action: "acknowledge",
/// };
/// assert!(err.to_string().contains("resolved"));
/// assert!(!err.is_retryable());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    /// No alert with this id exists.
    #[error("Alert: alert {0} not found")]
    NotFound(String),

    /// The action is not permitted from the alert's current status.
    #[error("Alert: cannot {action} alert {id} in status {from}")]
    InvalidTransition {
        id: String,
        from: AlertStatus,
        action: &'static str,
    },

    /// Missing, malformed or expired bearer token.
    #[error("Alert: authentication failed: {0}")]
    Auth(String),

    /// Network or storage unavailable. Retryable by the caller.
    #[error("Alert: transient I/O failure: {0}")]
    TransientIo(String),
}

impl AlertError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AlertError::TransientIo(_))
    }
}

/// Convenience `Result` alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, AlertError>;
