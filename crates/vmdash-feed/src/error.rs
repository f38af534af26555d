/// Errors raised by feed sources and subscriptions.
///
/// Every variant is treated as a disconnect by [`crate::Subscription`],
/// which reconnects and resyncs.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The change stream ended or the socket failed.
    #[error("Feed: transport error: {0}")]
    Transport(String),

    /// The subscriber fell behind and the hub dropped events.
    #[error("Feed: subscriber lagged, {0} events dropped")]
    Lagged(u64),

    /// A frame or response body could not be decoded.
    #[error("Feed: decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// An HTTP request to the alert API failed.
    #[error("Feed: HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The alert API answered with a non-zero error code.
    #[error("Feed: API error {code}: {message}")]
    Api { code: i32, message: String },

    /// Reading the snapshot from the local store failed.
    #[error("Feed: query failed: {0}")]
    Query(String),
}

/// Convenience `Result` alias for feed operations.
pub type Result<T> = std::result::Result<T, FeedError>;
