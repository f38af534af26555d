use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;
use vmdash_common::types::{Alert, AlertChange, AlertDigest};

use crate::error::Result;
use crate::filter::ViewFilter;

/// Ordered stream of changes for one connection. Ends or yields an error
/// when the connection is lost.
pub type ChangeStream = Pin<Box<dyn Stream<Item = Result<AlertChange>> + Send>>;

/// Where a viewer gets its snapshot and its live changes from.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Opens the change stream. Callers subscribe before fetching the
    /// snapshot so nothing published in between is missed.
    async fn subscribe(&self) -> Result<ChangeStream>;

    /// The first page of alerts matching `filter`, newest first.
    async fn fetch_page(&self, filter: &ViewFilter) -> Result<Vec<Alert>>;

    /// Digests of the whole collection.
    async fn fetch_digests(&self) -> Result<Vec<AlertDigest>>;
}
