use async_trait::async_trait;
use futures_util::stream;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use vmdash_alert::memory::MemoryAlertRepository;
use vmdash_alert::AlertRepository;
use vmdash_common::types::{Alert, AlertDigest};

use crate::error::{FeedError, Result};
use crate::filter::ViewFilter;
use crate::hub::FeedHub;
use crate::source::{ChangeStream, FeedSource};

/// Read side a [`LocalFeed`] takes its snapshots from.
#[async_trait]
pub trait AlertSnapshot: Send + Sync {
    async fn page(&self, filter: &ViewFilter) -> Result<Vec<Alert>>;
    async fn digests(&self) -> Result<Vec<AlertDigest>>;
}

#[async_trait]
impl AlertSnapshot for MemoryAlertRepository {
    async fn page(&self, filter: &ViewFilter) -> Result<Vec<Alert>> {
        let mut alerts: Vec<Alert> = self
            .snapshot()
            .into_iter()
            .filter(|a| filter.matches(a))
            .collect();
        alerts.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        alerts.truncate(filter.page_limit());
        Ok(alerts)
    }

    async fn digests(&self) -> Result<Vec<AlertDigest>> {
        AlertRepository::digests(self)
            .await
            .map_err(|e| FeedError::Query(e.to_string()))
    }
}

/// In-process feed: changes come straight from a [`FeedHub`].
pub struct LocalFeed {
    hub: FeedHub,
    snapshot: Arc<dyn AlertSnapshot>,
}

impl LocalFeed {
    pub fn new(hub: FeedHub, snapshot: Arc<dyn AlertSnapshot>) -> Self {
        Self { hub, snapshot }
    }
}

#[async_trait]
impl FeedSource for LocalFeed {
    async fn subscribe(&self) -> Result<ChangeStream> {
        let rx = self.hub.subscribe();
        let changes = stream::unfold(Some(rx), |rx| async move {
            let mut rx = rx?;
            match rx.recv().await {
                Ok(change) => Some((Ok(change), Some(rx))),
                // Report the gap once, then end the stream.
                Err(RecvError::Lagged(n)) => Some((Err(FeedError::Lagged(n)), None)),
                Err(RecvError::Closed) => None,
            }
        });
        Ok(Box::pin(changes))
    }

    async fn fetch_page(&self, filter: &ViewFilter) -> Result<Vec<Alert>> {
        self.snapshot.page(filter).await
    }

    async fn fetch_digests(&self) -> Result<Vec<AlertDigest>> {
        self.snapshot.digests().await
    }
}
