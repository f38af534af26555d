use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use vmdash_common::types::{AlertChange, AlertStats};

use crate::backoff::Backoff;
use crate::error::Result;
use crate::filter::ViewFilter;
use crate::source::{ChangeStream, FeedSource};
use crate::stats::StatsIndex;
use crate::toast::{Toast, ToastPolicy};
use crate::view::{AlertView, ViewChange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Connecting,
    Active,
    Disconnected,
}

/// What [`Subscription::next_event`] observed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// (Re)connected and refetched the filtered page and the digests.
    Resynced { visible: usize, total: usize },
    /// A live change was applied to the view and the stats index.
    Change {
        change: AlertChange,
        view: ViewChange,
        toast: Option<Toast>,
    },
    /// The connection was lost or could not be opened.
    Disconnected { error: String, retry_in: Duration },
}

/// A viewer's live subscription to the alert feed.
///
/// Local state only changes in response to the source: a resync replaces
/// the view and the stats index, and each change event patches both.
pub struct Subscription {
    source: Arc<dyn FeedSource>,
    view: AlertView,
    stats: StatsIndex,
    toasts: ToastPolicy,
    backoff: Backoff,
    state: SubscriptionState,
    stream: Option<ChangeStream>,
    retry_after: Option<Duration>,
}

impl Subscription {
    pub fn new(source: Arc<dyn FeedSource>, filter: ViewFilter) -> Self {
        Self {
            source,
            view: AlertView::new(filter),
            stats: StatsIndex::new(),
            toasts: ToastPolicy::default(),
            backoff: Backoff::default(),
            state: SubscriptionState::Disconnected,
            stream: None,
            retry_after: None,
        }
    }

    pub fn with_toast_policy(mut self, policy: ToastPolicy) -> Self {
        self.toasts = policy;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn view(&self) -> &AlertView {
        &self.view
    }

    pub fn stats(&self) -> AlertStats {
        self.stats.stats()
    }

    /// Subscribes to the change stream, then refetches the filtered page
    /// and the digests.
    pub async fn connect(&mut self) -> Result<()> {
        self.state = SubscriptionState::Connecting;
        self.stream = None;

        let stream = match self.resync().await {
            Ok(stream) => stream,
            Err(e) => {
                self.state = SubscriptionState::Disconnected;
                return Err(e);
            }
        };
        self.stream = Some(stream);
        self.state = SubscriptionState::Active;
        self.backoff.reset();
        tracing::info!(
            visible = self.view.len(),
            total = self.stats.len(),
            "Alert feed resynced"
        );
        Ok(())
    }

    async fn resync(&mut self) -> Result<ChangeStream> {
        let stream = self.source.subscribe().await?;
        let page = self.source.fetch_page(self.view.filter()).await?;
        let digests = self.source.fetch_digests().await?;
        self.view.reset(page);
        self.stats.reset(digests);
        Ok(stream)
    }

    /// Waits for the next thing to happen on this subscription.
    ///
    /// When disconnected this waits out the backoff delay and reconnects;
    /// it never replays missed events.
    pub async fn next_event(&mut self) -> FeedEvent {
        if self.stream.is_none() {
            if let Some(delay) = self.retry_after.take() {
                tokio::time::sleep(delay).await;
            }
            return match self.connect().await {
                Ok(()) => FeedEvent::Resynced {
                    visible: self.view.len(),
                    total: self.stats.len(),
                },
                Err(e) => self.disconnected(e.to_string()),
            };
        }

        let next = match self.stream.as_mut() {
            Some(stream) => stream.next().await,
            None => None,
        };
        match next {
            Some(Ok(change)) => {
                // A record already indexed was delivered twice or was part
                // of the last resync; it must not toast again.
                let known = self.stats.contains(&change.record().id);
                let view = self.view.apply(&change);
                self.stats.apply(change.record());
                let toast = if known {
                    None
                } else {
                    self.toasts.toast_for(&change)
                };
                FeedEvent::Change { change, view, toast }
            }
            Some(Err(e)) => self.disconnected(e.to_string()),
            None => self.disconnected("change stream ended".to_string()),
        }
    }

    fn disconnected(&mut self, error: String) -> FeedEvent {
        self.stream = None;
        self.state = SubscriptionState::Disconnected;
        let retry_in = self.backoff.next_delay();
        self.retry_after = Some(retry_in);
        tracing::warn!(error = %error, retry_in_ms = retry_in.as_millis() as u64, "Alert feed disconnected");
        FeedEvent::Disconnected { error, retry_in }
    }

    /// Drops the connection. A later [`Subscription::next_event`] reconnects.
    pub fn close(&mut self) {
        self.stream = None;
        self.retry_after = None;
        self.state = SubscriptionState::Disconnected;
    }
}
