//! Realtime alert feed.
//!
//! The server side is a [`hub::FeedHub`] that fans every alert insert/update
//! out to all subscribers. The viewer side is a [`subscription::Subscription`]
//! over a [`source::FeedSource`]: it keeps a filtered, newest-first
//! [`view::AlertView`], a whole-collection [`stats::StatsIndex`] and raises
//! [`toast::Toast`]s for new alerts. Every (re)connect triggers a full
//! resync; events are never replayed.

pub mod backoff;
pub mod error;
pub mod filter;
pub mod hub;
pub mod local;
pub mod remote;
pub mod source;
pub mod stats;
pub mod subscription;
pub mod toast;
pub mod view;


pub use error::FeedError;
pub use filter::ViewFilter;
pub use hub::FeedHub;
pub use source::FeedSource;
pub use subscription::{FeedEvent, Subscription, SubscriptionState};
