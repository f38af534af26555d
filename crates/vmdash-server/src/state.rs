use crate::config::ServerConfig;
use crate::engine::scheduler::RuleScheduler;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use vmdash_alert::manager::AlertManager;
use vmdash_feed::FeedHub;
use vmdash_storage::AlertStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<AlertStore>,
    pub manager: Arc<AlertManager>,
    pub hub: FeedHub,
    pub scheduler: Arc<RuleScheduler>,
    pub start_time: DateTime<Utc>,
    pub jwt_secret: Arc<String>,
    pub config: Arc<ServerConfig>,
}
