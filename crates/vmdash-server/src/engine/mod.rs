pub mod influx;
pub mod scheduler;

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use vmdash_alert::lifecycle::LifecyclePolicy;
use vmdash_alert::manager::AlertManager;
use vmdash_alert::policy::policy_by_name;
use vmdash_alert::{AlertRepository, ChangePublisher};
use vmdash_notify::channels::webhook::WebhookChannel;
use vmdash_notify::manager::NotificationManager;
use vmdash_notify::routing::ChannelRoute;
use vmdash_notify::NotificationChannel;

use crate::config::{EngineConfig, NotificationConfig};

/// 按配置构建通知管理器，未启用时返回 `None`。
pub fn build_notifier(config: &NotificationConfig) -> anyhow::Result<Option<NotificationManager>> {
    if !config.enabled {
        tracing::info!("Notifications disabled");
        return Ok(None);
    }
    let Some(url) = config.webhook_url.as_deref().filter(|u| !u.is_empty()) else {
        tracing::warn!("Notifications enabled but webhook_url is empty, skipping");
        return Ok(None);
    };

    let webhook = WebhookChannel::new(
        url,
        config.service_key.clone(),
        Duration::from_secs(config.timeout_secs),
    )
    .context("Failed to create webhook channel")?;
    let channels: Vec<Box<dyn NotificationChannel>> = vec![Box::new(webhook)];
    let routes = vec![ChannelRoute {
        min_severity: config.min_severity,
        channel_index: 0,
    }];

    tracing::info!(
        min_severity = %config.min_severity,
        recipients = config.recipients.len(),
        "Webhook notifications enabled"
    );
    Ok(Some(NotificationManager::new(
        channels,
        routes,
        config.recipients.clone(),
    )))
}

/// 按引擎配置组装告警生命周期管理器。
pub fn build_manager(
    config: &EngineConfig,
    repo: Arc<dyn AlertRepository>,
    publisher: Arc<dyn ChangePublisher>,
) -> anyhow::Result<AlertManager> {
    let policy = policy_by_name(&config.dedup_policy).ok_or_else(|| {
        anyhow::anyhow!(
            "unknown dedup_policy '{}', expected refresh_open or always_insert",
            config.dedup_policy
        )
    })?;
    Ok(AlertManager::new(repo, publisher)
        .with_lifecycle(LifecyclePolicy {
            auto_resolve_from_acknowledged: config.auto_resolve_from_acknowledged,
        })
        .with_create_policy(policy))
}
