use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Duration, Instant, MissedTickBehavior};
use utoipa::ToSchema;
use vmdash_alert::evaluator::{EvaluationReport, Evaluator};
use vmdash_common::types::AlertRuleDef;
use vmdash_notify::manager::NotificationManager;
use vmdash_storage::{AlertStore, NotificationLogRow};

/// 状态中最多展示的下次执行时间条数
const MAX_NEXT_RUN_ENTRIES: usize = 5;

/// 单条规则的最长检查周期（7 天），更大的配置值按此截断
const MAX_CHECK_INTERVAL_SECS: u64 = 7 * 24 * 3600;

/// 单条规则的定时任务
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobSchedule {
    /// 规则名称
    pub name: String,
    /// 下次执行时间
    pub next_run: DateTime<Utc>,
}

/// 告警引擎运行状态
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EngineStatus {
    pub running: bool,
    /// 已调度的规则数
    pub jobs: usize,
    /// 处于冷却期的 (规则, 资源) 数
    pub cooldowns_active: usize,
    pub next_run_times: Vec<JobSchedule>,
}

struct Job {
    rule: AlertRuleDef,
    next_run: Arc<Mutex<DateTime<Utc>>>,
    /// 置为 true 后任务在下一次等待时退出，不会打断正在进行的评估
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Job {
    fn cancel(&self) {
        let _ = self.cancel.send(true);
    }
}

/// 单次规则评估：采样、更新告警、发送通知并记录投递结果。
#[derive(Clone)]
struct RuleRunner {
    store: Arc<AlertStore>,
    evaluator: Arc<Evaluator>,
    notifier: Option<Arc<NotificationManager>>,
}

impl RuleRunner {
    async fn run(&self, rule: &AlertRuleDef) -> anyhow::Result<EvaluationReport> {
        let report = self.evaluator.run_rule(rule).await?;

        if let Some(ref notifier) = self.notifier {
            for alert in &report.inserted {
                for record in notifier.notify(alert).await {
                    let row = NotificationLogRow {
                        id: vmdash_common::id::next_id(),
                        alert_id: record.alert_id,
                        recipient: record.recipient,
                        channel: record.channel,
                        status: record.status.as_str().to_string(),
                        error: record.error,
                        sent_at: record.sent_at,
                    };
                    if let Err(e) = self.store.insert_notification_log(&row).await {
                        tracing::error!(alert_id = %row.alert_id, error = %e, "Failed to record notification");
                    }
                }
            }
        }
        Ok(report)
    }
}

/// 按规则各自的 `check_interval_seconds` 周期性评估已启用的规则，
/// 并定期重新加载规则表。
pub struct RuleScheduler {
    runner: RuleRunner,
    reload_interval: Duration,
    jobs: Mutex<HashMap<String, Job>>,
    running: AtomicBool,
}

impl RuleScheduler {
    pub fn new(
        store: Arc<AlertStore>,
        evaluator: Arc<Evaluator>,
        notifier: Option<Arc<NotificationManager>>,
        reload_interval_secs: u64,
    ) -> Self {
        Self {
            runner: RuleRunner {
                store,
                evaluator,
                notifier,
            },
            reload_interval: Duration::from_secs(reload_interval_secs.max(1)),
            jobs: Mutex::new(HashMap::new()),
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 立即评估一条规则（不等待定时器）。
    pub async fn evaluate_now(&self, rule: &AlertRuleDef) -> anyhow::Result<EvaluationReport> {
        self.runner.run(rule).await
    }

    /// 按当前已启用的规则同步任务：定义未变的规则保留原任务及下次执行时间，
    /// 变更或新增的规则重新调度，已删除或停用的规则取消。返回调度的规则数。
    pub async fn reload(&self) -> anyhow::Result<usize> {
        let rules = self
            .runner
            .store
            .list_enabled_alert_rules()
            .await
            .context("Failed to load alert rules")?;

        let mut jobs = self.jobs.lock().unwrap_or_else(|p| p.into_inner());
        let mut previous = std::mem::take(&mut *jobs);

        for rule in rules {
            if let Some(job) = previous.remove(&rule.id) {
                if job.rule == rule && !job.handle.is_finished() {
                    jobs.insert(rule.id.clone(), job);
                    continue;
                }
                job.cancel();
            }

            let job = self.spawn_job(rule.clone());
            jobs.insert(rule.id, job);
        }

        for (id, job) in previous {
            tracing::info!(rule_id = %id, rule = %job.rule.name, "Alert rule unscheduled");
            job.cancel();
        }

        let count = jobs.len();
        tracing::info!(count, "Alert rules scheduled");
        Ok(count)
    }

    fn spawn_job(&self, rule: AlertRuleDef) -> Job {
        let period = check_period(&rule);
        let next_run = Arc::new(Mutex::new(Utc::now() + to_chrono(period)));
        let (cancel, cancelled) = watch::channel(false);
        tracing::info!(
            rule = %rule.name,
            interval_secs = period.as_secs(),
            severity = %rule.severity,
            "Scheduled alert rule"
        );

        let handle = tokio::spawn(run_job(
            self.runner.clone(),
            rule.clone(),
            period,
            next_run.clone(),
            cancelled,
        ));
        Job {
            rule,
            next_run,
            cancel,
            handle,
        }
    }

    /// 启动引擎：立即加载规则，之后每个 `reload_interval` 重新加载。
    pub async fn run(self: Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("Alert engine already running");
            return;
        }
        tracing::info!(
            reload_interval_secs = self.reload_interval.as_secs(),
            "Alert engine started"
        );

        let mut tick = interval(self.reload_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            if !self.is_running() {
                break;
            }
            if let Err(e) = self.reload().await {
                tracing::error!(error = %e, "Alert rule reload failed");
            }
        }
    }

    pub fn stop(&self) {
        let was_running = self.running.swap(false, Ordering::SeqCst);
        let mut jobs = self.jobs.lock().unwrap_or_else(|p| p.into_inner());
        for (_, job) in jobs.drain() {
            job.cancel();
        }
        if was_running {
            tracing::info!("Alert engine stopped");
        }
    }

    pub fn status(&self) -> EngineStatus {
        let jobs = self.jobs.lock().unwrap_or_else(|p| p.into_inner());
        let mut next_run_times: Vec<JobSchedule> = jobs
            .values()
            .map(|job| JobSchedule {
                name: job.rule.name.clone(),
                next_run: *job.next_run.lock().unwrap_or_else(|p| p.into_inner()),
            })
            .collect();
        next_run_times.sort_by(|a, b| a.next_run.cmp(&b.next_run));
        next_run_times.truncate(MAX_NEXT_RUN_ENTRIES);

        EngineStatus {
            running: self.is_running(),
            jobs: jobs.len(),
            cooldowns_active: self.runner.evaluator.cooldowns_active(),
            next_run_times,
        }
    }
}

async fn run_job(
    runner: RuleRunner,
    rule: AlertRuleDef,
    period: Duration,
    next_run: Arc<Mutex<DateTime<Utc>>>,
    mut cancelled: watch::Receiver<bool>,
) {
    // 首次执行在一个周期之后
    let mut tick = interval_at(Instant::now() + period, period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = tick.tick() => {}
            // 发送端被丢弃同样视为取消
            _ = cancelled.wait_for(|c| *c) => break,
        }
        *next_run.lock().unwrap_or_else(|p| p.into_inner()) = Utc::now() + to_chrono(period);

        match runner.run(&rule).await {
            Ok(report) => {
                if !report.failed.is_empty() {
                    tracing::warn!(
                        rule = %rule.name,
                        failed = ?report.failed,
                        "Rule evaluation incomplete"
                    );
                }
                tracing::debug!(
                    rule = %rule.name,
                    inserted = report.inserted.len(),
                    refreshed = report.refreshed.len(),
                    auto_resolved = report.auto_resolved.len(),
                    "Rule evaluated"
                )
            }
            Err(e) => tracing::error!(rule = %rule.name, error = %e, "Rule evaluation failed"),
        }
    }
    tracing::debug!(rule = %rule.name, "Rule job stopped");
}

fn check_period(rule: &AlertRuleDef) -> Duration {
    Duration::from_secs(rule.check_interval_seconds.clamp(1, MAX_CHECK_INTERVAL_SECS))
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::seconds(d.as_secs().min(MAX_CHECK_INTERVAL_SECS) as i64)
}
