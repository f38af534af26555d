use serde::{Deserialize, Serialize};
use vmdash_common::types::{AlertCategory, Severity};
use vmdash_notify::Recipient;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// CORS 允许的 origins 列表，为空时允许所有来源（开发模式）
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,

    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub influx: InfluxConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    #[serde(default)]
    pub feed: FeedConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            cors_allowed_origins: Vec::new(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            engine: EngineConfig::default(),
            influx: InfluxConfig::default(),
            notification: NotificationConfig::default(),
            feed: FeedConfig::default(),
        }
    }
}

fn default_http_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SeaORM 连接串，支持 `sqlite://` 与 `postgres://`
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://data/vmdash.db?mode=rwc".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// 认证平台签发 token 使用的 HS256 密钥
    #[serde(default)]
    pub jwt_secret: Option<String>,
    /// 期望的 `aud` 声明，为空时不校验
    #[serde(default = "default_audience")]
    pub audience: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            audience: default_audience(),
        }
    }
}

fn default_audience() -> Option<String> {
    Some("authenticated".to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_engine_enabled")]
    pub enabled: bool,
    /// 规则重新加载周期（秒）
    #[serde(default = "default_reload_interval_secs")]
    pub reload_interval_secs: u64,
    /// 是否允许自动恢复已确认的告警
    #[serde(default = "default_auto_resolve_from_acknowledged")]
    pub auto_resolve_from_acknowledged: bool,
    /// 去重策略：`refresh_open` 或 `always_insert`
    #[serde(default = "default_dedup_policy")]
    pub dedup_policy: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: default_engine_enabled(),
            reload_interval_secs: default_reload_interval_secs(),
            auto_resolve_from_acknowledged: default_auto_resolve_from_acknowledged(),
            dedup_policy: default_dedup_policy(),
        }
    }
}

fn default_engine_enabled() -> bool {
    true
}

fn default_reload_interval_secs() -> u64 {
    300
}

fn default_auto_resolve_from_acknowledged() -> bool {
    true
}

fn default_dedup_policy() -> String {
    "refresh_open".to_string()
}

fn default_category() -> AlertCategory {
    AlertCategory::NodeHealth
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxConfig {
    #[serde(default = "default_influx_url")]
    pub url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub org: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// 聚合窗口，Flux duration 字面量
    #[serde(default = "default_time_range")]
    pub time_range: String,
    #[serde(default = "default_influx_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: default_influx_url(),
            token: None,
            org: String::new(),
            bucket: default_bucket(),
            time_range: default_time_range(),
            timeout_secs: default_influx_timeout_secs(),
        }
    }
}

fn default_influx_url() -> String {
    "http://localhost:8086".to_string()
}

fn default_bucket() -> String {
    "proxmox_metrics".to_string()
}

fn default_time_range() -> String {
    "5m".to_string()
}

fn default_influx_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// 调用 webhook 时携带的 Bearer key
    #[serde(default)]
    pub service_key: Option<String>,
    #[serde(default = "default_min_severity")]
    pub min_severity: Severity,
    #[serde(default = "default_notify_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub recipients: Vec<Recipient>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: None,
            service_key: None,
            min_severity: default_min_severity(),
            timeout_secs: default_notify_timeout_secs(),
            recipients: Vec::new(),
        }
    }
}

fn default_min_severity() -> Severity {
    Severity::High
}

fn default_notify_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// 实时推送广播通道容量，落后超过该值的订阅者会被断开并重新同步
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_channel_capacity() -> usize {
    vmdash_feed::hub::DEFAULT_CHANNEL_CAPACITY
}

// ---- Rules seed file types (used by `init-rules` CLI subcommand) ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesSeedFile {
    #[serde(default)]
    pub rules: Vec<SeedAlertRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedAlertRule {
    pub name: String,
    #[serde(default = "default_category")]
    pub category: AlertCategory,
    #[serde(default = "default_seed_severity")]
    pub severity: Severity,
    pub metric_type: String,
    #[serde(default = "default_seed_operator")]
    pub condition_operator: String,
    pub threshold_value: f64,
    #[serde(default = "default_check_interval_seconds")]
    pub check_interval_seconds: u64,
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
    #[serde(default)]
    pub influx_query: Option<String>,
    #[serde(default = "default_seed_enabled")]
    pub enabled: bool,
}

fn default_seed_severity() -> Severity {
    Severity::Medium
}

fn default_seed_operator() -> String {
    ">".to_string()
}

fn default_check_interval_seconds() -> u64 {
    60
}

fn default_cooldown_seconds() -> u64 {
    300
}

fn default_seed_enabled() -> bool {
    true
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// 用环境变量覆盖配置文件中的密钥。
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(secret) = non_empty("VMDASH_JWT_SECRET") {
            self.auth.jwt_secret = Some(secret);
        }
        if let Some(token) = non_empty("VMDASH_INFLUX_TOKEN") {
            self.influx.token = Some(token);
        }
        if let Some(key) = non_empty("VMDASH_NOTIFY_SERVICE_KEY") {
            self.notification.service_key = Some(key);
        }
    }
}
