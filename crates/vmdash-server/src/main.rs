use anyhow::Result;
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use vmdash_alert::evaluator::Evaluator;
use vmdash_feed::FeedHub;
use vmdash_storage::AlertStore;

use vmdash_server::app;
use vmdash_server::auth;
use vmdash_server::config::ServerConfig;
use vmdash_server::engine::{self, influx::InfluxMetricSource, scheduler::RuleScheduler};
use vmdash_server::rule_seed;
use vmdash_server::state::AppState;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  vmdash-server [config.toml]                          Start the server");
    eprintln!("  vmdash-server init-rules <config.toml> <seed.json>   Initialize alert rules from seed file");
}

#[tokio::main]
async fn main() -> Result<()> {
    vmdash_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("vmdash=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("init-rules") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-rules requires <config.toml> and <seed.json> arguments")
            })?;
            let seed_path = args.get(3).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-rules requires <seed.json> argument")
            })?;
            run_init_rules(config_path, seed_path).await
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or("config/server.toml");
            run_server(config_path).await
        }
    }
}

async fn run_init_rules(config_path: &str, seed_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    let store = AlertStore::new(&config.database.url).await?;
    rule_seed::init_from_seed_file(&store, seed_path).await?;
    Ok(())
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;

    tracing::info!(
        http_port = config.http_port,
        engine = config.engine.enabled,
        dedup_policy = %config.engine.dedup_policy,
        notifications = config.notification.enabled,
        "vmdash-server starting"
    );

    let store = Arc::new(AlertStore::new(&config.database.url).await?);
    let hub = FeedHub::new(config.feed.channel_capacity);
    let manager = Arc::new(engine::build_manager(
        &config.engine,
        store.clone(),
        Arc::new(hub.clone()),
    )?);

    // Seed default alert rules (only when DB has none)
    if let Err(e) = rule_seed::init_default_rules(&store).await {
        tracing::error!(error = %e, "Failed to initialize default alert rules");
    }

    let notifier = engine::build_notifier(&config.notification)?.map(Arc::new);
    let source = Arc::new(InfluxMetricSource::new(&config.influx)?);
    let evaluator = Arc::new(Evaluator::new(source, manager.clone()));
    let scheduler = Arc::new(RuleScheduler::new(
        store.clone(),
        evaluator,
        notifier,
        config.engine.reload_interval_secs,
    ));

    let jwt_secret = match &config.auth.jwt_secret {
        Some(secret) => Arc::new(secret.clone()),
        None => {
            tracing::warn!("No jwt_secret configured. A random secret was generated and no platform-issued token will validate. Set [auth].jwt_secret or VMDASH_JWT_SECRET.");
            Arc::new(auth::generate_secret())
        }
    };

    let state = AppState {
        store,
        manager,
        hub,
        scheduler: scheduler.clone(),
        start_time: Utc::now(),
        jwt_secret,
        config: Arc::new(config.clone()),
    };

    let engine_handle = if config.engine.enabled {
        let scheduler = scheduler.clone();
        Some(tokio::spawn(async move {
            scheduler.run().await;
        }))
    } else {
        tracing::info!("Alert engine disabled");
        None
    };

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let app = app::build_http_app(state);
    let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
    tracing::info!(http = %http_addr, "Server started");

    let result = axum::serve(http_listener, app)
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
            tracing::info!("Shutting down gracefully");
        })
        .await;
    if let Err(e) = result {
        tracing::error!(error = %e, "HTTP server error");
    }

    scheduler.stop();
    if let Some(h) = engine_handle {
        h.abort();
    }
    tracing::info!("Server stopped");

    Ok(())
}
