//! Entry point: loads config, builds the exchange registry, and binds
//! the webhook/balance HTTP surface.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};

use rebalancer::audit::AuditLog;
use rebalancer::http::{self, AppState};
use rebalancer::notify::{LineNotifier, NoopNotifier, Notifier};
use rebalancer::registry::{load_credentials_from_env, MarketRegistry};
use rebalancer_core::config::Config;

/// Webhook-driven portfolio rebalancer for centralized spot crypto
/// exchanges.
#[derive(Parser)]
#[command(name = "rebalancer")]
#[command(about = "Adaptive limit-order executor for webhook-driven portfolio rebalancing")]
#[command(version)]
struct Cli {
    /// Path to config.json. Overrides CONFIG_PATH.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind the HTTP server to. Overrides BIND_ADDR.
    #[arg(long)]
    bind: Option<String>,
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config
        .clone()
        .or_else(|| std::env::var("CONFIG_PATH").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("config.json"))
}

fn bind_addr(cli: &Cli) -> String {
    cli.bind
        .clone()
        .or_else(|| std::env::var("BIND_ADDR").ok())
        .unwrap_or_else(|| "0.0.0.0:8080".to_string())
}

fn default_notifier() -> Arc<dyn Notifier> {
    match std::env::var("LINE_NOTIFY_TOKEN") {
        Ok(token) if !token.is_empty() => Arc::new(LineNotifier::new(&token)),
        _ => Arc::new(NoopNotifier),
    }
}

fn required_secret() -> Option<String> {
    std::env::var("ORDER_EXECUTION_SECRET").ok().filter(|s| !s.is_empty())
}

/// Resolves on Ctrl-C or SIGTERM, whichever comes first, so both an
/// interactive stop and `docker stop`/`systemctl stop` trigger the same
/// graceful shutdown path.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&config_path(&cli)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("fatal: failed to load config: {e}");
            process::exit(1);
        }
    };

    let credentials = load_credentials_from_env(config.exchanges.keys().cloned());
    let registry = Arc::new(MarketRegistry::new(&config, &credentials));

    let audit = match AuditLog::open(&PathBuf::from("audit.jsonl")) {
        Ok(a) => Arc::new(a),
        Err(e) => {
            eprintln!("fatal: failed to open audit log: {e}");
            process::exit(1);
        }
    };

    let state = AppState {
        registry: registry.clone(),
        audit,
        default_notifier: default_notifier(),
        required_secret: required_secret(),
    };

    let addr = bind_addr(&cli);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("fatal: failed to bind {addr}: {e}");
            process::exit(1);
        }
    };

    info!("listening on {addr}");
    let app = http::router(state);

    let shutdown_registry = registry.clone();
    let shutdown_notifier = default_notifier();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("shutdown requested, stopping active workers");
            shutdown_registry.shutdown(&shutdown_notifier);
        })
        .await;

    if let Err(e) = result {
        error!("server error: {e}");
        process::exit(1);
    }
}
