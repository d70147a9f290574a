// SPDX-License-Identifier: MIT OR Apache-2.0
use anyhow::{Context, Result};
use clap::Parser;
use rk_config::{RestKitConfig, load_config, merge_configs, validate_config};
use rk_daemon::{AppState, build_app};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rk-daemon", version, about = "restkit demo server")]
struct Args {
    /// Bind address.
    #[arg(long, default_value = "127.0.0.1:8089")]
    bind: String,

    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level; overrides RESTKIT_LOG_LEVEL and the config file.
    #[arg(long)]
    log_level: Option<String>,

    /// Include debug blocks in envelopes.
    #[arg(long)]
    debug: bool,

    /// Origin allowed to call the api cross-site; repeatable.
    #[arg(long = "cors-origin")]
    cors_origins: Vec<String>,

    /// Api requests allowed per minute; unlimited when absent.
    #[arg(long)]
    rate_limit: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let file = load_config(args.config.as_deref()).context("load config")?;
    let overlay = RestKitConfig {
        debug: args.debug.then_some(true),
        log_level: args.log_level.clone(),
        ..RestKitConfig::default()
    };
    let config = merge_configs(file, overlay);
    let warnings = validate_config(&config).context("validate config")?;

    let filter = EnvFilter::new(format!(
        "rk_daemon={level},rk_dispatch={level},tower_http=info",
        level = config.log_level()
    ));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    for warning in &warnings {
        warn!(%warning, "config warning");
    }

    let mut state = AppState::new(config)?.with_cors_origins(args.cors_origins);
    if let Some(per_minute) = args.rate_limit {
        state = state.with_rate_limit(per_minute, Duration::from_secs(60));
    }
    let app = build_app(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("bind {}", args.bind))?;
    info!(bind = %args.bind, "rk-daemon listening");

    axum::serve(listener, app).await.context("serve")
}
