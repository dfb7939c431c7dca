//! Alert Relay - Alertmanager webhook fan-out adapter
//!
//! Receives Alertmanager webhook batches over HTTP and relays each alert to
//! Feishu bot webhooks and syslog collectors, optionally enriched with
//! recent log lines queried from Loki.

use alertrelay::{
    cli::Cli,
    config::Config,
    core::LogQuerier,
    dispatch::{ChannelSet, Dispatcher},
    enrichment::LokiClient,
    server::{self, AppState},
    transport::{FeishuTransport, SyslogTransport},
};
use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment,
    // and CLI args.
    let config = Config::load(&cli).context("Failed to load configuration")?;

    // Initialize logging; RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    info!("Alert relay starting up...");

    // Log the loaded configuration settings for visibility
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Listen Address: {}", config.listen_addr);
    info!("Syslog Protocol: {}", config.syslog.protocol);
    info!(
        "Syslog Connect Timeout: {}s",
        config.syslog.connect_timeout_seconds
    );
    info!(
        "Feishu Request Timeout: {}s",
        config.feishu.request_timeout_seconds
    );
    info!("Feishu Targets: {:?}", config.targets.feishu.keys());
    info!("Syslog Targets: {:?}", config.targets.syslog.keys());
    info!(
        "Loki Enrichment: {}",
        if config.loki.enabled() {
            "Enabled"
        } else {
            "Disabled"
        }
    );
    if config.loki.enabled() {
        info!("Loki Log Limit: {}", config.loki.log_limit);
        info!("Loki Query Range: {}m", config.loki.query_range_minutes);
        info!("Loki Query Timeout: {}s", config.loki.query_timeout_seconds);
    }
    info!("-------------------------------------------------------");

    config.validate()?;
    if config.targets.feishu.is_empty() {
        warn!("No Feishu targets configured; /feishu requests will be no-ops");
    }
    if config.targets.syslog.is_empty() {
        warn!("No syslog targets configured; /syslog requests will be no-ops");
    }

    // =========================================================================
    // 1. Instantiate Transports and Enricher
    // =========================================================================
    let feishu_transport = Arc::new(
        FeishuTransport::new(Duration::from_secs(config.feishu.request_timeout_seconds))
            .context("Failed to build Feishu HTTP client")?,
    );
    let syslog_transport = Arc::new(SyslogTransport::new(
        config.syslog.protocol,
        Duration::from_secs(config.syslog.connect_timeout_seconds),
    ));

    let enricher: Option<Arc<dyn LogQuerier>> = if config.loki.enabled() {
        let client = LokiClient::new(
            config.loki.url.clone().unwrap_or_default(),
            config.loki.username.clone(),
            config.loki.password.clone(),
            Duration::from_secs(config.loki.query_timeout_seconds),
        )
        .context("Failed to build Loki client")?;
        Some(Arc::new(client))
    } else {
        None
    };

    // =========================================================================
    // 2. Assemble the Dispatcher
    // =========================================================================
    let mut dispatcher = Dispatcher::new(
        ChannelSet {
            targets: config.targets.feishu.clone(),
            transport: feishu_transport,
        },
        ChannelSet {
            targets: config.targets.syslog.clone(),
            transport: syslog_transport,
        },
    );
    if let Some(enricher) = enricher {
        dispatcher = dispatcher.with_enricher(
            enricher,
            config.loki.log_limit,
            config.loki.query_range_minutes,
        );
    }

    // =========================================================================
    // 3. Install Metrics Recorder and Serve
    // =========================================================================
    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    let state = Arc::new(AppState {
        dispatcher,
        prometheus: Some(prometheus),
    });

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!("Webhook listener running on {}", config.listen_addr);

    axum::serve(listener, server::router(state)).await?;
    Ok(())
}
