//! Configuration management for the alert relay
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to load configuration from an `alertrelay.toml` file and merge it
//! with environment variables and command-line arguments.
//!
//! The target registries additionally honor the `FEISHU_WEBHOOK_<NAME>` and
//! `SYSLOG_WEBHOOK_<NAME>` environment variable convention: each variable
//! registers one named destination, the name being the lowercased suffix.

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cli::Cli;
use crate::transport::SyslogProtocol;

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Address the inbound webhook listener binds to.
    pub listen_addr: String,
    /// The logging level for the application.
    pub log_level: String,
    /// Configuration for the syslog transport.
    pub syslog: SyslogConfig,
    /// Configuration for the Feishu transport.
    pub feishu: FeishuConfig,
    /// Configuration for Loki log enrichment.
    pub loki: LokiConfig,
    /// Named destinations per transport kind.
    pub targets: TargetsConfig,
}

/// Configuration for the syslog transport.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyslogConfig {
    /// Connection style used to reach collectors.
    pub protocol: SyslogProtocol,
    /// Per-call connection and write timeout.
    pub connect_timeout_seconds: u64,
}

/// Configuration for the Feishu transport.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FeishuConfig {
    /// Per-call HTTP request timeout.
    pub request_timeout_seconds: u64,
}

/// Configuration for Loki log enrichment. Enrichment is enabled iff a
/// backend URL is configured.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LokiConfig {
    /// Base URL of the Loki server, e.g. `http://loki:3100`.
    pub url: Option<String>,
    /// Basic auth username; auth is attached only when the password is
    /// also set.
    pub username: Option<String>,
    /// Basic auth password.
    pub password: Option<String>,
    /// Maximum number of log lines rendered per alert.
    pub log_limit: usize,
    /// Query window, counted back from now.
    pub query_range_minutes: i64,
    /// Per-query HTTP timeout.
    pub query_timeout_seconds: u64,
}

impl LokiConfig {
    pub fn enabled(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

/// Named destinations per transport kind: target name → address.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TargetsConfig {
    /// Feishu webhook URLs.
    pub feishu: BTreeMap<String, String>,
    /// Syslog collector addresses in host:port form.
    pub syslog: BTreeMap<String, String>,
}

impl Config {
    /// Loads the application configuration by layering sources: defaults,
    /// TOML file, `ALERTRELAY_*` environment variables, and CLI arguments,
    /// then folds in the env-var target and Loki conventions.
    pub fn load(cli: &Cli) -> Result<Self> {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| "alertrelay.toml".into());

        let mut config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            // Allow overriding with environment variables,
            // e.g. ALERTRELAY_LISTEN_ADDR=0.0.0.0:9090
            .merge(Env::prefixed("ALERTRELAY_").split("__"))
            .merge(cli.clone())
            .extract()?;

        if let Some(protocol) = &cli.syslog_protocol {
            config.syslog.protocol = protocol.parse().map_err(anyhow::Error::msg)?;
        }

        config.apply_env_conventions(std::env::vars());
        Ok(config)
    }

    /// Folds the original deployment conventions into the loaded config:
    /// `FEISHU_WEBHOOK_*` / `SYSLOG_WEBHOOK_*` target registration and the
    /// bare `LOKI_*` settings.
    pub fn apply_env_conventions<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(name) = key.strip_prefix("FEISHU_WEBHOOK_") {
                self.targets.feishu.insert(name.to_lowercase(), value);
            } else if let Some(name) = key.strip_prefix("SYSLOG_WEBHOOK_") {
                self.targets.syslog.insert(name.to_lowercase(), value);
            } else if key == "LOKI_URL" {
                self.loki.url = Some(value);
            } else if key == "LOKI_USERNAME" {
                self.loki.username = Some(value);
            } else if key == "LOKI_PASSWORD" {
                self.loki.password = Some(value);
            } else if key == "LOKI_LOG_LIMIT" {
                if let Ok(v) = value.parse::<usize>() {
                    if v > 0 {
                        self.loki.log_limit = v;
                    }
                }
            } else if key == "LOKI_QUERY_RANGE" {
                if let Ok(v) = value.parse::<i64>() {
                    if v > 0 {
                        self.loki.query_range_minutes = v;
                    }
                }
            } else if key == "LOKI_QUERY_TIMEOUT" {
                if let Ok(v) = value.parse::<u64>() {
                    if v > 0 {
                        self.loki.query_timeout_seconds = v;
                    }
                }
            }
        }
    }

    /// Startup sanity check: the relay is useless with zero destinations of
    /// both kinds.
    pub fn validate(&self) -> Result<()> {
        if self.targets.feishu.is_empty() && self.targets.syslog.is_empty() {
            anyhow::bail!(
                "no targets configured: set [targets.feishu] / [targets.syslog] \
                 or FEISHU_WEBHOOK_* / SYSLOG_WEBHOOK_* environment variables"
            );
        }
        Ok(())
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
            syslog: SyslogConfig {
                protocol: SyslogProtocol::Tcp,
                connect_timeout_seconds: 5,
            },
            feishu: FeishuConfig {
                request_timeout_seconds: 10,
            },
            loki: LokiConfig {
                url: None,
                username: None,
                password: None,
                log_limit: 10,
                query_range_minutes: 5,
                query_timeout_seconds: 5,
            },
            targets: TargetsConfig::default(),
        }
    }
}
