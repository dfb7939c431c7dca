//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using
//! the `clap` crate. These arguments are parsed at startup and then merged
//! with the configuration from the `alertrelay.toml` file and environment
//! variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Relays Alertmanager webhook notifications to Feishu bots and syslog
/// collectors, optionally enriching alerts with recent Loki log lines.
#[derive(Parser, Debug, Default, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address to bind the webhook listener to.
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<String>,

    /// Protocol for syslog delivery (tcp or udp).
    #[arg(long, value_name = "PROTOCOL")]
    pub syslog_protocol: Option<String>,

    /// Logging level (e.g. info, debug).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(listen) = &self.listen {
            dict.insert("listen_addr".into(), Value::from(listen.clone()));
        }

        // The --syslog-protocol flag maps to the nested syslog.protocol key
        // and is applied by Config::load after extraction.

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
