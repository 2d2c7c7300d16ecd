//! Configuration for the shard manager.
//!
//! Every option can be given as a flag or through its environment variable;
//! flags win.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use upsf_reconcile::{ShardDefaults, DEFAULT_VIRTUAL_MAC};

use crate::controller::ControllerConfig;

/// Maps shards to user planes in the user plane selection function.
#[derive(Debug, Clone, Parser)]
#[command(name = "shard-manager")]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Store gRPC host.
    #[arg(long = "upsf-host", env = "UPSF_HOST", default_value = "127.0.0.1")]
    pub upsf_host: String,

    /// Store gRPC port.
    #[arg(long = "upsf-port", short = 'p', env = "UPSF_PORT", default_value_t = 50051)]
    pub upsf_port: u16,

    /// Policy file with static bindings and predefined shards.
    #[arg(
        long = "config-file",
        visible_alias = "conf",
        short = 'c',
        env = "CONFIG_FILE",
        default_value = "/etc/upsf/policy.yaml"
    )]
    pub config_file: PathBuf,

    /// Virtual MAC assigned to created shards.
    #[arg(long = "virtual-mac", env = "VIRTUAL_MAC", default_value = DEFAULT_VIRTUAL_MAC)]
    pub virtual_mac: String,

    /// Seconds between predefined shard registrations.
    #[arg(
        long = "registration-interval",
        short = 'i',
        env = "REGISTRATION_INTERVAL",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub registration_interval_secs: u64,

    /// Register predefined shards periodically (yes/no).
    #[arg(
        long = "upsf-auto-register",
        short = 'a',
        env = "UPSF_AUTO_REGISTER",
        default_value = "yes",
        action = ArgAction::Set,
        value_parser = parse_switch
    )]
    pub auto_register: bool,

    /// Log level.
    #[arg(
        long = "loglevel",
        short = 'l',
        env = "LOGLEVEL",
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warning", "warn", "error", "critical"]
    )]
    pub log_level: String,

    /// Seconds before a store request is abandoned.
    #[arg(
        long = "rpc-timeout",
        env = "UPSF_RPC_TIMEOUT",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub rpc_timeout_secs: u64,
}

impl Config {
    /// URI of the store's gRPC endpoint.
    pub fn upsf_endpoint(&self) -> String {
        format!("http://{}:{}", self.upsf_host, self.upsf_port)
    }

    pub fn registration_interval(&self) -> Duration {
        Duration::from_secs(self.registration_interval_secs)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    /// Default `tracing` filter for the configured level.
    pub fn log_filter(&self) -> &str {
        match self.log_level.as_str() {
            "warning" => "warn",
            "critical" => "error",
            other => other,
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            registrar_interval: self.auto_register.then(|| self.registration_interval()),
            defaults: ShardDefaults {
                virtual_mac: self.virtual_mac.clone(),
            },
        }
    }
}

fn parse_switch(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "t" | "y" | "yes" => Ok(true),
        "false" | "0" | "f" | "n" | "no" => Ok(false),
        other => Err(format!("expected yes or no, got {other:?}")),
    }
}
