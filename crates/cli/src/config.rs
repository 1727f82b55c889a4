use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use voipmon_call_engine::CallManagerConfig;
use voipmon_infra_common::LoggingConfig;
use voipmon_registrar_core::RegistrarConfig;
use voipmon_rtp_core::RtpProcessorConfig;

/// VoIP call-quality monitor
#[derive(Parser, Debug, Default)]
#[command(name = "voipmon", version, about)]
pub struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "VOIPMON_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address the SIP listeners bind to
    #[arg(long)]
    pub bind: Option<IpAddr>,

    #[arg(long)]
    pub udp_port: Option<u16>,

    #[arg(long)]
    pub tcp_port: Option<u16>,

    #[arg(long)]
    pub tls_port: Option<u16>,

    /// Do not offer SIP over TLS
    #[arg(long)]
    pub no_tls: bool,

    /// IP announced in SDP and Contact headers
    #[arg(long)]
    pub advertised_ip: Option<IpAddr>,

    /// Completed-call history file
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// trace, debug, info, warn or error
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Log as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,
}

/// Observer feed settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Broadcast channel capacity
    pub capacity: usize,

    /// How often the call manager is polled for changes (ms)
    pub update_interval_ms: u64,

    /// Log every observer event at debug level
    pub log_events: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            update_interval_ms: 1000,
            log_events: true,
        }
    }
}

impl FeedConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms.max(10))
    }
}

/// Complete process configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub logging: LoggingConfig,
    pub sip: RegistrarConfig,
    pub rtp: RtpProcessorConfig,
    pub calls: CallManagerConfig,
    pub feed: FeedConfig,
}

impl MonitorConfig {
    /// Defaults, overlaid with `path` when given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Command-line flags win over the file
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(bind) = args.bind {
            self.sip.bind_host = bind;
        }
        if let Some(port) = args.udp_port {
            self.sip.udp_port = port;
        }
        if let Some(port) = args.tcp_port {
            self.sip.tcp_port = port;
        }
        if let Some(port) = args.tls_port {
            self.sip.tls_port = port;
        }
        if args.no_tls {
            self.sip.tls_enabled = false;
        }
        if let Some(ip) = args.advertised_ip {
            self.sip.advertised_ip = Some(ip);
        }
        if let Some(history) = &args.history {
            self.calls.history_path = history.clone();
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if args.json_logs {
            self.logging.json = true;
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to render configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_gives_defaults() {
        let config = MonitorConfig::load(None).unwrap();
        assert_eq!(config.sip.udp_port, 5060);
        assert_eq!(config.calls.history_path, PathBuf::from("data/calls.json"));
        assert_eq!(config.feed.update_interval(), Duration::from_secs(1));
    }

    #[test]
    fn partial_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voipmon.toml");
        std::fs::write(
            &path,
            r#"
[logging]
level = "debug"

[sip]
domain = "monitor.example.net"
udp_port = 5070
tls_enabled = false

[sip.users]
"lab-gw" = "s3cret"

[rtp]
report_every = 25

[calls]
history_path = "/var/lib/voipmon/calls.json"
"#,
        )
        .unwrap();

        let config = MonitorConfig::load(Some(&path)).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.sip.domain, "monitor.example.net");
        assert_eq!(config.sip.udp_port, 5070);
        assert_eq!(config.sip.tcp_port, 5060);
        assert!(!config.sip.tls_enabled);
        assert_eq!(config.sip.password_for("lab-gw"), Some("s3cret"));
        assert_eq!(config.sip.password_for("gateway-monitor"), None);
        assert_eq!(config.sip.test_extensions.len(), 4);
        assert_eq!(config.rtp.report_every, 25);
        assert_eq!(config.rtp.loss_window, 100);
        assert_eq!(config.calls.history_path, PathBuf::from("/var/lib/voipmon/calls.json"));
    }

    #[test]
    fn bad_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[sip\nudp_port = ").unwrap();
        assert!(MonitorConfig::load(Some(&path)).is_err());
        assert!(MonitorConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn flags_override_file() {
        let args = Args::parse_from([
            "voipmon",
            "--bind",
            "127.0.0.1",
            "--udp-port",
            "15060",
            "--no-tls",
            "--history",
            "/tmp/calls.json",
            "--log-level",
            "warn",
            "--json-logs",
        ]);
        let mut config = MonitorConfig::default();
        config.apply_args(&args);

        assert_eq!(config.sip.bind_host.to_string(), "127.0.0.1");
        assert_eq!(config.sip.udp_port, 15060);
        assert_eq!(config.sip.tcp_port, 5060);
        assert!(!config.sip.tls_enabled);
        assert_eq!(config.calls.history_path, PathBuf::from("/tmp/calls.json"));
        assert_eq!(config.logging.level, "warn");
        assert!(config.logging.json);
    }

    #[test]
    fn rendered_config_parses_back() {
        let config = MonitorConfig::default();
        let text = config.to_toml().unwrap();
        let parsed: MonitorConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.sip, config.sip);
        assert_eq!(parsed.rtp, config.rtp);
        assert_eq!(parsed.calls, config.calls);
    }
}
