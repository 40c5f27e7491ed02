//! Relay configuration.
//!
//! Four layers, shallow-merged in precedence order:
//! defaults < config file (JSON) < environment < CLI flags.
//!
//! Environment variables carry the uppercased field names
//! (`ENGINE_HOST`, `ENGINE_PORT`, `TRANSPORT`, `MULTICAST_GROUP`,
//! `MULTICAST_INTERFACE`, `WS_HOST`, `WS_PORT`, `WS_PATH`, `FILTER`,
//! `VERBOSE`).

use std::collections::HashSet;
use std::env;
use std::fmt;
use std::net::Ipv4Addr;
use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use engine_codec::EventKind;
use serde::Deserialize;

/// Which transport carries the engine session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Tcp,
    Udp,
    Multicast,
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(TransportKind::Tcp),
            "udp" => Ok(TransportKind::Udp),
            "multicast" => Ok(TransportKind::Multicast),
            other => Err(format!("unknown transport {other:?}")),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Tcp => write!(f, "tcp"),
            TransportKind::Udp => write!(f, "udp"),
            TransportKind::Multicast => write!(f, "multicast"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub engine_host: String,
    pub engine_port: u16,
    pub transport: TransportKind,

    /// `group` or `group:port` for the multicast transport.
    pub multicast_group: Option<String>,
    /// IPv4 address of the receiving interface.
    pub multicast_interface: Option<String>,

    pub ws_host: String,
    pub ws_port: u16,
    pub ws_path: String,

    /// Kebab-case event kinds to forward; empty means all.
    pub filter: Vec<String>,

    pub verbose: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            engine_host: "127.0.0.1".to_string(),
            engine_port: 9000,
            transport: TransportKind::Tcp,
            multicast_group: None,
            multicast_interface: None,
            ws_host: "0.0.0.0".to_string(),
            ws_port: 8765,
            ws_path: "/ws".to_string(),
            filter: Vec::new(),
            verbose: false,
        }
    }
}

/// One layer of overrides; unset fields fall through.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    pub engine_host: Option<String>,
    pub engine_port: Option<u16>,
    pub transport: Option<TransportKind>,
    pub multicast_group: Option<String>,
    pub multicast_interface: Option<String>,
    pub ws_host: Option<String>,
    pub ws_port: Option<u16>,
    pub ws_path: Option<String>,
    pub filter: Option<Vec<String>>,
    pub verbose: Option<bool>,
}

impl RelayConfig {
    /// Assemble the effective config from all four layers.
    pub fn load(file: Option<&Path>, cli: ConfigLayer) -> Result<Self> {
        let mut config = RelayConfig::default();

        if let Some(path) = file {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            let layer: ConfigLayer = serde_json::from_str(&raw)
                .with_context(|| format!("parsing config file {}", path.display()))?;
            config.apply(layer);
        }

        config.apply(layer_from_env()?);
        config.apply(cli);
        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, layer: ConfigLayer) {
        if let Some(v) = layer.engine_host {
            self.engine_host = v;
        }
        if let Some(v) = layer.engine_port {
            self.engine_port = v;
        }
        if let Some(v) = layer.transport {
            self.transport = v;
        }
        if let Some(v) = layer.multicast_group {
            self.multicast_group = Some(v);
        }
        if let Some(v) = layer.multicast_interface {
            self.multicast_interface = Some(v);
        }
        if let Some(v) = layer.ws_host {
            self.ws_host = v;
        }
        if let Some(v) = layer.ws_port {
            self.ws_port = v;
        }
        if let Some(v) = layer.ws_path {
            self.ws_path = v;
        }
        if let Some(v) = layer.filter {
            self.filter = v;
        }
        if let Some(v) = layer.verbose {
            self.verbose = v;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.transport == TransportKind::Multicast && self.multicast_group.is_none() {
            bail!("multicast transport requires a multicast_group");
        }
        if !self.ws_path.starts_with('/') {
            bail!("ws_path must start with '/': {:?}", self.ws_path);
        }
        self.filter_set()?;
        Ok(())
    }

    pub fn engine_addr(&self) -> String {
        format!("{}:{}", self.engine_host, self.engine_port)
    }

    pub fn ws_addr(&self) -> String {
        format!("{}:{}", self.ws_host, self.ws_port)
    }

    /// The effective filter set; an empty configured list forwards
    /// every event kind.
    pub fn filter_set(&self) -> Result<HashSet<EventKind>> {
        if self.filter.is_empty() {
            return Ok(EventKind::ALL.into_iter().collect());
        }
        self.filter
            .iter()
            .map(|name| {
                name.parse::<EventKind>()
                    .map_err(|e| anyhow::anyhow!("bad filter entry: {e}"))
            })
            .collect()
    }

    /// Split `group[:port]` into the group address and port, falling
    /// back to the engine port when no port is given.
    pub fn multicast_endpoint(&self) -> Result<(Ipv4Addr, u16)> {
        let raw = self
            .multicast_group
            .as_deref()
            .context("multicast transport requires a multicast_group")?;

        let (group, port) = match raw.split_once(':') {
            Some((g, p)) => (g, p.parse::<u16>().context("bad multicast port")?),
            None => (raw, self.engine_port),
        };
        let group: Ipv4Addr = group.parse().context("bad multicast group address")?;
        if !group.is_multicast() {
            bail!("{group} is not a multicast address");
        }
        Ok((group, port))
    }

    pub fn multicast_iface(&self) -> Result<Option<Ipv4Addr>> {
        self.multicast_interface
            .as_deref()
            .map(|s| s.parse::<Ipv4Addr>().context("bad multicast interface address"))
            .transpose()
    }
}

fn layer_from_env() -> Result<ConfigLayer> {
    Ok(ConfigLayer {
        engine_host: read_env("ENGINE_HOST")?,
        engine_port: read_env("ENGINE_PORT")?,
        transport: read_env_parsed("TRANSPORT")?,
        multicast_group: read_env("MULTICAST_GROUP")?,
        multicast_interface: read_env("MULTICAST_INTERFACE")?,
        ws_host: read_env("WS_HOST")?,
        ws_port: read_env("WS_PORT")?,
        ws_path: read_env("WS_PATH")?,
        filter: read_env::<String>("FILTER")?
            .map(|raw| raw.split(',').map(|s| s.trim().to_string()).collect()),
        verbose: read_env("VERBOSE")?,
    })
}

fn read_env<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(val) => Ok(Some(
            val.parse::<T>().with_context(|| format!("parsing ${key}"))?,
        )),
        Err(_) => Ok(None),
    }
}

fn read_env_parsed(key: &str) -> Result<Option<TransportKind>> {
    match env::var(key) {
        Ok(val) => Ok(Some(val.parse().map_err(|e| anyhow::anyhow!("${key}: {e}"))?)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = RelayConfig::default();
        assert_eq!(config.engine_addr(), "127.0.0.1:9000");
        assert_eq!(config.ws_path, "/ws");
        assert_eq!(config.filter_set().unwrap().len(), 6);
    }

    #[test]
    fn cli_layer_wins_over_defaults() {
        let mut config = RelayConfig::default();
        config.apply(ConfigLayer {
            engine_port: Some(7001),
            filter: Some(vec!["trade".to_string(), "top-of-book".to_string()]),
            ..Default::default()
        });

        assert_eq!(config.engine_port, 7001);
        let set = config.filter_set().unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&EventKind::Trade));
    }

    #[test]
    fn bad_filter_entry_is_rejected() {
        let mut config = RelayConfig::default();
        config.apply(ConfigLayer {
            filter: Some(vec!["trades".to_string()]),
            ..Default::default()
        });
        assert!(config.filter_set().is_err());
    }

    #[test]
    fn multicast_endpoint_parses_group_and_port() {
        let mut config = RelayConfig::default();
        config.apply(ConfigLayer {
            transport: Some(TransportKind::Multicast),
            multicast_group: Some("239.255.0.1:5000".to_string()),
            ..Default::default()
        });

        let (group, port) = config.multicast_endpoint().unwrap();
        assert_eq!(group, Ipv4Addr::new(239, 255, 0, 1));
        assert_eq!(port, 5000);
    }

    #[test]
    fn multicast_without_group_fails_validation() {
        let config = RelayConfig {
            transport: TransportKind::Multicast,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn file_layer_parses_json() {
        let layer: ConfigLayer =
            serde_json::from_str(r#"{"engine_host": "10.0.0.5", "ws_port": 9090}"#).unwrap();
        let mut config = RelayConfig::default();
        config.apply(layer);
        assert_eq!(config.engine_host, "10.0.0.5");
        assert_eq!(config.ws_port, 9090);
    }
}
