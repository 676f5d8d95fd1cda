//! Controller configuration
//!
//! Settings come from three layers, later ones winning: built-in defaults,
//! an optional TOML file (`--config`), and command-line flags.
//!
//! ```toml
//! [device]
//! address = "127.0.0.1:50051"
//! device_id = 0
//! election_id = 10
//!
//! [pipeline]
//! p4info = "build/program.p4info.txt"
//! device_config = "build/program.json"
//!
//! [arbitration]
//! reinforce_interval_secs = 2
//!
//! [[routes]]
//! prefix = "10.0.0.1/32"
//! port = 0
//! ```

use crate::error::{P4rtError, Result};
use clap::Parser;
use p4rt_types::{DeviceId, ElectionId, Ipv4Prefix, PortNumber};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Command-line arguments.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "p4rt-ctld", version, about = "P4Runtime controller")]
pub struct ControllerArgs {
    /// P4Runtime gRPC address [default: 127.0.0.1:50051]
    #[arg(long, value_name = "HOST:PORT")]
    pub addr: Option<String>,

    /// Target device id [default: 0]
    #[arg(long, alias = "device_id")]
    pub device_id: Option<u64>,

    /// Election id for arbitration [default: 10]
    #[arg(long, alias = "election_id")]
    pub election_id: Option<u64>,

    /// Path to the P4Info file (text format, or binary with .bin/.pb)
    #[arg(long, value_name = "PATH")]
    pub p4info: Option<PathBuf>,

    /// Path to the compiled device image (BMv2 JSON)
    #[arg(long, alias = "json", value_name = "PATH")]
    pub device_config: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Route to install, repeatable; replaces configured routes
    #[arg(long = "route", value_name = "PREFIX=PORT")]
    pub routes: Vec<RouteConfig>,

    /// Enable debug logging
    #[arg(long, short)]
    pub verbose: bool,
}

/// Device connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// gRPC address, `host:port` or a full URI
    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default)]
    pub device_id: u64,

    /// Low word of the election id; the high word is zero
    #[serde(default = "default_election_id")]
    pub election_id: u64,
}

/// Forwarding program inputs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub p4info: Option<PathBuf>,

    #[serde(default)]
    pub device_config: Option<PathBuf>,
}

/// Mastership session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrationConfig {
    /// Seconds between mastership claim reinforcements
    #[serde(default = "default_reinforce_interval")]
    pub reinforce_interval_secs: u64,

    /// Keep reading the stream after election and stop on demotion
    #[serde(default)]
    pub watch_mastership: bool,

    /// Capacity of the outbound stream queue
    #[serde(default = "default_send_queue_depth")]
    pub send_queue_depth: usize,
}

/// Names of the program elements the rules target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    #[serde(default = "default_table")]
    pub table: String,

    #[serde(default = "default_match_field")]
    pub match_field: String,

    #[serde(default = "default_action")]
    pub action: String,

    /// Preferred action parameter; the first declared one is used otherwise
    #[serde(default = "default_param")]
    pub param: String,
}

/// One LPM forwarding rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Destination, `a.b.c.d/len`; a bare address is a /32
    pub prefix: String,
    pub port: u64,
}

impl FromStr for RouteConfig {
    type Err = String;

    /// Parses `PREFIX=PORT`, e.g. `10.0.0.1/32=0`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (prefix, port) = s
            .split_once('=')
            .ok_or_else(|| format!("expected PREFIX=PORT, got '{}'", s))?;
        let port = port
            .trim()
            .parse()
            .map_err(|_| format!("invalid port '{}'", port))?;
        Ok(RouteConfig {
            prefix: prefix.trim().to_string(),
            port,
        })
    }
}

impl RouteConfig {
    pub fn new(prefix: impl Into<String>, port: u64) -> Self {
        Self {
            prefix: prefix.into(),
            port,
        }
    }

    /// Checked prefix and port.
    pub fn parse(&self) -> Result<(Ipv4Prefix, PortNumber)> {
        let prefix: Ipv4Prefix = self.prefix.parse()?;
        let port = PortNumber::new(self.port)?;
        Ok((prefix, port))
    }
}

/// Complete controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub arbitration: ArbitrationConfig,

    #[serde(default)]
    pub schema: SchemaConfig,

    #[serde(default = "default_routes")]
    pub routes: Vec<RouteConfig>,
}

// Default functions
fn default_address() -> String {
    "127.0.0.1:50051".to_string()
}

fn default_election_id() -> u64 {
    10
}

fn default_reinforce_interval() -> u64 {
    2
}

fn default_send_queue_depth() -> usize {
    16
}

fn default_table() -> String {
    "my_ingress.ipv4_match".to_string()
}

fn default_match_field() -> String {
    "hdr.ipv4.dst_addr".to_string()
}

fn default_action() -> String {
    "my_ingress.to_port_action".to_string()
}

fn default_param() -> String {
    "port".to_string()
}

fn default_routes() -> Vec<RouteConfig> {
    vec![
        RouteConfig::new("10.0.0.1/32", 0),
        RouteConfig::new("10.0.0.2/32", 1),
    ]
}

// Default implementations
impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            device_id: 0,
            election_id: default_election_id(),
        }
    }
}

impl Default for ArbitrationConfig {
    fn default() -> Self {
        Self {
            reinforce_interval_secs: default_reinforce_interval(),
            watch_mastership: false,
            send_queue_depth: default_send_queue_depth(),
        }
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
            match_field: default_match_field(),
            action: default_action(),
            param: default_param(),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            pipeline: PipelineConfig::default(),
            arbitration: ArbitrationConfig::default(),
            schema: SchemaConfig::default(),
            routes: default_routes(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                P4rtError::Config(format!(
                    "Failed to parse config file {}: {}",
                    path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(P4rtError::Io(e)),
        }
    }

    /// Builds the effective configuration: file (if given) overlaid by flags.
    pub fn from_args(args: &ControllerArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load_or_default(path)?,
            None => Self::default(),
        };
        config.apply_args(args);
        Ok(config)
    }

    /// Overrides file values with the flags that were given.
    pub fn apply_args(&mut self, args: &ControllerArgs) {
        if let Some(addr) = &args.addr {
            self.device.address = addr.clone();
        }
        if let Some(device_id) = args.device_id {
            self.device.device_id = device_id;
        }
        if let Some(election_id) = args.election_id {
            self.device.election_id = election_id;
        }
        if let Some(p4info) = &args.p4info {
            self.pipeline.p4info = Some(p4info.clone());
        }
        if let Some(device_config) = &args.device_config {
            self.pipeline.device_config = Some(device_config.clone());
        }
        if !args.routes.is_empty() {
            self.routes = args.routes.clone();
        }
    }

    /// gRPC endpoint URI; a bare `host:port` gets an `http://` scheme.
    pub fn endpoint(&self) -> String {
        let address = self.device.address.trim();
        if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        }
    }

    pub fn device_id(&self) -> DeviceId {
        DeviceId::new(self.device.device_id)
    }

    pub fn election_id(&self) -> ElectionId {
        ElectionId::from_low(self.device.election_id)
    }

    /// P4Info path, checked by [`Self::validate`].
    pub fn p4info_path(&self) -> Result<&Path> {
        self.pipeline
            .p4info
            .as_deref()
            .ok_or_else(|| P4rtError::Config("no P4Info file given (--p4info)".to_string()))
    }

    /// Device image path, checked by [`Self::validate`].
    pub fn device_config_path(&self) -> Result<&Path> {
        self.pipeline.device_config.as_deref().ok_or_else(|| {
            P4rtError::Config("no device config file given (--device-config)".to_string())
        })
    }

    /// Validate configuration
    ///
    /// Routes are not checked here; a malformed route fails on its own when
    /// rules are installed and is counted in the install summary.
    pub fn validate(&self) -> Result<()> {
        if self.device.address.trim().is_empty() {
            return Err(P4rtError::Config("device address is empty".to_string()));
        }

        if self.arbitration.reinforce_interval_secs == 0 {
            return Err(P4rtError::Config(
                "reinforce_interval_secs must be > 0".to_string(),
            ));
        }

        if self.arbitration.send_queue_depth == 0 {
            return Err(P4rtError::Config("send_queue_depth must be > 0".to_string()));
        }

        self.p4info_path()?;
        self.device_config_path()?;

        Ok(())
    }
}
