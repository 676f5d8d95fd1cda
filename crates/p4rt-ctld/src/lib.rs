//! Minimal P4Runtime controller
//!
//! This crate claims mastership over a single P4Runtime device, pushes a
//! compiled forwarding program to it, and installs IPv4 longest-prefix-match
//! forwarding rules. The session is then held open, with the mastership
//! claim reinforced in the background, until the process is told to stop.
//!
//! # NIST 800-53 Rev 5 Control Mappings
//!
//! This module implements the following security controls:
//!
//! | Control | Description | Implementation |
//! |---------|-------------|----------------|
//! | AC-3 | Access Enforcement | Writes only after mastership and pipeline commit |
//! | AU-3 | Content of Audit Records | Structured logging with device and election ids |
//! | AU-12 | Audit Record Generation | Arbitration, install and every rule logged |
//! | CM-6 | Configuration Settings | TOML file and CLI overrides, validated up front |
//! | SC-8 | Transmission Confidentiality | gRPC channel to the device |
//! | SI-10 | Input Validation | Addresses, prefixes and ports checked before write |
//! | SI-11 | Error Handling | Structured error types |
//!
//! # Architecture
//!
//! ```text
//! +-----------------+     +---------------------+     +-----------------+
//! |  ConfigLoader   |---->|  ArbitrationSession |<--->|  P4Runtime      |
//! |  p4info + image |     |  claim / reinforce  |     |  device         |
//! +-----------------+     +---------------------+     |                 |
//!                                   |                 |                 |
//!                                   v                 |                 |
//!                         +---------------------+     |                 |
//!                         |  PipelineInstaller  |---->|  SetPipeline    |
//!                         +---------------------+     |                 |
//!                                   |                 |                 |
//!                                   v                 |                 |
//!                         +---------------------+     |                 |
//!                         | SchemaIndex         |     |                 |
//!                         | RuleInstaller       |---->|  Write          |
//!                         +---------------------+     +-----------------+
//! ```

pub mod arbitration;
pub mod config;
pub mod controller;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod rules;
pub mod schema;

pub use arbitration::{ArbitrationSession, ArbitrationStatus, SessionOptions, SessionState};
pub use config::{ControllerArgs, ControllerConfig, RouteConfig};
pub use controller::{Controller, HoldOutcome, ProvisionOutcome, RunOutcome};
pub use error::{P4rtError, Result, SchemaElement};
pub use loader::{ConfigLoader, P4InfoFormat, PipelineInputs};
pub use pipeline::{InstalledPipeline, PipelineInstaller};
pub use rules::{InstallSummary, RuleInstaller};
pub use schema::{ResolvedRuleTemplate, SchemaIndex};
