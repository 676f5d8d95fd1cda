//! Error types for p4rt-ctld
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - SI-11: Error Handling - Structured error types with contextual information
//! - AU-3: Content of Audit Records - Errors include sufficient detail for audit

use p4rt_types::{ParseError, PortNumber};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Program element looked up by name in the P4Info.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaElement {
    Table,
    MatchField,
    Action,
    ActionParam,
}

impl fmt::Display for SchemaElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            SchemaElement::Table => "table",
            SchemaElement::MatchField => "match field",
            SchemaElement::Action => "action",
            SchemaElement::ActionParam => "action parameter",
        };
        f.write_str(kind)
    }
}

/// Errors that can occur in p4rt-ctld
///
/// Not being elected primary is not an error; see
/// [`crate::ProvisionOutcome::NotPrimary`].
#[derive(Debug, Error)]
pub enum P4rtError {
    /// Channel or stream transport failure
    /// NIST: SC-8 (Transmission Confidentiality) - Device communication errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// Device sent something the arbitration exchange does not allow
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// SetForwardingPipelineConfig was rejected
    #[error("Pipeline install failed: {}: {}", .0.code(), .0.message())]
    Install(#[source] tonic::Status),

    /// Named program element is missing from the P4Info
    /// NIST: SI-10 (Information Input Validation) - Schema validation
    #[error("{element} not found in P4Info: {name}")]
    SchemaNotFound { element: SchemaElement, name: String },

    /// Destination address or prefix length is malformed
    #[error("Address format error: {0}")]
    AddressFormat(String),

    /// Port does not fit the fixed-width action parameter
    #[error("Port {port} does not fit in {bits} bits")]
    PortOutOfRange { port: u64, bits: usize },

    /// Table entry write was rejected
    #[error("Write of {prefix} rejected: {}: {}", .status.code(), .status.message())]
    Write {
        prefix: String,
        #[source]
        status: tonic::Status,
    },

    /// Configuration error
    /// NIST: CM-6 (Configuration Settings) - Configuration validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Program description or device image could not be read or decoded
    #[error("Failed to load {}: {reason}", .path.display())]
    Load { path: PathBuf, reason: String },

    /// IO error
    /// NIST: SI-11 (Error Handling) - System-level errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl P4rtError {
    pub fn connection(context: &str, status: &tonic::Status) -> Self {
        P4rtError::Connection(format!("{}: {}: {}", context, status.code(), status.message()))
    }

    pub fn schema_not_found(element: SchemaElement, name: impl Into<String>) -> Self {
        P4rtError::SchemaNotFound {
            element,
            name: name.into(),
        }
    }

    pub fn load(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        P4rtError::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error aborts provisioning.
    ///
    /// Per-rule failures (bad route input, rejected write) are logged and
    /// counted while the remaining rules are still installed.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            P4rtError::AddressFormat(_) | P4rtError::PortOutOfRange { .. } | P4rtError::Write { .. }
        )
    }
}

impl From<ParseError> for P4rtError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::PortOutOfRange(port) => P4rtError::PortOutOfRange {
                port,
                bits: PortNumber::WIDTH_BYTES * 8,
            },
            ParseError::InvalidIpAddress(_) | ParseError::InvalidIpPrefix(_) => {
                P4rtError::AddressFormat(err.to_string())
            }
            ParseError::InvalidPortNumber(_) => P4rtError::Config(err.to_string()),
        }
    }
}

/// Result type alias for p4rt-ctld operations
pub type Result<T> = std::result::Result<T, P4rtError>;
