//! Integration test infrastructure for the P4Runtime controller
//!
//! Provides:
//! - An in-process device implementing `P4RuntimeApi`
//! - P4Info and device image fixtures
//! - Write request verification helpers

pub mod fixtures;
mod mock;
mod verification;

pub use fixtures::*;
pub use mock::{ArbitrationReply, MockBehavior, MockDevice};
pub use verification::*;
