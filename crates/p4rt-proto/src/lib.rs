//! P4Runtime protocol support for the controller.
//!
//! This crate carries everything that touches the wire:
//!
//! - [`p4runtime`]: `p4.v1` messages and the `P4Runtime` service stubs
//! - [`p4info`]: `p4.config.v1` P4Info schema messages
//! - [`rpc`]: `google.rpc.Status`
//! - [`text`]: protobuf text-format reader for P4Info files
//! - [`api`]: the [`P4RuntimeApi`] trait the controller programs against
//!
//! Messages, the gRPC client and the server stubs are generated at build
//! time from the upstream `p4runtime` protos under `proto/`.
//!
//! # Example
//!
//! ```ignore
//! use p4rt_proto::{P4RuntimeApi, P4RuntimeClient};
//!
//! let client = P4RuntimeClient::connect("http://127.0.0.1:9559").await?;
//! client.write(request).await?;
//! ```

pub mod google {
    pub mod rpc {
        tonic::include_proto!("google.rpc");
    }
}

pub mod p4 {
    pub mod v1 {
        tonic::include_proto!("p4.v1");
    }

    pub mod config {
        pub mod v1 {
            tonic::include_proto!("p4.config.v1");
        }
    }
}

pub mod api;
pub mod error;
mod ext;
pub mod text;

pub use google::rpc;
pub use p4::config::v1 as p4info;
pub use p4::v1 as p4runtime;

pub use api::{InboundStream, P4RuntimeApi};
pub use error::{TextFormatError, TextFormatResult};
pub use p4runtime::p4_runtime_client::P4RuntimeClient;
pub use p4runtime::p4_runtime_server::{P4Runtime, P4RuntimeServer};
