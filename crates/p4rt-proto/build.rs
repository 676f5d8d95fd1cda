//! Build script for compiling the P4Runtime protobuf definitions
//!
//! Generates messages, the gRPC client and server stubs, and a file
//! descriptor set used to read P4Info text format at runtime.

use std::env;
use std::path::PathBuf;

const PROTOS: &[&str] = &[
    "proto/google/rpc/status.proto",
    "proto/p4/config/v1/p4types.proto",
    "proto/p4/config/v1/p4info.proto",
    "proto/p4/v1/p4data.proto",
    "proto/p4/v1/p4runtime.proto",
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use vendored protoc instead of relying on a system installation
    let protoc = protoc_bin_vendored::protoc_bin_path()
        .map_err(|e| format!("vendored protoc unavailable: {e:?}"))?;
    let well_known = protoc_bin_vendored::include_path()
        .map_err(|e| format!("vendored protobuf includes unavailable: {e:?}"))?;
    env::set_var("PROTOC", protoc);

    let out_dir = PathBuf::from(env::var("OUT_DIR")?);

    tonic_build::configure()
        .build_client(true)
        .build_server(true)
        .file_descriptor_set_path(out_dir.join("p4runtime_descriptor.bin"))
        .type_attribute(".", "#[allow(clippy::enum_variant_names)]")
        .compile_protos(PROTOS, &[PathBuf::from("proto"), well_known])?;

    println!("cargo:rerun-if-changed=proto");

    Ok(())
}
