//! Test fixtures for P4Info documents and device images.
//!
//! Provides the sample forwarding program the controller targets by
//! default, plus a builder for ad-hoc programs.

use p4rt_proto::p4info::{self, P4Info};
use std::io;
use std::path::{Path, PathBuf};

/// Table id of `my_ingress.ipv4_match` in [`SAMPLE_P4INFO`].
pub const SAMPLE_TABLE_ID: u32 = 37375156;
/// Match field id of `hdr.ipv4.dst_addr`.
pub const SAMPLE_MATCH_FIELD_ID: u32 = 1;
/// Action id of `my_ingress.to_port_action`.
pub const SAMPLE_ACTION_ID: u32 = 25652968;
/// Param id of `port`.
pub const SAMPLE_PARAM_ID: u32 = 1;

/// P4Info text as p4c emits it for a one-table IPv4 forwarding program.
pub const SAMPLE_P4INFO: &str = r#"# proto-file: p4/config/v1/p4info.proto
# proto-message: p4.config.v1.P4Info

pkg_info {
  arch: "v1model"
}
tables {
  preamble {
    id: 37375156
    name: "my_ingress.ipv4_match"
    alias: "ipv4_match"
  }
  match_fields {
    id: 1
    name: "hdr.ipv4.dst_addr"
    bitwidth: 32
    match_type: LPM
  }
  action_refs {
    id: 25652968
  }
  action_refs {
    id: 28485346
  }
  action_refs {
    id: 21257015
    annotations: "@defaultonly"
    scope: DEFAULT_ONLY
  }
  size: 1024
}
actions {
  preamble {
    id: 21257015
    name: "NoAction"
    alias: "NoAction"
    annotations: "@noWarn(\"unused\")"
  }
}
actions {
  preamble {
    id: 28485346
    name: "my_ingress.drop"
    alias: "drop"
  }
}
actions {
  preamble {
    id: 25652968
    name: "my_ingress.to_port_action"
    alias: "to_port_action"
  }
  params {
    id: 1
    name: "port"
    bitwidth: 9
  }
}
type_info {
}
"#;

/// A stand-in for the BMv2 JSON produced by p4c.
pub const SAMPLE_DEVICE_CONFIG: &[u8] =
    br#"{"header_types": [], "headers": [], "pipelines": [{"name": "ingress"}]}"#;

/// Parsed [`SAMPLE_P4INFO`].
pub fn sample_p4info() -> P4Info {
    match p4rt_proto::text::parse_p4info(SAMPLE_P4INFO) {
        Ok(p4info) => p4info,
        Err(e) => panic!("sample P4Info does not parse: {}", e),
    }
}

/// Writes the sample P4Info and device image into `dir`.
///
/// Returns `(p4info_path, device_config_path)`.
pub fn write_sample_files(dir: &Path) -> io::Result<(PathBuf, PathBuf)> {
    let p4info = dir.join("program.p4info.txt");
    let device_config = dir.join("program.json");
    std::fs::write(&p4info, SAMPLE_P4INFO)?;
    std::fs::write(&device_config, SAMPLE_DEVICE_CONFIG)?;
    Ok((p4info, device_config))
}

/// Builder for small programs.
#[derive(Debug, Clone, Default)]
pub struct P4InfoBuilder {
    p4info: P4Info,
}

impl P4InfoBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table with `(name, id)` match fields.
    pub fn table(mut self, name: &str, id: u32, match_fields: &[(&str, u32)]) -> Self {
        self.p4info.tables.push(p4info::Table {
            preamble: Some(preamble(name, id)),
            match_fields: match_fields
                .iter()
                .map(|(field, field_id)| p4info::MatchField {
                    id: *field_id,
                    name: field.to_string(),
                    bitwidth: 32,
                    r#match: Some(p4info::match_field::Match::MatchType(
                        p4info::match_field::MatchType::Lpm as i32,
                    )),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        });
        self
    }

    /// Adds an action with `(name, id)` params.
    pub fn action(mut self, name: &str, id: u32, params: &[(&str, u32)]) -> Self {
        self.p4info.actions.push(p4info::Action {
            preamble: Some(preamble(name, id)),
            params: params
                .iter()
                .map(|(param, param_id)| p4info::action::Param {
                    id: *param_id,
                    name: param.to_string(),
                    bitwidth: 9,
                    ..Default::default()
                })
                .collect(),
        });
        self
    }

    /// Adds a register, which the controller never reads but must push.
    pub fn register(mut self, name: &str, id: u32, size: i32) -> Self {
        self.p4info.registers.push(p4info::Register {
            preamble: Some(preamble(name, id)),
            size,
            ..Default::default()
        });
        self
    }

    /// Adds `packet_in` controller metadata with one `ingress_port` field.
    pub fn packet_in(mut self, id: u32) -> Self {
        self.p4info
            .controller_packet_metadata
            .push(p4info::ControllerPacketMetadata {
                preamble: Some(preamble("packet_in", id)),
                metadata: vec![p4info::controller_packet_metadata::Metadata {
                    id: 1,
                    name: "ingress_port".to_string(),
                    bitwidth: 9,
                    ..Default::default()
                }],
            });
        self
    }

    pub fn build(self) -> P4Info {
        self.p4info
    }
}

fn preamble(name: &str, id: u32) -> p4info::Preamble {
    let alias = name.rsplit('.').next().unwrap_or(name);
    p4info::Preamble {
        id,
        name: name.to_string(),
        alias: alias.to_string(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sample_p4info_ids() {
        let p4info = sample_p4info();
        let table = &p4info.tables[0];
        assert_eq!(table.name(), "my_ingress.ipv4_match");
        assert_eq!(table.id(), SAMPLE_TABLE_ID);
        assert_eq!(table.match_fields[0].id, SAMPLE_MATCH_FIELD_ID);

        let action = p4info
            .actions
            .iter()
            .find(|a| a.name() == "my_ingress.to_port_action")
            .unwrap();
        assert_eq!(action.id(), SAMPLE_ACTION_ID);
        assert_eq!(action.params[0].id, SAMPLE_PARAM_ID);
    }

    #[test]
    fn test_builder() {
        let p4info = P4InfoBuilder::new()
            .action("A", 3, &[("port", 1)])
            .table("T", 5, &[("M", 7)])
            .build();
        assert_eq!(p4info.tables[0].id(), 5);
        assert_eq!(p4info.tables[0].match_fields[0].id, 7);
        assert_eq!(p4info.actions[0].params[0].name, "port");
        assert_eq!(p4info.actions[0].preamble.as_ref().unwrap().alias, "A");
    }

    #[test]
    fn test_builder_non_forwarding_sections() {
        let p4info = P4InfoBuilder::new()
            .register("my_ingress.hits", 369140025, 64)
            .packet_in(67146229)
            .build();
        assert_eq!(p4info.registers[0].size, 64);
        assert_eq!(
            p4info.controller_packet_metadata[0].metadata[0].name,
            "ingress_port"
        );
    }
}
