//! Loading of the forwarding program and device image.

use crate::config::ControllerConfig;
use crate::error::{P4rtError, Result};
use p4rt_proto::p4info::P4Info;
use p4rt_proto::text;
use prost::Message;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Encoding of a P4Info file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum P4InfoFormat {
    /// Protobuf text format, as `p4c --p4runtime-files x.txt` writes it.
    Text,
    /// Binary protobuf.
    Binary,
}

impl P4InfoFormat {
    /// Picks the format from the file extension; anything but `.bin` and
    /// `.pb` is read as text.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("bin") | Some("pb") => P4InfoFormat::Binary,
            _ => P4InfoFormat::Text,
        }
    }
}

/// Everything the pipeline install needs.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineInputs {
    pub p4info: P4Info,
    /// Opaque target image, passed through unmodified.
    pub device_config: Vec<u8>,
}

/// Reads pipeline inputs from storage.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads both inputs named by `config`.
    pub fn load(config: &ControllerConfig) -> Result<PipelineInputs> {
        let p4info = Self::load_p4info(config.p4info_path()?)?;
        let device_config = Self::load_device_config(config.device_config_path()?)?;
        Ok(PipelineInputs {
            p4info,
            device_config,
        })
    }

    pub fn load_p4info(path: &Path) -> Result<P4Info> {
        let format = P4InfoFormat::from_path(path);
        let p4info = match format {
            P4InfoFormat::Text => {
                let text = fs::read_to_string(path).map_err(|e| P4rtError::load(path, e))?;
                text::parse_p4info(&text).map_err(|e| P4rtError::load(path, e))?
            }
            P4InfoFormat::Binary => {
                let bytes = fs::read(path).map_err(|e| P4rtError::load(path, e))?;
                P4Info::decode(bytes.as_slice()).map_err(|e| P4rtError::load(path, e))?
            }
        };

        if p4info.tables.is_empty() {
            warn!(path = %path.display(), "P4Info declares no tables");
        }
        info!(
            path = %path.display(),
            ?format,
            tables = p4info.tables.len(),
            actions = p4info.actions.len(),
            "Loaded P4Info"
        );
        Ok(p4info)
    }

    pub fn load_device_config(path: &Path) -> Result<Vec<u8>> {
        let bytes = fs::read(path).map_err(|e| P4rtError::load(path, e))?;
        if bytes.is_empty() {
            warn!(path = %path.display(), "Device config is empty");
        }
        debug!(path = %path.display(), bytes = bytes.len(), "Loaded device config");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p4rt_test::{
        P4InfoBuilder, SAMPLE_DEVICE_CONFIG, SAMPLE_P4INFO, sample_p4info, write_sample_files,
    };
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            P4InfoFormat::from_path(Path::new("x.p4info.txt")),
            P4InfoFormat::Text
        );
        assert_eq!(P4InfoFormat::from_path(Path::new("x.p4info")), P4InfoFormat::Text);
        assert_eq!(P4InfoFormat::from_path(Path::new("x")), P4InfoFormat::Text);
        assert_eq!(P4InfoFormat::from_path(Path::new("x.pb")), P4InfoFormat::Binary);
        assert_eq!(P4InfoFormat::from_path(Path::new("x.bin")), P4InfoFormat::Binary);
    }

    #[test]
    fn test_load_text_p4info() {
        let dir = tempfile::tempdir().unwrap();
        let (p4info_path, _) = write_sample_files(dir.path()).unwrap();

        let p4info = ConfigLoader::load_p4info(&p4info_path).unwrap();
        assert_eq!(p4info, sample_p4info());
    }

    #[test]
    fn test_load_binary_p4info() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("program.p4info.bin");
        fs::write(&path, sample_p4info().encode_to_vec()).unwrap();

        let p4info = ConfigLoader::load_p4info(&path).unwrap();
        assert_eq!(p4info.tables[0].name(), "my_ingress.ipv4_match");
    }

    #[test]
    fn test_binary_p4info_kept_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("program.p4info.pb");
        let bytes = P4InfoBuilder::new()
            .table("my_ingress.ipv4_match", 37375156, &[("hdr.ipv4.dst_addr", 1)])
            .action("my_ingress.to_port_action", 25652968, &[("port", 1)])
            .register("my_ingress.hits", 369140025, 64)
            .packet_in(67146229)
            .build()
            .encode_to_vec();
        fs::write(&path, &bytes).unwrap();

        let p4info = ConfigLoader::load_p4info(&path).unwrap();
        assert_eq!(p4info.registers.len(), 1);
        assert_eq!(p4info.controller_packet_metadata.len(), 1);
        assert_eq!(p4info.encode_to_vec(), bytes);
    }

    #[test]
    fn test_load_text_with_extern_any() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("program.p4info.txt");
        let text = format!(
            "{SAMPLE_P4INFO}\nexterns {{\n  extern_type_id: 129\n  instances {{\n    info {{\n      [type.googleapis.com/p4.config.v1.Meter] {{ size: 8 }}\n    }}\n  }}\n}}\n"
        );
        fs::write(&path, text).unwrap();

        let p4info = ConfigLoader::load_p4info(&path).unwrap();
        assert_eq!(p4info.tables, sample_p4info().tables);
        let info = p4info.externs[0].instances[0].info.as_ref().unwrap();
        assert_eq!(info.type_url, "type.googleapis.com/p4.config.v1.Meter");
    }

    #[test]
    fn test_deeply_nested_text_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested.txt");
        let depth = 200_000;
        fs::write(&path, format!("{}{}", "tables {".repeat(depth), "}".repeat(depth))).unwrap();

        let err = ConfigLoader::load_p4info(&path).unwrap_err();
        assert!(matches!(err, P4rtError::Load { .. }));
        assert!(err.to_string().contains("nesting"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ConfigLoader::load_p4info(Path::new("/nonexistent/p4info.txt")).unwrap_err();
        assert!(matches!(err, P4rtError::Load { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_load_malformed_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.txt");
        fs::write(&path, "tables {\n  preamble {\n").unwrap();

        let err = ConfigLoader::load_p4info(&path).unwrap_err();
        assert!(err.to_string().contains("broken.txt"));
    }

    #[test]
    fn test_load_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let (p4info_path, device_config_path) = write_sample_files(dir.path()).unwrap();

        let mut config = ControllerConfig::default();
        config.pipeline.p4info = Some(p4info_path);
        config.pipeline.device_config = Some(device_config_path);

        let inputs = ConfigLoader::load(&config).unwrap();
        assert_eq!(inputs.device_config, SAMPLE_DEVICE_CONFIG.to_vec());
        assert_eq!(inputs.p4info.actions.len(), 3);
        assert!(SAMPLE_P4INFO.contains("my_ingress.to_port_action"));
    }

    #[test]
    fn test_load_without_paths() {
        let mut config = ControllerConfig::default();
        config.pipeline.p4info = Some(PathBuf::from("/nonexistent"));
        assert!(matches!(
            ConfigLoader::load(&config),
            Err(P4rtError::Load { .. })
        ));

        let config = ControllerConfig::default();
        assert!(matches!(ConfigLoader::load(&config), Err(P4rtError::Config(_))));
    }
}
