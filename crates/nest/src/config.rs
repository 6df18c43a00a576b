use std::path::PathBuf;

use config_rs::{Config, Environment, File};
use nest_server::ServerConfig;
use nest_video::VideoConfig;
use serde::Deserialize;

#[derive(Deserialize, Debug, Default, Clone)]
pub struct Metadata {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Memory,
    #[default]
    Sqlite,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub kind: StorageKind,
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            kind: StorageKind::default(),
            path: PathBuf::from("./data.db"),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct NestConfig {
    pub metadata: Metadata,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub video: VideoConfig,
    pub shutdown_timeout_ms: u64,
}

impl Default for NestConfig {
    fn default() -> Self {
        NestConfig {
            metadata: Metadata::default(),
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            video: VideoConfig::default(),
            shutdown_timeout_ms: 2000,
        }
    }
}

impl NestConfig {
    ///Reads `path` if it exists, then applies `NEST_*` environment overrides
    ///(`NEST_VIDEO__UDP__PORT=9000` sets `video.udp.port`).
    pub fn load(path: &str) -> Result<Self, config_rs::ConfigError> {
        Self::builder(path)
            .add_source(
                Environment::with_prefix("NEST")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|config| config.try_deserialize::<NestConfig>())
    }

    fn builder(path: &str) -> config_rs::ConfigBuilder<config_rs::builder::DefaultState> {
        Config::builder().add_source(File::with_name(path).required(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nest_video::IngestMode;
    use std::io::Write;

    fn from_file(path: &str) -> Result<NestConfig, config_rs::ConfigError> {
        NestConfig::builder(path)
            .build()
            .and_then(|config| config.try_deserialize::<NestConfig>())
    }

    fn yaml(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "nest-config-{}-{}.yaml",
            std::process::id(),
            contents.len()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = from_file("/nonexistent/nest-config").unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.storage.kind, StorageKind::Sqlite);
        assert_eq!(config.storage.path, PathBuf::from("./data.db"));
        assert_eq!(config.video.ingest, IngestMode::Upload);
        assert_eq!(config.video.udp.port, 8080);
        assert_eq!(config.video.udp.recv_buffer, 1024 * 1024);
        assert_eq!(config.shutdown_timeout_ms, 2000);
        assert!(config.metadata.name.is_none());
    }

    #[test]
    fn test_partial_file() {
        let path = yaml(
            "metadata:\n  name: nursery\nstorage:\n  kind: memory\nvideo:\n  ingest: udp\n  udp:\n    port: 9999\n",
        );
        let config = from_file(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.metadata.name.as_deref(), Some("nursery"));
        assert_eq!(config.storage.kind, StorageKind::Memory);
        assert_eq!(config.video.ingest, IngestMode::Udp);
        assert_eq!(config.video.udp.port, 9999);
        assert_eq!(config.video.udp.recv_timeout_ms, 1000);
        assert_eq!(config.video.width, 640);
    }

    #[test]
    fn test_environment_overrides_file() {
        let path = yaml("server:\n  port: 7000\nvideo:\n  ingest: socket\n  width: 320\n");
        std::env::set_var("NEST_SERVER__PORT", "9000");
        std::env::set_var("NEST_VIDEO__INGEST", "udp");
        let loaded = NestConfig::load(path.to_str().unwrap());
        std::env::remove_var("NEST_SERVER__PORT");
        std::env::remove_var("NEST_VIDEO__INGEST");
        std::fs::remove_file(&path).unwrap();

        let config = loaded.unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.video.ingest, IngestMode::Udp);
        //untouched keys keep the file's value
        assert_eq!(config.video.width, 320);
        assert_eq!(config.video.height, 360);
    }

    #[test]
    fn test_wrong_types_are_rejected() {
        let path = yaml("server:\n  port: lots\n");
        let result = from_file(path.to_str().unwrap());
        std::fs::remove_file(&path).unwrap();
        assert!(result.is_err());
    }
}
