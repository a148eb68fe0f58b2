use memshard_core::{CoordinatorConfig, MemshardError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_PREFIX: &str = "MEMSHARD";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_host: String,
    pub api_port: u16,
    /// Storage node addresses. Their order decides chunk placement.
    pub storage_servers: Vec<String>,
    pub storage_port: u16,
    pub server_id: String,
    pub max_file_size: u64,
    pub chunk_count: usize,
    /// Reserved for a disk-backed store; the in-memory path never touches it.
    pub upload_dir: PathBuf,
    /// Reserved for a disk-backed store; the in-memory path never touches it.
    pub storage_dir: PathBuf,
    pub node_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_host: "0.0.0.0".to_string(),
            api_port: 8080,
            storage_servers: (8081..=8086)
                .map(|port| format!("localhost:{}", port))
                .collect(),
            storage_port: 8081,
            server_id: "1".to_string(),
            max_file_size: 10 * 1024 * 1024 * 1024,
            chunk_count: 6,
            upload_dir: PathBuf::from("./uploads"),
            storage_dir: PathBuf::from("./storage"),
            node_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Defaults, then the optional file, then `MEMSHARD_*` environment variables.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let defaults = ::config::Config::try_from(&Config::default())
            .map_err(|e| MemshardError::Config(e.to_string()))?;

        let mut builder = ::config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(::config::File::with_name(path).required(false));
        }

        let settings = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("storage_servers"),
            )
            .build()
            .map_err(|e| MemshardError::Config(e.to_string()))?;

        let mut config: Config = settings
            .try_deserialize()
            .map_err(|e| MemshardError::Config(e.to_string()))?;

        config.storage_servers = config
            .storage_servers
            .iter()
            .map(|address| address.trim().to_string())
            .filter(|address| !address.is_empty())
            .collect();

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_count == 0 {
            return Err(MemshardError::Config(
                "chunk_count must be at least 1".to_string(),
            ));
        }
        if self.storage_servers.is_empty() {
            return Err(MemshardError::Config(
                "storage_servers cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    pub fn node_address(&self) -> String {
        format!("0.0.0.0:{}", self.storage_port)
    }

    pub fn node_timeout(&self) -> Duration {
        Duration::from_secs(self.node_timeout_secs)
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            chunk_count: self.chunk_count,
            max_file_size: self.max_file_size,
            call_timeout: self.node_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_address(), "0.0.0.0:8080");
        assert_eq!(config.storage_servers.len(), 6);
        assert_eq!(config.storage_servers[0], "localhost:8081");
        assert_eq!(config.chunk_count, 6);
        assert_eq!(config.max_file_size, 10 * 1024 * 1024 * 1024);
        config.validate().unwrap();
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memshard.yaml");
        std::fs::write(
            &path,
            "api_port: 9090\nchunk_count: 3\nstorage_servers:\n  - node-a:7001\n  - node-b:7002\n",
        )
        .unwrap();

        let config = Config::load(path.to_str()).unwrap();
        assert_eq!(config.api_port, 9090);
        assert_eq!(config.chunk_count, 3);
        assert_eq!(config.storage_servers, vec!["node-a:7001", "node-b:7002"]);
        assert_eq!(config.server_id, "1");

        let coordinator = config.coordinator_config();
        assert_eq!(coordinator.chunk_count, 3);
        assert_eq!(coordinator.call_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");

        let config = Config::load(path.to_str()).unwrap();
        assert_eq!(config.api_port, Config::default().api_port);
    }

    #[test]
    fn test_rejects_zero_chunk_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memshard.yaml");
        std::fs::write(&path, "chunk_count: 0\n").unwrap();

        let err = Config::load(path.to_str()).unwrap_err();
        assert!(matches!(err, MemshardError::Config(_)));
    }
}
