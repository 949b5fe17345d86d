//! Staging registry
//!
//! Copies land in a local, ephemeral registry whose storage directory
//! becomes the bundle. [`DistributionRegistry`] runs the CNCF distribution
//! `registry` binary for that.

use crate::error::BundleError;
use async_trait::async_trait;
use serde::Serialize;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::process::Command;
use tracing::{debug, info};

/// Local registry used as the destination of every copy
#[async_trait]
pub trait StagingRegistry: Send + Sync {
    /// `host:port` to use as the destination registry
    fn address(&self) -> &str;

    /// Serve until the registry stops. Returning at all means it stopped.
    async fn listen_and_serve(&self) -> Result<(), BundleError>;
}

pub struct DistributionRegistry {
    program: PathBuf,
    address: String,
    storage_dir: PathBuf,
    // Holds the generated config.yml, kept out of the storage directory
    config_dir: TempDir,
}

impl DistributionRegistry {
    /// Registry on a free loopback port, for staging copies
    pub fn new(binary: &str, storage_dir: &Path) -> Result<Self, BundleError> {
        let address = format!("127.0.0.1:{}", free_port()?);
        Self::with_address(binary, storage_dir, &address)
    }

    /// Registry listening on `address`, e.g. to serve an extracted bundle
    pub fn with_address(
        binary: &str,
        storage_dir: &Path,
        address: &str,
    ) -> Result<Self, BundleError> {
        let program = which::which(binary).map_err(|e| BundleError::ToolNotFound {
            name: binary.to_string(),
            reason: e.to_string(),
        })?;

        let config_dir = tempfile::Builder::new().prefix("registry-").tempdir()?;
        std::fs::write(
            config_dir.path().join("config.yml"),
            registry_config(storage_dir, address)?,
        )?;

        Ok(Self {
            program,
            address: address.to_string(),
            storage_dir: storage_dir.to_path_buf(),
            config_dir,
        })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Wait until the registry accepts connections
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<(), BundleError> {
        wait_for_address(&self.address, timeout).await
    }
}

#[async_trait]
impl StagingRegistry for DistributionRegistry {
    fn address(&self) -> &str {
        &self.address
    }

    async fn listen_and_serve(&self) -> Result<(), BundleError> {
        info!("Serving staging registry on {}", self.address);
        debug!("Registry storage at {}", self.storage_dir.display());

        let status = Command::new(&self.program)
            .arg("serve")
            .arg(self.config_dir.path().join("config.yml"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| {
                BundleError::RegistryStartup(format!(
                    "failed to run {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        Err(BundleError::RegistryStartup(format!(
            "registry exited with {}",
            status
        )))
    }
}

/// Subset of the distribution configuration file that we set
#[derive(Debug, Serialize)]
struct DistributionConfig<'a> {
    version: &'a str,
    log: LogConfig,
    storage: StorageConfig<'a>,
    http: HttpConfig<'a>,
}

#[derive(Debug, Serialize)]
struct LogConfig {
    level: &'static str,
    accesslog: Toggle,
}

#[derive(Debug, Serialize)]
struct StorageConfig<'a> {
    filesystem: FilesystemConfig<'a>,
    maintenance: MaintenanceConfig,
}

#[derive(Debug, Serialize)]
struct FilesystemConfig<'a> {
    rootdirectory: &'a Path,
}

#[derive(Debug, Serialize)]
struct MaintenanceConfig {
    uploadpurging: Toggle,
}

#[derive(Debug, Serialize)]
struct Toggle {
    #[serde(skip_serializing_if = "Option::is_none")]
    disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enabled: Option<bool>,
}

#[derive(Debug, Serialize)]
struct HttpConfig<'a> {
    addr: &'a str,
}

/// Minimal distribution config: filesystem storage and a single listener
fn registry_config(storage_dir: &Path, address: &str) -> Result<String, BundleError> {
    let config = DistributionConfig {
        version: "0.1",
        log: LogConfig {
            level: "error",
            accesslog: Toggle {
                disabled: Some(true),
                enabled: None,
            },
        },
        storage: StorageConfig {
            filesystem: FilesystemConfig {
                rootdirectory: storage_dir,
            },
            maintenance: MaintenanceConfig {
                uploadpurging: Toggle {
                    disabled: None,
                    enabled: Some(false),
                },
            },
        },
        http: HttpConfig { addr: address },
    };
    serde_yaml::to_string(&config).map_err(|e| BundleError::Serialization(e.to_string()))
}

/// Ask the OS for an unused loopback port
fn free_port() -> Result<u16, BundleError> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Poll `address` until a TCP connection succeeds or `timeout` elapses
pub async fn wait_for_address(address: &str, timeout: Duration) -> Result<(), BundleError> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match TcpStream::connect(address).await {
            Ok(_) => {
                debug!("Staging registry at {} is ready", address);
                return Ok(());
            }
            Err(e) if tokio::time::Instant::now() >= deadline => {
                return Err(BundleError::RegistryStartup(format!(
                    "registry at {} not ready after {:?}: {}",
                    address, timeout, e
                )));
            }
            Err(_) => tokio::time::sleep(Duration::from_millis(50)).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_config() {
        let config =
            registry_config(Path::new("/tmp/.image-bundle-abc"), "127.0.0.1:5000").unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&config).unwrap();
        assert_eq!(parsed["version"], serde_yaml::Value::from("0.1"));
        assert_eq!(
            parsed["storage"]["filesystem"]["rootdirectory"],
            serde_yaml::Value::from("/tmp/.image-bundle-abc")
        );
        assert_eq!(
            parsed["storage"]["maintenance"]["uploadpurging"]["enabled"],
            serde_yaml::Value::from(false)
        );
        assert_eq!(parsed["log"]["accesslog"]["disabled"], serde_yaml::Value::from(true));
        assert_eq!(parsed["http"]["addr"], serde_yaml::Value::from("127.0.0.1:5000"));
    }

    #[test]
    fn test_registry_config_quotes_awkward_paths() {
        let storage = Path::new("/tmp/bundle: #1 'quoted'");
        let config = registry_config(storage, "0.0.0.0:5000").unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&config).unwrap();
        assert_eq!(
            parsed["storage"]["filesystem"]["rootdirectory"],
            serde_yaml::Value::from("/tmp/bundle: #1 'quoted'")
        );
    }

    #[test]
    fn test_with_address_keeps_listener_and_storage() {
        let dir = tempfile::tempdir().unwrap();
        // Any binary on PATH stands in; nothing is spawned here
        let registry = DistributionRegistry::with_address("sh", dir.path(), "0.0.0.0:5000").unwrap();
        assert_eq!(registry.address(), "0.0.0.0:5000");
        assert_eq!(registry.storage_dir(), dir.path());
    }

    #[test]
    fn test_free_port() {
        assert_ne!(free_port().unwrap(), 0);
    }

    #[test]
    fn test_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let err = DistributionRegistry::new("/nonexistent/registry", dir.path())
            .err()
            .unwrap();
        assert!(matches!(err, BundleError::ToolNotFound { .. }));
    }

    #[tokio::test]
    async fn test_wait_for_address_ready() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        wait_for_address(&address, Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_address_timeout() {
        let address = format!("127.0.0.1:{}", free_port().unwrap());
        let err = wait_for_address(&address, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, BundleError::RegistryStartup(_)));
    }
}
