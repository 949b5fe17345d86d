//! Service for the `serve image-bundle` command
//!
//! Unpacks a bundle into a temporary directory and serves it with the
//! distribution registry until the registry stops or the process is
//! interrupted.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::{
    archive::extract_archive,
    constants::bundle::TEMP_DIR_PREFIX,
    error::BundleResult,
    registry::{DistributionRegistry, StagingRegistry},
    service::bundle::{serve_stopped, ServeGuard},
};

#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub image_bundle: PathBuf,
    pub listen_address: IpAddr,
    pub listen_port: u16,
    pub registry_binary: String,
}

pub struct ServeService;

impl ServeService {
    pub async fn serve(options: ServeOptions) -> BundleResult<()> {
        info!("Creating temporary directory");
        let temp_dir = tempfile::Builder::new().prefix(TEMP_DIR_PREFIX).tempdir()?;

        info!("Extracting image bundle {}", options.image_bundle.display());
        extract_archive(&options.image_bundle, temp_dir.path())?;

        let address = SocketAddr::new(options.listen_address, options.listen_port).to_string();
        let registry = Arc::new(DistributionRegistry::with_address(
            &options.registry_binary,
            temp_dir.path(),
            &address,
        )?);
        info!(
            "Serving {} on {}",
            registry.storage_dir().display(),
            registry.address()
        );

        let serving = Arc::clone(&registry);
        let mut serve = ServeGuard(tokio::spawn(async move { serving.listen_and_serve().await }));

        let result = tokio::select! {
            served = &mut serve.0 => Err(serve_stopped(served)),
            interrupted = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping registry");
                interrupted.map_err(Into::into)
            }
        };
        result
    }
}
