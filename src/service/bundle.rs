//! Bundle service for the `create image-bundle` command
//!
//! Handles the steps around orchestration: output checks, config parsing,
//! the staging registry lifecycle, and archiving.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info};

use crate::{
    archive::archive_directory,
    config::{self, write_sanitized_config, ImagesConfig},
    constants::bundle::{SANITIZED_CONFIG_FILE, TEMP_DIR_PREFIX},
    error::{BundleError, BundleResult},
    platform::PlatformSpec,
    registry::{DistributionRegistry, StagingRegistry},
    service::orchestrator::{BundleOrchestrator, BundleSummary},
    skopeo::SkopeoRunner,
};

const REGISTRY_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for a bundle creation
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub images_file: PathBuf,
    pub platforms: Vec<PlatformSpec>,
    pub output_file: PathBuf,
    pub overwrite: bool,
    pub skopeo_binary: String,
    pub registry_binary: String,
    pub verbose: bool,
}

/// Stops the staging registry when the bundle run ends, however it ends
pub(crate) struct ServeGuard(pub(crate) JoinHandle<BundleResult<()>>);

impl Drop for ServeGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Service for creating image bundles
pub struct BundleService;

impl BundleService {
    pub async fn create(options: CreateOptions) -> BundleResult<BundleSummary> {
        if !options.overwrite {
            info!("Checking if output file already exists");
            ensure_output_absent(&options.output_file)?;
        }

        info!("Parsing image bundle config");
        let images = config::parse_file(&options.images_file)?;
        debug!("Images config: {:?}", config::sanitized(&images));

        info!("Creating temporary directory");
        let output_abs = std::path::absolute(&options.output_file)?;
        let parent = output_abs.parent().unwrap_or_else(|| Path::new("."));
        let temp_dir = tempfile::Builder::new()
            .prefix(TEMP_DIR_PREFIX)
            .tempdir_in(parent)?;

        info!("Starting temporary Docker registry");
        let registry = Arc::new(DistributionRegistry::new(
            &options.registry_binary,
            temp_dir.path(),
        )?);
        let serving = Arc::clone(&registry);
        let mut serve = ServeGuard(tokio::spawn(async move { serving.listen_and_serve().await }));

        // The temp dir outlives both branches, so it is removed on every path
        let result = tokio::select! {
            served = &mut serve.0 => Err(serve_stopped(served)),
            staged = stage(&options, &images, registry.as_ref(), temp_dir.path()) => staged,
        };
        result
    }
}

/// Copy every image into the running staging registry and archive its storage
async fn stage(
    options: &CreateOptions,
    images: &ImagesConfig,
    registry: &DistributionRegistry,
    storage_dir: &Path,
) -> BundleResult<BundleSummary> {
    registry.wait_until_ready(REGISTRY_READY_TIMEOUT).await?;

    let runner = SkopeoRunner::new(&options.skopeo_binary)?;
    let summary = BundleOrchestrator::new(&runner, registry.address(), &options.platforms)
        .with_debug(options.verbose)
        .run(images)
        .await?;
    info!(
        "Copied {} image(s): {} platform copies, {} manifest list(s)",
        summary.images, summary.platform_copies, summary.manifest_lists
    );

    write_sanitized_config(images, &storage_dir.join(SANITIZED_CONFIG_FILE))?;

    info!("Archiving images to {}", options.output_file.display());
    archive_directory(storage_dir, &options.output_file)?;

    Ok(summary)
}

/// Any end of the serve task before staging finished is a registry failure
pub(crate) fn serve_stopped(served: Result<BundleResult<()>, JoinError>) -> BundleError {
    let err = match served {
        Ok(Err(BundleError::RegistryStartup(reason))) => BundleError::RegistryStartup(reason),
        Ok(Err(e)) => BundleError::RegistryStartup(e.to_string()),
        Ok(Ok(())) => BundleError::RegistryStartup("registry stopped serving".to_string()),
        Err(e) => BundleError::RegistryStartup(format!("registry task failed: {}", e)),
    };
    error!("error serving Docker registry: {}", err);
    err
}

/// Fail with `OutputExists` if something is already at `output_file`
pub fn ensure_output_absent(output_file: &Path) -> BundleResult<()> {
    match std::fs::metadata(output_file) {
        Ok(_) => Err(BundleError::OutputExists(output_file.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BundleError::Io(e)),
    }
}
