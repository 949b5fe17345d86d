//! Per-tag copy orchestration
//!
//! Walks every (registry, image, tag) in the images config, resolves each
//! requested platform against the source manifest list, copies it into the
//! staging registry and publishes a manifest list of what was copied by
//! digest. The first failure aborts the whole run.

use crate::config::{ImagesConfig, RegistryConfig};
use crate::copy::{plan, source_options, tag_reference, CopyOption, CopyRequest, CopyTool};
use crate::error::{BundleError, BundleResult, ToolError};
use crate::manifest::{DestinationManifestList, ManifestList};
use crate::platform::PlatformSpec;
use crate::resolve::{resolve, ManifestIndex, Resolution};
use tracing::{debug, info, info_span, Instrument};

/// Counts reported after a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleSummary {
    /// (registry, image, tag) triples copied
    pub images: usize,
    pub platform_copies: usize,
    pub manifest_lists: usize,
}

pub struct BundleOrchestrator<'a> {
    tool: &'a dyn CopyTool,
    staging_address: String,
    platforms: Vec<PlatformSpec>,
    debug: bool,
}

impl<'a> BundleOrchestrator<'a> {
    /// Repeated platforms are only copied once
    pub fn new(
        tool: &'a dyn CopyTool,
        staging_address: impl Into<String>,
        platforms: &[PlatformSpec],
    ) -> Self {
        let mut unique: Vec<PlatformSpec> = Vec::with_capacity(platforms.len());
        for platform in platforms {
            if !unique.contains(platform) {
                unique.push(platform.clone());
            }
        }

        Self {
            tool,
            staging_address: staging_address.into(),
            platforms: unique,
            debug: false,
        }
    }

    /// Turn on the copy tool's debug output
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub async fn run(&self, config: &ImagesConfig) -> BundleResult<BundleSummary> {
        let mut summary = BundleSummary::default();

        for (registry_name, registry) in config {
            let options = self.registry_options(registry_name, registry).await?;

            for (image_name, tags) in &registry.images {
                for tag in tags {
                    let src = tag_reference(registry_name, image_name, tag);
                    self.copy_tag(registry_name, image_name, tag, &options, &mut summary)
                        .instrument(info_span!("image", src = %src))
                        .await?;
                    summary.images += 1;
                }
            }
        }

        Ok(summary)
    }

    async fn registry_options(
        &self,
        registry_name: &str,
        registry: &RegistryConfig,
    ) -> BundleResult<Vec<CopyOption>> {
        let has_username = registry
            .credentials
            .as_ref()
            .is_some_and(|c| !c.username.is_empty());

        if !has_username {
            self.tool
                .login(registry_name)
                .await
                .map_err(|source| BundleError::Login {
                    registry: registry_name.to_string(),
                    source,
                })?;
        }

        Ok(source_options(registry, self.debug))
    }

    async fn copy_tag(
        &self,
        registry_name: &str,
        image_name: &str,
        tag: &str,
        options: &[CopyOption],
        summary: &mut BundleSummary,
    ) -> BundleResult<()> {
        let src = tag_reference(registry_name, image_name, tag);
        info!(
            "Copying {} (platforms: {})",
            src,
            self.platforms
                .iter()
                .map(PlatformSpec::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );

        let (source_list, output) = self
            .tool
            .inspect_manifest(&src, options)
            .await
            .map_err(|source| {
                log_tool_output(&source);
                BundleError::Inspect {
                    reference: src.clone(),
                    source,
                }
            })?;
        debug!("{}", String::from_utf8_lossy(&output));

        let Some(source_list) = source_list else {
            info!("{} is not a manifest list, copying by tag", src);
            for platform in &self.platforms {
                let request = self.plan(
                    registry_name,
                    image_name,
                    tag,
                    platform,
                    &Resolution::Unresolved,
                    options,
                );
                self.copy(&request).await?;
                summary.platform_copies += 1;
            }
            return Ok(());
        };

        let destination = self
            .copy_platforms(registry_name, image_name, tag, &source_list, options, summary)
            .await?;

        if destination.should_publish() {
            self.publish(image_name, tag, &destination, options).await?;
            summary.manifest_lists += 1;
        }
        Ok(())
    }

    async fn copy_platforms(
        &self,
        registry_name: &str,
        image_name: &str,
        tag: &str,
        source_list: &ManifestList,
        options: &[CopyOption],
        summary: &mut BundleSummary,
    ) -> BundleResult<DestinationManifestList> {
        let index = ManifestIndex::from_descriptors(&source_list.manifests);
        let mut destination = DestinationManifestList::new(source_list);

        for platform in &self.platforms {
            let resolution = resolve(&index, platform);
            // arm64 and arm64/v8 can both land on the same manifest
            if let Some(digest) = resolution.digest() {
                if destination.contains_digest(digest) {
                    debug!("{} already copied as {}, skipping", platform, digest);
                    continue;
                }
            }

            let request =
                self.plan(registry_name, image_name, tag, platform, &resolution, options);

            self.copy(&request).await?;
            summary.platform_copies += 1;

            if let Some(entry) = resolution.entry() {
                destination.append(entry, true);
            }
        }

        Ok(destination)
    }

    fn plan(
        &self,
        registry_name: &str,
        image_name: &str,
        tag: &str,
        platform: &PlatformSpec,
        resolution: &Resolution,
        options: &[CopyOption],
    ) -> CopyRequest {
        plan(
            registry_name,
            image_name,
            tag,
            platform,
            resolution,
            &self.staging_address,
            options,
        )
    }

    async fn copy(&self, request: &CopyRequest) -> BundleResult<()> {
        debug!(
            "Copying {} to {} for {}",
            request.src, request.dst, request.platform
        );

        let output = self
            .tool
            .copy(&request.src, &request.dst, &request.options)
            .await
            .map_err(|source| {
                log_tool_output(&source);
                BundleError::Copy {
                    src: request.src.clone(),
                    dst: request.dst.clone(),
                    source,
                }
            })?;
        debug!("{}", String::from_utf8_lossy(&output));
        Ok(())
    }

    async fn publish(
        &self,
        image_name: &str,
        tag: &str,
        destination: &DestinationManifestList,
        options: &[CopyOption],
    ) -> BundleResult<()> {
        let dst = tag_reference(&self.staging_address, image_name, tag);
        debug!(
            "Publishing manifest list with {} manifest(s) to {}",
            destination.len(),
            dst
        );

        let mut options = options.to_vec();
        options.push(CopyOption::DisableDestTlsVerify);

        let output = self
            .tool
            .copy_manifest(destination.manifest_list(), &dst, &options)
            .await
            .map_err(|source| {
                log_tool_output(&source);
                BundleError::ManifestPublish {
                    dst: dst.clone(),
                    source,
                }
            })?;
        debug!("{}", String::from_utf8_lossy(&output));
        Ok(())
    }
}

/// Failed tool output is always shown, not only in verbose mode
fn log_tool_output(err: &ToolError) {
    let output = err.output();
    if !output.is_empty() {
        info!("{}", String::from_utf8_lossy(output));
    }
}
