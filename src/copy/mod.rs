//! Copy requests and the copy tool interface
//!
//! [`plan`] turns a platform resolution into a [`CopyRequest`]; a
//! [`CopyTool`] carries the request out.

use crate::config::RegistryConfig;
use crate::error::ToolError;
use crate::manifest::ManifestList;
use crate::platform::PlatformSpec;
use crate::resolve::Resolution;
use async_trait::async_trait;

/// Options passed through to the copy tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOption {
    DisableSrcTlsVerify,
    DisableDestTlsVerify,
    SrcCredentials { username: String, password: String },
    Os(String),
    Arch(String),
    Variant(String),
    Debug,
}

/// External tool that moves image content between registries
#[async_trait]
pub trait CopyTool: Send + Sync {
    /// Copy one image reference to another, returning the tool's output
    async fn copy(&self, src: &str, dst: &str, options: &[CopyOption])
        -> Result<Vec<u8>, ToolError>;

    /// Write `manifest_list` to the tag reference `dst`
    async fn copy_manifest(
        &self,
        manifest_list: &ManifestList,
        dst: &str,
        options: &[CopyOption],
    ) -> Result<Vec<u8>, ToolError>;

    /// Fetch the manifest behind `src`. `None` means the reference is a
    /// single-image manifest rather than a list.
    async fn inspect_manifest(
        &self,
        src: &str,
        options: &[CopyOption],
    ) -> Result<(Option<ManifestList>, Vec<u8>), ToolError>;

    /// Make credentials for `registry` available to later calls
    async fn login(&self, registry: &str) -> Result<(), ToolError> {
        let _ = registry;
        Ok(())
    }
}

/// A single platform copy, ready to hand to a [`CopyTool`]
#[derive(Debug, Clone, PartialEq)]
pub struct CopyRequest {
    pub src: String,
    pub dst: String,
    /// Platform filter hint for the copy tool
    pub platform: PlatformSpec,
    /// Digest the copy is pinned to, when there is one
    pub digest: Option<String>,
    pub options: Vec<CopyOption>,
}

/// Options derived from a registry's configuration. Credentials are only
/// added when a username is configured.
pub fn source_options(registry: &RegistryConfig, debug: bool) -> Vec<CopyOption> {
    let mut options = Vec::new();
    if !registry.tls_verify() {
        options.push(CopyOption::DisableSrcTlsVerify);
    }
    if let Some(creds) = registry.credentials.as_ref().filter(|c| !c.username.is_empty()) {
        options.push(CopyOption::SrcCredentials {
            username: creds.username.clone(),
            password: creds.password.clone(),
        });
    }
    if debug {
        options.push(CopyOption::Debug);
    }
    options
}

pub fn tag_reference(registry: &str, image: &str, tag: &str) -> String {
    format!("{}/{}:{}", registry, image, tag)
}

pub fn digest_reference(registry: &str, image: &str, digest: &str) -> String {
    format!("{}/{}@{}", registry, image, digest)
}

/// Plan the copy of one requested platform of `<registry>/<image>:<tag>`
/// into the staging registry.
///
/// A resolution with a digest is copied by digest on both sides; anything
/// else is copied by tag and left to the tool's own platform selection.
pub fn plan(
    registry_name: &str,
    image_name: &str,
    tag: &str,
    requested: &PlatformSpec,
    resolution: &Resolution,
    staging_address: &str,
    source_options: &[CopyOption],
) -> CopyRequest {
    let platform = resolution
        .entry()
        .map(|e| e.platform.clone())
        .unwrap_or_else(|| requested.clone());

    let (src, dst, digest) = match resolution.digest() {
        Some(digest) => (
            digest_reference(registry_name, image_name, digest),
            digest_reference(staging_address, image_name, digest),
            Some(digest.to_string()),
        ),
        None => (
            tag_reference(registry_name, image_name, tag),
            tag_reference(staging_address, image_name, tag),
            None,
        ),
    };

    let mut options = source_options.to_vec();
    options.push(CopyOption::DisableDestTlsVerify);
    options.push(CopyOption::Os(platform.os.clone()));
    options.push(CopyOption::Arch(platform.arch.clone()));
    options.push(CopyOption::Variant(platform.variant.clone()));

    CopyRequest {
        src,
        dst,
        platform,
        digest,
        options,
    }
}
