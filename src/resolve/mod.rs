//! Platform resolution against a source manifest list
//!
//! [`ManifestIndex`] maps canonical platform strings to the manifests an
//! upstream list reports, and [`resolve`] picks the entry for one requested
//! platform.

use crate::constants::platform::{ARM64_ARCH, ARM64_FALLBACK_VARIANT};
use crate::manifest::{ManifestDescriptor, SourceManifestEntry};
use crate::platform::PlatformSpec;
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct ManifestIndex {
    entries: HashMap<String, SourceManifestEntry>,
}

impl ManifestIndex {
    /// Index entries by their source-reported platform. A later entry for the
    /// same platform replaces an earlier one; entries without a digest are kept.
    pub fn build(manifests: impl IntoIterator<Item = SourceManifestEntry>) -> Self {
        let mut entries = HashMap::new();
        for entry in manifests {
            entries.insert(entry.platform.canonical_string(), entry);
        }
        Self { entries }
    }

    pub fn from_descriptors(descriptors: &[ManifestDescriptor]) -> Self {
        Self::build(descriptors.iter().cloned().map(SourceManifestEntry::from))
    }

    pub fn get(&self, platform: &PlatformSpec) -> Option<&SourceManifestEntry> {
        self.entries.get(&platform.canonical_string())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of looking up one requested platform
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved {
        entry: SourceManifestEntry,
        has_digest: bool,
    },
    Unresolved,
}

impl Resolution {
    /// Digest to pin the copy to, if the resolved entry has one
    pub fn digest(&self) -> Option<&str> {
        match self {
            Resolution::Resolved {
                entry,
                has_digest: true,
            } => Some(&entry.digest),
            _ => None,
        }
    }

    pub fn entry(&self) -> Option<&SourceManifestEntry> {
        match self {
            Resolution::Resolved { entry, .. } => Some(entry),
            Resolution::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved { .. })
    }
}

/// Find the manifest for `requested`.
///
/// An `arm64` request without a variant is retried once as `arm64/v8`.
/// A platform that is still missing is reported with a warning and comes
/// back as [`Resolution::Unresolved`].
pub fn resolve(index: &ManifestIndex, requested: &PlatformSpec) -> Resolution {
    let mut found = index.get(requested);

    if found.is_none() && requested.arch == ARM64_ARCH && requested.variant.is_empty() {
        let fallback = requested.with_variant(ARM64_FALLBACK_VARIANT);
        debug!("Platform {} not found, trying {}", requested, fallback);
        found = index.get(&fallback);
    }

    match found {
        Some(entry) => Resolution::Resolved {
            entry: entry.clone(),
            has_digest: entry.has_digest(),
        },
        None => {
            warn!(
                "could not find platform {}, continuing without a digest",
                requested
            );
            Resolution::Unresolved
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(platform: &str, digest: &str) -> SourceManifestEntry {
        let platform = PlatformSpec::parse(platform).unwrap();
        let descriptor = ManifestDescriptor {
            media_type: "application/vnd.docker.distribution.manifest.v2+json".to_string(),
            size: 1570,
            digest: digest.to_string(),
            platform: crate::manifest::Platform {
                architecture: platform.arch.clone(),
                os: platform.os.clone(),
                variant: platform.variant.clone(),
                ..Default::default()
            },
            ..Default::default()
        };
        descriptor.into()
    }

    #[test]
    fn test_build_index_keys_by_canonical_platform() {
        let index = ManifestIndex::build(vec![
            entry("linux/amd64", "sha256:aaa"),
            entry("linux/arm64/v8", "sha256:bbb"),
        ]);
        assert_eq!(index.len(), 2);
        assert!(index.get(&PlatformSpec::parse("linux/arm64/v8").unwrap()).is_some());
        assert!(index.get(&PlatformSpec::parse("linux/arm64").unwrap()).is_none());
    }

    #[test]
    fn test_build_index_later_duplicate_wins() {
        let index = ManifestIndex::build(vec![
            entry("linux/amd64", "sha256:first"),
            entry("linux/amd64", "sha256:second"),
        ]);
        assert_eq!(index.len(), 1);
        let found = index.get(&PlatformSpec::parse("linux/amd64").unwrap()).unwrap();
        assert_eq!(found.digest, "sha256:second");
    }

    #[test]
    fn test_build_index_keeps_empty_digest() {
        let index = ManifestIndex::build(vec![entry("linux/amd64", "")]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_resolve_exact_match() {
        let index = ManifestIndex::build(vec![entry("linux/amd64", "sha256:aaa")]);
        let resolution = resolve(&index, &PlatformSpec::parse("linux/amd64").unwrap());
        assert_eq!(resolution.digest(), Some("sha256:aaa"));
    }

    #[test]
    fn test_resolve_arm64_falls_back_to_v8() {
        let index = ManifestIndex::build(vec![entry("linux/arm64/v8", "sha256:aaa")]);
        let resolution = resolve(&index, &PlatformSpec::parse("linux/arm64").unwrap());
        assert_eq!(resolution.digest(), Some("sha256:aaa"));
        assert_eq!(resolution.entry().unwrap().platform.variant, "v8");
    }

    #[test]
    fn test_resolve_arm64_with_explicit_variant_does_not_fall_back() {
        let index = ManifestIndex::build(vec![entry("linux/arm64/v8", "sha256:aaa")]);
        let resolution = resolve(&index, &PlatformSpec::parse("linux/arm64/v9").unwrap());
        assert_eq!(resolution, Resolution::Unresolved);
    }

    #[test]
    fn test_resolve_arm_v7_missing_is_unresolved() {
        let index = ManifestIndex::build(vec![
            entry("linux/arm64/v8", "sha256:aaa"),
            entry("linux/arm/v8", "sha256:bbb"),
        ]);
        let resolution = resolve(&index, &PlatformSpec::parse("linux/arm/v7").unwrap());
        assert_eq!(resolution, Resolution::Unresolved);
        assert!(resolution.digest().is_none());
    }

    #[test]
    fn test_resolve_non_arm64_never_falls_back() {
        let index = ManifestIndex::build(vec![entry("linux/amd64/v8", "sha256:aaa")]);
        let resolution = resolve(&index, &PlatformSpec::parse("linux/amd64").unwrap());
        assert!(!resolution.is_resolved());
    }

    #[test]
    fn test_resolve_empty_digest_is_resolved_without_digest() {
        let index = ManifestIndex::build(vec![entry("linux/amd64", "")]);
        let resolution = resolve(&index, &PlatformSpec::parse("linux/amd64").unwrap());
        match &resolution {
            Resolution::Resolved { has_digest, .. } => assert!(!has_digest),
            Resolution::Unresolved => panic!("expected a resolved entry"),
        }
        assert!(resolution.digest().is_none());
    }
}
