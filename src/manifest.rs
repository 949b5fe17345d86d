use crate::constants::media_type;
use crate::platform::PlatformSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Header shared by every manifest document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned {
    #[serde(rename = "schemaVersion")]
    pub schema_version: i32,
    #[serde(rename = "mediaType", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

/// Manifest list (Docker) or image index (OCI) for multi-arch images
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestList {
    #[serde(flatten)]
    pub versioned: Versioned,
    #[serde(default)]
    pub manifests: Vec<ManifestDescriptor>,
}

/// Descriptor for a platform-specific manifest in the list.
///
/// Upstream lists are third-party data, so a missing digest or platform
/// deserializes to empty values instead of failing. Fields this type does
/// not model are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestDescriptor {
    #[serde(rename = "mediaType", default)]
    pub media_type: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Platform information for a manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub os: String,
    #[serde(rename = "os.version", default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(rename = "os.features", default, skip_serializing_if = "Option::is_none")]
    pub os_features: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub variant: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
}

impl ManifestList {
    /// Interpret a raw manifest document.
    ///
    /// Returns `Ok(None)` when the document is a single-image manifest rather
    /// than a list.
    pub fn from_raw(raw: &[u8]) -> serde_json::Result<Option<Self>> {
        let value: serde_json::Value = serde_json::from_slice(raw)?;

        let is_list = match value.get("mediaType").and_then(|m| m.as_str()) {
            Some(media_type::DOCKER_MANIFEST_LIST) | Some(media_type::OCI_IMAGE_INDEX) => true,
            Some(_) => false,
            // OCI indexes may omit mediaType; only an index carries `manifests`
            None => value.get("manifests").is_some_and(|m| m.is_array()),
        };
        if !is_list {
            return Ok(None);
        }

        serde_json::from_value(value).map(Some)
    }

    /// Empty list carrying the same versioned header
    pub fn with_header_of(source: &ManifestList) -> Self {
        Self {
            versioned: source.versioned.clone(),
            manifests: Vec::new(),
        }
    }
}

impl ManifestDescriptor {
    /// Platform reported by the source, in canonical form
    pub fn platform_spec(&self) -> PlatformSpec {
        PlatformSpec::new(
            &self.platform.os,
            &self.platform.architecture,
            &self.platform.variant,
        )
    }
}

/// One platform's manifest record from an upstream manifest list
#[derive(Debug, Clone, PartialEq)]
pub struct SourceManifestEntry {
    pub platform: PlatformSpec,
    /// May be empty when the upstream list omits it
    pub digest: String,
    pub descriptor: ManifestDescriptor,
}

impl From<ManifestDescriptor> for SourceManifestEntry {
    fn from(descriptor: ManifestDescriptor) -> Self {
        Self {
            platform: descriptor.platform_spec(),
            digest: descriptor.digest.clone(),
            descriptor,
        }
    }
}

impl SourceManifestEntry {
    pub fn has_digest(&self) -> bool {
        !self.digest.is_empty()
    }
}

/// Accumulates the platform manifests that were copied by digest for one
/// (registry, image, tag) and decides whether a list gets published.
#[derive(Debug, Clone)]
pub struct DestinationManifestList {
    list: ManifestList,
}

impl DestinationManifestList {
    pub fn new(source: &ManifestList) -> Self {
        Self {
            list: ManifestList::with_header_of(source),
        }
    }

    /// Record `entry` when its copy succeeded and it is addressable by digest.
    /// A digest already in the list is not added again. Returns whether the
    /// entry was appended.
    pub fn append(&mut self, entry: &SourceManifestEntry, copy_succeeded: bool) -> bool {
        if !copy_succeeded || !entry.has_digest() || self.contains_digest(&entry.digest) {
            return false;
        }
        self.list.manifests.push(entry.descriptor.clone());
        true
    }

    pub fn contains_digest(&self, digest: &str) -> bool {
        self.list.manifests.iter().any(|m| m.digest == digest)
    }

    pub fn should_publish(&self) -> bool {
        !self.list.manifests.is_empty()
    }

    pub fn len(&self) -> usize {
        self.list.manifests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.manifests.is_empty()
    }

    pub fn manifest_list(&self) -> &ManifestList {
        &self.list
    }
}
