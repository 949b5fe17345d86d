use crate::error::BundleError;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;


/// Images to bundle, keyed by source registry
pub type ImagesConfig = BTreeMap<String, RegistryConfig>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Verify the registry's TLS certificate (default: true)
    #[serde(rename = "tlsVerify", default, skip_serializing_if = "Option::is_none")]
    pub tls_verify: Option<bool>,

    /// Credentials for pulling from the registry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,

    /// Image name to tags
    #[serde(default, deserialize_with = "deserialize_images")]
    pub images: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl RegistryConfig {
    pub fn tls_verify(&self) -> bool {
        self.tls_verify.unwrap_or(true)
    }
}

/// Tags may be written unquoted in YAML (`- 7`), so accept scalars of any kind.
/// Floats are refused: `1.20` has already become `1.2` by the time it gets here.
#[derive(Deserialize)]
#[serde(untagged)]
enum TagValue {
    String(String),
    Number(serde_yaml::Number),
    Bool(bool),
}

impl TagValue {
    fn into_string(self, image: &str) -> Result<String, String> {
        match self {
            TagValue::String(s) => Ok(s),
            TagValue::Number(n) if n.is_f64() => Err(format!(
                "tag {} of image {} is a floating point number: quote numeric tags",
                n, image
            )),
            TagValue::Number(n) => Ok(n.to_string()),
            TagValue::Bool(b) => Ok(b.to_string()),
        }
    }
}

fn deserialize_images<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<String, Option<Vec<TagValue>>> = BTreeMap::deserialize(deserializer)?;

    let mut images = BTreeMap::new();
    for (image, tags) in raw {
        let mut unique: Vec<String> = Vec::new();
        for tag in tags.unwrap_or_default() {
            let tag = tag.into_string(&image).map_err(D::Error::custom)?;
            if !unique.contains(&tag) {
                unique.push(tag);
            }
        }
        images.insert(image, unique);
    }
    Ok(images)
}

pub fn parse_str(content: &str, path: &Path) -> Result<ImagesConfig, BundleError> {
    // An empty document is an empty config, not an error
    if content.trim().is_empty() {
        return Ok(ImagesConfig::new());
    }

    serde_yaml::from_str(content).map_err(|e| BundleError::ConfigParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

pub fn parse_file(path: &Path) -> Result<ImagesConfig, BundleError> {
    let content = std::fs::read_to_string(path).map_err(|e| BundleError::ConfigParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_str(&content, path)
}

/// Copy of `config` with every credentials block removed
pub fn sanitized(config: &ImagesConfig) -> ImagesConfig {
    config
        .iter()
        .map(|(name, registry)| {
            (
                name.clone(),
                RegistryConfig {
                    credentials: None,
                    ..registry.clone()
                },
            )
        })
        .collect()
}

pub fn write_sanitized_config(config: &ImagesConfig, path: &Path) -> Result<(), BundleError> {
    let content = serde_yaml::to_string(&sanitized(config))
        .map_err(|e| BundleError::Serialization(e.to_string()))?;
    std::fs::write(path, content)?;
    Ok(())
}
