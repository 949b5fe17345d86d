//! Platform descriptors
//!
//! A [`PlatformSpec`] identifies an `{os, arch, variant}` target. Its
//! canonical string form (`os/arch` or `os/arch/variant`) is also the key
//! used to look platforms up in a [`ManifestIndex`](crate::resolve::ManifestIndex),
//! so equality and hashing are defined over that string.

use crate::error::BundleError;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, Default)]
pub struct PlatformSpec {
    pub os: String,
    pub arch: String,
    pub variant: String,
}

impl PlatformSpec {
    pub fn new(os: impl Into<String>, arch: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
            variant: variant.into(),
        }
    }

    /// Parse `<os>/<arch>[/<variant>]`
    pub fn parse(s: &str) -> Result<Self, BundleError> {
        let parts: Vec<&str> = s.split('/').collect();
        if !(2..=3).contains(&parts.len()) || parts.iter().any(|p| p.is_empty()) {
            return Err(BundleError::InvalidPlatformFormat(s.to_string()));
        }

        Ok(Self::new(
            parts[0],
            parts[1],
            parts.get(2).copied().unwrap_or_default(),
        ))
    }

    pub fn canonical_string(&self) -> String {
        if self.variant.is_empty() {
            format!("{}/{}", self.os, self.arch)
        } else {
            format!("{}/{}/{}", self.os, self.arch, self.variant)
        }
    }

    /// Same platform with a different variant
    pub fn with_variant(&self, variant: impl Into<String>) -> Self {
        Self {
            variant: variant.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for PlatformSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_string())
    }
}

impl FromStr for PlatformSpec {
    type Err = BundleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq for PlatformSpec {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_string() == other.canonical_string()
    }
}

impl Eq for PlatformSpec {}

impl Hash for PlatformSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_string().hash(state);
    }
}

/// clap value parser for `--platform`
pub fn parse_platform_arg(s: &str) -> Result<PlatformSpec, String> {
    PlatformSpec::parse(s).map_err(|e| e.to_string())
}
