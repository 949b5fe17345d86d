//! Registry login support
//!
//! Registries with credentials in the images file get them passed straight
//! to the copy tool. Everything else relies on the tool's own auth files,
//! except AWS ECR, which needs a short-lived token fetched first.

use regex::Regex;
use std::sync::OnceLock;

fn ecr_registry_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:https://)?[a-zA-Z0-9]+\.dkr\.ecr\.([^.]+)\.amazonaws\.com/?")
            .expect("valid ECR registry regex")
    })
}

/// Check whether `registry_address` points at an AWS ECR registry
pub fn is_ecr_registry(registry_address: &str) -> bool {
    ecr_registry_regex().is_match(registry_address)
}

/// AWS region encoded in an ECR registry address
pub fn ecr_region(registry_address: &str) -> Option<&str> {
    ecr_registry_regex()
        .captures(registry_address)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_ecr_registry() {
        assert!(is_ecr_registry("123456789012.dkr.ecr.us-west-2.amazonaws.com"));
        assert!(is_ecr_registry("https://123456789012.dkr.ecr.eu-central-1.amazonaws.com/"));
        assert!(!is_ecr_registry("docker.io"));
        assert!(!is_ecr_registry("public.ecr.aws"));
        assert!(!is_ecr_registry("123456789012.dkr.ecr.amazonaws.com"));
    }

    #[test]
    fn test_ecr_region() {
        assert_eq!(
            ecr_region("123456789012.dkr.ecr.us-west-2.amazonaws.com"),
            Some("us-west-2")
        );
        assert_eq!(ecr_region("quay.io"), None);
    }
}
