use super::*;
use std::collections::HashSet;

#[test]
fn test_parse_os_arch() {
    let p = PlatformSpec::parse("linux/amd64").unwrap();
    assert_eq!(p.os, "linux");
    assert_eq!(p.arch, "amd64");
    assert!(p.variant.is_empty());
}

#[test]
fn test_parse_with_variant() {
    let p: PlatformSpec = "linux/arm/v7".parse().unwrap();
    assert_eq!(p.os, "linux");
    assert_eq!(p.arch, "arm");
    assert_eq!(p.variant, "v7");
}

#[test]
fn test_canonical_string_round_trip() {
    for s in ["linux/amd64", "linux/arm64/v8", "windows/amd64", "linux/arm/v6"] {
        let p = PlatformSpec::parse(s).unwrap();
        assert_eq!(p.canonical_string(), s);
        assert_eq!(p.to_string(), s);
        assert_eq!(PlatformSpec::parse(&p.canonical_string()).unwrap(), p);
    }
}

#[test]
fn test_parse_invalid() {
    for s in ["", "linux", "linux/", "/amd64", "linux/amd64/", "linux/arm/v7/extra", "linux//v7"] {
        match PlatformSpec::parse(s) {
            Err(BundleError::InvalidPlatformFormat(value)) => assert_eq!(value, s),
            other => panic!("expected InvalidPlatformFormat for {:?}, got {:?}", s, other),
        }
    }
}

#[test]
fn test_equality_and_hash_use_canonical_string() {
    let a = PlatformSpec::new("linux", "arm64", "");
    let b = PlatformSpec::parse("linux/arm64").unwrap();
    let c = a.with_variant("v8");
    assert_eq!(a, b);
    assert_ne!(a, c);

    let set: HashSet<PlatformSpec> = [a, b, c].into_iter().collect();
    assert_eq!(set.len(), 2);
}

#[test]
fn test_parse_platform_arg_message() {
    let err = parse_platform_arg("linux").unwrap_err();
    assert!(err.contains("<os>/<arch>[/<variant>]"));
}
