/// Platform constants for image selection
pub mod platform {
    /// Platform selected when no `--platform` flag is given
    pub const DEFAULT: &str = "linux/amd64";

    /// Architecture whose manifests are commonly published with or without a variant
    pub const ARM64_ARCH: &str = "arm64";

    /// Variant tried for `arm64` requests that did not name one
    pub const ARM64_FALLBACK_VARIANT: &str = "v8";
}

/// Manifest media types
pub mod media_type {
    /// Docker distribution manifest list
    pub const DOCKER_MANIFEST_LIST: &str =
        "application/vnd.docker.distribution.manifest.list.v2+json";

    /// OCI image index
    pub const OCI_IMAGE_INDEX: &str = "application/vnd.oci.image.index.v1+json";
}

/// Bundle layout constants
pub mod bundle {
    /// Default name of the archive written by `create image-bundle`
    pub const DEFAULT_OUTPUT_FILE: &str = "images.tar";

    /// Name of the sanitized images config stored at the bundle root
    pub const SANITIZED_CONFIG_FILE: &str = "images.yaml";

    /// Prefix of the staging directory created next to the output file
    pub const TEMP_DIR_PREFIX: &str = ".image-bundle-";
}

/// Defaults for `serve image-bundle`
pub mod serve {
    pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0";
    pub const DEFAULT_LISTEN_PORT: u16 = 5000;
}

/// Transport prefixes understood by skopeo
pub mod transport {
    pub const DOCKER: &str = "docker://";
    pub const DIR: &str = "dir:";
}
