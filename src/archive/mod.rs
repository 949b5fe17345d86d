use crate::constants::bundle::TEMP_DIR_PREFIX;
use crate::error::BundleError;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tar::{Archive, Builder};
use tracing::debug;

/// Write an uncompressed tarball of the contents of `source_dir` to
/// `output_file`. Entry paths are relative to `source_dir`.
///
/// The tarball is written next to `output_file` under a temporary name and
/// renamed into place once complete, so a failed run never leaves a partial
/// bundle and never clobbers an existing one.
pub fn archive_directory(source_dir: &Path, output_file: &Path) -> Result<(), BundleError> {
    let wrap = |source: std::io::Error| BundleError::Archive {
        path: output_file.to_path_buf(),
        source,
    };

    debug!(
        "Archiving {} to {}",
        source_dir.display(),
        output_file.display()
    );

    let parent = match output_file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let partial = tempfile::Builder::new()
        .prefix(TEMP_DIR_PREFIX)
        .suffix(".tar")
        .tempfile_in(parent)
        .map_err(wrap)?;

    let mut tar = Builder::new(BufWriter::new(partial.as_file()));
    tar.follow_symlinks(false);
    tar.append_dir_all("", source_dir).map_err(wrap)?;

    let writer = tar.into_inner().map_err(wrap)?;
    writer
        .into_inner()
        .map_err(|e| wrap(e.into_error()))?
        .sync_all()
        .map_err(wrap)?;

    partial.persist(output_file).map_err(|e| wrap(e.error))?;
    Ok(())
}

/// Unpack the bundle at `archive_file` into `dest_dir`
pub fn extract_archive(archive_file: &Path, dest_dir: &Path) -> Result<(), BundleError> {
    let wrap = |source: std::io::Error| BundleError::Extract {
        path: archive_file.to_path_buf(),
        source,
    };

    debug!(
        "Extracting {} to {}",
        archive_file.display(),
        dest_dir.display()
    );

    let file = File::open(archive_file).map_err(wrap)?;
    Archive::new(file).unpack(dest_dir).map_err(wrap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;

    fn entries(archive: &Path) -> BTreeSet<String> {
        let mut tar = tar::Archive::new(File::open(archive).unwrap());
        tar.entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().display().to_string())
            .collect()
    }

    #[test]
    fn test_archive_directory() {
        let src = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("docker/registry/v2")).unwrap();
        fs::write(src.path().join("docker/registry/v2/blob"), b"data").unwrap();
        fs::write(src.path().join("images.yaml"), b"docker.io: {}\n").unwrap();

        let out_dir = tempfile::tempdir().unwrap();
        let out = out_dir.path().join("images.tar");
        archive_directory(src.path(), &out).unwrap();

        let names = entries(&out);
        assert!(names.contains("images.yaml"));
        assert!(names
            .iter()
            .any(|n| n.ends_with("docker/registry/v2/blob")));
    }

    #[test]
    fn test_archive_overwrites_existing_file() {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("images.yaml"), b"{}\n").unwrap();

        let out_dir = tempfile::tempdir().unwrap();
        let out = out_dir.path().join("images.tar");
        fs::write(&out, b"stale").unwrap();

        archive_directory(src.path(), &out).unwrap();
        assert!(fs::metadata(&out).unwrap().len() > 5);
    }

    fn leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(TEMP_DIR_PREFIX))
            .collect()
    }

    #[test]
    fn test_archive_missing_source() {
        let out_dir = tempfile::tempdir().unwrap();
        let out = out_dir.path().join("images.tar");
        let err = archive_directory(Path::new("/nonexistent/dir"), &out).unwrap_err();
        assert!(matches!(err, BundleError::Archive { .. }));
        assert!(!out.exists());
        assert!(leftovers(out_dir.path()).is_empty());
    }

    #[test]
    fn test_archive_failure_keeps_existing_output() {
        let out_dir = tempfile::tempdir().unwrap();
        let out = out_dir.path().join("images.tar");
        fs::write(&out, b"previous bundle").unwrap();

        archive_directory(Path::new("/nonexistent/dir"), &out).unwrap_err();
        assert_eq!(fs::read(&out).unwrap(), b"previous bundle");
        assert!(leftovers(out_dir.path()).is_empty());
    }

    #[test]
    fn test_extract_archive() {
        let src = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("docker/registry/v2")).unwrap();
        fs::write(src.path().join("docker/registry/v2/blob"), b"data").unwrap();

        let out_dir = tempfile::tempdir().unwrap();
        let out = out_dir.path().join("images.tar");
        archive_directory(src.path(), &out).unwrap();

        let dest = tempfile::tempdir().unwrap();
        extract_archive(&out, dest.path()).unwrap();
        assert_eq!(
            fs::read(dest.path().join("docker/registry/v2/blob")).unwrap(),
            b"data"
        );
    }

    #[test]
    fn test_extract_missing_archive() {
        let dest = tempfile::tempdir().unwrap();
        let err = extract_archive(Path::new("/nonexistent/images.tar"), dest.path()).unwrap_err();
        assert!(matches!(err, BundleError::Extract { .. }));
    }
}
