//! Assertions over published artifacts.

use crate::imaging::ops::read_metadata;
use std::path::Path;

/// Asserts that `path` is a decodable image of exactly `width` x `height`.
pub fn assert_image_dimensions(path: &Path, width: u32, height: u32) {
    let meta = read_metadata(path)
        .unwrap_or_else(|err| panic!("Expected an image at {}: {err}", path.display()));
    assert_eq!(
        (meta.width, meta.height),
        (width, height),
        "Unexpected dimensions for {}",
        path.display()
    );
}

/// Asserts that no temp file (`*.tmp*`) remains in `dir`.
pub fn assert_no_temp_files(dir: &Path) {
    let leftovers: Vec<String> = std::fs::read_dir(dir)
        .unwrap_or_else(|err| panic!("Cannot list {}: {err}", dir.display()))
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.contains(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "Temp files left in {}: {leftovers:?}", dir.display());
}

/// Asserts that nothing exists at `path`.
pub fn assert_absent(path: &Path) {
    assert!(!path.exists(), "Expected no file at {}", path.display());
}
