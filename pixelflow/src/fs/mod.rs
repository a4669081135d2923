//! Filesystem helpers for publishing artifacts.

mod atomic;

pub use atomic::{ensure_dir, temp_path_for, AtomicFileWriter};
