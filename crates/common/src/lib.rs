//! Shared types and utilities for swiftdesk.
//!
//! This crate provides common functionality used across all swiftdesk crates:
//! - Object-name and folder-prefix utilities
//! - Generic progress callback trait
//! - Shared constants (reserved containers, concurrency defaults)
//! - Human-readable byte formatting

pub mod constants;
pub mod error;
pub mod format;
pub mod names;
pub mod progress;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{validate_container_name, NameError};
pub use format::format_bytes;
pub use names::{
    download_path, folder_name, folder_prefix, object_name_for, strip_folder_prefix,
    to_posix_name,
};
pub use progress::{progress_fn, FnProgress, NoOpProgress, ProgressCallback};
