//! Object-name and folder-prefix utilities.
//!
//! Swift has no real directories: an object name may contain `/` and a
//! "folder" is just the set of objects sharing a name prefix. These helpers
//! keep the prefix conventions in one place.

use std::path::{Component, Path, PathBuf};

/// Convert a relative filesystem path to a POSIX-style object name.
///
/// # Arguments
/// * `path` - Relative path (native separators)
///
/// # Returns
/// Name with forward slashes as separators, skipping empty components.
pub fn to_posix_name(path: &Path) -> String {
    path.components()
        .filter(|c: &Component| matches!(c, Component::Normal(_)))
        .map(|c: Component| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Build the object name for a file under an uploaded folder.
///
/// Folder uploads keep the base folder segment, so uploading `/tmp/photos`
/// stores `photos/2024/a.jpg` for `/tmp/photos/2024/a.jpg`. Pass an empty
/// `base` for names relative to the folder itself (bulk-drop convention).
///
/// # Arguments
/// * `base` - Leading segment (usually the folder's own name), may be empty
/// * `relative` - Path of the file relative to the folder
pub fn object_name_for(base: &str, relative: &Path) -> String {
    let rel: String = to_posix_name(relative);
    if base.is_empty() {
        rel
    } else if rel.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, rel)
    }
}

/// The prefix shared by all objects "inside" a folder.
///
/// # Arguments
/// * `folder` - Folder path without trailing slash (e.g. `reports/2024`)
pub fn folder_prefix(folder: &str) -> String {
    let trimmed: &str = folder.trim_end_matches('/');
    format!("{}/", trimmed)
}

/// Last path segment of a folder path (`reports/2024` -> `2024`).
pub fn folder_name(folder: &str) -> &str {
    folder
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(folder)
}

/// Strip a folder prefix from an object name.
///
/// # Returns
/// The suffix after the prefix, or `None` if the object is not under it.
pub fn strip_folder_prefix<'a>(object_name: &'a str, prefix: &str) -> Option<&'a str> {
    object_name.strip_prefix(prefix)
}

/// Local destination path for a recursively downloaded object.
///
/// Objects `reports/2024/a.txt` downloaded with folder `reports/2024` into
/// `save_root` land at `save_root/2024/a.txt`: the folder keeps its own name,
/// parent segments of the prefix are dropped.
///
/// # Arguments
/// * `save_root` - Directory chosen as the download destination
/// * `folder` - Folder path being downloaded
/// * `suffix` - Object name with the folder prefix already stripped
pub fn download_path(save_root: &Path, folder: &str, suffix: &str) -> PathBuf {
    let mut path: PathBuf = save_root.join(folder_name(folder));
    for component in suffix.split('/').filter(|c: &&str| !c.is_empty()) {
        path.push(component);
    }
    path
}
