//! Error helper functions for short, actionable file error messages

use std::io;
use std::path::Path;

/// Check if an IO error is a permission denied error
pub fn is_permission_denied(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::PermissionDenied
}

/// Check if an IO error is a "not found" error
pub fn is_not_found(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound
}

/// Message for an input file that could not be opened
pub fn format_input_error(name: &str, err: &io::Error) -> String {
    if is_not_found(err) {
        format!("can't read {}: No such file or directory", name)
    } else if is_permission_denied(err) {
        format!("can't read {}: Permission denied", name)
    } else if err.kind() == io::ErrorKind::IsADirectory {
        format!("read error on {}: Is a directory", name)
    } else {
        format!("can't read {}: {}", name, err)
    }
}

/// Message for an in-place edit that could not write next to `path`
pub fn in_place_error(path: &Path, err: &io::Error) -> String {
    let parent_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| ".".to_string());

    if is_permission_denied(err) {
        format!(
            "couldn't edit {}: permission denied\n\
             In-place editing writes a temporary file in '{}'; check write access with: ls -ld '{}'",
            path.display(),
            parent_dir,
            parent_dir
        )
    } else {
        format!("couldn't edit {}: {}", path.display(), err)
    }
}
