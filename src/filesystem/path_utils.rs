use std::path::{Component, Path};

/// Root-relative, `/`-separated form of `path` used on the wire.
///
/// The root itself maps to the empty string. Paths outside `root` also map to
/// the empty string rather than exposing host layout.
pub fn to_protocol_path(root: &Path, path: &Path) -> String {
    let relative = match path.strip_prefix(root) {
        Ok(relative) => relative,
        Err(_) => return String::new(),
    };

    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Final path component for display; empty for the root
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
