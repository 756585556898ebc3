//! Reference statements and archive-relative path resolution.
//!
//! USDZ archives address sibling layers with POSIX-style relative paths.
//! Resolution never touches the file system; it only produces keys for the
//! [`AssetTable`](super::archive::AssetTable).

use super::types::PropertyNode;
use super::values::parse_token;

/// Resolve `relative` against the directory `base` (`""` for the archive root).
///
/// `.` segments are dropped, `..` pops (never above the root), leading
/// `./` and `/` are ignored, and `@`/quote delimiters are stripped.
pub fn resolve_path(base: &str, relative: &str) -> String {
    let relative = relative
        .trim()
        .trim_matches(|c| c == '@' || c == '"' || c == '\'')
        .trim();

    let mut segments: Vec<&str> = if relative.starts_with('/') {
        Vec::new()
    } else {
        base.split('/').filter(|s| !s.is_empty() && *s != ".").collect()
    };

    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

/// Directory part of an archive path (`scenes/room/model.usda` → `scenes/room`).
pub fn parent_dir(path: &str) -> &str {
    path.rfind('/').map_or("", |i| &path[..i])
}

/// Asset paths of a reference list value.
///
/// Accepts a single reference or a bracketed, comma-separated list. Each item
/// is either `@path@` (optionally followed by a `</Prim>` target) or a
/// quoted bare path.
pub fn parse_reference_list(value: &str) -> Vec<String> {
    value
        .replace(['[', ']'], "")
        .split(',')
        .filter_map(|item| {
            let item = item.trim();
            let path = if item.contains('@') {
                item.split('@').nth(1)?
            } else {
                parse_token(item)
            };
            let path = path.trim();
            (!path.is_empty()).then(|| path.to_string())
        })
        .collect()
}

/// Raw asset paths referenced by a prim, across all additive list-ops.
pub fn references_of(node: &PropertyNode) -> Vec<String> {
    node.metadata_values("references")
        .flat_map(parse_reference_list)
        .collect()
}
