//! Logical name normalization.
//!
//! Registry keys are slash-separated and extension-less. Relative names are
//! cleaned lexically and stay relative; absolute names are expanded to their
//! canonical absolute form. Nothing here touches the filesystem.

use std::borrow::Cow;
use std::path::Path;

/// Whether `name` is an absolute path on this platform.
pub fn is_absolute(name: &str) -> bool {
    Path::new(name).is_absolute() || name.starts_with('/')
}

/// Canonicalize `path` lexically: collapse separators, `.` and `..`.
pub fn clean(path: &str) -> String {
    let unified = unify_separators(path);
    if is_absolute(path) {
        clean_absolute(&unified)
    } else {
        clean_relative(&unified)
    }
}

/// Registry key for `name`: the cleaned path with a trailing `.{extension}` removed.
pub fn registry_key(name: &str, extension: &str) -> String {
    let cleaned = clean(name);
    strip_extension(&cleaned, extension).to_string()
}

/// Remove a trailing `.{extension}` suffix, if present.
pub fn strip_extension<'a>(name: &'a str, extension: &str) -> &'a str {
    name.strip_suffix(extension)
        .and_then(|rest| rest.strip_suffix('.'))
        .filter(|stem| !stem.is_empty() && !stem.ends_with('/'))
        .unwrap_or(name)
}

/// Join a scope prefix and a name into one cleaned logical name.
pub fn join(prefix: &str, name: &str) -> String {
    clean(&format!("{prefix}/{name}"))
}

fn unify_separators(path: &str) -> Cow<'_, str> {
    if cfg!(windows) && path.contains('\\') {
        Cow::Owned(path.replace('\\', "/"))
    } else {
        Cow::Borrowed(path)
    }
}

fn clean_absolute(path: &str) -> String {
    // Root is everything through the first separator: "/" or "C:/".
    let (root, rest) = match path.find('/') {
        Some(idx) => (&path[..=idx], &path[idx + 1..]),
        None => (path, ""),
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("{root}{}", segments.join("/"))
}

fn clean_relative(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ => segments.push(".."),
            },
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        ".".to_string()
    } else {
        segments.join("/")
    }
}
