//! Project-relative path utilities
//!
//! Project keys always use forward slashes regardless of platform, so that
//! renames, manifest rewrites and file classification can work on plain
//! strings.

use std::path::Path;

/// Normalize path to forward slashes
#[inline]
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Convert a relative Path to a normalized project key
#[inline]
pub fn path_to_key(path: &Path) -> String {
    normalize_path(&path.to_string_lossy())
}

/// Last path segment
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Last path segment without its final extension
pub fn file_stem(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(dot) => &name[..dot],
    }
}

/// Final extension without the dot, if any
pub fn extension(path: &str) -> Option<&str> {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(dot) => Some(&name[dot + 1..]),
    }
}

/// Replace the stem of the last segment, keeping directory and extension
pub fn with_stem(path: &str, stem: &str) -> String {
    let dir_len = path.len() - file_name(path).len();
    match extension(path) {
        Some(ext) => format!("{}{}.{}", &path[..dir_len], stem, ext),
        None => format!("{}{}", &path[..dir_len], stem),
    }
}

/// Directory part of a key, without the trailing slash
pub fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(slash) => &path[..slash],
        None => "",
    }
}

/// Longest directory prefix shared by every key
pub fn common_dir<'a>(paths: impl IntoIterator<Item = &'a str>) -> String {
    let mut common: Option<Vec<&str>> = None;
    for path in paths {
        let segments: Vec<&str> = parent(path).split('/').filter(|s| !s.is_empty()).collect();
        common = Some(match common {
            None => segments,
            Some(prev) => prev
                .iter()
                .zip(segments.iter())
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| *a)
                .collect(),
        });
    }
    common.unwrap_or_default().join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("App\\Views\\Home.swift"), "App/Views/Home.swift");
        assert_eq!(normalize_path("App/Views/Home.swift"), "App/Views/Home.swift");
        assert_eq!(normalize_path(""), "");
    }

    #[test]
    fn test_path_to_key() {
        let path = PathBuf::from("App").join("Home.swift");
        let key = path_to_key(&path);
        assert!(!key.contains('\\'));
        assert!(key.ends_with("Home.swift"));
    }

    #[test]
    fn test_stem_and_extension() {
        assert_eq!(file_stem("App/Views/Home.swift"), "Home");
        assert_eq!(extension("App/Views/Home.swift"), Some("swift"));
        assert_eq!(file_stem("App/project.pbxproj"), "project");
        assert_eq!(extension("App/.gitignore"), None);
        assert_eq!(file_stem("App/.gitignore"), ".gitignore");
    }

    #[test]
    fn test_with_stem() {
        assert_eq!(with_stem("App/Views/Home.swift", "Start"), "App/Views/Start.swift");
        assert_eq!(with_stem("Home.xib", "Start"), "Start.xib");
        assert_eq!(
            with_stem("App/Assets.xcassets/logo.imageset", "brand"),
            "App/Assets.xcassets/brand.imageset"
        );
    }

    #[test]
    fn test_common_dir() {
        let paths = ["App/Views/Home.swift", "App/Models/User.swift", "App/Views/List.swift"];
        assert_eq!(common_dir(paths), "App");
        assert_eq!(common_dir(["Main.swift"]), "");
        assert_eq!(common_dir(Vec::<&str>::new()), "");
    }
}
