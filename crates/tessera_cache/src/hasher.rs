//! File system hashing for fingerprint capture.
//!
//! Computes the content hashes the fingerprint records: single files,
//! directory listings and file collections made of files and filtered
//! directory trees.

use std::path::{Path, PathBuf};

use tessera_common::ContentHash;
use tessera_fingerprint::{FileSystemEntryKind, SimplifiedFileInput};

use crate::error::{CacheError, CacheResult};

/// Hash recorded for a file collection element that doesn't exist.
const MISSING: &str = "<missing>";

/// Utility for computing content hashes of file system inputs.
pub struct FileSystemHasher;

impl FileSystemHasher {
    /// Computes the content hash of a single file.
    pub fn hash_file(path: &Path) -> CacheResult<ContentHash> {
        let content = std::fs::read(path).map_err(|e| CacheError::io(path, e))?;
        Ok(ContentHash::from_bytes(&content))
    }

    /// Hashes the sorted child names of `dir`.
    ///
    /// Returns `None` if `dir` is not a readable directory.
    pub fn hash_directory_children(dir: &Path) -> Option<ContentHash> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .ok()?
            .filter_map(Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        Some(ContentHash::from_parts(names))
    }

    /// Classifies the entry at `path` without following symbolic links.
    pub fn entry_kind(path: &Path) -> FileSystemEntryKind {
        match std::fs::symlink_metadata(path) {
            Ok(meta) if meta.is_file() => FileSystemEntryKind::File,
            Ok(meta) if meta.is_dir() => FileSystemEntryKind::Directory,
            Ok(_) => FileSystemEntryKind::Other,
            Err(_) => FileSystemEntryKind::Missing,
        }
    }

    /// Fingerprints a simplified file collection.
    ///
    /// Each file contributes its path and content hash; each tree contributes
    /// the relative paths and hashes of the files matching its patterns, in
    /// sorted order. Missing files and trees hash as missing instead of
    /// failing, so their later creation changes the fingerprint.
    pub fn fingerprint_of(inputs: &[SimplifiedFileInput]) -> ContentHash {
        let mut parts = Vec::new();
        for input in inputs {
            match input {
                SimplifiedFileInput::File(file) => {
                    parts.push(file.to_string_lossy().into_owned());
                    parts.push(Self::hash_or_missing(file));
                }
                SimplifiedFileInput::Tree { root, patterns } => {
                    parts.push(root.to_string_lossy().into_owned());
                    parts.extend(patterns.iter().cloned());
                    if !root.is_dir() {
                        parts.push(MISSING.to_string());
                        continue;
                    }
                    for relative in tree_files(root, patterns) {
                        parts.push(Self::hash_or_missing(&root.join(&relative)));
                        parts.push(relative);
                    }
                }
            }
        }
        ContentHash::from_parts(parts)
    }

    fn hash_or_missing(file: &Path) -> String {
        match Self::hash_file(file) {
            Ok(hash) => hash.to_string(),
            Err(_) => MISSING.to_string(),
        }
    }
}

/// Relative paths, `/`-separated and sorted, of the files under `root`
/// matching any of `patterns`. No patterns matches every file.
fn tree_files(root: &Path, patterns: &[String]) -> Vec<String> {
    let mut files = Vec::new();
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            match FileSystemHasher::entry_kind(&path) {
                FileSystemEntryKind::Directory => pending.push(path),
                FileSystemEntryKind::File => {
                    let Ok(relative) = path.strip_prefix(root) else {
                        continue;
                    };
                    let relative = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    if patterns.is_empty() || patterns.iter().any(|p| matches_pattern(p, &relative))
                    {
                        files.push(relative);
                    }
                }
                _ => {}
            }
        }
    }
    files.sort();
    files
}

/// Matches a `/`-separated relative path against an include pattern.
///
/// `**` matches any number of directories, `*` any run of characters within
/// a segment and `?` a single character. A pattern ending in `/` matches
/// everything below that directory.
pub fn matches_pattern(pattern: &str, path: &str) -> bool {
    let pattern = match pattern.strip_suffix('/') {
        Some(dir) => format!("{dir}/**"),
        None => pattern.to_string(),
    };
    let pattern: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    match_segments(&pattern, &path)
}

fn match_segments(pattern: &[&str], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((&"**", rest)) => (0..=path.len()).any(|skip| match_segments(rest, &path[skip..])),
        Some((segment, rest)) => match path.split_first() {
            Some((name, remaining)) => {
                match_segment(segment.as_bytes(), name.as_bytes()) && match_segments(rest, remaining)
            }
            None => false,
        },
    }
}

fn match_segment(pattern: &[u8], name: &[u8]) -> bool {
    match pattern.split_first() {
        None => name.is_empty(),
        Some((b'*', rest)) => (0..=name.len()).any(|skip| match_segment(rest, &name[skip..])),
        Some((b'?', rest)) => !name.is_empty() && match_segment(rest, &name[1..]),
        Some((c, rest)) => name.first() == Some(c) && match_segment(rest, &name[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_file_consistent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("build.tsr");
        std::fs::write(&path, "plugins {}").unwrap();
        assert_eq!(
            FileSystemHasher::hash_file(&path).unwrap(),
            ContentHash::from_bytes(b"plugins {}")
        );
    }

    #[test]
    fn hash_file_not_found() {
        let result = FileSystemHasher::hash_file(Path::new("/nonexistent/build.tsr"));
        assert!(matches!(result, Err(CacheError::Io { .. })));
    }

    #[test]
    fn directory_children_ignore_creation_order() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        for name in ["x", "y"] {
            std::fs::write(a.path().join(name), "").unwrap();
        }
        for name in ["y", "x"] {
            std::fs::write(b.path().join(name), "").unwrap();
        }
        assert_eq!(
            FileSystemHasher::hash_directory_children(a.path()),
            FileSystemHasher::hash_directory_children(b.path())
        );
        assert!(FileSystemHasher::hash_directory_children(&a.path().join("x")).is_none());
    }

    #[test]
    fn entry_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, "").unwrap();
        assert_eq!(FileSystemHasher::entry_kind(dir.path()), FileSystemEntryKind::Directory);
        assert_eq!(FileSystemHasher::entry_kind(&file), FileSystemEntryKind::File);
        assert_eq!(
            FileSystemHasher::entry_kind(&dir.path().join("missing")),
            FileSystemEntryKind::Missing
        );
    }

    #[test]
    fn patterns() {
        assert!(matches_pattern("**/*.tsr", "build.tsr"));
        assert!(matches_pattern("**/*.tsr", "a/b/build.tsr"));
        assert!(!matches_pattern("*.tsr", "a/build.tsr"));
        assert!(matches_pattern("src/", "src/main/lib.rs"));
        assert!(matches_pattern("lib?.jar", "lib1.jar"));
        assert!(!matches_pattern("lib?.jar", "lib.jar"));
        assert!(matches_pattern("a/**/c", "a/c"));
    }

    #[test]
    fn tree_fingerprint_follows_matching_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("conf");
        std::fs::create_dir_all(root.join("nested")).unwrap();
        std::fs::write(root.join("nested/app.properties"), "a=1").unwrap();
        std::fs::write(root.join("notes.txt"), "draft").unwrap();
        let inputs = [SimplifiedFileInput::Tree {
            root: root.clone(),
            patterns: vec!["**/*.properties".into()],
        }];

        let before = FileSystemHasher::fingerprint_of(&inputs);
        std::fs::write(root.join("notes.txt"), "final").unwrap();
        assert_eq!(FileSystemHasher::fingerprint_of(&inputs), before);

        std::fs::write(root.join("nested/app.properties"), "a=2").unwrap();
        assert_ne!(FileSystemHasher::fingerprint_of(&inputs), before);
    }

    #[test]
    fn creating_a_missing_file_changes_the_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("local.properties");
        let inputs = [SimplifiedFileInput::File(file.clone())];
        let missing = FileSystemHasher::fingerprint_of(&inputs);
        std::fs::write(&file, "").unwrap();
        assert_ne!(FileSystemHasher::fingerprint_of(&inputs), missing);
    }
}
