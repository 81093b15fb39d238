//! Project store
//!
//! An in-memory `path → text` map of every transformable file in a source
//! tree, plus the filesystem adapter that fills it from and flushes it back
//! to disk. Static assets (images, fonts, binary plists, …) never enter the
//! map; only the names of asset-catalog image sets are tracked so that the
//! image-renaming stage can plan directory moves.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Result};
use crate::path_utils::{extension, path_to_key};

/// How a path is treated by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    /// `.swift`
    Source,
    /// `.xib`, `.storyboard`
    Interface,
    /// `.plist`, `.xml`
    PropertyList,
    /// `.pbxproj`
    Manifest,
    /// Everything else; copied byte-for-byte, never loaded
    Static,
}

impl FileClass {
    pub fn of(path: &str) -> Self {
        match extension(path) {
            Some("swift") => FileClass::Source,
            Some("xib") | Some("storyboard") => FileClass::Interface,
            Some("plist") | Some("xml") => FileClass::PropertyList,
            Some("pbxproj") => FileClass::Manifest,
            _ => FileClass::Static,
        }
    }

    pub fn is_transformable(self) -> bool {
        self != FileClass::Static
    }
}

/// A planned move of a static directory, applied when the project is saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetMove {
    pub from: String,
    pub to: String,
}

/// In-memory project: relative path → UTF-8 text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Project {
    files: BTreeMap<String, String>,
    image_sets: BTreeSet<String>,
    asset_moves: Vec<AssetMove>,
}

static IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("identifier pattern compiles"));

impl Project {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a project from `(path, text)` pairs; non-transformable paths are dropped
    pub fn from_files<I, P, T>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, T)>,
        P: Into<String>,
        T: Into<String>,
    {
        let mut project = Self::new();
        for (path, text) in files {
            project.insert(path, text);
        }
        project
    }

    /// Insert or replace a file. Returns false (and stores nothing) for static paths.
    pub fn insert(&mut self, path: impl Into<String>, text: impl Into<String>) -> bool {
        let path = path.into();
        if !FileClass::of(&path).is_transformable() {
            return false;
        }
        self.files.insert(path, text.into());
        true
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.files.remove(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(p, t)| (p.as_str(), t.as_str()))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Files of one class
    pub fn files_of(&self, class: FileClass) -> impl Iterator<Item = (&str, &str)> {
        self.files().filter(move |(p, _)| FileClass::of(p) == class)
    }

    pub fn source_count(&self) -> usize {
        self.files_of(FileClass::Source).count()
    }

    /// Whether any file contains `needle` verbatim
    pub fn contains_text(&self, needle: &str) -> bool {
        self.files.values().any(|t| t.contains(needle))
    }

    /// Every identifier-shaped token in every file
    pub fn vocabulary(&self) -> HashSet<String> {
        self.files
            .par_iter()
            .map(|(_, text)| {
                IDENT
                    .find_iter(text)
                    .map(|m| m.as_str().to_string())
                    .collect::<HashSet<_>>()
            })
            .reduce(HashSet::new, |mut a, b| {
                a.extend(b);
                a
            })
    }

    /// Rewrite every file of `class` independently on the current rayon pool.
    ///
    /// Each file's slot is written by exactly one task. Returns how many files changed.
    pub fn par_rewrite<F>(&mut self, class: FileClass, rewrite: F) -> usize
    where
        F: Fn(&str, &str) -> String + Sync,
    {
        let changed: Vec<(String, String)> = self
            .files
            .par_iter()
            .filter(|(path, _)| FileClass::of(path) == class)
            .filter_map(|(path, text)| {
                let new_text = rewrite(path, text);
                (new_text != *text).then(|| (path.clone(), new_text))
            })
            .collect();
        let count = changed.len();
        self.files.extend(changed);
        count
    }

    /// Move a file to a new key. Returns false if `from` is absent or `to` is taken.
    pub fn rename_path(&mut self, from: &str, to: &str) -> bool {
        if from == to || self.files.contains_key(to) {
            return false;
        }
        match self.files.remove(from) {
            Some(text) => {
                self.files.insert(to.to_string(), text);
                true
            }
            None => false,
        }
    }

    pub fn image_sets(&self) -> impl Iterator<Item = &str> {
        self.image_sets.iter().map(String::as_str)
    }

    pub fn add_image_set(&mut self, path: impl Into<String>) {
        self.image_sets.insert(path.into());
    }

    /// Record an image-set directory move to be performed on save
    pub fn move_image_set(&mut self, from: &str, to: &str) -> bool {
        if !self.image_sets.remove(from) {
            return false;
        }
        self.image_sets.insert(to.to_string());
        self.asset_moves.push(AssetMove {
            from: from.to_string(),
            to: to.to_string(),
        });
        true
    }

    pub fn asset_moves(&self) -> &[AssetMove] {
        &self.asset_moves
    }
}

/// Filesystem adapter for [`Project`]
pub struct ProjectStore;

fn is_skipped(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    (entry.file_type().is_dir() && name == "Pods") || name.starts_with("._")
}

impl ProjectStore {
    /// Read every transformable file under `dir` into a project and delete it
    /// from disk. Static files stay where they are.
    ///
    /// Files with a transformable extension that are not valid UTF-8 (binary
    /// property lists) are treated as static.
    pub fn load(dir: &Path) -> Result<Project> {
        let mut project = Project::new();
        let mut loaded: Vec<PathBuf> = Vec::new();

        for entry in WalkDir::new(dir).into_iter().filter_entry(|e| !is_skipped(e)) {
            let entry = entry.map_err(|e| Error::Read {
                path: e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf()),
                source: e.into(),
            })?;
            let Ok(rel) = entry.path().strip_prefix(dir) else {
                continue;
            };
            let key = path_to_key(rel);

            if entry.file_type().is_dir() {
                if extension(&key) == Some("imageset") && key.contains(".xcassets/") {
                    project.add_image_set(key);
                }
                continue;
            }
            if !FileClass::of(&key).is_transformable() {
                continue;
            }

            let bytes = fs::read(entry.path()).map_err(|source| Error::Read {
                path: entry.path().to_path_buf(),
                source,
            })?;
            match String::from_utf8(bytes) {
                Ok(text) => {
                    project.insert(key, text.replace('\u{2028}', " "));
                    loaded.push(entry.path().to_path_buf());
                }
                Err(_) => {
                    tracing::debug!("Keeping non-UTF-8 file as static: {}", key);
                }
            }
        }

        if project.is_empty() {
            return Err(Error::EmptyProject(dir.to_path_buf()));
        }

        for path in &loaded {
            fs::remove_file(path).map_err(|source| Error::Write {
                path: path.clone(),
                source,
            })?;
        }

        tracing::info!("Loaded {} transformable files from {}", loaded.len(), dir.display());
        Ok(project)
    }

    /// Write every file back under `dir`, creating directories as needed,
    /// then perform planned image-set moves.
    pub fn save(project: &Project, dir: &Path) -> Result<()> {
        for (key, text) in project.files() {
            let path = dir.join(key);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|source| Error::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            fs::write(&path, text).map_err(|source| Error::Write { path, source })?;
        }

        for moved in project.asset_moves() {
            let from = dir.join(&moved.from);
            let to = dir.join(&moved.to);
            if !from.exists() {
                tracing::warn!("Image set {} no longer exists; skipping move", moved.from);
                continue;
            }
            fs::rename(&from, &to).map_err(|source| Error::Write { path: to, source })?;
        }

        tracing::info!("Saved {} files to {}", project.len(), dir.display());
        Ok(())
    }
}
