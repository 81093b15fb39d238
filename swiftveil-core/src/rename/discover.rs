//! Project-wide identifier discovery

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::exclusions::ExclusionSet;
use super::functions::function_candidates;
use super::variables::local_variable_candidates;
use crate::lexical::{brace_depth_at, is_identifier};
use crate::path_utils::{file_name, file_stem};
use crate::project::{FileClass, Project};
use crate::scanner::{scan, Anchor};

/// Declaration keywords whose types may be renamed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKeyword {
    Class,
    Struct,
    Enum,
    Protocol,
}

impl TypeKeyword {
    pub fn parse(keyword: &str) -> Option<Self> {
        match keyword {
            "class" => Some(TypeKeyword::Class),
            "struct" => Some(TypeKeyword::Struct),
            "enum" => Some(TypeKeyword::Enum),
            "protocol" => Some(TypeKeyword::Protocol),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TypeKeyword::Class => "class",
            TypeKeyword::Struct => "struct",
            TypeKeyword::Enum => "enum",
            TypeKeyword::Protocol => "protocol",
        }
    }
}

impl fmt::Display for TypeKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    Type,
    LocalVariable,
    Function,
    File,
    Image,
}

/// A discovered rename candidate
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier {
    pub name: String,
    pub kind: IdentifierKind,
}

impl Identifier {
    pub fn new(name: impl Into<String>, kind: IdentifierKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// File stems never renamed regardless of content
pub const PROTECTED_STEMS: &[&str] = &["TuneUpPopUp", "TopUIButtonStyleKit"];

/// Knobs that change what discovery considers safe
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub type_keywords: BTreeSet<TypeKeyword>,
    /// File names (not paths) whose declarations are never renamed
    pub protected_files: Vec<String>,
    /// Whether file renaming travels with type renaming
    pub file_renaming: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            type_keywords: [TypeKeyword::Struct, TypeKeyword::Enum, TypeKeyword::Protocol]
                .into_iter()
                .collect(),
            protected_files: vec!["AppDelegate.swift".to_string(), "SceneDelegate.swift".to_string()],
            file_renaming: false,
        }
    }
}

impl DiscoveryOptions {
    fn is_protected(&self, path: &str) -> bool {
        let name = file_name(path);
        self.protected_files.iter().any(|p| p == name)
    }
}

/// Every candidate of the requested kinds, deduplicated by name within a kind
pub fn collect_identifiers(
    project: &Project,
    kinds: &[IdentifierKind],
    exclusions: &ExclusionSet,
    options: &DiscoveryOptions,
) -> BTreeSet<Identifier> {
    let mut found = BTreeSet::new();
    for kind in kinds {
        let names: Vec<String> = match kind {
            IdentifierKind::Type => collect_types(project, exclusions, options),
            IdentifierKind::File => collect_file_stems(project, exclusions, options),
            IdentifierKind::Image => collect_image_names(project, exclusions),
            IdentifierKind::Function => function_candidates(project, exclusions)
                .into_iter()
                .map(|c| c.name)
                .collect(),
            IdentifierKind::LocalVariable => project
                .files_of(FileClass::Source)
                .filter(|(path, _)| !options.is_protected(path))
                .flat_map(|(_, text)| local_variable_candidates(text))
                .collect(),
        };
        found.extend(names.into_iter().map(|name| Identifier::new(name, *kind)));
    }
    found
}

/// Top-level type declarations of the configured kinds that are safe to rename
pub fn collect_types(
    project: &Project,
    exclusions: &ExclusionSet,
    options: &DiscoveryOptions,
) -> Vec<String> {
    let interface_stems: HashSet<&str> = project
        .files_of(FileClass::Interface)
        .map(|(path, _)| file_stem(path))
        .collect();

    let mut names = BTreeSet::new();
    for (path, text) in project.files_of(FileClass::Source) {
        if options.is_protected(path) {
            continue;
        }
        let core_data = text.contains("import CoreData");
        let s = scan(text, Anchor::type_decl());
        let map = s.regions().clone();
        for construct in s {
            let Some(keyword) = TypeKeyword::parse(construct.capture(0)) else {
                continue;
            };
            if !options.type_keywords.contains(&keyword) {
                continue;
            }
            if brace_depth_at(text, &map, construct.start) != 0 {
                continue;
            }
            let name = construct.capture(1);
            if exclusions.contains(name) {
                continue;
            }
            // managed object subclasses are bound by name in the data model
            let name_end = construct.header.find(name).unwrap_or(0) + name.len();
            if core_data && construct.header[name_end..].trim_start().starts_with(':') {
                tracing::debug!("Skipping CoreData-bound type {} in {}", name, path);
                continue;
            }
            if !options.file_renaming && interface_stems.contains(name) {
                tracing::debug!("Skipping {}: loaded from a nib of the same name", name);
                continue;
            }
            names.insert(name.to_string());
        }
    }
    names.into_iter().collect()
}

/// Stems of `.swift` and `.xib` files that can be renamed
pub fn collect_file_stems(
    project: &Project,
    exclusions: &ExclusionSet,
    options: &DiscoveryOptions,
) -> Vec<String> {
    let mut names = BTreeSet::new();
    for path in project.paths() {
        if !(path.ends_with(".swift") || path.ends_with(".xib")) || options.is_protected(path) {
            continue;
        }
        let stem = file_stem(path);
        if stem.contains(['+', '-', ' ']) || PROTECTED_STEMS.contains(&stem) {
            continue;
        }
        if !is_identifier(stem) || exclusions.contains(stem) {
            continue;
        }
        names.insert(stem.to_string());
    }
    names.into_iter().collect()
}

/// Image-set names in asset catalogs
pub fn collect_image_names(project: &Project, exclusions: &ExclusionSet) -> Vec<String> {
    project
        .image_sets()
        .map(file_stem)
        .filter(|stem| is_identifier(stem) && !exclusions.contains(stem))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(project: &Project, options: &DiscoveryOptions) -> Vec<String> {
        collect_types(project, &ExclusionSet::from_project(project), options)
    }

    #[test]
    fn test_only_top_level_types_of_configured_kinds() {
        let project = Project::from_files([(
            "App/Models.swift",
            "struct Outer {\n    struct Inner {}\n}\nclass Service {}\nenum Mode { case a }\nprotocol Source {}\n",
        )]);
        let found = types(&project, &DiscoveryOptions::default());
        assert_eq!(found, vec!["Mode", "Outer", "Source"]);
    }

    #[test]
    fn test_type_exclusions() {
        let project = Project::from_files([
            ("App/AppDelegate.swift", "struct Launch {}"),
            ("App/Data.swift", "import CoreData\nstruct Entity: Codable {}\nstruct Plain {}"),
            ("App/Alias.swift", "typealias Handler = Box\nstruct Box {}\nstruct Free {}"),
            ("App/Card.swift", "struct Card {}"),
            ("App/Card.xib", "<view customClass=\"Card\"/>"),
        ]);
        let found = types(&project, &DiscoveryOptions::default());
        assert_eq!(found, vec!["Free", "Plain"]);

        let options = DiscoveryOptions {
            file_renaming: true,
            ..DiscoveryOptions::default()
        };
        assert!(types(&project, &options).contains(&"Card".to_string()));
    }

    #[test]
    fn test_file_stems() {
        let project = Project::from_files([
            ("App/Home.swift", ""),
            ("App/String+Ext.swift", ""),
            ("App/my-view.swift", ""),
            ("App/Cell.xib", ""),
            ("App/AppDelegate.swift", ""),
            ("App/main.swift", ""),
            ("App/TuneUpPopUp.swift", ""),
            ("App/Main.storyboard", ""),
        ]);
        let found = collect_file_stems(&project, &ExclusionSet::builtin(), &DiscoveryOptions::default());
        assert_eq!(found, vec!["Cell", "Home"]);
    }

    #[test]
    fn test_image_names() {
        let mut project = Project::from_files([("App/A.swift", "")]);
        project.add_image_set("App/Assets.xcassets/logo.imageset");
        project.add_image_set("App/Assets.xcassets/Icons/arrow-left.imageset");
        let found = collect_image_names(&project, &ExclusionSet::builtin());
        assert_eq!(found, vec!["logo"]);
    }

    #[test]
    fn test_collect_identifiers_tags_kinds() {
        let project = Project::from_files([("App/Home.swift", "struct Home {}")]);
        let ids = collect_identifiers(
            &project,
            &[IdentifierKind::Type, IdentifierKind::File],
            &ExclusionSet::builtin(),
            &DiscoveryOptions::default(),
        );
        assert!(ids.contains(&Identifier::new("Home", IdentifierKind::Type)));
        assert!(ids.contains(&Identifier::new("Home", IdentifierKind::File)));
    }
}
