//! File-private function renaming

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use once_cell::sync::Lazy;
use regex::Regex;

use super::apply::{rename_in_source, Replacer};
use super::exclusions::ExclusionSet;
use super::map::RenameMap;
use super::names::{derive_seed, NameGenerator, NameRole};
use crate::lexical::{is_argument_label, word_occurrences, RegionMap};
use crate::project::{FileClass, Project};

/// Names that collide with standard library or framework members
pub const FUNC_RESTRICTED: &[&str] = &[
    "isEmpty", "count", "first", "last", "lowercased", "uppercased", "trimmingCharacters",
    "removeAll", "remove", "append", "insert", "removeFirst", "removeLast", "removeSubrange",
    "removeValue", "hasPrefix", "hasSuffix", "contains", "split", "joined",
    "replacingOccurrences", "replacingCharacters", "popLast", "popFirst", "filter", "map",
    "flatMap", "compactMap", "reduce", "sorted", "updateValue", "update", "init", "deinit",
    "subscript", "description", "hash", "copy", "alloc", "dealloc", "application", "body",
    "main", "callAsFunction",
];

pub const FUNC_RESTRICTED_PREFIXES: &[&str] = &[
    "get", "set", "willSet", "didSet", "AF", "UI", "NS", "CG", "MK", "WK", "SCN", "SK", "AV",
    "CA", "CI", "CL", "CN", "KF", "URL", "JSON", "Firestore", "FIR", "Observ", "with", "Unsafe",
    "mutable", "test",
];

static FUNC_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"((?:@[A-Za-z_][A-Za-z0-9_]*(?:\([^)\n]*\))?\s+)*)((?:(?:private|fileprivate|public|internal|open|static|final|class|mutating|nonmutating|nonisolated|override|dynamic|optional|required|convenience)\s+)*)func\s+([A-Za-z_][A-Za-z0-9_]*)",
    )
    .expect("function declaration pattern compiles")
});

static WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("word pattern compiles"));

/// A private function that may be renamed inside its file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCandidate {
    pub path: String,
    pub name: String,
}

struct Declaration {
    name: String,
    private: bool,
}

fn declarations(text: &str) -> Vec<Declaration> {
    let map = RegionMap::new(text);
    FUNC_DECL
        .captures_iter(text)
        .filter_map(|caps| {
            let all = caps.get(0)?;
            if !map.is_code(all.start()) {
                return None;
            }
            let attributes = caps.get(1).map_or("", |m| m.as_str());
            let modifiers: Vec<&str> = caps
                .get(2)
                .map_or("", |m| m.as_str())
                .split_whitespace()
                .collect();
            // an attribute on the previous line belongs to this declaration too
            let previous_line = text[..all.start()].trim_end().lines().last().unwrap_or("");
            let attributed = previous_line.trim_start().starts_with('@');
            let private = modifiers.iter().any(|m| *m == "private" || *m == "fileprivate")
                && !modifiers.contains(&"override")
                && !modifiers.contains(&"optional")
                && !attributed
                && !attributes.contains("@objc")
                && !attributes.contains("@IB")
                && !attributes.contains("@NSManaged");
            Some(Declaration {
                name: caps.get(3)?.as_str().to_string(),
                private,
            })
        })
        .collect()
}

fn is_restricted(name: &str) -> bool {
    FUNC_RESTRICTED.contains(&name) || FUNC_RESTRICTED_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Every private function whose name is safe to change within its file
pub fn function_candidates(project: &Project, exclusions: &ExclusionSet) -> Vec<FunctionCandidate> {
    let words: HashMap<&str, HashSet<&str>> = project
        .files()
        .map(|(path, text)| (path, WORD.find_iter(text).map(|m| m.as_str()).collect()))
        .collect();

    let mut candidates = Vec::new();
    for (path, text) in project.files_of(FileClass::Source) {
        let mut by_name: BTreeMap<String, (usize, usize)> = BTreeMap::new();
        for decl in declarations(text) {
            let entry = by_name.entry(decl.name).or_default();
            entry.0 += 1;
            if decl.private {
                entry.1 += 1;
            }
        }
        let map = RegionMap::new(text);
        for (name, (total, private)) in by_name {
            if private == 0 || private != total || is_restricted(&name) || exclusions.contains(&name) {
                continue;
            }
            let elsewhere = words
                .iter()
                .any(|(other, vocab)| *other != path && vocab.contains(name.as_str()));
            if elsewhere {
                continue;
            }
            let all = word_occurrences(text, &map, &name, 0..text.len(), true).len();
            let plain = word_occurrences(text, &map, &name, 0..text.len(), false).len();
            if all != plain || is_argument_label(text, &map, &name, 0..text.len()) {
                continue;
            }
            candidates.push(FunctionCandidate {
                path: path.to_string(),
                name,
            });
        }
    }
    candidates
}

/// Rename every candidate inside its declaring file. Returns the number of
/// functions renamed.
pub fn rename_functions(
    project: &mut Project,
    exclusions: &ExclusionSet,
    vocabulary: &HashSet<String>,
    seed: u64,
) -> usize {
    let mut by_file: HashMap<String, Vec<String>> = HashMap::new();
    for c in function_candidates(project, exclusions) {
        by_file.entry(c.path).or_default().push(c.name);
    }
    if by_file.is_empty() {
        return 0;
    }

    let renamed = AtomicUsize::new(0);
    project.par_rewrite(FileClass::Source, |path, text| {
        let Some(names) = by_file.get(path) else {
            return text.to_string();
        };
        let mut generator = NameGenerator::new(vocabulary, derive_seed(seed, path));
        let mut map = RenameMap::new();
        for name in names {
            if let Some(new) = generator.fresh(NameRole::Function, Some(name)) {
                map.insert(name.clone(), new);
            }
        }
        renamed.fetch_add(map.len(), Ordering::Relaxed);
        let words = Replacer::new(&map, r"\b(?P<name>{})\b");
        rename_in_source(text, &map, &words, &HashSet::new())
    });
    renamed.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEW: &str = r#"final class Screen {
    func show() {
        let v = buildLabel(text: "hi")
        reload()
    }
    private func buildLabel(text: String) -> String { text }
    private func reload() { }
    @objc private func tapped() { }
    private func shared() { }
    override private func viewDidLoad() { }
    private func getValue() -> Int { 0 }
    fileprivate func chained() { self.chained() }
}"#;

    #[test]
    fn test_candidates() {
        let project = Project::from_files([
            ("App/Screen.swift", VIEW),
            ("App/Other.swift", "func caller() { shared() }"),
        ]);
        let names: Vec<String> = function_candidates(&project, &ExclusionSet::builtin())
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["buildLabel", "reload"]);
    }

    #[test]
    fn test_names_used_as_labels_are_kept() {
        let source = "final class Fader {\n    func fade(_ view: UIView) {\n        UIView.animate(withDuration: 0.3, animations: {}, completion: nil)\n        finish()\n    }\n    private func completion() { }\n    private func finish() { }\n}\n";
        let mut project = Project::from_files([("App/Fader.swift", source)]);
        let names: Vec<String> = function_candidates(&project, &ExclusionSet::builtin())
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["finish"]);

        let vocab = project.vocabulary();
        rename_functions(&mut project, &ExclusionSet::builtin(), &vocab, 9);
        let text = project.get("App/Fader.swift").unwrap();
        assert!(text.contains("completion: nil)"));
        assert!(text.contains("private func completion()"));
        assert!(!text.contains("func finish"));
    }

    #[test]
    fn test_rename_functions_in_file() {
        let mut project = Project::from_files([("App/Screen.swift", VIEW)]);
        let vocab = project.vocabulary();
        let n = rename_functions(&mut project, &ExclusionSet::builtin(), &vocab, 5);
        assert_eq!(n, 3);
        let text = project.get("App/Screen.swift").unwrap();
        assert!(!text.contains("buildLabel"));
        assert!(!text.contains("reload"));
        assert!(text.contains("func tapped"));
        assert!(text.contains("self.chained()"));
        assert!(text.contains("let v = func"));
    }
}
