//! Source normalization run before any structural stage

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::lexical::{RegionKind, RegionMap};
use crate::project::{FileClass, Project};

const TOOLS_VERSION: &str = "// swift-tools-version:";

static CLASS_FUNC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^([ \t]*(?:(?:public|internal|private|fileprivate|open|final)[ \t]+)*)class[ \t]+func[ \t]+([A-Za-z_][A-Za-z0-9_]*)")
        .expect("class func pattern compiles")
});

static OVERRIDE_CLASS_FUNC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\boverride\s+(?:(?:public|internal|open|final)\s+)*class\s+func\s+([A-Za-z_][A-Za-z0-9_]*)")
        .expect("override pattern compiles")
});

/// Drop every comment, keeping a leading `swift-tools-version` header
pub fn remove_comments(text: &str) -> String {
    let map = RegionMap::new(text);
    let b = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    for region in map.regions() {
        let slice = &text[region.range.clone()];
        match region.kind {
            RegionKind::Comment if slice.starts_with(TOOLS_VERSION) => out.push_str(slice),
            RegionKind::Comment => {
                // a block comment between two tokens still separates them
                let start = region.range.start;
                let end = region.range.end;
                let glued = start > 0
                    && end < b.len()
                    && !b[start - 1].is_ascii_whitespace()
                    && !b[end].is_ascii_whitespace();
                if glued {
                    out.push(' ');
                }
            }
            _ => out.push_str(slice),
        }
    }
    out
}

/// Drop whitespace-only lines, except inside multi-line literals
pub fn remove_empty_lines(text: &str) -> String {
    let map = RegionMap::new(text);
    let mut out = String::with_capacity(text.len());
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let keep = !line.trim().is_empty() || !map.is_code(offset);
        if keep {
            out.push_str(line);
        }
        offset += line.len();
    }
    if out.ends_with('\n') && !text.ends_with('\n') {
        out.pop();
    }
    out
}

/// Names declared anywhere as `override class func`
pub fn overridden_class_funcs(project: &Project) -> HashSet<String> {
    project
        .files_of(FileClass::Source)
        .flat_map(|(_, text)| {
            OVERRIDE_CLASS_FUNC
                .captures_iter(text)
                .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// `class func` → `static func` where nothing overrides the function
pub fn class_to_static(text: &str, overridden: &HashSet<String>) -> String {
    let map = RegionMap::new(text);
    CLASS_FUNC
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let all = &caps[0];
            let name = &caps[2];
            let start = caps.get(0).map_or(0, |m| m.start());
            if overridden.contains(name) || !map.is_code(start + caps[1].len()) {
                all.to_string()
            } else {
                // static members are already final
                let modifiers: Vec<&str> = caps[1].split_whitespace().filter(|m| *m != "final").collect();
                let indent = &caps[1][..caps[1].len() - caps[1].trim_start().len()];
                let mut out = indent.to_string();
                for m in modifiers {
                    out.push_str(m);
                    out.push(' ');
                }
                format!("{}static func {}", out, name)
            }
        })
        .into_owned()
}

/// Run the full preprocessing pass over one file
pub fn preprocess(text: &str, overridden: &HashSet<String>) -> String {
    let text = remove_comments(text);
    let text = remove_empty_lines(&text);
    class_to_static(&text, overridden)
}
