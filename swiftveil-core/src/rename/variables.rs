//! Local variable renaming
//!
//! Works one function body at a time. A local is renamed from its
//! declaration to the end of the block that declares it, and only when no
//! use of the same name in the function could refer to something else.

use std::collections::HashMap;
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

use super::apply::splice;
use super::names::{NameGenerator, NameRole};
use crate::lexical::{is_argument_label, word_occurrences, RegionMap};
use crate::scanner::{matching_brace, scan, Anchor, Construct};

static DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:var|let)\s+([A-Za-z_][A-Za-z0-9_]*)\s*[:=]").expect("declaration pattern compiles")
});

static NESTED_DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:func|struct|class|enum|protocol|actor|extension)\s+[A-Za-z_]")
        .expect("nested declaration pattern compiles")
});

static CASE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:case\b|default\s*:|@unknown\s+default)").expect("case label pattern compiles")
});

/// Names the compiler binds implicitly
const IMPLICIT: &[&str] = &["error", "newValue", "oldValue", "self", "super", "_"];

/// A renamable local: declaration name offset and the range it is visible in
#[derive(Debug, Clone)]
struct LocalDecl {
    name: String,
    at: usize,
    scope: Range<usize>,
}

/// Declarations must start a statement
fn starts_statement(text: &str, keyword_at: usize) -> bool {
    match text[..keyword_at].trim_end_matches([' ', '\t']).bytes().last() {
        None => true,
        Some(c) => matches!(c, b'\n' | b'{' | b'}' | b';'),
    }
}

fn has_nested_declaration(text: &str, map: &RegionMap, body: Range<usize>) -> bool {
    NESTED_DECLARATION
        .find_iter(&text[body.clone()])
        .any(|m| map.is_code(body.start + m.start()))
}

/// Innermost code `{` that is still open at `offset`, searching from `from`
fn enclosing_open(text: &str, map: &RegionMap, from: usize, offset: usize) -> Option<usize> {
    let b = text.as_bytes();
    let mut stack = Vec::new();
    for r in map.code_ranges(from..offset) {
        for i in r {
            match b[i] {
                b'{' => stack.push(i),
                b'}' => {
                    stack.pop();
                }
                _ => {}
            }
        }
    }
    stack.pop()
}

/// End of the visibility of a declaration at `at` whose block closes at
/// `block_end`: the block end, or the next `case`/`default` label of the
/// same block
fn scope_end(text: &str, map: &RegionMap, at: usize, block_end: usize) -> usize {
    let b = text.as_bytes();
    for m in CASE_LABEL.find_iter(&text[at..block_end]) {
        let label = at + m.start() + (m.as_str().len() - m.as_str().trim_start().len());
        if !map.is_code(label) {
            continue;
        }
        let depth = map
            .code_ranges(at..label)
            .flat_map(|r| b[r].iter())
            .fold(0i64, |d, &c| match c {
                b'{' => d + 1,
                b'}' => d - 1,
                _ => d,
            });
        if depth == 0 {
            return label;
        }
    }
    block_end
}

fn name_is_unsafe(function: &str, body: &str, name: &str) -> bool {
    let n = regex::escape(name);
    let patterns = [
        // `x = x`, `x: x`
        format!(r"\b{n}\s*[=:]\s*{n}\b"),
        // shorthand optional binding
        format!(r"\b(?:let|var)\s+{n}\s*(?:\{{|,|\belse\b)"),
    ];
    patterns.iter().enumerate().any(|(i, p)| match Regex::new(p) {
        Ok(re) => re.is_match(if i == 0 { function } else { body }),
        Err(_) => true,
    })
}

fn function_locals(text: &str, map: &RegionMap, function: &Construct) -> Vec<LocalDecl> {
    let body = function.body_range();
    if has_nested_declaration(text, map, body.clone()) {
        return Vec::new();
    }

    let mut found: HashMap<String, Vec<LocalDecl>> = HashMap::new();
    for caps in DECLARATION.captures_iter(&text[body.clone()]) {
        let (Some(all), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let keyword_at = body.start + all.start();
        let at = body.start + name.start();
        if !map.is_code(keyword_at) || !starts_statement(text, keyword_at) {
            continue;
        }
        if IMPLICIT.contains(&name.as_str()) {
            continue;
        }
        let block_end = match enclosing_open(text, map, body.start, keyword_at) {
            Some(open) => matching_brace(text, map, open).unwrap_or(body.end),
            None => body.end,
        };
        let end = scope_end(text, map, at, block_end);
        found.entry(name.as_str().to_string()).or_default().push(LocalDecl {
            name: name.as_str().to_string(),
            at,
            scope: at..end,
        });
    }

    let function_text = &text[function.span()];
    let body_text = &text[body.clone()];
    let mut locals: Vec<LocalDecl> = found
        .into_values()
        .filter(|decls| decls.len() == 1)
        .flatten()
        .filter(|decl| {
            let first = word_occurrences(text, map, &decl.name, function.span(), false);
            first.first() == Some(&decl.at)
                && !name_is_unsafe(function_text, body_text, &decl.name)
                && !is_argument_label(text, map, &decl.name, function.span())
        })
        .collect();
    locals.sort_by_key(|d| d.at);
    locals
}

fn functions(text: &str) -> (RegionMap, Vec<Construct>) {
    let s = scan(text, Anchor::function());
    let map = s.regions().clone();
    (map, s.collect())
}

/// Names of every renamable local in a file
pub fn local_variable_candidates(text: &str) -> Vec<String> {
    let (map, functions) = functions(text);
    functions
        .iter()
        .flat_map(|f| function_locals(text, &map, f))
        .map(|d| d.name)
        .collect()
}

/// Rename every safe local in every function of `text`. Returns the new text
/// and the number of locals renamed.
pub fn rename_variables(text: &str, names: &mut NameGenerator<'_>) -> (String, usize) {
    let (map, functions) = functions(text);
    let mut edits: Vec<(Range<usize>, String)> = Vec::new();
    let mut renamed = 0;

    for function in &functions {
        for decl in function_locals(text, &map, function) {
            let Some(new) = names.fresh(NameRole::Variable, Some(&decl.name)) else {
                continue;
            };
            for at in word_occurrences(text, &map, &decl.name, decl.scope.clone(), false) {
                edits.push((at..at + decl.name.len(), new.clone()));
            }
            renamed += 1;
        }
    }

    let edits = edits.iter().map(|(r, s)| (r.clone(), s.as_str())).collect();
    (splice(text, edits), renamed)
}
