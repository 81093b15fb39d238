//! `for x in seq { … }` → indexed `while`
//!
//! The sequence is materialized once with `Array(…)`, so a sequence whose
//! evaluation has side effects is still evaluated exactly once, but lazily
//! produced elements are all produced before the first iteration.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::lexical::{find_top_level_word, RegionMap};
use crate::rename::names::{NameGenerator, NameRole};
use crate::scanner::{scan_from, Anchor, Construct};

/// Headers whose block is assembled by a result builder
static RESULT_BUILDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"@[A-Za-z_][A-Za-z0-9_]*Builder|some\s+(?:View|Scene|Commands|ToolbarContent|WidgetConfiguration)")
        .expect("result builder pattern compiles")
});

/// A for-in loop split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForIn<'a> {
    pub binding: &'a str,
    pub sequence: &'a str,
    pub filter: Option<&'a str>,
    pub body: &'a str,
}

impl<'a> ForIn<'a> {
    pub fn from_construct(c: &'a Construct) -> Self {
        let raw = c.capture(1).trim();
        let (sequence, filter) = match find_top_level_word(raw, "where") {
            Some(at) => (raw[..at].trim(), Some(raw[at + "where".len()..].trim())),
            None => (raw, None),
        };
        Self {
            binding: c.capture(0),
            sequence,
            filter,
            body: &c.body,
        }
    }
}

/// `label: for …` (but not `case .x: for …`)
fn is_labeled(text: &str, start: usize) -> bool {
    let before = text[..start].trim_end();
    if !before.ends_with(':') {
        return false;
    }
    let line = before.rsplit('\n').next().unwrap_or(before).trim_start();
    !(line.starts_with("case ") || line.starts_with("default") || line.starts_with("@unknown"))
}

fn indentation(text: &str, start: usize) -> &str {
    let line_start = text[..start].rfind('\n').map_or(0, |i| i + 1);
    let line = &text[line_start..start];
    let width = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..width]
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Prefix every non-empty line after the first with `extra`
fn deepen(block: &str, extra: &str) -> String {
    let mut out = String::with_capacity(block.len() + extra.len() * 4);
    for (i, line) in block.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
            if !line.is_empty() {
                out.push_str(extra);
            }
        }
        out.push_str(line);
    }
    out
}

/// Whether `offset` sits inside a block assembled by a result builder,
/// where statements other than expressions are rejected
fn in_result_builder(text: &str, offset: usize) -> bool {
    let map = RegionMap::new(text);
    let b = text.as_bytes();
    let mut opens = Vec::new();
    for r in map.code_ranges(0..offset) {
        for i in r {
            match b[i] {
                b'{' => opens.push(i),
                b'}' => {
                    opens.pop();
                }
                _ => {}
            }
        }
    }
    opens.iter().any(|&open| {
        let start = text[..open].rfind(['{', '}', ';']).map_or(0, |i| i + 1);
        RESULT_BUILDER.is_match(&text[start..open])
    })
}

/// Emit the while form of one loop
pub fn generate_while(
    parts: &ForIn<'_>,
    sequence_name: &str,
    index_name: &str,
    indent: &str,
    comments: bool,
) -> String {
    let ForIn {
        binding,
        sequence,
        filter,
        body,
    } = parts;
    let inner = format!("{indent}    ");
    let mut out = String::new();

    if comments {
        out.push_str(&format!("// Walk {} by position\n{indent}", one_line(sequence)));
        out.push_str(&format!("let {sequence_name} = Array({sequence}) // fixed snapshot of the elements\n"));
        out.push_str(&format!("{indent}var {index_name} = 0 // position of the next element\n"));
        out.push_str(&format!("{indent}while {index_name} < {sequence_name}.count {{\n"));
        out.push_str(&format!("{inner}let {binding} = {sequence_name}[{index_name}] // current element\n"));
        out.push_str(&format!("{inner}{index_name} += 1 // move on before the body runs"));
    } else {
        out.push_str(&format!("let {sequence_name} = Array({sequence})\n"));
        out.push_str(&format!("{indent}var {index_name} = 0\n"));
        out.push_str(&format!("{indent}while {index_name} < {sequence_name}.count {{\n"));
        out.push_str(&format!("{inner}let {binding} = {sequence_name}[{index_name}]\n"));
        out.push_str(&format!("{inner}{index_name} += 1"));
    }

    match filter {
        Some(condition) => {
            let body = body.trim_end();
            let block = if body.starts_with('\n') {
                deepen(body, "    ")
            } else {
                format!("\n{inner}    {}", deepen(body.trim_start(), "    "))
            };
            if comments {
                let shown = one_line(condition);
                out.push_str(&format!(
                    "\n{inner}if {condition} {{ // only elements where {shown}{block}\n{inner}}}\n{indent}}}"
                ));
            } else {
                out.push_str(&format!("\n{inner}if {condition} {{{block}\n{inner}}}\n{indent}}}"));
            }
        }
        None => {
            if body.starts_with('\n') {
                out.push_str(body);
            } else {
                out.push_str(&format!("\n{inner}{}\n{indent}", body.trim()));
            }
            out.push('}');
        }
    }
    out
}

/// Rewrite every plain for-in loop in `text`. Returns the new text and how
/// many loops were rewritten.
pub fn transform_loops(text: &str, names: &mut NameGenerator<'_>, comments: bool) -> (String, usize) {
    let mut text = text.to_string();
    let mut cursor = 0;
    let mut n = 0;

    loop {
        let Some(found) = scan_from(&text, Anchor::for_loop(), cursor).next() else {
            break;
        };
        cursor = found.start + 1;
        if is_labeled(&text, found.start) {
            tracing::debug!("Leaving labeled loop at offset {} unchanged", found.start);
            continue;
        }
        if in_result_builder(&text, found.start) {
            tracing::debug!("Leaving loop at offset {} in a result builder unchanged", found.start);
            continue;
        }
        let parts = ForIn::from_construct(&found);
        if parts.sequence.is_empty() || parts.filter.is_some_and(str::is_empty) {
            continue;
        }
        let (Some(sequence_name), Some(index_name)) = (
            names.fresh_numbered(NameRole::Sequence, n),
            names.fresh_numbered(NameRole::Index, n),
        ) else {
            continue;
        };
        let indent = indentation(&text, found.start).to_string();
        let replacement = generate_while(&parts, &sequence_name, &index_name, &indent, comments);
        text.replace_range(found.span(), &replacement);
        n += 1;
    }
    (text, n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn transform(text: &str, comments: bool) -> (String, usize) {
        let vocab = HashSet::new();
        let mut names = NameGenerator::new(&vocab, 9);
        transform_loops(text, &mut names, comments)
    }

    /// Replace generated temporaries with fixed placeholders
    fn normalize(out: &str) -> String {
        let words: Vec<&str> = out
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .filter(|w| w.starts_with("sequence") || w.starts_with("index"))
            .collect();
        let mut out = out.to_string();
        for w in words {
            let placeholder = if w.starts_with("sequence") { "SEQ" } else { "IDX" };
            out = out.replace(w, placeholder);
        }
        out
    }

    #[test]
    fn test_loop_becomes_indexed_while() {
        let (out, n) = transform("for i in 0...3 { print(i) }", false);
        assert_eq!(n, 1);
        assert_eq!(
            normalize(&out),
            "let SEQ = Array(0...3)\nvar IDX = 0\nwhile IDX < SEQ.count {\n    let i = SEQ[IDX]\n    IDX += 1\n    print(i)\n}"
        );
    }

    #[test]
    fn test_where_clause_becomes_if() {
        let text = "    for (k, v) in dict where v > 1 {\n        use(k)\n    }";
        let (out, _) = transform(text, false);
        assert_eq!(
            normalize(&out),
            "    let SEQ = Array(dict)\n    var IDX = 0\n    while IDX < SEQ.count {\n        let (k, v) = SEQ[IDX]\n        IDX += 1\n        if v > 1 {\n            use(k)\n        }\n    }"
        );
    }

    #[test]
    fn test_single_line_filtered_body() {
        let (out, _) = transform("for x in xs where x > 0 { total += x }", false);
        assert_eq!(
            normalize(&out),
            "let SEQ = Array(xs)\nvar IDX = 0\nwhile IDX < SEQ.count {\n    let x = SEQ[IDX]\n    IDX += 1\n    if x > 0 {\n        total += x\n    }\n}"
        );
    }

    #[test]
    fn test_loops_in_result_builders_are_unchanged() {
        let text = "struct Menu: View {\n    var body: some View {\n        VStack {\n            for item in items { Text(item) }\n        }\n    }\n    @ViewBuilder\n    var footer: AnyView {\n        for line in lines { Text(line) }\n    }\n    func load() {\n        for item in items { print(item) }\n    }\n}";
        let (out, n) = transform(text, false);
        assert_eq!(n, 1);
        assert!(out.contains("for item in items { Text(item) }"));
        assert!(out.contains("for line in lines { Text(line) }"));
        assert!(!out.contains("for item in items { print(item) }"));
    }

    #[test]
    fn test_index_advances_before_body() {
        let (out, _) = transform("for x in xs {\n    if x { continue }\n}", false);
        let advance = out.find("+= 1").unwrap();
        let body = out.find("continue").unwrap();
        assert!(advance < body);
    }

    #[test]
    fn test_nested_loops_get_distinct_names() {
        let (out, n) = transform("for a in xs {\n    for b in ys {\n        f(a, b)\n    }\n}", false);
        assert_eq!(n, 2);
        assert!(!out.contains("for "));
        let seqs: HashSet<&str> = out
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .filter(|w| w.starts_with("sequence"))
            .collect();
        assert_eq!(seqs.len(), 2);
    }

    #[test]
    fn test_unsupported_forms_are_unchanged() {
        for text in [
            "outer: for a in xs { break outer }",
            "for case let x? in xs { print(x) }",
            "for var x in xs { x += 1 }",
            "for await line in lines { print(line) }",
            "for try await line in lines { print(line) }",
        ] {
            let (out, n) = transform(text, false);
            assert_eq!(n, 0, "{}", text);
            assert_eq!(out, text);
        }
    }

    #[test]
    fn test_case_label_is_not_a_loop_label() {
        let (_, n) = transform("switch m {\ncase .a: for x in xs { f(x) }\ndefault: break\n}", false);
        assert_eq!(n, 1);
    }

    #[test]
    fn test_comments_keep_tokens() {
        let (plain, _) = transform("for i in 0...3 { print(i) }", false);
        let vocab = HashSet::new();
        let mut names = NameGenerator::new(&vocab, 9);
        let (commented, _) = transform_loops("for i in 0...3 { print(i) }", &mut names, true);
        assert_eq!(
            crate::lexical::token_stream(&plain),
            crate::lexical::token_stream(&commented)
        );
    }
}
