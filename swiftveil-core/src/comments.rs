//! Comment annotator
//!
//! Adds line comments to a file without touching a single token. A comment
//! line is only inserted before a line that starts in code, and a trailing
//! comment is only appended to a line that ends in code, so no comment can
//! land inside a literal or another comment.

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;

use crate::enrich::{retry_accepted, Enricher, EnrichmentRequest, EnrichmentRole};
use crate::lexical::{token_stream, RegionMap};

pub const IMPORTS_HEADER: &str = "// MARK: - Imports";

static TYPE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:@\w+\s+)*(?:(?:public|internal|private|fileprivate|open|final|indirect)\s+)*(class|struct|enum|protocol|extension|actor)\s+([A-Za-z_][A-Za-z0-9_.]*)")
        .expect("type line pattern compiles")
});

static FUNC_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:@\w+\s+)*(?:(?:public|internal|private|fileprivate|open|final|static|class|override|mutating|convenience|required)\s+)*(?:func\s+([A-Za-z_][A-Za-z0-9_]*)|(init)\b)")
        .expect("function line pattern compiles")
});

static PROPERTY_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:@\w+(?:\([^)]*\))?\s+)*(?:(?:public|internal|private|fileprivate|open|static|lazy|weak|unowned|override)\s+)*(let|var)\s+([A-Za-z_][A-Za-z0-9_]*)")
        .expect("property line pattern compiles")
});

static CONTROL_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(if|guard|switch|while|repeat|case|default)\b").expect("control line pattern compiles")
});

static ASSIGNMENT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^((?:self\.)?[A-Za-z_][A-Za-z0-9_.]*)\s*(?:[-+*/]?=)\s*[^=]").expect("assignment pattern compiles")
});

const TYPE_NOTES: &[&str] = &[
    "Declares {}",
    "{} groups related state and behavior",
    "Definition of {}",
];
const EXTENSION_NOTES: &[&str] = &["Additional members for {}", "Extends {}"];
const FUNC_NOTES: &[&str] = &["{} performs one unit of work", "Implementation of {}", "Handles {}"];
const INIT_NOTES: &[&str] = &["Creates a new instance", "Sets up initial state"];
const PROPERTY_NOTES: &[&str] = &["Holds {}", "Storage for {}", "Value of {}"];
const CONTROL_NOTES: &[&str] = &[
    "Choose a path based on the current state",
    "Check the condition before continuing",
    "Branch on the value",
];
const ASSIGNMENT_NOTES: &[&str] = &["update {}", "store the new {}", "refresh {}"];

fn note(rng: &mut impl Rng, templates: &[&str], subject: &str) -> String {
    templates
        .choose(rng)
        .map(|t| t.replace("{}", subject))
        .unwrap_or_default()
}

/// `in_switch`: the line sits directly inside a `switch` body, so a `case`
/// line is a branch rather than an enum case
fn annotation_for(line: &str, in_switch: bool, rng: &mut impl Rng) -> Option<String> {
    if let Some(c) = TYPE_LINE.captures(line) {
        let templates = if &c[1] == "extension" { EXTENSION_NOTES } else { TYPE_NOTES };
        return Some(note(rng, templates, &c[2]));
    }
    if let Some(c) = FUNC_LINE.captures(line) {
        return Some(match c.get(1) {
            Some(name) => note(rng, FUNC_NOTES, name.as_str()),
            None => note(rng, INIT_NOTES, ""),
        });
    }
    if let Some(c) = PROPERTY_LINE.captures(line) {
        return Some(note(rng, PROPERTY_NOTES, &c[2]));
    }
    if let Some(c) = CONTROL_LINE.captures(line) {
        if matches!(&c[1], "case" | "default") && !in_switch {
            return None;
        }
        return Some(note(rng, CONTROL_NOTES, ""));
    }
    None
}

/// For each code block open at the current position, whether it is a
/// `switch` body
#[derive(Default)]
struct BlockStack {
    headers: Vec<bool>,
    boundary: usize,
}

impl BlockStack {
    fn in_switch(&self) -> bool {
        self.headers.last().copied().unwrap_or(false)
    }

    /// Account for the code bytes of `range`
    fn advance(&mut self, text: &str, map: &RegionMap, range: std::ops::Range<usize>) {
        let b = text.as_bytes();
        for r in map.code_ranges(range) {
            for i in r {
                match b[i] {
                    b'{' => {
                        let header = &text[self.boundary..i];
                        self.headers.push(header.split_whitespace().any(|w| w == "switch"));
                        self.boundary = i + 1;
                    }
                    b'}' => {
                        self.headers.pop();
                        self.boundary = i + 1;
                    }
                    b';' => self.boundary = i + 1,
                    _ => {}
                }
            }
        }
    }
}

/// Add deterministic comments to one file
pub fn annotate(text: &str, rng: &mut impl Rng) -> String {
    let map = RegionMap::new(text);
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    let mut offset = 0;
    let mut imports_marked = false;
    let mut blocks = BlockStack::default();

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let in_switch = blocks.in_switch();
        blocks.advance(text, &map, line_start..offset);

        let content = line.trim_end_matches(['\n', '\r']);
        let trimmed = content.trim_start();
        let first = line_start + (content.len() - trimmed.len());
        if trimmed.is_empty() || !map.is_code(line_start) || !map.is_code(first) {
            out.push_str(line);
            continue;
        }
        let indent = &content[..content.len() - trimmed.len()];

        if trimmed.starts_with("import ") && !imports_marked {
            imports_marked = true;
            if !text.contains(IMPORTS_HEADER) {
                out.push_str(indent);
                out.push_str(IMPORTS_HEADER);
                out.push('\n');
            }
        } else if let Some(comment) = annotation_for(trimmed, in_switch, rng) {
            if rng.gen_bool(0.6) {
                out.push_str(indent);
                out.push_str("// ");
                out.push_str(&comment);
                out.push('\n');
            }
        }

        // trailing comment on simple assignments whose last byte is code
        let last = line_start + content.trim_end().len().saturating_sub(1);
        let assignment = ASSIGNMENT_LINE.captures(trimmed).filter(|_| {
            !content.trim_end().is_empty() && map.is_code(last) && !content.trim_end().ends_with('\\')
        });
        match assignment {
            Some(c) if rng.gen_bool(0.4) => {
                let target = c[1].rsplit('.').next().unwrap_or(&c[1]).to_string();
                out.push_str(content.trim_end());
                out.push_str(" // ");
                out.push_str(&note(rng, ASSIGNMENT_NOTES, &target));
                out.push_str(&line[content.trim_end().len()..]);
            }
            _ => out.push_str(line),
        }
    }

    if token_stream(&out) != token_stream(text) {
        tracing::warn!("Comment annotation changed tokens; keeping the file unannotated");
        return text.to_string();
    }
    out
}

/// Annotate through an enricher when one is available, falling back to
/// [`annotate`]. An enriched result is accepted only if its token stream is
/// identical to the input's.
pub fn annotate_file(
    text: &str,
    enricher: Option<&dyn Enricher>,
    temperature: f64,
    max_tries: u32,
    rng: &mut impl Rng,
) -> String {
    if let Some(enricher) = enricher {
        let request = EnrichmentRequest {
            role: EnrichmentRole::Commenting,
            temperature,
            input: text.to_string(),
        };
        let expected = token_stream(text);
        let enriched = retry_accepted(
            max_tries,
            |_| enricher.suggest(&request),
            |candidate| token_stream(candidate) == expected,
        );
        if let Some(enriched) = enriched {
            return enriched;
        }
        tracing::debug!("Enriched comments rejected; using deterministic annotation");
    }
    annotate(text, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::testing::ScriptedEnricher;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SOURCE: &str = r#"import Foundation
import UIKit
struct Counter {
    var total = 0
    let banner = """
    struct NotReal {
    """
    mutating func add(_ n: Int) {
        if n > 0 {
            total += n
        }
        total = total /* inline */ + 0
        let url = "a // b"
    }
}
"#;

    #[test]
    fn test_annotation_is_purely_additive() {
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let out = annotate(SOURCE, &mut rng);
            assert_eq!(token_stream(&out), token_stream(SOURCE));
            assert!(out.starts_with(IMPORTS_HEADER));
            assert_eq!(out.matches(IMPORTS_HEADER).count(), 1);
            assert!(out.contains("    struct NotReal {\n"));
        }
    }

    #[test]
    fn test_comments_only_added_in_code() {
        let mut rng = StdRng::seed_from_u64(4);
        let out = annotate(SOURCE, &mut rng);
        // the literal body is untouched
        let literal = "    let banner = \"\"\"\n    struct NotReal {\n    \"\"\"";
        assert!(out.contains(literal));
        assert!(out.contains("let url = \"a // b\"\n"));
    }

    #[test]
    fn test_case_lines_annotated_only_in_switch() {
        let text = "enum Color {\n    case red, green\n}\nswitch color {\ncase .red:\n    break\ndefault:\n    break\n}\n";
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let out = annotate(text, &mut rng);
            let before_enum_case = out.split("    case red").next().unwrap();
            assert!(!before_enum_case.lines().last().unwrap_or("").trim_start().starts_with("//"));
        }
        let mut rng = StdRng::seed_from_u64(0);
        assert!(annotation_for("case red, green", false, &mut rng).is_none());
        assert!(annotation_for("case .red:", true, &mut rng).is_some());
        assert!(annotation_for("if ready {", false, &mut rng).is_some());
    }

    #[test]
    fn test_enriched_comments_must_keep_tokens() {
        let text = "let a = 1\n";
        let enricher = ScriptedEnricher::new(vec![
            Ok("let a = 2 // changed\n"),
            Ok("// the answer\nlet a = 1\n"),
        ]);
        let mut rng = StdRng::seed_from_u64(1);
        let out = annotate_file(text, Some(&enricher), 1.0, 3, &mut rng);
        assert_eq!(out, "// the answer\nlet a = 1\n");
    }

    #[test]
    fn test_enrichment_falls_back_to_deterministic() {
        let text = "let a = 1\n";
        let enricher = ScriptedEnricher::new(vec![Ok("let b = 1\n")]);
        let mut rng = StdRng::seed_from_u64(1);
        let out = annotate_file(text, Some(&enricher), 1.0, 2, &mut rng);
        assert_eq!(token_stream(&out), token_stream(text));
    }
}
