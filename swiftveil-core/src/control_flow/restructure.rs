//! Function restructuring
//!
//! A function keeps its declaration but its body moves into a new private
//! function; the original becomes a one-line wrapper that forwards every
//! argument. An unrelated dummy function follows the pair.
//!
//! Only plain member and top-level functions are touched. Anything whose
//! arguments cannot be forwarded verbatim (variadics, autoclosures, throwing
//! or generic signatures) or whose attributes might depend on the body is
//! left alone.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::lexical::{is_identifier, split_top_level, word_occurrences, RegionMap};
use crate::noise::{NoiseGenerator, NoiseShape};
use crate::rename::names::{NameGenerator, NameRole};
use crate::scanner::{matching_delimiter, scan_from, Anchor, Construct};

/// Modifiers a restructured declaration may carry on its own line
const MODIFIERS: &[&str] = &[
    "public", "internal", "private", "fileprivate", "open", "final", "static", "class",
    "override", "mutating", "nonmutating", "dynamic", "@objc", "@IBAction", "@discardableResult",
];

static TYPE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:class|struct|enum|actor|extension)\b").expect("type block pattern compiles")
});

static NOT_TYPE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:func|init|deinit|subscript|var|let|get|set|willSet|didSet|protocol)\b")
        .expect("member block pattern compiles")
});

/// One forwarded parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// External label; `_` when the argument is unlabeled
    pub label: String,
    pub name: String,
    pub inout: bool,
}

impl Parameter {
    fn argument(&self) -> String {
        let value = if self.inout {
            format!("&{}", self.name)
        } else {
            self.name.clone()
        };
        if self.label == "_" {
            value
        } else {
            format!("{}: {}", self.label, value)
        }
    }
}

/// Parse the text between a declaration's parentheses. `None` when some
/// parameter cannot be forwarded as a plain argument.
pub fn parse_parameters(list: &str) -> Option<Vec<Parameter>> {
    let mut params = Vec::new();
    for raw in split_top_level(list, b',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let parts = split_top_level(raw, b':');
        if parts.len() < 2 {
            return None;
        }
        let ty = parts[1..].join(":");
        if ty.contains("...") || ty.contains("@autoclosure") {
            return None;
        }
        let names: Vec<&str> = parts[0].split_whitespace().collect();
        let (label, name) = match names.as_slice() {
            [one] => (*one, *one),
            [label, name] => (*label, *name),
            _ => return None,
        };
        if name == "_" || !is_identifier(name) || !is_identifier(label) {
            return None;
        }
        params.push(Parameter {
            label: label.to_string(),
            name: name.to_string(),
            inout: ty.split_whitespace().any(|w| w == "inout"),
        });
    }
    Some(params)
}

/// What the wrapper needs to know about a declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    /// Declaration text after the name, up to the opening brace
    pub rest: String,
    pub parameters: Vec<Parameter>,
    pub returns_value: bool,
    pub is_async: bool,
}

impl Signature {
    /// Read a function construct's header. Initializers, generic and
    /// throwing functions give `None`.
    pub fn parse(function: &Construct) -> Option<Self> {
        let name = function.capture(0);
        if name.is_empty() {
            return None;
        }
        let after_keyword = function.header.strip_prefix("func")?.trim_start();
        let rest = after_keyword.strip_prefix(name)?;
        let params_at = rest.len() - rest.trim_start().len();
        if !rest[params_at..].starts_with('(') {
            return None;
        }
        let map = RegionMap::new(rest);
        let close = matching_delimiter(rest, &map, params_at, b'(', b')')?;
        let parameters = parse_parameters(&rest[params_at + 1..close])?;

        let effects = &rest[close + 1..];
        let words: Vec<&str> = effects
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .filter(|w| !w.is_empty())
            .collect();
        if words.iter().any(|w| matches!(*w, "throws" | "rethrows" | "where")) {
            return None;
        }
        let returns_value = match effects.find("->") {
            Some(arrow) => !matches!(effects[arrow + 2..].trim(), "Void" | "()"),
            None => false,
        };
        Some(Self {
            name: name.to_string(),
            rest: rest.to_string(),
            parameters,
            returns_value,
            is_async: words.contains(&"async"),
        })
    }

    /// Call forwarding every parameter to `target`
    pub fn forward_call(&self, target: &str) -> String {
        let args: Vec<String> = self.parameters.iter().map(Parameter::argument).collect();
        let mut call = String::new();
        if self.returns_value {
            call.push_str("return ");
        }
        if self.is_async {
            call.push_str("await ");
        }
        call.push_str(&format!("{}({})", target, args.join(", ")));
        call
    }
}

fn line_start(text: &str, offset: usize) -> usize {
    text[..offset].rfind('\n').map_or(0, |i| i + 1)
}

/// Modifiers written before `func` on the declaration line, or `None` if
/// anything else shares the line
fn same_line_modifiers(text: &str, start: usize) -> Option<Vec<&str>> {
    let words: Vec<&str> = text[line_start(text, start)..start].split_whitespace().collect();
    words.iter().all(|w| MODIFIERS.contains(w)).then_some(words)
}

fn attributed_on_previous_line(text: &str, start: usize) -> bool {
    let line = line_start(text, start);
    text[..line]
        .trim_end()
        .lines()
        .last()
        .is_some_and(|l| l.trim_start().starts_with('@'))
}

/// Whether the innermost code block around `offset` is a type body, or
/// there is none
fn at_member_level(text: &str, map: &RegionMap, offset: usize) -> bool {
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
    let Some(&open) = opens.last() else {
        return true;
    };
    let boundary = text[..open].rfind(['{', '}', ';']).map_or(0, |i| i + 1);
    let header = &text[boundary..open];
    TYPE_BLOCK.is_match(header) && !NOT_TYPE_BLOCK.is_match(header)
}

/// Modifiers of the performing function derived from the original's
fn performing_modifiers(original: &[&str]) -> String {
    let mut out = String::from("private ");
    if original.iter().any(|m| *m == "static" || *m == "class") {
        out.push_str("static ");
    }
    for m in ["mutating", "nonmutating"] {
        if original.contains(&m) {
            out.push_str(m);
            out.push(' ');
        }
    }
    out
}

fn indentation(text: &str, start: usize) -> &str {
    let line = &text[line_start(text, start)..start];
    &line[..line.len() - line.trim_start_matches([' ', '\t']).len()]
}

/// The wrapper, performing function and dummy function replacing `function`,
/// or `None` when the function is not eligible
fn restructure(
    text: &str,
    map: &RegionMap,
    function: &Construct,
    names: &mut NameGenerator<'_>,
) -> Option<String> {
    let modifiers = same_line_modifiers(text, function.start)?;
    if attributed_on_previous_line(text, function.start) || !at_member_level(text, map, function.start) {
        return None;
    }
    if function.body.trim().is_empty()
        || !word_occurrences(text, map, "func", function.body_range(), false).is_empty()
    {
        return None;
    }
    let signature = Signature::parse(function)?;
    let performing = names.fresh(NameRole::Function, Some(&signature.name))?;

    let indent = indentation(text, function.start).to_string();
    let wrapper = format!(
        "{}{{\n{indent}    {}\n{indent}}}",
        function.header,
        signature.forward_call(&performing)
    );
    let performing = format!(
        "{indent}{}func {}{}{{{}}}",
        performing_modifiers(&modifiers),
        performing,
        signature.rest,
        function.body
    );
    let dummy = NoiseGenerator::new(names, NoiseShape::default()).dummy_function(&indent);
    Some(format!("{wrapper}\n\n{performing}\n\n{dummy}"))
}

/// Split every eligible function in `text` into a wrapper and a performing
/// function, each followed by a dummy function. Returns the new text and how
/// many functions were restructured.
pub fn restructure_functions(text: &str, names: &mut NameGenerator<'_>) -> (String, usize) {
    let mut text = text.to_string();
    let mut cursor = 0;
    let mut n = 0;

    loop {
        let (function, replacement) = {
            let mut found = scan_from(&text, Anchor::function(), cursor);
            let Some(function) = found.next() else {
                break;
            };
            let replacement = restructure(&text, found.regions(), &function, names);
            (function, replacement)
        };
        match replacement {
            Some(replacement) => {
                cursor = function.start + replacement.len();
                text.replace_range(function.span(), &replacement);
                n += 1;
            }
            None => cursor = function.start + 1,
        }
    }
    (text, n)
}
