//! Structural scanner
//!
//! Locates constructs (functions, guard statements, for-in loops, type
//! declarations) inside raw Swift text. An [`Anchor`] regex finds the start
//! of a construct and must end on its opening `{`; from there the scanner
//! walks code bytes counting brace depth until the construct closes.
//!
//! Matches that start inside a literal or comment, whose header has
//! unbalanced delimiters, or whose braces never close are dropped. A dropped
//! match never hides a later one: the search restarts one character after
//! the rejected match start.
//!
//! Offsets in a [`Construct`] are only valid for the exact text that was
//! scanned. Anything that rewrites the text must scan again.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::lexical::{is_balanced, RegionMap};

/// Kind of syntactic unit an anchor locates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstructKind {
    Function,
    Guard,
    ForLoop,
    TypeDecl,
}

/// A delimiter-balanced span of source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Construct {
    pub kind: ConstructKind,
    /// Offset of the anchor match start
    pub start: usize,
    /// Offset one past the closing `}`
    pub end: usize,
    /// Offset of the opening `{`
    pub open: usize,
    /// Text from `start` up to (not including) the opening `{`
    pub header: String,
    /// Text strictly between the braces
    pub body: String,
    /// Anchor capture groups 1..n (empty string when a group did not match)
    pub captures: Vec<String>,
}

impl Construct {
    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Range of the body inside the scanned text
    pub fn body_range(&self) -> Range<usize> {
        self.open + 1..self.end - 1
    }

    pub fn capture(&self, index: usize) -> &str {
        self.captures
            .get(index)
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Lexical cue locating the start of a construct
#[derive(Debug, Clone)]
pub struct Anchor {
    kind: ConstructKind,
    pattern: Regex,
}

static FUNCTION: Lazy<Anchor> = Lazy::new(|| {
    Anchor::new(
        ConstructKind::Function,
        r"\b(?:func\s+([A-Za-z_][A-Za-z0-9_]*)|(init)[?!]?)\s*(?:<[^{}]*?>)?\s*\([^{]*?\{",
    )
    .expect("function anchor compiles")
});

static GUARD: Lazy<Anchor> = Lazy::new(|| {
    Anchor::new(ConstructKind::Guard, r"\bguard\s+([\s\S]+?)\s*\belse\s*\{")
        .expect("guard anchor compiles")
});

static FOR_LOOP: Lazy<Anchor> = Lazy::new(|| {
    Anchor::new(
        ConstructKind::ForLoop,
        r"\bfor\s+([A-Za-z_][A-Za-z0-9_]*|\(\s*[A-Za-z_][A-Za-z0-9_]*(?:\s*,\s*[A-Za-z_][A-Za-z0-9_]*)+\s*\))\s+in\s+([^{]+?)\s*\{",
    )
    .expect("for-in anchor compiles")
});

static TYPE_DECL: Lazy<Anchor> = Lazy::new(|| {
    Anchor::new(
        ConstructKind::TypeDecl,
        r"\b(class|struct|enum|protocol|actor|extension)\s+([A-Z][A-Za-z0-9_]*)\b[^{;]*?\{",
    )
    .expect("type anchor compiles")
});

impl Anchor {
    /// Compile an anchor. The pattern must end by matching the opening `{`.
    pub fn new(kind: ConstructKind, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            kind,
            pattern: Regex::new(pattern)?,
        })
    }

    /// `func name(...) ... {` and `init(...) {`; group 1 is the function name,
    /// group 2 is `init` for initializers
    pub fn function() -> &'static Anchor {
        &FUNCTION
    }

    /// `guard <condition> else {`; group 1 is the condition
    pub fn guard() -> &'static Anchor {
        &GUARD
    }

    /// `for <binding> in <sequence> {`; group 1 is the binding, group 2 the
    /// sequence (with any `where` clause still attached)
    pub fn for_loop() -> &'static Anchor {
        &FOR_LOOP
    }

    /// `struct Name ... {` and friends; group 1 is the keyword, group 2 the name
    pub fn type_decl() -> &'static Anchor {
        &TYPE_DECL
    }

    pub fn kind(&self) -> ConstructKind {
        self.kind
    }
}

/// Lazily yields constructs from one text
pub struct Scan<'a> {
    text: &'a str,
    anchor: &'a Anchor,
    map: RegionMap,
    pos: usize,
}

/// Scan `text` for constructs located by `anchor`
pub fn scan<'a>(text: &'a str, anchor: &'a Anchor) -> Scan<'a> {
    scan_from(text, anchor, 0)
}

/// Scan starting at byte `offset` (clamped to a char boundary)
pub fn scan_from<'a>(text: &'a str, anchor: &'a Anchor, offset: usize) -> Scan<'a> {
    let mut pos = offset.min(text.len());
    while !text.is_char_boundary(pos) {
        pos += 1;
    }
    Scan {
        text,
        anchor,
        map: RegionMap::new(text),
        pos,
    }
}

impl<'a> Scan<'a> {
    pub fn regions(&self) -> &RegionMap {
        &self.map
    }

    fn advance_past(&mut self, start: usize) {
        let mut next = start + 1;
        while next < self.text.len() && !self.text.is_char_boundary(next) {
            next += 1;
        }
        self.pos = next;
    }

    fn accept(&self, caps: &Captures<'_>) -> Option<Construct> {
        let m = caps.get(0)?;
        let start = m.start();
        let open = m.end() - 1;
        if !self.map.is_code(start) || !self.map.is_code(open) {
            return None;
        }
        if !is_balanced(self.text, &self.map, start..open) {
            return None;
        }
        if self.anchor.kind == ConstructKind::Function {
            // `self.init(...)` and `super.init(...)` are calls
            if start > 0 && self.text.as_bytes()[start - 1] == b'.' {
                return None;
            }
            if !function_header_ok(&self.text[start..open]) {
                return None;
            }
        }
        let close = matching_brace(self.text, &self.map, open)?;
        Some(Construct {
            kind: self.anchor.kind,
            start,
            end: close + 1,
            open,
            header: self.text[start..open].to_string(),
            body: self.text[open + 1..close].to_string(),
            captures: caps
                .iter()
                .skip(1)
                .map(|g| g.map(|g| g.as_str().to_string()).unwrap_or_default())
                .collect(),
        })
    }
}

impl<'a> Iterator for Scan<'a> {
    type Item = Construct;

    fn next(&mut self) -> Option<Construct> {
        while self.pos < self.text.len() {
            let caps = self.anchor.pattern.captures_at(self.text, self.pos)?;
            let start = caps.get(0)?.start();
            let construct = self.accept(&caps);
            self.advance_past(start);
            if construct.is_some() {
                return construct;
            }
        }
        None
    }
}

static TRAILING_STATEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:var|let|func|init|subscript|case|typealias|struct|class|enum|protocol|extension|if|guard|for|while|switch|return)\b",
    )
    .expect("statement keyword pattern compiles")
});

/// Text after a function's parameter list may only hold effects, a return
/// type and a where clause. Anything else means the anchor ran past a
/// body-less requirement into the next declaration.
fn function_header_ok(header: &str) -> bool {
    let map = RegionMap::new(header);
    let Some(open) = header
        .char_indices()
        .find(|&(i, c)| c == '(' && map.is_code(i))
        .map(|(i, _)| i)
    else {
        return false;
    };
    let Some(close) = matching_delimiter(header, &map, open, b'(', b')') else {
        return false;
    };
    let rest = &header[close + 1..];
    let rest_map = RegionMap::new(rest);
    !TRAILING_STATEMENT
        .find_iter(rest)
        .any(|m| rest_map.is_code(m.start()))
}

/// Offset of the `}` closing the `{` at `open`, counting only code braces
pub fn matching_brace(text: &str, map: &RegionMap, open: usize) -> Option<usize> {
    matching_delimiter(text, map, open, b'{', b'}')
}

/// Offset of the delimiter closing the one at `open`, counting only code bytes
pub fn matching_delimiter(
    text: &str,
    map: &RegionMap,
    open: usize,
    opening: u8,
    closing: u8,
) -> Option<usize> {
    let b = text.as_bytes();
    let mut depth = 0usize;
    for range in map.code_ranges(open..text.len()) {
        for i in range {
            if b[i] == opening {
                depth += 1;
            } else if b[i] == closing {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
struct Counter {
    var total = 0
    func add(_ values: [Int]) -> Int {
        guard !values.isEmpty else { return 0 }
        for v in values where v > 0 {
            if v > 10 { print("big {") }
        }
        return total
    }
}
"#;

    #[test]
    fn test_scan_function() {
        let found: Vec<_> = scan(SAMPLE, Anchor::function()).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, ConstructKind::Function);
        assert_eq!(found[0].capture(0), "add");
        assert!(found[0].body.trim_end().ends_with("return total"));
    }

    #[test]
    fn test_scan_guard_and_loop() {
        let guards: Vec<_> = scan(SAMPLE, Anchor::guard()).collect();
        assert_eq!(guards.len(), 1);
        assert_eq!(guards[0].capture(0), "!values.isEmpty");
        assert_eq!(guards[0].body.trim(), "return 0");

        let loops: Vec<_> = scan(SAMPLE, Anchor::for_loop()).collect();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].capture(0), "v");
        assert_eq!(loops[0].capture(1), "values where v > 0");
    }

    #[test]
    fn test_type_decl_captures() {
        let types: Vec<_> = scan(SAMPLE, Anchor::type_decl()).collect();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].capture(0), "struct");
        assert_eq!(types[0].capture(1), "Counter");
        assert_eq!(types[0].end, SAMPLE.rfind('}').unwrap() + 1);
    }

    #[test]
    fn test_anchor_inside_string_is_ignored() {
        let text = r#"let s = "guard ok else { nope }"
guard ready else { return }"#;
        let guards: Vec<_> = scan(text, Anchor::guard()).collect();
        assert_eq!(guards.len(), 1);
        assert_eq!(guards[0].capture(0), "ready");
    }

    #[test]
    fn test_unbalanced_construct_is_dropped() {
        let text = "func broken() {\n    if x {\n";
        assert_eq!(scan(text, Anchor::function()).count(), 0);
    }

    #[test]
    fn test_scanning_is_idempotent() {
        let first: Vec<_> = scan(SAMPLE, Anchor::for_loop()).collect();
        let second: Vec<_> = scan(SAMPLE, Anchor::for_loop()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_balance_invariant() {
        for anchor in [
            Anchor::function(),
            Anchor::guard(),
            Anchor::for_loop(),
            Anchor::type_decl(),
        ] {
            let s = scan(SAMPLE, anchor);
            let map = RegionMap::new(SAMPLE);
            for c in s {
                assert!(is_balanced(SAMPLE, &map, c.span()), "{:?}", c.kind);
            }
        }
    }

    #[test]
    fn test_nested_loops_are_all_found() {
        let text = "for a in xs { for b in ys { print(a, b) } }";
        let loops: Vec<_> = scan(text, Anchor::for_loop()).collect();
        assert_eq!(loops.len(), 2);
        assert_eq!(loops[0].capture(0), "a");
        assert_eq!(loops[1].capture(0), "b");
    }

    #[test]
    fn test_protocol_requirement_is_not_a_function() {
        let text = "protocol P {\n    func a() -> Int\n}\nextension P {\n    func b() { }\n}";
        let names: Vec<_> = scan(text, Anchor::function())
            .map(|c| c.capture(0).to_string())
            .collect();
        assert_eq!(names, vec!["b".to_string()]);
    }

    #[test]
    fn test_initializer_call_is_not_a_function() {
        let text = "init(x: Int) {\n    self.init(y: x)\n    if x > 0 { print(x) }\n}";
        let found: Vec<_> = scan(text, Anchor::function()).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].start, 0);
        assert_eq!(found[0].capture(1), "init");
    }

    #[test]
    fn test_requirement_followed_by_property_is_not_a_function() {
        let text = "protocol P {\n    func a()\n    var b: Int { get }\n}";
        assert_eq!(scan(text, Anchor::function()).count(), 0);
    }

    #[test]
    fn test_scan_from_offset() {
        let text = "guard a else { return }\nguard b else { return }";
        let second = text.rfind("guard").unwrap();
        let found: Vec<_> = scan_from(text, Anchor::guard(), second).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].capture(0), "b");
    }
}
