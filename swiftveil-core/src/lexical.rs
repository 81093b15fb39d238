//! Lexical region map for Swift source
//!
//! Classifies every byte of a file as code, literal or comment. String
//! interpolations (`"\(expr)"`) are code, multi-line (`"""`) and raw
//! (`#"…"#`) strings are literals, block comments nest the way Swift's do.
//!
//! Every component that needs to know "is this offset real code?" asks a
//! [`RegionMap`] instead of re-implementing quote tracking.

use std::ops::Range;

/// What a byte of source text belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Code,
    Literal,
    Comment,
}

/// A maximal run of bytes of one kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub kind: RegionKind,
    pub range: Range<usize>,
}

/// Sorted, contiguous regions covering a whole text
#[derive(Debug, Clone)]
pub struct RegionMap {
    regions: Vec<Region>,
    len: usize,
}

enum Frame {
    /// Plain code, or the inside of a `\( … )` interpolation
    Code { interpolation: bool, parens: usize },
    Str { multiline: bool },
    RawStr { hashes: usize, multiline: bool },
}

struct Builder {
    regions: Vec<Region>,
    kind: RegionKind,
    start: usize,
}

impl Builder {
    fn switch(&mut self, kind: RegionKind, at: usize) {
        if kind == self.kind {
            return;
        }
        if at > self.start {
            self.regions.push(Region {
                kind: self.kind,
                range: self.start..at,
            });
        } else if let Some(last) = self.regions.last() {
            // empty region in between; glue onto the previous run
            if last.kind == kind && last.range.end == at {
                self.start = last.range.start;
                self.regions.pop();
            }
        }
        self.kind = kind;
        self.start = at;
    }

    fn finish(mut self, len: usize) -> Vec<Region> {
        if len > self.start {
            self.regions.push(Region {
                kind: self.kind,
                range: self.start..len,
            });
        }
        self.regions
    }
}

impl RegionMap {
    pub fn new(text: &str) -> Self {
        let b = text.as_bytes();
        let n = b.len();
        let mut builder = Builder {
            regions: Vec::new(),
            kind: RegionKind::Code,
            start: 0,
        };
        let mut stack = vec![Frame::Code {
            interpolation: false,
            parens: 0,
        }];
        let mut i = 0;

        while i < n {
            let c = b[i];
            let next = b.get(i + 1).copied();
            let Some(frame) = stack.last_mut() else {
                break;
            };

            match frame {
                Frame::Code {
                    interpolation,
                    parens,
                } => {
                    if c == b'/' && next == Some(b'/') {
                        builder.switch(RegionKind::Comment, i);
                        i = line_end(b, i);
                        builder.switch(RegionKind::Code, i);
                        continue;
                    }
                    if c == b'/' && next == Some(b'*') {
                        builder.switch(RegionKind::Comment, i);
                        i = block_comment_end(b, i);
                        builder.switch(RegionKind::Code, i);
                        continue;
                    }
                    if c == b'#' {
                        let mut j = i;
                        while j < n && b[j] == b'#' {
                            j += 1;
                        }
                        if j < n && b[j] == b'"' {
                            let multiline = b[j..].starts_with(b"\"\"\"");
                            builder.switch(RegionKind::Literal, i);
                            stack.push(Frame::RawStr {
                                hashes: j - i,
                                multiline,
                            });
                            i = j + if multiline { 3 } else { 1 };
                            continue;
                        }
                        i = j;
                        continue;
                    }
                    if c == b'"' {
                        let multiline = b[i..].starts_with(b"\"\"\"");
                        builder.switch(RegionKind::Literal, i);
                        stack.push(Frame::Str { multiline });
                        i += if multiline { 3 } else { 1 };
                        continue;
                    }
                    if *interpolation {
                        if c == b'(' {
                            *parens += 1;
                        } else if c == b')' {
                            if *parens == 0 {
                                stack.pop();
                                builder.switch(RegionKind::Literal, i);
                                i += 1;
                                continue;
                            }
                            *parens -= 1;
                        }
                    }
                    i += 1;
                }
                Frame::Str { multiline } => {
                    if c == b'\\' {
                        if next == Some(b'(') {
                            i += 2;
                            builder.switch(RegionKind::Code, i);
                            stack.push(Frame::Code {
                                interpolation: true,
                                parens: 0,
                            });
                            continue;
                        }
                        i += 2;
                        continue;
                    }
                    if *multiline {
                        if b[i..].starts_with(b"\"\"\"") {
                            i += 3;
                            stack.pop();
                            builder.switch(RegionKind::Code, i);
                            continue;
                        }
                    } else if c == b'"' {
                        i += 1;
                        stack.pop();
                        builder.switch(RegionKind::Code, i);
                        continue;
                    } else if c == b'\n' {
                        // unterminated single-line literal stops at the line end
                        stack.pop();
                        builder.switch(RegionKind::Code, i);
                        continue;
                    }
                    i += 1;
                }
                Frame::RawStr { hashes, multiline } => {
                    let quotes = if *multiline { 3 } else { 1 };
                    if b[i..].starts_with(&b"\"\"\""[..quotes])
                        && b.len() >= i + quotes + *hashes
                        && b[i + quotes..i + quotes + *hashes].iter().all(|&h| h == b'#')
                    {
                        i += quotes + *hashes;
                        stack.pop();
                        builder.switch(RegionKind::Code, i);
                        continue;
                    }
                    if !*multiline && c == b'\n' {
                        stack.pop();
                        builder.switch(RegionKind::Code, i);
                        continue;
                    }
                    i += 1;
                }
            }
        }

        Self {
            regions: builder.finish(n),
            len: n,
        }
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Kind of the byte at `offset`; offsets past the end count as code
    pub fn kind_at(&self, offset: usize) -> RegionKind {
        if offset >= self.len {
            return RegionKind::Code;
        }
        let idx = self.regions.partition_point(|r| r.range.end <= offset);
        self.regions
            .get(idx)
            .map(|r| r.kind)
            .unwrap_or(RegionKind::Code)
    }

    #[inline]
    pub fn is_code(&self, offset: usize) -> bool {
        self.kind_at(offset) == RegionKind::Code
    }

    /// Code ranges intersecting `within`, clipped to it
    pub fn code_ranges(&self, within: Range<usize>) -> impl Iterator<Item = Range<usize>> + '_ {
        self.regions
            .iter()
            .filter(|r| r.kind == RegionKind::Code)
            .filter_map(move |r| {
                let start = r.range.start.max(within.start);
                let end = r.range.end.min(within.end);
                (start < end).then_some(start..end)
            })
    }
}

fn line_end(b: &[u8], from: usize) -> usize {
    b[from..]
        .iter()
        .position(|&c| c == b'\n')
        .map(|p| from + p)
        .unwrap_or(b.len())
}

fn block_comment_end(b: &[u8], from: usize) -> usize {
    let mut depth = 0usize;
    let mut i = from;
    while i < b.len() {
        if b[i..].starts_with(b"/*") {
            depth += 1;
            i += 2;
        } else if b[i..].starts_with(b"*/") {
            depth -= 1;
            i += 2;
            if depth == 0 {
                return i;
            }
        } else {
            i += 1;
        }
    }
    b.len()
}

/// Byte that may appear inside a Swift identifier
#[inline]
pub fn is_ident_byte(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Whether `name` is a plain ASCII identifier
pub fn is_identifier(name: &str) -> bool {
    let mut bytes = name.bytes();
    match bytes.next() {
        Some(c) if c.is_ascii_alphabetic() || c == b'_' => bytes.all(is_ident_byte),
        _ => false,
    }
}

/// Whole-word occurrences of `name` in code within `within`.
///
/// Member accesses (`.name`) are skipped unless `include_members` is set.
pub fn word_occurrences(
    text: &str,
    map: &RegionMap,
    name: &str,
    within: Range<usize>,
    include_members: bool,
) -> Vec<usize> {
    let b = text.as_bytes();
    let mut found = Vec::new();
    if name.is_empty() {
        return found;
    }
    for range in map.code_ranges(within) {
        let slice = &text[range.clone()];
        let mut from = 0;
        while let Some(pos) = slice[from..].find(name) {
            let at = range.start + from + pos;
            let end = at + name.len();
            let before_ok = at == 0 || !is_ident_byte(b[at - 1]);
            let after_ok = end >= b.len() || !is_ident_byte(b[end]);
            let member = at > 0 && b[at - 1] == b'.' && !(at > 1 && b[at - 2] == b'.');
            if before_ok && after_ok && (include_members || !member) {
                found.push(at);
            }
            from += pos + name.len();
        }
    }
    found
}

/// Whether `name` appears in code within `within` as an argument or
/// parameter label: `(name:` or `, name:`
pub fn is_argument_label(text: &str, map: &RegionMap, name: &str, within: Range<usize>) -> bool {
    word_occurrences(text, map, name, within, false).into_iter().any(|at| {
        let before = text[..at].trim_end().bytes().last();
        let after = text[at + name.len()..].trim_start().as_bytes();
        matches!(before, Some(b'(' | b',')) && after.first() == Some(&b':')
    })
}

/// Code delimiters `()`, `[]` and `{}` each balance within `range`
pub fn is_balanced(text: &str, map: &RegionMap, range: Range<usize>) -> bool {
    let b = text.as_bytes();
    let (mut paren, mut bracket, mut brace) = (0i64, 0i64, 0i64);
    for r in map.code_ranges(range) {
        for &c in &b[r] {
            match c {
                b'(' => paren += 1,
                b')' => paren -= 1,
                b'[' => bracket += 1,
                b']' => bracket -= 1,
                b'{' => brace += 1,
                b'}' => brace -= 1,
                _ => {}
            }
            if paren < 0 || bracket < 0 || brace < 0 {
                return false;
            }
        }
    }
    paren == 0 && bracket == 0 && brace == 0
}

/// Net `{`/`}` depth of code before `offset`
pub fn brace_depth_at(text: &str, map: &RegionMap, offset: usize) -> i64 {
    let b = text.as_bytes();
    map.code_ranges(0..offset)
        .flat_map(|r| b[r].iter())
        .fold(0i64, |depth, &c| match c {
            b'{' => depth + 1,
            b'}' => depth - 1,
            _ => depth,
        })
}

/// Split `text` on `sep` where it appears at nesting depth 0 in code
pub fn split_top_level(text: &str, sep: u8) -> Vec<&str> {
    let map = RegionMap::new(text);
    let b = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i64;
    let mut last = 0;
    for r in map.code_ranges(0..text.len()) {
        for i in r {
            match b[i] {
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth -= 1,
                c if c == sep && depth == 0 => {
                    parts.push(&text[last..i]);
                    last = i + 1;
                }
                _ => {}
            }
        }
    }
    parts.push(&text[last..]);
    parts
}

/// Offset of the last depth-0 code occurrence of keyword `word`
pub fn find_top_level_word(text: &str, word: &str) -> Option<usize> {
    let map = RegionMap::new(text);
    word_occurrences(text, &map, word, 0..text.len(), false)
        .into_iter()
        .filter(|&at| {
            let b = text.as_bytes();
            let mut depth = 0i64;
            for r in map.code_ranges(0..at) {
                for &c in &b[r] {
                    match c {
                        b'(' | b'[' | b'{' => depth += 1,
                        b')' | b']' | b'}' => depth -= 1,
                        _ => {}
                    }
                }
            }
            depth == 0
        })
        .last()
}

/// Code tokens with comments dropped and code whitespace removed.
///
/// Literal contents are kept verbatim, so two texts with the same stream
/// differ only in comments and layout.
pub fn token_stream(text: &str) -> String {
    let map = RegionMap::new(text);
    let mut out = String::with_capacity(text.len());
    for region in map.regions() {
        let slice = &text[region.range.clone()];
        match region.kind {
            RegionKind::Code => out.extend(slice.chars().filter(|c| !c.is_whitespace())),
            RegionKind::Literal => out.push_str(slice),
            RegionKind::Comment => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<(RegionKind, &str)> {
        RegionMap::new(text)
            .regions()
            .iter()
            .map(|r| (r.kind, &text[r.range.clone()]))
            .collect()
    }

    #[test]
    fn test_line_and_block_comments() {
        let text = "let a = 1 // note\n/* x /* nested */ y */let b = 2";
        let regions = kinds(text);
        assert_eq!(regions[0], (RegionKind::Code, "let a = 1 "));
        assert_eq!(regions[1], (RegionKind::Comment, "// note"));
        assert_eq!(regions[3], (RegionKind::Comment, "/* x /* nested */ y */"));
        assert_eq!(regions[4], (RegionKind::Code, "let b = 2"));
    }

    #[test]
    fn test_string_with_comment_marker_is_literal() {
        let text = r#"let url = "https://example.com" // trailing"#;
        let map = RegionMap::new(text);
        let slash = text.find("//").unwrap();
        assert_eq!(map.kind_at(slash), RegionKind::Literal);
        let trailing = text.rfind("//").unwrap();
        assert_eq!(map.kind_at(trailing), RegionKind::Comment);
    }

    #[test]
    fn test_interpolation_is_code() {
        let text = r#"print("value: \(foo(bar)) done")"#;
        let map = RegionMap::new(text);
        assert!(map.is_code(text.find("foo").unwrap()));
        assert!(map.is_code(text.find("bar").unwrap()));
        assert!(!map.is_code(text.find("value").unwrap()));
        assert!(!map.is_code(text.find("done").unwrap()));
    }

    #[test]
    fn test_nested_string_in_interpolation() {
        let text = r#"let s = "a\(dict["key"] ?? "none")b"; let t = 1"#;
        let map = RegionMap::new(text);
        assert!(map.is_code(text.find("dict").unwrap()));
        assert!(!map.is_code(text.find("key").unwrap()));
        assert!(map.is_code(text.find("let t").unwrap()));
    }

    #[test]
    fn test_multiline_and_raw_strings() {
        let text = "let m = \"\"\"\n{ guard\n\"\"\"\nlet r = #\"a \"quoted\" {\"#\nlet z = 0";
        let map = RegionMap::new(text);
        assert!(!map.is_code(text.find("guard").unwrap()));
        assert!(!map.is_code(text.find("quoted").unwrap()));
        assert!(map.is_code(text.find("let z").unwrap()));
        assert!(is_balanced(text, &map, 0..text.len()));
    }

    #[test]
    fn test_unterminated_string_stops_at_line_end() {
        let text = "let a = \"open\nlet b = 2";
        let map = RegionMap::new(text);
        assert!(map.is_code(text.find("let b").unwrap()));
    }

    #[test]
    fn test_word_occurrences_skip_members_and_partials() {
        let text = "count += other.count + counter + count";
        let map = RegionMap::new(text);
        let found = word_occurrences(text, &map, "count", 0..text.len(), false);
        assert_eq!(found, vec![0, text.rfind("count").unwrap()]);
    }

    #[test]
    fn test_split_top_level_commas() {
        let parts = split_top_level(r#"a > 0, f(x, y), s != "a,b", [1, 2].isEmpty"#, b',');
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[1].trim(), "f(x, y)");
        assert_eq!(parts[2].trim(), r#"s != "a,b""#);
    }

    #[test]
    fn test_token_stream_ignores_comments_and_layout() {
        let a = "let x = 1\nprint(\"a  b\")";
        let b = "// header\nlet x=1 // one\n\n  print( \"a  b\" )";
        assert_eq!(token_stream(a), token_stream(b));
        assert_ne!(token_stream(a), token_stream("let x = 1\nprint(\"a b\")"));
    }

    #[test]
    fn test_brace_depth() {
        let text = "struct A { var s = \"}\" }\nstruct B {";
        let map = RegionMap::new(text);
        assert_eq!(brace_depth_at(text, &map, text.find("struct B").unwrap()), 0);
        assert_eq!(brace_depth_at(text, &map, text.len()), 1);
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("HelperView"));
        assert!(is_identifier("_private1"));
        assert!(!is_identifier("My-File"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_argument_labels() {
        let text = "UIView.animate(withDuration: 0.3,\n    completion: nil)\nlet c = x ? completion : y\nprint(\"(reload: 1)\")";
        let map = RegionMap::new(text);
        assert!(is_argument_label(text, &map, "completion", 0..text.len()));
        assert!(is_argument_label(text, &map, "withDuration", 0..text.len()));
        assert!(!is_argument_label(text, &map, "reload", 0..text.len()));
        assert!(!is_argument_label(text, &map, "animate", 0..text.len()));
    }
}
