//! `guard … else { … }` → `if !(…) { … }`

use once_cell::sync::Lazy;
use regex::Regex;

use crate::lexical::{split_top_level, RegionMap};
use crate::scanner::{scan_from, Anchor, Construct};

static BINDING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:let|var|case)\b|#available\b|#unavailable\b").expect("binding pattern compiles")
});

/// Whether a guard condition introduces bindings (or availability scope)
/// that an `if` would not carry past its block
pub fn is_unsafe_condition(condition: &str) -> bool {
    let map = RegionMap::new(condition);
    BINDING
        .find_iter(condition)
        .any(|m| map.is_code(m.start()))
}

/// Single-line rendering of a condition for use inside a line comment
fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Join top-level comma-separated clauses with `&&`
pub fn join_conditions(condition: &str) -> String {
    let parts: Vec<&str> = split_top_level(condition, b',')
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() == 1 {
        return parts[0].to_string();
    }
    parts
        .iter()
        .map(|p| format!("({})", p))
        .collect::<Vec<_>>()
        .join(" && ")
}

fn rewrite(guard: &Construct, comments: bool) -> String {
    let joined = join_conditions(guard.capture(0));
    if comments {
        let shown = one_line(&joined);
        format!(
            "// Continue only when {shown} holds\nif !({joined}) {{ // {shown} does not hold\n{}}}",
            guard.body
        )
    } else {
        format!("if !({}) {{{}}}", joined, guard.body)
    }
}

/// Rewrite every safe guard in `text`. Returns the new text and how many
/// guards were rewritten.
pub fn transform_guards(text: &str, comments: bool) -> (String, usize) {
    let mut text = text.to_string();
    let mut cursor = 0;
    let mut rewritten = 0;

    loop {
        let Some(guard) = scan_from(&text, Anchor::guard(), cursor).next() else {
            break;
        };
        if is_unsafe_condition(guard.capture(0)) {
            let note = if comments {
                format!(
                    "// Guard on {} binds names for the rest of the scope and stays as written\n",
                    one_line(guard.capture(0))
                )
            } else {
                String::new()
            };
            text.insert_str(guard.start, &note);
            cursor = guard.start + note.len() + 1;
            continue;
        }
        let replacement = rewrite(&guard, comments);
        text.replace_range(guard.span(), &replacement);
        // the body is now inside the replacement; nested guards are still ahead
        cursor = guard.start + 1;
        rewritten += 1;
    }
    (text, rewritten)
}
