//! Synthetic source files
//!
//! Each generated file is self-consistent Swift that compiles on its own and
//! never runs: a protocol with one requirement, extensions adding pure
//! functions, final classes conforming to the protocol, and plain enums.
//! Integer arithmetic uses wrapping operators so no body can trap.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::path_utils::common_dir;
use crate::project::{FileClass, Project};
use crate::rename::names::{NameGenerator, NameRole};

pub const NOISE_DIR: &str = "Components";

/// How much each noise file contains
#[derive(Debug, Clone, Copy)]
pub struct NoiseShape {
    pub extensions: usize,
    pub classes: usize,
    pub functions_per_class: usize,
    pub enums: usize,
    pub max_cases: usize,
}

impl Default for NoiseShape {
    fn default() -> Self {
        Self {
            extensions: 12,
            classes: 3,
            functions_per_class: 4,
            enums: 8,
            max_cases: 12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReturnType {
    Int,
    String,
    Bool,
    Double,
    Float,
    Void,
}

impl ReturnType {
    const ALL: [ReturnType; 6] = [
        ReturnType::Int,
        ReturnType::String,
        ReturnType::Bool,
        ReturnType::Double,
        ReturnType::Float,
        ReturnType::Void,
    ];

    fn as_str(self) -> &'static str {
        match self {
            ReturnType::Int => "Int",
            ReturnType::String => "String",
            ReturnType::Bool => "Bool",
            ReturnType::Double => "Double",
            ReturnType::Float => "Float",
            ReturnType::Void => "Void",
        }
    }
}

const COMPARISONS: [&str; 4] = [">", "<", "==", "!="];

/// A synthesized function: its requirement signature and full text
struct Function {
    signature: String,
    text: String,
}

pub struct NoiseGenerator<'g, 'a> {
    names: &'g mut NameGenerator<'a>,
    shape: NoiseShape,
}

impl<'g, 'a> NoiseGenerator<'g, 'a> {
    pub fn new(names: &'g mut NameGenerator<'a>, shape: NoiseShape) -> Self {
        Self { names, shape }
    }

    fn name(&mut self, role: NameRole) -> String {
        // the numeric fallback keeps generation total even when the budget runs out
        self.names.fresh(role, None).unwrap_or_else(|| {
            let n: u64 = self.names.rng().gen();
            format!("{}{:x}", role.prefix(), n)
        })
    }

    fn int(&mut self, max: i64) -> i64 {
        self.names.rng().gen_range(1..=max)
    }

    fn float(&mut self) -> String {
        let f: f64 = self.names.rng().gen_range(1.0..10_000.0);
        format!("{:.3}", f)
    }

    fn pick<T: Copy>(&mut self, items: &[T]) -> T {
        *items.choose(self.names.rng()).unwrap_or(&items[0])
    }

    fn body(&mut self, ret: ReturnType, with_loop: bool, indent: &str) -> String {
        let local = self.name(NameRole::Variable);
        let rounds = self.int(64);
        let int_op = self.pick(&["&+", "&-", "&*"]);
        let float_op = self.pick(&["+", "-", "*"]);
        let cmp = self.pick(&COMPARISONS);
        let (a, b) = (self.int(10_000), self.int(10_000));
        let (fa, fb) = (self.float(), self.float());
        let word = self.name(NameRole::Variable);
        let i = indent;

        match (ret, with_loop) {
            (ReturnType::Int, false) => format!("{i}return {a} {int_op} {b}"),
            (ReturnType::Int, true) => format!(
                "{i}var {local} = {a}\n{i}for _ in 0...{rounds} {{\n{i}    {local} = {local} {int_op} {b}\n{i}}}\n{i}return {local}"
            ),
            (ReturnType::String, false) => format!("{i}return \"{word}\""),
            (ReturnType::String, true) => format!(
                "{i}var {local} = \"{word}\"\n{i}for _ in 0...{rounds} {{\n{i}    {local} += \"{word}\"\n{i}}}\n{i}return {local}"
            ),
            (ReturnType::Bool, false) => format!("{i}return {a} {cmp} {b}"),
            (ReturnType::Bool, true) => format!(
                "{i}var {local} = {fa}\n{i}for _ in 0...{rounds} {{\n{i}    {local} = {local} {float_op} {fb}\n{i}}}\n{i}return {local} {cmp} {b}.0"
            ),
            (ReturnType::Double, false) => format!("{i}return {fa} {float_op} {fb}"),
            (ReturnType::Double, true) => format!(
                "{i}var {local} = {fa}\n{i}for _ in 0...{rounds} {{\n{i}    {local} = {local} {float_op} {fb}\n{i}}}\n{i}return {local}"
            ),
            (ReturnType::Float, false) => format!("{i}return Float({fa} {float_op} {fb})"),
            (ReturnType::Float, true) => format!(
                "{i}var {local} = {fa}\n{i}for _ in 0...{rounds} {{\n{i}    {local} = {local} {float_op} {fb}\n{i}}}\n{i}return Float({local})"
            ),
            (ReturnType::Void, false) => format!("{i}print(\"{word}\")"),
            (ReturnType::Void, true) => format!(
                "{i}for _ in 0...{rounds} {{\n{i}    print(\"{word}\")\n{i}}}"
            ),
        }
    }

    fn function(&mut self, indent: &str) -> Function {
        let name = self.name(NameRole::Function);
        let ret = self.pick(&ReturnType::ALL);
        let branch: bool = self.names.rng().gen();
        let with_loop: bool = self.names.rng().gen();
        let signature = format!("func {}() -> {}", name, ret.as_str());
        let inner = format!("{indent}    ");

        let body = if branch {
            let (a, b) = (self.int(10_000), self.int(10_000));
            let cmp = self.pick(&COMPARISONS);
            let deeper = format!("{inner}    ");
            let then = self.body(ret, with_loop, &deeper);
            let otherwise = self.body(ret, with_loop, &deeper);
            format!("{inner}if {a} {cmp} {b} {{\n{then}\n{inner}}} else {{\n{otherwise}\n{inner}}}")
        } else {
            self.body(ret, with_loop, &inner)
        };
        Function {
            text: format!("{indent}{signature} {{\n{body}\n{indent}}}"),
            signature,
        }
    }

    /// One free-standing function whose first line is indented by `indent`
    pub fn dummy_function(&mut self, indent: &str) -> String {
        self.function(indent).text
    }

    fn enumeration(&mut self) -> String {
        let name = self.name(NameRole::Type);
        let count = self.int(self.shape.max_cases.max(1) as i64);
        let cases: Vec<String> = (0..count)
            .map(|_| format!("    case {}", self.name(NameRole::Case)))
            .collect();
        format!("enum {} {{\n{}\n}}", name, cases.join("\n"))
    }

    /// Full text of one noise file whose main class is `class_name`
    pub fn file_content(&mut self, class_name: &str) -> String {
        let protocol = self.name(NameRole::Protocol);
        let requirement = self.function("    ");

        let mut out = format!(
            "import Foundation\n\nprotocol {} {{\n    {}\n}}\n",
            protocol, requirement.signature
        );
        for _ in 0..self.shape.extensions {
            let f = self.function("    ");
            out.push_str(&format!("\nextension {} {{\n{}\n}}\n", protocol, f.text));
        }
        for i in 0..self.shape.classes.max(1) {
            let name = if i == 0 {
                class_name.to_string()
            } else {
                self.name(NameRole::Type)
            };
            let mut members = vec![requirement.text.clone()];
            for _ in 0..self.shape.functions_per_class {
                members.push(self.function("    ").text);
            }
            out.push_str(&format!(
                "\nfinal class {}: {} {{\n{}\n}}\n",
                name,
                protocol,
                members.join("\n")
            ));
        }
        for _ in 0..self.shape.enums {
            out.push('\n');
            out.push_str(&self.enumeration());
            out.push('\n');
        }
        out
    }
}

/// Add `files_per_real_file` noise files for every Swift source file.
/// Returns the number of files added.
pub fn generate(
    project: &mut Project,
    files_per_real_file: usize,
    names: &mut NameGenerator<'_>,
    shape: NoiseShape,
) -> usize {
    let sources: Vec<&str> = project
        .files_of(FileClass::Source)
        .map(|(path, _)| path)
        .collect();
    let count = sources.len() * files_per_real_file;
    if count == 0 {
        return 0;
    }
    let root = common_dir(sources);
    let dir = if root.is_empty() {
        NOISE_DIR.to_string()
    } else {
        format!("{}/{}", root, NOISE_DIR)
    };

    let mut generator = NoiseGenerator::new(names, shape);
    let mut added = 0;
    for _ in 0..count {
        let class_name = generator.name(NameRole::Type);
        let path = format!("{}/{}.swift", dir, class_name);
        if project.contains(&path) {
            continue;
        }
        let content = generator.file_content(&class_name);
        project.insert(path, content);
        added += 1;
    }
    tracing::info!("Generated {} noise files under {}", added, dir);
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexical::{is_balanced, RegionMap};
    use crate::scanner::{scan, Anchor};
    use std::collections::HashSet;

    #[test]
    fn test_generate_counts_and_location() {
        let mut project = Project::from_files([
            ("App/Sources/A.swift", "struct A {}"),
            ("App/Sources/Views/B.swift", "struct B {}"),
            ("App/Info.plist", "<plist/>"),
        ]);
        let vocab = project.vocabulary();
        let mut names = NameGenerator::new(&vocab, 1);
        let added = generate(&mut project, 2, &mut names, NoiseShape::default());
        assert_eq!(added, 4);
        let noise: Vec<&str> = project
            .paths()
            .filter(|p| p.starts_with("App/Sources/Components/"))
            .collect();
        assert_eq!(noise.len(), 4);
    }

    #[test]
    fn test_noise_file_is_well_formed() {
        let vocab = HashSet::new();
        let mut names = NameGenerator::new(&vocab, 3);
        let mut generator = NoiseGenerator::new(&mut names, NoiseShape::default());
        let text = generator.file_content("TypeCacheOcean1");
        let map = RegionMap::new(&text);
        assert!(text.starts_with("import Foundation"));
        assert!(is_balanced(&text, &map, 0..text.len()));
        assert!(text.contains("final class TypeCacheOcean1: Protocol"));

        let functions = scan(&text, Anchor::function()).count();
        let shape = NoiseShape::default();
        assert_eq!(
            functions,
            shape.extensions + shape.classes * (1 + shape.functions_per_class)
        );
        // every integer operation wraps
        for op in [" + ", " - ", " * "] {
            for line in text.lines().filter(|l| l.contains(op)) {
                assert!(line.contains('.'), "non-wrapping integer op: {}", line);
            }
        }
    }

    #[test]
    fn test_noise_names_are_unique() {
        let vocab = HashSet::new();
        let mut names = NameGenerator::new(&vocab, 5);
        let mut generator = NoiseGenerator::new(&mut names, NoiseShape::default());
        let text = generator.file_content("TypeMain");
        let declared: Vec<String> = scan(&text, Anchor::function())
            .map(|c| c.capture(0).to_string())
            .collect();
        let requirement = declared.first().cloned().unwrap_or_default();
        let distinct: HashSet<&String> = declared.iter().filter(|n| **n != requirement).collect();
        let others = declared.iter().filter(|n| **n != requirement).count();
        assert_eq!(distinct.len(), others);
    }
}
