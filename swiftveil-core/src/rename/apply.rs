//! Propagating a rename map through every file format
//!
//! Each format only exposes a few contexts where a symbol is referenced by
//! name. Source files are rewritten at whole-word code occurrences, interface
//! files at `customClass` attributes, property lists at element values and
//! project manifests at file references. Nothing else is touched.

use std::collections::HashSet;
use std::ops::Range;

use regex::Regex;

use super::exclusions::BUILT_IN_TYPES;
use super::map::RenameMap;
use crate::lexical::{is_ident_byte, RegionMap};
use crate::path_utils::{extension, file_stem, with_stem};
use crate::project::{FileClass, Project};
use crate::scanner::{scan, Anchor};

/// `{}` in a template is replaced by the alternation of names; the template
/// must wrap it in a group named `name`.
const WORD: &str = r"\b(?P<name>{})\b";
const CUSTOM_CLASS: &str = r#"\bcustomClass="(?P<name>{})""#;
const ELEMENT_VALUE: &str = r">(?:[A-Za-z0-9_$()]*\.)?(?P<name>{})<";
const MANIFEST_COMMENT: &str = r"/\* (?P<name>{})\.(?:swift|xib) ";
const MANIFEST_FIELD: &str = r#"\b(?:path|name) = "?(?:[^;"\n]*/)?(?P<name>{})\.(?:swift|xib)"?;"#;
const NIB_NAME: &str = r#"\bnibName:\s*"(?P<name>{})""#;
const LOAD_NIB: &str = r#"\bloadNibNamed\(\s*"(?P<name>{})""#;
const IMAGE_SOURCE: &str =
    r#"(?:\bnamed:|\bImage\(|\bdecorative:|\bresourceName:)\s*"(?P<name>{})""#;
const IMAGE_INTERFACE: &str =
    r#"(?:\b(?:image|selectedImage|highlightedImage|backgroundImage)=|<image\s+name=)"(?P<name>{})""#;

/// Compiled matcher for one context template over all names of a map
pub struct Replacer {
    regexes: Vec<Regex>,
}

impl Replacer {
    /// Compile one alternation; if that fails, one pattern per name. Names
    /// that still fail are dropped and logged.
    pub fn new(map: &RenameMap, template: &str) -> Self {
        let mut names: Vec<&str> = map.keys().collect();
        if names.is_empty() {
            return Self { regexes: Vec::new() };
        }
        // longest first so no alternative shadows a longer one
        names.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        let alternation = names
            .iter()
            .map(|n| regex::escape(n))
            .collect::<Vec<_>>()
            .join("|");
        match Regex::new(&template.replace("{}", &alternation)) {
            Ok(re) => Self { regexes: vec![re] },
            Err(e) => {
                tracing::debug!("Combined pattern failed ({}); compiling per name", e);
                let regexes = names
                    .iter()
                    .filter_map(|n| match Regex::new(&template.replace("{}", &regex::escape(n))) {
                        Ok(re) => Some(re),
                        Err(e) => {
                            tracing::warn!("Dropping rename of {}: {}", n, e);
                            None
                        }
                    })
                    .collect();
                Self { regexes }
            }
        }
    }

    /// Replace every accepted `name` group with its mapped value
    pub fn apply(&self, text: &str, map: &RenameMap, accept: impl Fn(usize) -> bool) -> String {
        let mut edits: Vec<(Range<usize>, &str)> = Vec::new();
        for re in &self.regexes {
            for caps in re.captures_iter(text) {
                let Some(m) = caps.name("name") else {
                    continue;
                };
                if !accept(m.start()) {
                    continue;
                }
                if let Some(new) = map.get(m.as_str()) {
                    edits.push((m.range(), new));
                }
            }
        }
        splice(text, edits)
    }
}

/// Apply non-overlapping edits; overlapping ones after the first are ignored
pub fn splice(text: &str, mut edits: Vec<(Range<usize>, &str)>) -> String {
    if edits.is_empty() {
        return text.to_string();
    }
    edits.sort_by_key(|(r, _)| r.start);
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (range, new) in edits {
        if range.start < last {
            continue;
        }
        out.push_str(&text[last..range.start]);
        out.push_str(new);
        last = range.end;
    }
    out.push_str(&text[last..]);
    out
}

/// `.name` but not `...name`
pub fn is_member_access(text: &str, at: usize) -> bool {
    let b = text.as_bytes();
    at > 0 && b[at - 1] == b'.' && !(at > 1 && b[at - 2] == b'.')
}

/// `Module.name`: a member access whose qualifier is a capitalized
/// identifier that names no known type, so it can only be a module.
/// Framework-style names (`UIButton`, `NSView`) count as types.
pub fn is_module_qualified(text: &str, at: usize, types: &HashSet<String>) -> bool {
    if !is_member_access(text, at) {
        return false;
    }
    let b = text.as_bytes();
    let dot = at - 1;
    let start = (0..dot).rev().take_while(|&i| is_ident_byte(b[i])).last().unwrap_or(dot);
    let qualifier = &text[start..dot];
    let chained = start > 0 && matches!(b[start - 1], b'.' | b')' | b']' | b'?' | b'!');
    let mut leading = qualifier.bytes();
    let capitalized = leading.next().is_some_and(|c| c.is_ascii_uppercase());
    let framework_style = leading.next().is_some_and(|c| c.is_ascii_uppercase());
    !chained
        && capitalized
        && !framework_style
        && qualifier != "Self"
        && !types.contains(qualifier)
        && !BUILT_IN_TYPES.contains(&qualifier)
}

/// Replace whole-word code occurrences of mapped names in Swift source,
/// skipping member accesses other than module-qualified ones. `types` are
/// the type names declared in the project.
pub fn rename_in_source(text: &str, map: &RenameMap, words: &Replacer, types: &HashSet<String>) -> String {
    let regions = RegionMap::new(text);
    let b = text.as_bytes();
    words.apply(text, map, |at| {
        regions.is_code(at)
            && (!is_member_access(text, at) || is_module_qualified(text, at, types))
            && (at == 0 || !is_ident_byte(b[at - 1]))
    })
}

/// Every type name declared in a source file of the project
pub fn declared_types(project: &Project) -> HashSet<String> {
    let mut out = HashSet::new();
    for (path, text) in project.files_of(FileClass::Source) {
        out.extend(scan(text, Anchor::type_decl()).map(|c| c.capture(1).to_string()));
        // a file named after an extension's target still counts as declared
        let stem = file_stem(path);
        if text.contains(&format!("extension {}", stem)) {
            out.insert(stem.to_string());
        }
    }
    out
}

/// Propagate a type rename map through all formats. With `rename_files`,
/// `.swift`/`.xib` files named after a renamed type move with it.
///
/// Returns the number of files whose contents or paths changed.
pub fn apply(project: &mut Project, map: &RenameMap, rename_files: bool) -> usize {
    if map.is_empty() {
        return 0;
    }
    let words = Replacer::new(map, WORD);
    let custom_class = Replacer::new(map, CUSTOM_CLASS);
    let element = Replacer::new(map, ELEMENT_VALUE);
    let types = declared_types(project);

    let mut changed =
        project.par_rewrite(FileClass::Source, |_, text| rename_in_source(text, map, &words, &types));
    changed += project.par_rewrite(FileClass::Interface, |_, text| custom_class.apply(text, map, |_| true));
    changed += project.par_rewrite(FileClass::PropertyList, |_, text| element.apply(text, map, |_| true));

    if rename_files {
        changed += apply_file_renames(project, map);
    }
    changed
}

/// Move `.swift`/`.xib` files whose stem is mapped, then fix manifest
/// references and nib-loading literals
pub fn apply_file_renames(project: &mut Project, map: &RenameMap) -> usize {
    if map.is_empty() {
        return 0;
    }
    let moves: Vec<(String, String)> = project
        .paths()
        .filter(|p| matches!(extension(p), Some("swift") | Some("xib")))
        .filter_map(|p| map.get(file_stem(p)).map(|new| (p.to_string(), with_stem(p, new))))
        .collect();

    let mut changed = 0;
    for (from, to) in &moves {
        if project.rename_path(from, to) {
            tracing::debug!("Renamed {} -> {}", from, to);
            changed += 1;
        } else {
            tracing::warn!("Cannot move {} to {}: target exists", from, to);
        }
    }

    let comment = Replacer::new(map, MANIFEST_COMMENT);
    let field = Replacer::new(map, MANIFEST_FIELD);
    changed += project.par_rewrite(FileClass::Manifest, |_, text| {
        let text = comment.apply(text, map, |_| true);
        field.apply(&text, map, |_| true)
    });

    let nib_name = Replacer::new(map, NIB_NAME);
    let load_nib = Replacer::new(map, LOAD_NIB);
    changed += project.par_rewrite(FileClass::Source, |_, text| {
        let text = nib_name.apply(text, map, |_| true);
        load_nib.apply(&text, map, |_| true)
    });
    changed
}

/// Rename image sets and every literal that loads them by name
pub fn apply_image_renames(project: &mut Project, map: &RenameMap) -> usize {
    if map.is_empty() {
        return 0;
    }
    let moves: Vec<(String, String)> = project
        .image_sets()
        .filter_map(|p| map.get(file_stem(p)).map(|new| (p.to_string(), with_stem(p, new))))
        .collect();
    for (from, to) in &moves {
        project.move_image_set(from, to);
    }

    let source = Replacer::new(map, IMAGE_SOURCE);
    let interface = Replacer::new(map, IMAGE_INTERFACE);
    let mut changed = project.par_rewrite(FileClass::Source, |_, text| source.apply(text, map, |_| true));
    changed += project.par_rewrite(FileClass::Interface, |_, text| interface.apply(text, map, |_| true));
    changed + moves.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> RenameMap {
        let mut m = RenameMap::new();
        for (o, n) in pairs {
            m.insert(*o, *n);
        }
        m
    }

    #[test]
    fn test_source_rename_respects_regions_and_members() {
        let m = map(&[("Helper", "TypeCacheHelper")]);
        let words = Replacer::new(&m, WORD);
        let text = r#"let h: Helper = Helper() // Helper
let s = "Helper \(Helper.self)"
let x = other.Helper
let y = HelperView()"#;
        let out = rename_in_source(text, &m, &words, &HashSet::new());
        assert_eq!(
            out,
            r#"let h: TypeCacheHelper = TypeCacheHelper() // Helper
let s = "Helper \(TypeCacheHelper.self)"
let x = other.Helper
let y = HelperView()"#
        );
    }

    #[test]
    fn test_module_qualified_names_are_renamed() {
        let m = map(&[("Helper", "TypeCacheHelper")]);
        let words = Replacer::new(&m, WORD);
        let types: HashSet<String> = ["Helper", "Palette"].iter().map(|s| s.to_string()).collect();
        let text = "let a: MyApp.Helper = MyApp.Helper()\nlet b = Palette.Helper\nlet c = String.Helper\nlet d = Self.Helper\nlet e = x.MyApp.Helper\nlet f = UIButton.Helper";
        let out = rename_in_source(text, &m, &words, &types);
        assert_eq!(
            out,
            "let a: MyApp.TypeCacheHelper = MyApp.TypeCacheHelper()\nlet b = Palette.Helper\nlet c = String.Helper\nlet d = Self.Helper\nlet e = x.MyApp.Helper\nlet f = UIButton.Helper"
        );
    }

    #[test]
    fn test_apply_covers_interface_and_plist() {
        let m = map(&[("Card", "TypeLoaderCard")]);
        let mut project = Project::from_files([
            ("App/Card.swift", "struct Card {}"),
            ("App/Main.storyboard", r#"<viewController customClass="Card" id="Card"/>"#),
            ("App/Info.plist", "<string>$(PRODUCT_MODULE_NAME).Card</string><string>Card</string><string>Cards</string>"),
        ]);
        let changed = apply(&mut project, &m, false);
        assert_eq!(changed, 3);
        assert_eq!(project.get("App/Card.swift"), Some("struct TypeLoaderCard {}"));
        assert_eq!(
            project.get("App/Main.storyboard"),
            Some(r#"<viewController customClass="TypeLoaderCard" id="Card"/>"#)
        );
        assert_eq!(
            project.get("App/Info.plist"),
            Some("<string>$(PRODUCT_MODULE_NAME).TypeLoaderCard</string><string>TypeLoaderCard</string><string>Cards</string>")
        );
    }

    #[test]
    fn test_file_renames_move_paths_and_references() {
        let m = map(&[("Card", "TypeLoaderCard")]);
        let mut project = Project::from_files([
            ("App/Card.swift", "let v = Bundle.main.loadNibNamed(\"Card\", owner: nil)"),
            ("App/Card.xib", "<view/>"),
            (
                "App.xcodeproj/project.pbxproj",
                "A /* Card.swift in Sources */;\nB = {path = Card.swift; name = Views/Card.xib;};",
            ),
        ]);
        apply_file_renames(&mut project, &m);
        assert!(project.contains("App/TypeLoaderCard.swift"));
        assert!(project.contains("App/TypeLoaderCard.xib"));
        assert!(!project.contains("App/Card.swift"));
        assert_eq!(
            project.get("App/TypeLoaderCard.swift"),
            Some("let v = Bundle.main.loadNibNamed(\"TypeLoaderCard\", owner: nil)")
        );
        assert_eq!(
            project.get("App.xcodeproj/project.pbxproj"),
            Some("A /* TypeLoaderCard.swift in Sources */;\nB = {path = TypeLoaderCard.swift; name = Views/TypeLoaderCard.xib;};")
        );
    }

    #[test]
    fn test_image_renames() {
        let m = map(&[("logo", "imageCacheLogo")]);
        let mut project = Project::from_files([
            ("App/A.swift", r#"let a = UIImage(named: "logo"); let b = Image("logo"); let c = "logo""#),
            ("App/Main.storyboard", r#"<imageView image="logo"/><image name="logo" width="1"/>"#),
        ]);
        project.add_image_set("App/Assets.xcassets/logo.imageset");
        apply_image_renames(&mut project, &m);
        assert_eq!(
            project.get("App/A.swift"),
            Some(r#"let a = UIImage(named: "imageCacheLogo"); let b = Image("imageCacheLogo"); let c = "logo""#)
        );
        assert_eq!(
            project.get("App/Main.storyboard"),
            Some(r#"<imageView image="imageCacheLogo"/><image name="imageCacheLogo" width="1"/>"#)
        );
        assert_eq!(
            project.image_sets().collect::<Vec<_>>(),
            vec!["App/Assets.xcassets/imageCacheLogo.imageset"]
        );
    }

    #[test]
    fn test_splice_ignores_overlaps() {
        let out = splice("abcdef", vec![(1..3, "X"), (2..4, "Y"), (4..5, "Z")]);
        assert_eq!(out, "aXdZf");
    }
}
