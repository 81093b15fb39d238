//! Collision-aware name generation
//!
//! Every fresh identifier in the engine (renamed types, variables, files,
//! images, loop temporaries, noise declarations) comes out of a
//! [`NameGenerator`]. A generator refuses names that already occur anywhere in
//! the project vocabulary and names it has already handed out.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::lexical::is_identifier;

/// Attempts before a generator gives up on one name
const MAX_ATTEMPTS: usize = 64;

/// What a generated name will be used for; decides its leading prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameRole {
    Type,
    Protocol,
    Variable,
    Function,
    Sequence,
    Index,
    Case,
    Image,
}

impl NameRole {
    pub fn prefix(self) -> &'static str {
        match self {
            NameRole::Type => "Type",
            NameRole::Protocol => "Protocol",
            NameRole::Variable => "var",
            NameRole::Function => "func",
            NameRole::Sequence => "sequence",
            NameRole::Index => "index",
            NameRole::Case => "case",
            NameRole::Image => "image",
        }
    }
}

pub const NAME_PREFIXES: &[&str] = &[
    "Cache", "Parser", "Indexer", "Linker", "Formatter", "Selector", "Derived", "Traverser",
    "Recognizer", "Subscriber", "Verifier", "Receiver", "Uninstaller", "State", "Subject",
    "Sender", "Invoker", "Concrete", "Detector", "Context", "Environment", "Builder", "Binder",
    "Generator", "Util", "Serializer", "Locator", "Retriever", "Converter", "Sanitizer",
    "Emitter", "Scaler", "Resolver", "Initializer", "Inspector", "Logger", "Analyzer",
    "Renderer", "Manager", "Provider", "Splitter", "Validator", "Aggregator", "Factory",
    "Finalizer", "Coordinator", "Installer", "Fetcher", "Router", "Mediator", "Wrapper",
    "Mapper", "Config", "Assembler", "Profiler", "Command", "Joiner", "Extrapolator", "Writer",
    "Calculator", "Processor", "Tracer", "Reader", "Transformer", "Comparator", "Handler",
    "Composite", "Executor", "Combiner", "Harvester", "Iterator", "Collector", "Decorator",
    "Supervisor", "Configurator", "Listener", "Scanner", "Sorter", "Evaluator", "Director",
    "Registry", "Chain", "Merger", "Facade", "Normalizer", "Observer", "Consumer", "Crawler",
    "Collaborator", "Accessor", "Producer", "Watcher", "Strategy", "Connector", "Persister",
    "Tracker", "Decomposer", "Injector", "Interceptor", "Visitor", "Updater", "Monitor",
    "Adapter", "Resizer", "Dispatcher", "Caller", "Notifier", "Modifier", "Publisher", "Saver",
    "Balancer", "Matcher", "Helper", "Reporter", "Disposer", "Loader", "Registrar", "Filter",
    "Mutator", "Template", "Interpolator", "Deserializer", "Synchronizer", "Composer",
    "Searcher", "Bridge", "Estimator", "Extractor", "Disassembler",
];

pub const NAME_ROOTS: &[&str] = &[
    "Ocean", "Estuary", "Timber", "Grassland", "Orchard", "Taiga", "Permafrost", "Lagoon",
    "Delta", "Forest", "River", "Tundra", "Fjord", "Meadow", "Prairie", "Creek", "Blossom",
    "Savanna", "Pond", "Evergreen", "Marsh", "Wetland", "Mangrove", "Reservoir", "Canyon",
    "Glacier", "Harbor", "Steppe", "Strait", "Grove", "Brook", "Swamp", "Bay", "Pasture",
    "Vineyard", "Orchid", "Sprout", "Biome", "Boreal", "Chaparral", "Stream", "Garden",
    "Trunk", "Branch", "Petal", "Biosphere", "Littoral", "Pelagic", "Benthic", "Arctic",
];

/// Common abbreviations expanded before a name is composed
pub const ABBREVIATIONS: &[(&str, &str)] = &[
    ("VC", "ViewController"),
    ("VM", "ViewModel"),
    ("API", "ApplicationProgrammingInterface"),
    ("HTTP", "HyperTextTransferProtocol"),
    ("HTTPS", "HyperTextTransferProtocolSecure"),
    ("URL", "UniformResourceLocator"),
    ("JSON", "JavaScriptObjectNotation"),
    ("ID", "Identifier"),
    ("HTML", "HyperTextMarkupLanguage"),
    ("UI", "UserInterface"),
    ("SDK", "SoftwareDevelopmentKit"),
    ("DB", "Database"),
    ("XML", "ExtensibleMarkupLanguage"),
    ("RGBA", "RedGreenBlueAlpha"),
    ("MVC", "ModelViewController"),
    ("MVVM", "ModelViewViewModel"),
    ("CSV", "CommaSeparatedValues"),
    ("IB", "InterfaceBuilder"),
    ("XIB", "XMLInterfaceBuilder"),
    ("FPS", "FramesPerSecond"),
    ("JWT", "JSONWebToken"),
    ("TV", "TableView"),
    ("BG", "Background"),
    ("FG", "Foreground"),
    ("GCD", "GrandCentralDispatch"),
    ("SQL", "StructuredQueryLanguage"),
];

/// Derive a per-key seed so seeded runs do not depend on scheduling order
pub fn derive_seed(seed: u64, key: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    seed ^ hasher.finish()
}

fn first_upper(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Split a camel-case identifier into words. An upper-case run followed by a
/// lower-case letter gives up its last letter to the next word (`URLSession`
/// → `URL`, `Session`).
fn camel_words(name: &str) -> Vec<&str> {
    let b = name.as_bytes();
    let mut words = Vec::new();
    let mut start = 0;
    for i in 1..b.len() {
        let prev = b[i - 1];
        let cur = b[i];
        let next = b.get(i + 1).copied();
        let boundary = (cur.is_ascii_uppercase() && !prev.is_ascii_uppercase())
            || (cur.is_ascii_uppercase()
                && prev.is_ascii_uppercase()
                && next.is_some_and(|n| n.is_ascii_lowercase()));
        if boundary {
            words.push(&name[start..i]);
            start = i;
        }
    }
    if start < b.len() {
        words.push(&name[start..]);
    }
    words
}

/// Expand known abbreviations and upper-case the first letter
pub fn normalize_case(name: &str) -> String {
    let expanded: String = camel_words(name)
        .into_iter()
        .map(|word| {
            ABBREVIATIONS
                .iter()
                .find(|(short, _)| *short == word)
                .map(|(_, long)| *long)
                .unwrap_or(word)
        })
        .collect();
    first_upper(&expanded)
}

/// Hands out fresh identifiers that collide with nothing in the project
pub struct NameGenerator<'a> {
    reserved: &'a HashSet<String>,
    chosen: HashSet<String>,
    rng: StdRng,
}

impl<'a> NameGenerator<'a> {
    /// `reserved` is usually the project vocabulary
    pub fn new(reserved: &'a HashSet<String>, seed: u64) -> Self {
        Self {
            reserved,
            chosen: HashSet::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Mark a name as taken without generating it
    pub fn reserve(&mut self, name: impl Into<String>) {
        self.chosen.insert(name.into());
    }

    pub fn is_free(&self, name: &str) -> bool {
        is_identifier(name) && !self.reserved.contains(name) && !self.chosen.contains(name)
    }

    /// Compose a candidate without checking it
    fn candidate(&mut self, role: NameRole, old: Option<&str>) -> String {
        let prefix = NAME_PREFIXES.choose(&mut self.rng).copied().unwrap_or("Util");
        let body = match old.filter(|o| !o.is_empty()) {
            Some(old) => format!("{}{}", prefix, normalize_case(old)),
            None => {
                let root = NAME_ROOTS.choose(&mut self.rng).copied().unwrap_or("Delta");
                let n: u32 = self.rng.gen_range(0..10_000);
                format!("{}{}{}", prefix, root, n)
            }
        };
        format!("{}{}", role.prefix(), first_upper(&body))
    }

    /// A fresh name for `role`, derived from `old` when given. `None` once
    /// the attempt budget is exhausted.
    pub fn fresh(&mut self, role: NameRole, old: Option<&str>) -> Option<String> {
        for _ in 0..MAX_ATTEMPTS {
            let name = self.candidate(role, old);
            if self.is_free(&name) {
                self.chosen.insert(name.clone());
                return Some(name);
            }
        }
        tracing::debug!("Name budget exhausted for {:?} {:?}", role, old);
        None
    }

    /// A fresh name with a numeric suffix, for loop temporaries
    pub fn fresh_numbered(&mut self, role: NameRole, n: usize) -> Option<String> {
        for _ in 0..MAX_ATTEMPTS {
            let name = format!("{}{}", self.candidate(role, None), n);
            if self.is_free(&name) {
                self.chosen.insert(name.clone());
                return Some(name);
            }
        }
        None
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_words() {
        assert_eq!(camel_words("URLSessionVC"), vec!["URL", "Session", "VC"]);
        assert_eq!(camel_words("homeView"), vec!["home", "View"]);
        assert_eq!(camel_words("X"), vec!["X"]);
    }

    #[test]
    fn test_normalize_case_expands_abbreviations() {
        assert_eq!(normalize_case("LoginVC"), "LoginViewController");
        assert_eq!(normalize_case("userID"), "UserIdentifier");
        assert_eq!(normalize_case("count"), "Count");
    }

    #[test]
    fn test_fresh_name_shape() {
        let vocab = HashSet::new();
        let mut names = NameGenerator::new(&vocab, 7);
        let name = names.fresh(NameRole::Type, Some("Helper")).unwrap();
        assert!(name.starts_with("Type"));
        assert!(name.ends_with("Helper"));
        let var = names.fresh(NameRole::Variable, Some("count")).unwrap();
        assert!(var.starts_with("var"));
        assert!(var.ends_with("Count"));
        let anon = names.fresh(NameRole::Function, None).unwrap();
        assert!(anon.starts_with("func"));
        assert!(is_identifier(&anon));
    }

    #[test]
    fn test_fresh_names_are_unique_and_avoid_vocabulary() {
        let vocab: HashSet<String> = ["TypeCacheItem".to_string()].into_iter().collect();
        let mut names = NameGenerator::new(&vocab, 1);
        let mut seen = HashSet::new();
        for _ in 0..20 {
            let name = names.fresh(NameRole::Variable, None).unwrap();
            assert!(!vocab.contains(&name));
            assert!(seen.insert(name));
        }

        // every candidate for this old name is taken
        let full: HashSet<String> = NAME_PREFIXES
            .iter()
            .map(|p| format!("Type{}Item", p))
            .collect();
        let mut names = NameGenerator::new(&full, 1);
        assert_eq!(names.fresh(NameRole::Type, Some("Item")), None);
    }

    #[test]
    fn test_seeded_generators_agree() {
        let vocab = HashSet::new();
        let mut a = NameGenerator::new(&vocab, derive_seed(42, "App/A.swift"));
        let mut b = NameGenerator::new(&vocab, derive_seed(42, "App/A.swift"));
        for _ in 0..5 {
            assert_eq!(a.fresh(NameRole::Variable, None), b.fresh(NameRole::Variable, None));
        }
    }
}
