//! Names that must never be substituted

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::lexical::{is_identifier, RegionMap};
use crate::project::{FileClass, Project};

pub const BUILT_IN_TYPES: &[&str] = &[
    "CVarArg", "RangeReplaceableCollection", "Character", "SignedInteger", "Comparable",
    "RandomAccessCollection", "ExpressibleByUnicodeScalarLiteral", "ClosedRange",
    "BidirectionalCollection", "AnyHashable", "ExpressibleByFloatLiteral", "OpaquePointer",
    "LosslessStringConvertible", "AutoreleasingUnsafeMutablePointer", "CustomStringConvertible",
    "ExpressibleByStringLiteral", "CustomReflectable", "Numeric", "MemoryLayout",
    "ExpressibleByExtendedGraphemeClusterLiteral", "FixedWidthInteger", "Array", "Range",
    "ExpressibleByStringInterpolation", "UInt", "BinaryInteger", "Void", "MutableCollection",
    "FloatingPoint", "Float16", "CustomDebugStringConvertible", "Any", "ExpressibleByBooleanLiteral",
    "ExpressibleByNilLiteral", "Hashable", "Float", "UnsafeRawPointer", "ExpressibleByArrayLiteral",
    "UnsafePointer", "Collection", "RawRepresentable", "UnsafeMutableRawPointer", "Encodable",
    "AnyObject", "Error", "BinaryFloatingPoint", "StaticString", "AnyClass", "Double", "Equatable",
    "ExpressibleByIntegerLiteral", "Decodable", "Codable", "Int", "Bool", "Self",
    "ExpressibleByDictionaryLiteral", "StringProtocol", "String", "UnsafeMutablePointer", "KeyPath",
    "UnsignedInteger", "Set", "SignedNumeric", "Dictionary", "SIMD", "Mirror", "Strideable",
    "Never", "Optional", "IteratorProtocol", "ObjectIdentifier", "Sequence", "Float80", "Identifiable",
    "Sendable", "Result", "Task", "Input", "Output",
];

pub const FRAMEWORKS: &[&str] = &[
    "Foundation", "UIKit", "SwiftUI", "Combine", "CoreData", "CoreGraphics", "CoreFoundation",
    "CoreLocation", "CoreImage", "CoreText", "CoreMotion", "CoreML", "CoreBluetooth", "CoreAudio",
    "CoreMedia", "CoreVideo", "CoreHaptics", "CoreNFC", "CoreSpotlight", "CoreTelephony",
    "AVFoundation", "AVKit", "MapKit", "WebKit", "StoreKit", "Photos", "PhotosUI", "Contacts",
    "EventKit", "HealthKit", "HomeKit", "CloudKit", "GameplayKit", "SpriteKit", "SceneKit", "ARKit",
    "Metal", "MetalKit", "Vision", "Speech", "Network", "CryptoKit", "Accelerate", "QuartzCore",
    "SafariServices", "MessageUI", "UserNotifications", "LocalAuthentication",
    "AuthenticationServices", "PassKit", "PushKit", "CallKit", "Intents", "WatchKit",
    "WatchConnectivity", "XCTest", "Alamofire", "Kingfisher", "SnapKit", "RxSwift", "RealmSwift",
    "Realm", "Firebase", "FirebaseAuth", "FirebaseFirestore", "FirebaseMessaging", "Lottie",
    "SwiftyJSON", "Moya", "PromiseKit", "SDWebImage", "Charts", "Hero", "IQKeyboardManager",
];

/// Framework-reserved lifecycle symbols
pub const RESERVED_NAMES: &[&str] = &[
    "AppDelegate", "SceneDelegate", "ContentState", "ContentView", "main", "Package",
];

static OBJC_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@objc\(\s*([A-Za-z_][A-Za-z0-9_:]*)\s*\)").expect("objc pattern compiles"));

static CLASS_FROM_STRING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"NSClassFromString\(\s*"(?:[A-Za-z_][A-Za-z0-9_]*\.)?([A-Za-z_][A-Za-z0-9_]*)"\s*\)"#)
        .expect("class lookup pattern compiles")
});

static ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([A-Za-z_][A-Za-z0-9_]*)").expect("attribute pattern compiles"));

static TYPEALIAS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\btypealias\s+([A-Za-z_][A-Za-z0-9_]*)[^=\n]*=\s*([^\n;]+)")
        .expect("typealias pattern compiles")
});

static IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:@[A-Za-z_]+\s+)*import\s+(?:(?:class|struct|enum|protocol|func|var|let|typealias)\s+)?([A-Za-z_][A-Za-z0-9_]*)")
        .expect("import pattern compiles")
});

static WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("word pattern compiles"));

/// Names no rename may touch; computed once per run before any map is built
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    names: HashSet<String>,
}

impl ExclusionSet {
    /// Fixed builtin, framework and lifecycle names only
    pub fn builtin() -> Self {
        let names = BUILT_IN_TYPES
            .iter()
            .chain(FRAMEWORKS)
            .chain(RESERVED_NAMES)
            .map(|s| s.to_string())
            .collect();
        Self { names }
    }

    /// Builtins plus every name the project exposes to reflective lookup,
    /// aliases or imports
    pub fn from_project(project: &Project) -> Self {
        let mut set = Self::builtin();
        for (_, text) in project.files_of(FileClass::Source) {
            set.scan_source(text);
        }
        set
    }

    fn scan_source(&mut self, text: &str) {
        let map = RegionMap::new(text);

        for caps in OBJC_NAME.captures_iter(text) {
            if let Some(name) = caps.get(1) {
                // selectors like `@objc(doThing:)` name a method, not a type
                let name = name.as_str().trim_end_matches(':');
                self.names.insert(name.split(':').next().unwrap_or(name).to_string());
            }
        }
        // the class name sits inside a literal, so no region check
        for caps in CLASS_FROM_STRING.captures_iter(text) {
            if let Some(name) = caps.get(1) {
                self.names.insert(name.as_str().to_string());
            }
        }
        for caps in ATTRIBUTE.captures_iter(text) {
            if let Some(name) = caps.get(1) {
                if map.is_code(name.start()) {
                    self.names.insert(name.as_str().to_string());
                }
            }
        }
        for caps in TYPEALIAS.captures_iter(text) {
            let (Some(alias), Some(target)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            if !map.is_code(alias.start()) {
                continue;
            }
            self.names.insert(alias.as_str().to_string());
            self.names
                .extend(WORD.find_iter(target.as_str()).map(|m| m.as_str().to_string()));
        }
        for caps in IMPORT.captures_iter(text) {
            if let Some(name) = caps.get(1) {
                if map.is_code(name.start()) {
                    self.names.insert(name.as_str().to_string());
                }
            }
        }
    }

    pub fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        !is_identifier(name) || self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_excluded() {
        let set = ExclusionSet::builtin();
        assert!(set.contains("String"));
        assert!(set.contains("UIKit"));
        assert!(set.contains("AppDelegate"));
        assert!(!set.contains("Helper"));
        assert!(set.contains("not-an-identifier"));
    }

    #[test]
    fn test_project_evidence_is_excluded() {
        let project = Project::from_files([(
            "App/A.swift",
            r#"import Lottie
@objc(LegacyWidget) class Widget: NSObject {}
typealias Completion = (ResultBox) -> Void
@Observed var model = Model()
let cls = NSClassFromString("MyApp.Dynamic")
let s = "@NotAnAttribute"
"#,
        )]);
        let set = ExclusionSet::from_project(&project);
        assert!(set.contains("Lottie"));
        assert!(set.contains("LegacyWidget"));
        assert!(set.contains("Completion"));
        assert!(set.contains("ResultBox"));
        assert!(set.contains("Observed"));
        assert!(set.contains("Dynamic"));
        assert!(!set.contains("NotAnAttribute"));
        assert!(!set.contains("Widget"));
        assert!(!set.contains("Model"));
    }
}
