//! Identifier rename engine
//!
//! Discovery and map construction run project-wide before anything is
//! rewritten; application then fans out per file with the map shared
//! read-only.

pub mod apply;
pub mod discover;
pub mod exclusions;
pub mod functions;
pub mod map;
pub mod names;
pub mod variables;

pub use apply::{apply, apply_file_renames, apply_image_renames, declared_types};
pub use discover::{
    collect_identifiers, DiscoveryOptions, Identifier, IdentifierKind, TypeKeyword,
};
pub use exclusions::ExclusionSet;
pub use functions::rename_functions;
pub use map::{build_rename_map, RenameMap};
pub use names::{NameGenerator, NameRole};
pub use variables::rename_variables;
