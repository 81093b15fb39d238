//! SwiftVeil Core Library
//!
//! Transformation engine for obfuscating Swift application projects:
//! - Lexical region map and structural scanner
//! - Project-wide identifier renaming across sources, nibs, plists and manifests
//! - Guard and for-in control-flow rewrites
//! - Noise file generation and comment annotation
//! - Pipeline orchestration with progress and cancellation

pub mod comments;
pub mod config;
pub mod control_flow;
pub mod enrich;
pub mod error;
pub mod lexical;
pub mod noise;
pub mod path_utils;
pub mod pipeline;
pub mod preprocess;
pub mod project;
pub mod rename;
pub mod scanner;

// Re-export commonly used types
pub use comments::{annotate, annotate_file};
pub use config::{EnrichmentConfig, PipelineConfig, CONFIG_FILE_NAME};
pub use enrich::{retry_accepted, EnrichError, Enricher, EnrichmentRequest, EnrichmentRole};
pub use error::{Error, Result};
pub use lexical::{token_stream, RegionKind, RegionMap};
pub use pipeline::{
    Phase, Pipeline, PipelineOutcome, PipelineReport, ProgressSink, Stage, StageReport,
    TracingProgress,
};
pub use project::{FileClass, Project, ProjectStore};
pub use rename::{
    collect_identifiers, DiscoveryOptions, ExclusionSet, Identifier, IdentifierKind, RenameMap,
    TypeKeyword,
};
pub use scanner::{scan, scan_from, Anchor, Construct, ConstructKind};
