//! Pipeline configuration loaded from swiftveil.toml

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pipeline::Stage;
use crate::rename::discover::{DiscoveryOptions, TypeKeyword};

pub const CONFIG_FILE_NAME: &str = "swiftveil.toml";

/// One switch per optional stage plus run-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Rewrite `guard` statements into negated `if` statements
    #[serde(default = "default_true")]
    pub condition_transformation: bool,
    /// Rewrite for-in loops into indexed while loops
    #[serde(default = "default_true")]
    pub loop_transformation: bool,
    /// Split functions into a forwarding wrapper and a private performing
    /// function plus a dummy function
    #[serde(default)]
    pub function_transformation: bool,
    #[serde(default = "default_true")]
    pub type_renaming: bool,
    /// Declaration keywords whose types get renamed
    #[serde(default = "default_types_to_rename")]
    pub types_to_rename: BTreeSet<TypeKeyword>,
    #[serde(default)]
    pub file_renaming: bool,
    #[serde(default)]
    pub image_renaming: bool,
    #[serde(default = "default_true")]
    pub variable_renaming: bool,
    /// Rename private functions within their own file
    #[serde(default)]
    pub function_renaming: bool,
    #[serde(default = "default_true")]
    pub comment_adding: bool,
    /// Strip comments and blank lines before any other stage
    #[serde(default = "default_true")]
    pub preprocess: bool,
    /// Noise files generated per real source file
    #[serde(default)]
    pub noise_file_count: usize,
    /// Fixed seed for reproducible runs; random when absent
    #[serde(default)]
    pub seed: Option<u64>,
    /// Worker threads; CPU count when absent
    #[serde(default)]
    pub workers: Option<usize>,
    /// Explicit stage order; the phase order must stay non-decreasing
    #[serde(default)]
    pub stage_order: Option<Vec<Stage>>,
    /// File names whose declarations are never renamed
    #[serde(default = "default_protected_files")]
    pub protected_files: Vec<String>,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            condition_transformation: true,
            loop_transformation: true,
            function_transformation: false,
            type_renaming: true,
            types_to_rename: default_types_to_rename(),
            file_renaming: false,
            image_renaming: false,
            variable_renaming: true,
            function_renaming: false,
            comment_adding: true,
            preprocess: true,
            noise_file_count: 0,
            seed: None,
            workers: None,
            stage_order: None,
            protected_files: default_protected_files(),
            enrichment: EnrichmentConfig::default(),
        }
    }
}

/// Sampling settings passed to an [`Enricher`](crate::enrich::Enricher)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(default = "default_rename_temperature")]
    pub rename_temperature: f64,
    #[serde(default = "default_max_tries")]
    pub rename_max_tries: u32,
    #[serde(default = "default_comment_temperature")]
    pub comment_temperature: f64,
    #[serde(default = "default_max_tries")]
    pub comment_max_tries: u32,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            rename_temperature: default_rename_temperature(),
            rename_max_tries: default_max_tries(),
            comment_temperature: default_comment_temperature(),
            comment_max_tries: default_max_tries(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_types_to_rename() -> BTreeSet<TypeKeyword> {
    [TypeKeyword::Struct, TypeKeyword::Enum, TypeKeyword::Protocol]
        .into_iter()
        .collect()
}

fn default_protected_files() -> Vec<String> {
    DiscoveryOptions::default().protected_files
}

fn default_rename_temperature() -> f64 {
    1.2
}

fn default_comment_temperature() -> f64 {
    1.0
}

fn default_max_tries() -> u32 {
    3
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    pub fn from_config_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load `swiftveil.toml` from `dir` when present, defaults otherwise
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::from_config_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            type_keywords: self.types_to_rename.clone(),
            protected_files: self.protected_files.clone(),
            file_renaming: self.file_renaming,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert!(config.condition_transformation);
        assert!(config.loop_transformation);
        assert!(config.type_renaming);
        assert!(config.variable_renaming);
        assert!(config.comment_adding);
        assert!(!config.file_renaming);
        assert!(!config.image_renaming);
        assert!(!config.function_transformation);
        assert_eq!(config.noise_file_count, 0);
        assert!(!config.types_to_rename.contains(&TypeKeyword::Class));
        assert_eq!(config.enrichment.rename_temperature, 1.2);
    }

    #[test]
    fn test_empty_file_equals_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_written_defaults_load_back() {
        let written = toml::to_string_pretty(&PipelineConfig::default()).unwrap();
        assert!(written.contains("[enrichment]"));
        assert_eq!(PipelineConfig::from_toml(&written).unwrap(), PipelineConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let config = PipelineConfig::from_toml(
            r#"
loop_transformation = false
types_to_rename = ["class", "struct"]
noise_file_count = 2
seed = 42

[enrichment]
comment_max_tries = 5
"#,
        )
        .unwrap();
        assert!(!config.loop_transformation);
        assert!(config.condition_transformation);
        assert!(config.types_to_rename.contains(&TypeKeyword::Class));
        assert!(!config.types_to_rename.contains(&TypeKeyword::Enum));
        assert_eq!(config.noise_file_count, 2);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.enrichment.comment_max_tries, 5);
        assert_eq!(config.enrichment.rename_max_tries, 3);
    }

    #[test]
    fn test_stage_order_parses() {
        let config = PipelineConfig::from_toml(
            r#"stage_order = ["preprocess", "loop_transform", "condition_transform", "type_rename"]"#,
        )
        .unwrap();
        let order = config.stage_order.unwrap();
        assert_eq!(order[1], Stage::LoopTransform);
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn test_invalid_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "noise_file_count = \"many\"").unwrap();
        let err = PipelineConfig::from_config_file(&path).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_from_dir_without_file() {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig::from_dir(dir.path()).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }
}
