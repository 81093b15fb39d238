//! Optional enrichment seam
//!
//! An [`Enricher`] proposes names or comments (typically backed by a language
//! model service living outside this crate). Every call goes through
//! [`retry_accepted`], and every response is validated; anything that fails
//! falls back to the deterministic path.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::lexical::is_identifier;
use crate::rename::map::RenameMap;
use crate::rename::names::NameGenerator;

/// What an enrichment request is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentRole {
    /// Input is a JSON list of names; output a JSON object old → new
    Naming,
    /// Input is one source file; output the same file with comments added
    Commenting,
}

#[derive(Debug, Clone)]
pub struct EnrichmentRequest {
    pub role: EnrichmentRole,
    pub temperature: f64,
    pub input: String,
}

#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    #[error("Enrichment service unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed enrichment response: {0}")]
    Malformed(String),
}

pub trait Enricher: Send + Sync {
    fn suggest(&self, request: &EnrichmentRequest) -> Result<String, EnrichError>;
}

/// Call `attempt` up to `max_tries` times and return the first result that
/// `accept` approves
pub fn retry_accepted<T>(
    max_tries: u32,
    mut attempt: impl FnMut(u32) -> Result<T, EnrichError>,
    mut accept: impl FnMut(&T) -> bool,
) -> Option<T> {
    for n in 1..=max_tries {
        match attempt(n) {
            Ok(value) if accept(&value) => return Some(value),
            Ok(_) => tracing::debug!("Enrichment attempt {} rejected", n),
            Err(e) => tracing::debug!("Enrichment attempt {} failed: {}", n, e),
        }
    }
    None
}

fn parse_names(response: &str) -> Result<HashMap<String, String>, EnrichError> {
    // tolerate prose or code fences around the object
    let start = response.find('{');
    let end = response.rfind('}');
    let body = match (start, end) {
        (Some(s), Some(e)) if s < e => &response[s..=e],
        _ => return Err(EnrichError::Malformed("no JSON object".to_string())),
    };
    serde_json::from_str(body).map_err(|e| EnrichError::Malformed(e.to_string()))
}

/// Ask the enricher for better names for every key of `map`. Suggestions
/// that are not identifiers, repeat, or collide with the vocabulary are
/// ignored; their deterministic names stay.
pub fn enrich_rename_map(
    map: &RenameMap,
    enricher: &dyn Enricher,
    temperature: f64,
    max_tries: u32,
    names: &mut NameGenerator<'_>,
) -> RenameMap {
    if map.is_empty() {
        return map.clone();
    }
    let old: Vec<&str> = map.keys().collect();
    let input = match serde_json::to_string(&old) {
        Ok(input) => input,
        Err(_) => return map.clone(),
    };
    let request = EnrichmentRequest {
        role: EnrichmentRole::Naming,
        temperature,
        input,
    };

    let suggested = retry_accepted(
        max_tries,
        |_| parse_names(&enricher.suggest(&request)?),
        |parsed| old.iter().any(|o| parsed.contains_key(*o)),
    );
    let Some(suggested) = suggested else {
        return map.clone();
    };

    let mut enriched: BTreeMap<&str, String> = BTreeMap::new();
    for (old_name, new_name) in map.iter() {
        let candidate = suggested
            .get(old_name)
            .filter(|s| is_identifier(s) && names.is_free(s) && !map.contains(s));
        match candidate {
            Some(s) => {
                names.reserve(s.clone());
                enriched.insert(old_name, s.clone());
            }
            None => {
                enriched.insert(old_name, new_name.to_string());
            }
        }
    }

    let mut out = RenameMap::new();
    for (old_name, new_name) in enriched {
        if !out.insert(old_name, new_name) {
            // a suggestion clashed with a deterministic name; keep the deterministic one
            if let Some(fallback) = map.get(old_name) {
                out.insert(old_name, fallback);
            }
        }
    }
    out
}
