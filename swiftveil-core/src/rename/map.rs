//! Immutable old → new name mapping

use std::collections::{BTreeMap, HashSet};

use super::discover::Identifier;
use super::names::{NameGenerator, NameRole};

/// Old → new names. No two old names share a new name, and no new name is
/// also an old name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameMap {
    entries: BTreeMap<String, String>,
    targets: HashSet<String>,
}

impl RenameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pair, refusing anything that would break injectivity
    pub fn insert(&mut self, old: impl Into<String>, new: impl Into<String>) -> bool {
        let old = old.into();
        let new = new.into();
        if old == new
            || self.entries.contains_key(&old)
            || self.entries.contains_key(&new)
            || self.targets.contains(&new)
            || self.targets.contains(&old)
        {
            return false;
        }
        self.targets.insert(new.clone());
        self.entries.insert(old, new);
        true
    }

    pub fn get(&self, old: &str) -> Option<&str> {
        self.entries.get(old).map(String::as_str)
    }

    pub fn contains(&self, old: &str) -> bool {
        self.entries.contains_key(old)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(o, n)| (o.as_str(), n.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Drop entries whose old name fails `keep`
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &str) -> bool) {
        let targets = &mut self.targets;
        self.entries.retain(|old, new| {
            let kept = keep(old, new);
            if !kept {
                targets.remove(new.as_str());
            }
            kept
        });
    }
}

/// Build a map for `identifiers`, one fresh name each. Identifiers the
/// generator cannot serve stay unrenamed.
pub fn build_rename_map<'a>(
    identifiers: impl IntoIterator<Item = &'a Identifier>,
    role: NameRole,
    names: &mut NameGenerator<'_>,
) -> RenameMap {
    let mut map = RenameMap::new();
    for id in identifiers {
        if map.contains(&id.name) {
            continue;
        }
        match names.fresh(role, Some(&id.name)) {
            Some(new) => {
                map.insert(id.name.clone(), new);
            }
            None => tracing::warn!("No free name for {}; leaving it unrenamed", id.name),
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rename::discover::IdentifierKind;

    #[test]
    fn test_insert_refuses_collisions() {
        let mut map = RenameMap::new();
        assert!(map.insert("Helper", "TypeCacheHelper"));
        assert!(!map.insert("Other", "TypeCacheHelper"));
        assert!(!map.insert("Helper", "TypeLoaderHelper"));
        assert!(!map.insert("TypeCacheHelper", "X"));
        assert!(!map.insert("Y", "Helper"));
        assert!(!map.insert("Same", "Same"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_build_rename_map_is_injective() {
        let ids: Vec<Identifier> = ["Helper", "HelperView", "Item", "Helper"]
            .iter()
            .map(|n| Identifier::new(*n, IdentifierKind::Type))
            .collect();
        let vocab: HashSet<String> = ids.iter().map(|i| i.name.clone()).collect();
        let mut names = NameGenerator::new(&vocab, 3);
        let map = build_rename_map(&ids, NameRole::Type, &mut names);
        assert_eq!(map.len(), 3);
        let values: HashSet<&str> = map.iter().map(|(_, n)| n).collect();
        assert_eq!(values.len(), 3);
        assert!(values.iter().all(|v| !vocab.contains(*v)));
    }

    #[test]
    fn test_retain_releases_targets() {
        let mut map = RenameMap::new();
        map.insert("A", "B");
        map.retain(|old, _| old != "A");
        assert!(map.insert("C", "B"));
    }
}
