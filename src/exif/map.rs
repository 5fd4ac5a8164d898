use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::tags::{Directory, QualifiedId};
use super::tiff::TagFormat;
use super::value::TagValue;

/// One decoded tag.
#[derive(Debug, Clone, PartialEq)]
pub struct TagEntry {
    pub directory: Directory,
    pub id: u16,
    pub name: String,
    /// Field format on the wire; re-used when the entry is encoded again.
    pub format: TagFormat,
    pub value: TagValue,
}

impl TagEntry {
    pub fn qualified_id(&self) -> QualifiedId {
        QualifiedId::new(self.directory, self.id)
    }
}

/// Flat presentation record: `{tag_name, tag_id, value}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagRecord {
    pub tag_name: String,
    pub tag_id: String,
    pub value: String,
}

/// Tags keyed by resolved name, in decode (then insertion) order.
///
/// Names are unique; a `(directory, id)` pair appears at most once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagMap {
    entries: Vec<TagEntry>,
}

impl TagMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TagEntry> {
        self.entries.iter()
    }

    pub fn get(&self, name: &str) -> Option<&TagEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn get_by_id(&self, qid: QualifiedId) -> Option<&TagEntry> {
        self.entries.iter().find(|e| e.qualified_id() == qid)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert or replace. An existing entry with the same name or the same
    /// qualified ID is overwritten in place; otherwise the entry is appended.
    pub fn insert(&mut self, entry: TagEntry) {
        let qid = entry.qualified_id();
        self.entries
            .retain(|e| !(e.qualified_id() == qid && e.name != entry.name));
        match self.entries.iter_mut().find(|e| e.name == entry.name) {
            Some(slot) => *slot = entry,
            None => self.entries.push(entry),
        }
    }

    /// Re-key the entry called `name`, keeping its position.
    pub(crate) fn rename(&mut self, name: &str, new_name: String) -> bool {
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => {
                entry.name = new_name;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<TagEntry> {
        let pos = self.entries.iter().position(|e| e.name == name)?;
        Some(self.entries.remove(pos))
    }

    pub fn remove_by_id(&mut self, qid: QualifiedId) -> Option<TagEntry> {
        let pos = self.entries.iter().position(|e| e.qualified_id() == qid)?;
        Some(self.entries.remove(pos))
    }

    /// Qualified ID of a named tag.
    pub fn qualified_id(&self, name: &str) -> Option<QualifiedId> {
        self.get(name).map(TagEntry::qualified_id)
    }

    /// Name → qualified ID lookup table, parallel to the map.
    pub fn id_table(&self) -> BTreeMap<String, QualifiedId> {
        self.entries
            .iter()
            .map(|e| (e.name.clone(), e.qualified_id()))
            .collect()
    }

    /// Name → display value.
    pub fn values(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|e| (e.name.clone(), e.value.to_string()))
            .collect()
    }

    pub fn records(&self) -> Vec<TagRecord> {
        self.entries
            .iter()
            .map(|e| TagRecord {
                tag_name: e.name.clone(),
                tag_id: e.qualified_id().to_string(),
                value: e.value.to_string(),
            })
            .collect()
    }

    pub fn ids_in(&self, directory: Directory) -> BTreeSet<u16> {
        self.entries
            .iter()
            .filter(|e| e.directory == directory)
            .map(|e| e.id)
            .collect()
    }

    pub fn in_directory(&self, directory: Directory) -> impl Iterator<Item = &TagEntry> {
        self.entries.iter().filter(move |e| e.directory == directory)
    }
}
