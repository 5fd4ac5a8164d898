//! Side-channel registry of user-defined tag names.
//!
//! Custom tags have no dictionary entry, so their names are kept as a JSON object
//! (`{"65000": "Author", ...}`) in the value of a reserved primary-directory tag.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ExifError, Result};

/// Primary-directory tag that stores the registry JSON. Never surfaced as a regular tag.
pub const REGISTRY_TAG_ID: u16 = 64999;
/// First ID handed out to a new custom tag.
pub const CUSTOM_ID_FLOOR: u16 = 65000;

/// Mapping from custom tag ID to its user-assigned name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomTagRegistry {
    names: BTreeMap<u16, String>,
}

impl CustomTagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the raw value of the reserved slot.
    ///
    /// Malformed content never fails the caller: it is logged and yields an empty registry,
    /// so a corrupt slot cannot block decoding of the remaining tags.
    pub fn load(raw: &[u8]) -> Self {
        match Self::try_load(raw) {
            Ok(registry) => registry,
            Err(e) => {
                log::warn!("Ignoring custom tag registry in tag {REGISTRY_TAG_ID}: {e}");
                Self::default()
            }
        }
    }

    /// Strict variant of [`load`](Self::load).
    pub fn try_load(raw: &[u8]) -> Result<Self> {
        let end = raw.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
        let names: BTreeMap<u16, String> =
            serde_json::from_slice(&raw[..end]).map_err(ExifError::MalformedCustomRegistry)?;
        Ok(Self { names })
    }

    /// Serialize for the reserved slot; `None` means the slot should be removed.
    pub fn serialize(&self) -> Option<Vec<u8>> {
        if self.names.is_empty() {
            return None;
        }
        serde_json::to_vec(&self.names).ok()
    }

    pub fn name(&self, id: u16) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    pub fn id_of(&self, name: &str) -> Option<u16> {
        self.names
            .iter()
            .find_map(|(id, n)| (n == name).then_some(*id))
    }

    pub fn insert(&mut self, id: u16, name: impl Into<String>) {
        self.names.insert(id, name.into());
    }

    pub fn remove(&mut self, id: u16) -> Option<String> {
        self.names.remove(&id)
    }

    pub fn contains(&self, id: u16) -> bool {
        self.names.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &str)> {
        self.names.iter().map(|(id, n)| (*id, n.as_str()))
    }

    /// Drop mappings whose ID is no longer present; returns the removed names.
    pub fn retain_ids(&mut self, present: &BTreeSet<u16>) -> Vec<String> {
        let stale: Vec<u16> = self
            .names
            .keys()
            .filter(|id| !present.contains(id))
            .copied()
            .collect();
        stale.into_iter().filter_map(|id| self.names.remove(&id)).collect()
    }

    /// Lowest ID at or above [`CUSTOM_ID_FLOOR`] that is neither in `existing` nor bound
    /// to a name in this registry.
    pub fn allocate(&self, existing: &BTreeSet<u16>) -> Result<u16> {
        (CUSTOM_ID_FLOOR..=u16::MAX)
            .find(|id| !existing.contains(id) && !self.names.contains_key(id))
            .ok_or(ExifError::CustomIdsExhausted(CUSTOM_ID_FLOOR))
    }
}
