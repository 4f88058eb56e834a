//! Closed membership table mapping peer identities to elevator slots.

use std::collections::HashMap;

use anyhow::bail;

use crate::config;

/// Fixed table from peer identity to elevator slot index.
///
/// Built once at startup. Identities not in the table are treated as noise by the peer watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRegistry {
    slots: HashMap<String, usize>,
    identities: Vec<String>,
}

impl PeerRegistry {
    /// Builds a registry where the identity at index `i` owns slot `i`.
    ///
    /// Fails on empty or duplicate identities, since either would make the lookup ambiguous.
    pub fn from_identities<I, S>(identities: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let identities: Vec<String> = identities.into_iter().map(Into::into).collect();
        let mut slots = HashMap::with_capacity(identities.len());

        for (slot, id) in identities.iter().enumerate() {
            if id.is_empty() {
                bail!("Identity for slot {} is empty", slot);
            }
            if let Some(prev) = slots.insert(id.clone(), slot) {
                bail!("Identity {:?} is registered for both slot {} and {}", id, prev, slot);
            }
        }
        if identities.is_empty() {
            bail!("Registry needs at least one identity");
        }

        Ok(Self { slots, identities })
    }

    /// Slot owned by `id`, if `id` is a member.
    pub fn slot_of(&self, id: &str) -> Option<usize> {
        self.slots.get(id).copied()
    }

    /// Identity registered for `slot`.
    pub fn identity_of(&self, slot: usize) -> Option<&str> {
        self.identities.get(slot).map(String::as_str)
    }

    /// Number of registered identities.
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    /// Always false for a constructed registry.
    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

impl Default for PeerRegistry {
    fn default() -> Self {
        let identities: Vec<String> = config::DEFAULT_IDENTITIES.iter().map(|s| s.to_string()).collect();
        let slots = identities
            .iter()
            .enumerate()
            .map(|(slot, id)| (id.clone(), slot))
            .collect();
        Self { slots, identities }
    }
}
