//! Attribute-by-key registry.
//!
//! One cell per attribute key. Removed attributes are cleared, not
//! deleted, so a key that once existed keeps its cell for the lifetime of
//! the registry. A fresh registry is built for every session.

use crate::cell::{Cell, Revision};
use configurator_core::attribute::{Attribute, AttributeKey};
use configurator_core::configuration::{AttributeChanges, Configuration};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_VERSION: AtomicU64 = AtomicU64::new(1);

/// An attribute snapshot with a process-unique version stamp.
///
/// Two entries with the same version are the same snapshot instance.
#[derive(Debug, Clone)]
pub struct VersionedAttribute {
    pub attribute: Arc<Attribute>,
    pub version: u64,
}

impl VersionedAttribute {
    fn new(attribute: Attribute) -> Self {
        Self {
            attribute: Arc::new(attribute),
            version: NEXT_VERSION.fetch_add(1, Ordering::Relaxed),
        }
    }
}

type Slot = Cell<Option<VersionedAttribute>>;

pub struct AttributeRegistry {
    revision: Revision,
    slots: RwLock<BTreeMap<AttributeKey, Slot>>,
}

impl AttributeRegistry {
    pub fn from_configuration(revision: &Revision, configuration: &Configuration) -> Self {
        let slots = configuration
            .attributes
            .iter()
            .map(|(key, attribute)| {
                (
                    key.clone(),
                    Cell::new(revision, Some(VersionedAttribute::new(attribute.clone()))),
                )
            })
            .collect();
        Self {
            revision: revision.clone(),
            slots: RwLock::new(slots),
        }
    }

    pub fn get(&self, key: &AttributeKey) -> Option<VersionedAttribute> {
        self.slots.read().get(key).and_then(Cell::get)
    }

    pub fn contains(&self, key: &AttributeKey) -> bool {
        self.get(key).is_some()
    }

    /// Keys of the attributes currently present, in key order.
    pub fn keys(&self) -> Vec<AttributeKey> {
        self.slots
            .read()
            .iter()
            .filter(|(_, slot)| slot.get().is_some())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Attributes currently present, in key order.
    pub fn attributes(&self) -> Vec<Arc<Attribute>> {
        self.slots
            .read()
            .values()
            .filter_map(|slot| slot.get().map(|entry| entry.attribute))
            .collect()
    }

    /// Number of slots, cleared ones included.
    pub fn slot_count(&self) -> usize {
        self.slots.read().len()
    }

    pub fn apply(&self, changes: &AttributeChanges) {
        for attribute in changes.added.iter().chain(&changes.changed) {
            let key = attribute.id().key();
            let entry = Some(VersionedAttribute::new(attribute.clone()));
            let existing = self.slots.read().get(&key).cloned();
            match existing {
                Some(slot) => slot.set(entry),
                None => {
                    self.slots.write().insert(key, Cell::new(&self.revision, entry));
                    self.revision.bump();
                }
            }
        }
        for id in &changes.removed {
            let slot = self.slots.read().get(&id.key()).cloned();
            if let Some(slot) = slot {
                slot.set(None);
            }
        }
    }
}
