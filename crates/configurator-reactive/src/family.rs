//! Keyed member cache with explicit garbage collection.

use configurator_core::attribute::AttributeKey;
use parking_lot::Mutex;
use std::collections::HashMap;

/// One member per attribute key, created on first access.
///
/// Members live until removed; [`Family::retain`] is what the periodic
/// sweep uses to drop members whose attribute went away.
pub struct Family<M> {
    members: Mutex<HashMap<AttributeKey, M>>,
}

impl<M: Clone> Family<M> {
    pub fn new() -> Self {
        Self {
            members: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_or_create(&self, key: &AttributeKey, create: impl FnOnce() -> M) -> M {
        self.members.lock().entry(key.clone()).or_insert_with(create).clone()
    }

    pub fn contains(&self, key: &AttributeKey) -> bool {
        self.members.lock().contains_key(key)
    }

    pub fn remove(&self, key: &AttributeKey) -> Option<M> {
        self.members.lock().remove(key)
    }

    pub fn len(&self) -> usize {
        self.members.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.lock().is_empty()
    }

    /// Keeps members whose key passes `keep`. Returns how many were removed.
    pub fn retain(&self, mut keep: impl FnMut(&AttributeKey) -> bool) -> usize {
        let mut members = self.members.lock();
        let before = members.len();
        members.retain(|key, _| keep(key));
        before - members.len()
    }
}

impl<M: Clone> Default for Family<M> {
    fn default() -> Self {
        Self::new()
    }
}
