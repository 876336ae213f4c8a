use crate::attribute::{Attribute, AttributeKey, GlobalAttributeId};
use crate::decision::ExplicitDecision;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Immutable snapshot pushed by the session on every change.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub is_satisfied: bool,
    pub attributes: BTreeMap<AttributeKey, Attribute>,
}

impl Configuration {
    pub fn from_attributes(
        is_satisfied: bool,
        attributes: impl IntoIterator<Item = Attribute>,
    ) -> Self {
        Self {
            is_satisfied,
            attributes: attributes.into_iter().map(|a| (a.id().key(), a)).collect(),
        }
    }

    pub fn attribute(&self, id: &GlobalAttributeId) -> Option<&Attribute> {
        self.attributes.get(&id.key())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeChanges {
    pub added: Vec<Attribute>,
    pub changed: Vec<Attribute>,
    pub removed: Vec<GlobalAttributeId>,
}

/// Delta accompanying a configuration push.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationChanges {
    pub is_satisfied: Option<bool>,
    pub attributes: AttributeChanges,
}

impl ConfigurationChanges {
    pub fn is_empty(&self) -> bool {
        self.is_satisfied.is_none()
            && self.attributes.added.is_empty()
            && self.attributes.changed.is_empty()
            && self.attributes.removed.is_empty()
    }
}

/// Payload of a configuration-changed notification.
#[derive(Debug, Clone)]
pub struct ConfigurationUpdate {
    pub configuration: Arc<Configuration>,
    pub changes: ConfigurationChanges,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredConfiguration {
    pub schema_version: u32,
    pub decisions: Vec<ExplicitDecision>,
}
