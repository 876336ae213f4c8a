//! Attribute identity and the string key derived from it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structural identity of an attribute.
///
/// Attributes nested inside components carry the local ids of their
/// ancestor components in `component_path`. Attributes of a shared
/// configuration model also carry that model's id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalAttributeId {
    pub local_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub component_path: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_configuration_model_id: Option<String>,
}

impl GlobalAttributeId {
    /// A top-level attribute of the root model.
    pub fn new(local_id: impl Into<String>) -> Self {
        Self {
            local_id: local_id.into(),
            component_path: Vec::new(),
            shared_configuration_model_id: None,
        }
    }

    pub fn with_component_path<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.component_path = path.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_shared_model(mut self, shared_configuration_model_id: impl Into<String>) -> Self {
        self.shared_configuration_model_id = Some(shared_configuration_model_id.into());
        self
    }

    /// Path a child of this attribute carries: own path plus own local id.
    pub fn child_path(&self) -> Vec<String> {
        let mut path = self.component_path.clone();
        path.push(self.local_id.clone());
        path
    }

    pub fn key(&self) -> AttributeKey {
        AttributeKey::from(self)
    }
}

/// Addressing key for every per-attribute cell.
///
/// Segments are escaped (`\`, `:` and `@`) and joined with `::`. A shared
/// model id is written first as `@<id>`. The encoding is injective: two
/// identities produce the same key only when they are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeKey(String);

impl AttributeKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn push_escaped(out: &mut String, segment: &str) {
    for c in segment.chars() {
        if matches!(c, '\\' | ':' | '@') {
            out.push('\\');
        }
        out.push(c);
    }
}

impl From<&GlobalAttributeId> for AttributeKey {
    fn from(id: &GlobalAttributeId) -> Self {
        let mut key = String::new();
        if let Some(shared) = &id.shared_configuration_model_id {
            key.push('@');
            push_escaped(&mut key, shared);
            key.push_str("::");
        }
        for segment in &id.component_path {
            push_escaped(&mut key, segment);
            key.push_str("::");
        }
        push_escaped(&mut key, &id.local_id);
        Self(key)
    }
}

impl From<GlobalAttributeId> for AttributeKey {
    fn from(id: GlobalAttributeId) -> Self {
        Self::from(&id)
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
