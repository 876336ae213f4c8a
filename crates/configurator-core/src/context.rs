//! Session parameters ("session context") and their structural equality.
//!
//! Callers routinely rebuild these values on every render. Equality is
//! therefore defined field by field, with absent collections equal to empty
//! ones, so an equivalent value never looks like a change.

use crate::attribute::GlobalAttributeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where the configuration model comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConfigurationModelSource {
    #[serde(rename_all = "camelCase")]
    Channel {
        deployment_name: String,
        channel: String,
    },
    /// An inline model package, compared deeply.
    Package { package: serde_json::Value },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeRelation {
    pub attribute_id: GlobalAttributeId,
    pub decisions_to_respect: Vec<GlobalAttributeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AllowedRules {
    All,
    None,
    Specific { rules: Vec<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowedInExplain {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<AllowedRules>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub configuration_model_source: ConfigurationModelSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_relations: Option<Vec<AttributeRelation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_rule_parameters: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_in_explain: Option<AllowedInExplain>,
}

impl SessionContext {
    pub fn new(configuration_model_source: ConfigurationModelSource) -> Self {
        Self {
            configuration_model_source,
            attribute_relations: None,
            usage_rule_parameters: None,
            allowed_in_explain: None,
        }
    }

    /// Shorthand for a channel-based model source.
    pub fn channel(deployment_name: impl Into<String>, channel: impl Into<String>) -> Self {
        Self::new(ConfigurationModelSource::Channel {
            deployment_name: deployment_name.into(),
            channel: channel.into(),
        })
    }
}

impl PartialEq for AllowedRules {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::All, Self::All) | (Self::None, Self::None) => true,
            (Self::Specific { rules: a }, Self::Specific { rules: b }) => a == b,
            _ => false,
        }
    }
}

impl PartialEq for AllowedInExplain {
    fn eq(&self, other: &Self) -> bool {
        self.rules == other.rules
    }
}

impl PartialEq for SessionContext {
    fn eq(&self, other: &Self) -> bool {
        self.configuration_model_source == other.configuration_model_source
            && self.attribute_relations.as_deref().unwrap_or_default()
                == other.attribute_relations.as_deref().unwrap_or_default()
            && usage_rule_parameters_eq(&self.usage_rule_parameters, &other.usage_rule_parameters)
            && self.allowed_in_explain == other.allowed_in_explain
    }
}

fn usage_rule_parameters_eq(
    a: &Option<BTreeMap<String, String>>,
    b: &Option<BTreeMap<String, String>>,
) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        (Some(map), None) | (None, Some(map)) => map.is_empty(),
        (None, None) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fresh_but_equivalent_contexts_are_equal() {
        let a = SessionContext::channel("deployment", "release");
        let mut b = SessionContext::channel("deployment", "release");
        b.attribute_relations = Some(Vec::new());
        b.usage_rule_parameters = Some(BTreeMap::new());

        assert_eq!(a, b);
    }

    #[test]
    fn test_model_source_is_compared_deeply() {
        let a = SessionContext::new(ConfigurationModelSource::Package {
            package: json!({"root": "M1", "attributes": [1, 2]}),
        });
        let b = SessionContext::new(ConfigurationModelSource::Package {
            package: json!({"attributes": [1, 2], "root": "M1"}),
        });
        let c = SessionContext::new(ConfigurationModelSource::Package {
            package: json!({"root": "M2", "attributes": [1, 2]}),
        });

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_usage_rule_parameters_differ_when_non_empty() {
        let a = SessionContext::channel("d", "c");
        let mut b = a.clone();
        b.usage_rule_parameters = Some(BTreeMap::from([("region".to_string(), "eu".to_string())]));

        assert_ne!(a, b);
    }

    #[test]
    fn test_allowed_in_explain_rules() {
        let mut a = SessionContext::channel("d", "c");
        let mut b = a.clone();
        a.allowed_in_explain = Some(AllowedInExplain {
            rules: Some(AllowedRules::Specific {
                rules: vec!["R1".to_string()],
            }),
        });
        b.allowed_in_explain = Some(AllowedInExplain {
            rules: Some(AllowedRules::Specific {
                rules: vec!["R1".to_string()],
            }),
        });
        assert_eq!(a, b);

        b.allowed_in_explain = Some(AllowedInExplain {
            rules: Some(AllowedRules::All),
        });
        assert_ne!(a, b);
    }
}
