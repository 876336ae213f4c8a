use super::id::GlobalAttributeId;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum AttributeType {
    Choice,
    Numeric,
    Boolean,
    Component,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum DecisionKind {
    Explicit,
    Implicit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision<T> {
    pub state: T,
    pub kind: DecisionKind,
}

impl<T> Decision<T> {
    pub fn explicit(state: T) -> Self {
        Self {
            state,
            kind: DecisionKind::Explicit,
        }
    }

    pub fn implicit(state: T) -> Self {
        Self {
            state,
            kind: DecisionKind::Implicit,
        }
    }

    pub fn is_explicit(&self) -> bool {
        self.kind == DecisionKind::Explicit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum ChoiceValueDecisionState {
    Included,
    Excluded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum ComponentDecisionState {
    Included,
    Excluded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cardinality {
    pub lower_bound: u32,
    pub upper_bound: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceValue {
    pub id: String,
    pub decision: Option<Decision<ChoiceValueDecisionState>>,
    pub possible_decision_states: Vec<ChoiceValueDecisionState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceAttribute {
    pub id: GlobalAttributeId,
    pub is_satisfied: bool,
    pub can_contribute_to_configuration_satisfaction: bool,
    pub cardinality: Cardinality,
    pub values: Vec<ChoiceValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericAttribute {
    pub id: GlobalAttributeId,
    pub is_satisfied: bool,
    pub can_contribute_to_configuration_satisfaction: bool,
    pub decision: Option<Decision<f64>>,
    pub range: NumericRange,
    pub decimal_places: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooleanAttribute {
    pub id: GlobalAttributeId,
    pub is_satisfied: bool,
    pub can_contribute_to_configuration_satisfaction: bool,
    pub decision: Option<Decision<bool>>,
    pub possible_decision_states: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentAttribute {
    pub id: GlobalAttributeId,
    pub is_satisfied: bool,
    pub can_contribute_to_configuration_satisfaction: bool,
    pub decision: Option<Decision<ComponentDecisionState>>,
    pub possible_decision_states: Vec<ComponentDecisionState>,
}

/// One attribute of a configuration snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Attribute {
    Choice(ChoiceAttribute),
    Numeric(NumericAttribute),
    Boolean(BooleanAttribute),
    Component(ComponentAttribute),
}

impl Attribute {
    pub fn id(&self) -> &GlobalAttributeId {
        match self {
            Self::Choice(a) => &a.id,
            Self::Numeric(a) => &a.id,
            Self::Boolean(a) => &a.id,
            Self::Component(a) => &a.id,
        }
    }

    pub fn attribute_type(&self) -> AttributeType {
        match self {
            Self::Choice(_) => AttributeType::Choice,
            Self::Numeric(_) => AttributeType::Numeric,
            Self::Boolean(_) => AttributeType::Boolean,
            Self::Component(_) => AttributeType::Component,
        }
    }

    pub fn is_satisfied(&self) -> bool {
        match self {
            Self::Choice(a) => a.is_satisfied,
            Self::Numeric(a) => a.is_satisfied,
            Self::Boolean(a) => a.is_satisfied,
            Self::Component(a) => a.is_satisfied,
        }
    }

    pub fn can_contribute_to_configuration_satisfaction(&self) -> bool {
        match self {
            Self::Choice(a) => a.can_contribute_to_configuration_satisfaction,
            Self::Numeric(a) => a.can_contribute_to_configuration_satisfaction,
            Self::Boolean(a) => a.can_contribute_to_configuration_satisfaction,
            Self::Component(a) => a.can_contribute_to_configuration_satisfaction,
        }
    }

    pub fn as_choice(&self) -> Option<&ChoiceAttribute> {
        match self {
            Self::Choice(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_numeric(&self) -> Option<&NumericAttribute> {
        match self {
            Self::Numeric(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<&BooleanAttribute> {
        match self {
            Self::Boolean(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_component(&self) -> Option<&ComponentAttribute> {
        match self {
            Self::Component(a) => Some(a),
            _ => None,
        }
    }
}
