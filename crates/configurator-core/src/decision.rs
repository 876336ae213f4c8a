//! Decision payloads sent to a configuration session.

use crate::attribute::{
    ChoiceValueDecisionState, ComponentDecisionState, DecisionKind, GlobalAttributeId,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplicitChoiceDecision {
    pub attribute_id: GlobalAttributeId,
    pub choice_value_id: String,
    pub state: Option<ChoiceValueDecisionState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplicitNumericDecision {
    pub attribute_id: GlobalAttributeId,
    pub state: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplicitBooleanDecision {
    pub attribute_id: GlobalAttributeId,
    pub state: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplicitComponentDecision {
    pub attribute_id: GlobalAttributeId,
    pub state: Option<ComponentDecisionState>,
}

/// A decision made (or withdrawn, with a `None` state) by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExplicitDecision {
    Choice(ExplicitChoiceDecision),
    Numeric(ExplicitNumericDecision),
    Boolean(ExplicitBooleanDecision),
    Component(ExplicitComponentDecision),
}

impl ExplicitDecision {
    pub fn attribute_id(&self) -> &GlobalAttributeId {
        match self {
            Self::Choice(d) => &d.attribute_id,
            Self::Numeric(d) => &d.attribute_id,
            Self::Boolean(d) => &d.attribute_id,
            Self::Component(d) => &d.attribute_id,
        }
    }
}

/// How a batch of decisions treats the decisions already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MakeManyDecisionsMode {
    #[default]
    Default,
    KeepExistingDecisions,
    DropExistingDecisions,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MakeManyDecisionsResult {
    pub rejected_decisions: Vec<ExplicitDecision>,
}

/// A decision as reported back by the session, explicit or implied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectedDecision {
    pub kind: DecisionKind,
    pub decision: ExplicitDecision,
}

/// Which collected decisions a query or cell covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DecisionFilter {
    #[default]
    All,
    Explicit,
    Implicit,
}

impl DecisionFilter {
    pub fn kind(self) -> Option<DecisionKind> {
        match self {
            Self::All => None,
            Self::Explicit => Some(DecisionKind::Explicit),
            Self::Implicit => Some(DecisionKind::Implicit),
        }
    }

    pub fn matches(self, decision: &CollectedDecision) -> bool {
        self.kind().is_none_or(|kind| kind == decision.kind)
    }
}
