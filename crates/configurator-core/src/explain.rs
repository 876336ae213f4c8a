//! Explain questions and answers.

use crate::attribute::{ChoiceValueDecisionState, ComponentDecisionState, GlobalAttributeId};
use crate::decision::{ExplicitDecision, MakeManyDecisionsMode};
use crate::error::{ConfiguratorError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExplainQuestionType {
    WhyIsNotSatisfied,
    WhyIsStateNotPossible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExplainQuestionSubject {
    Configuration,
    Attribute,
    ChoiceValue,
    Numeric,
    Boolean,
    Component,
}

/// The state a "why is this state not possible" question asks about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExplainState {
    ChoiceValue(ChoiceValueState),
    Numeric(f64),
    Boolean(bool),
    Component(ComponentDecisionState),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceValueState {
    pub choice_value_id: String,
    pub state: ChoiceValueDecisionState,
}

/// A fully specified question as the session receives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainQuestion {
    pub question: ExplainQuestionType,
    pub subject: ExplainQuestionSubject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_id: Option<GlobalAttributeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ExplainState>,
}

impl ExplainQuestion {
    /// Why the configuration as a whole is not satisfied.
    pub fn why_is_configuration_not_satisfied() -> Self {
        Self {
            question: ExplainQuestionType::WhyIsNotSatisfied,
            subject: ExplainQuestionSubject::Configuration,
            attribute_id: None,
            state: None,
        }
    }
}

/// A question about one attribute, before the attribute id and subject
/// are filled in. `S` is the state type of the attribute variant.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeQuestion<S> {
    WhyIsNotSatisfied,
    WhyIsStateNotPossible(S),
}

/// Which parts of an explanation the caller wants back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AnswerShape {
    Decisions,
    Constraints,
    Full,
}

impl AnswerShape {
    /// Parses `decisions`, `constraints` or `full`; anything else is an error.
    pub fn parse(shape: &str) -> Result<Self> {
        Self::from_str(shape).map_err(|_| ConfiguratorError::unknown_answer_shape(shape))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainSolution {
    pub decisions: Vec<ExplicitDecision>,
    pub mode: MakeManyDecisionsMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionExplanation {
    pub caused_by_decisions: Vec<ExplicitDecision>,
    pub solution: Option<ExplainSolution>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintExplanation {
    pub caused_by_cardinalities: Vec<GlobalAttributeId>,
    pub caused_by_rules: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum ExplainAnswer {
    Decisions {
        decision_explanations: Vec<DecisionExplanation>,
    },
    Constraints {
        constraint_explanations: Vec<ConstraintExplanation>,
    },
    Full {
        decision_explanations: Vec<DecisionExplanation>,
        constraint_explanations: Vec<ConstraintExplanation>,
    },
}

impl ExplainAnswer {
    pub fn shape(&self) -> AnswerShape {
        match self {
            Self::Decisions { .. } => AnswerShape::Decisions,
            Self::Constraints { .. } => AnswerShape::Constraints,
            Self::Full { .. } => AnswerShape::Full,
        }
    }
}
