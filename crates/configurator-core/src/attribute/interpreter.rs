//! Read-only queries over attribute snapshots.

use super::id::GlobalAttributeId;
use super::model::{
    Attribute, BooleanAttribute, ChoiceAttribute, ChoiceValue, ChoiceValueDecisionState,
    ComponentAttribute, NumericAttribute,
};
use crate::decision::{
    ExplicitBooleanDecision, ExplicitChoiceDecision, ExplicitComponentDecision, ExplicitDecision,
    ExplicitNumericDecision,
};

/// An attribute is mandatory when leaving it undecided can keep the
/// configuration from being satisfied.
pub fn is_mandatory(attribute: &Attribute) -> bool {
    attribute.can_contribute_to_configuration_satisfaction()
}

pub fn is_multi_select(attribute: &ChoiceAttribute) -> bool {
    attribute.cardinality.upper_bound > 1
}

pub fn is_choice_value_allowed(value: &ChoiceValue) -> bool {
    value
        .possible_decision_states
        .contains(&ChoiceValueDecisionState::Included)
}

pub fn is_choice_value_blocked(value: &ChoiceValue) -> bool {
    !is_choice_value_allowed(value)
}

pub fn is_choice_value_included(value: &ChoiceValue) -> bool {
    value
        .decision
        .as_ref()
        .is_some_and(|d| d.state == ChoiceValueDecisionState::Included)
}

pub fn allowed_choice_values(attribute: &ChoiceAttribute) -> Vec<ChoiceValue> {
    filter_values(attribute, is_choice_value_allowed)
}

pub fn blocked_choice_values(attribute: &ChoiceAttribute) -> Vec<ChoiceValue> {
    filter_values(attribute, is_choice_value_blocked)
}

pub fn included_choice_values(attribute: &ChoiceAttribute) -> Vec<ChoiceValue> {
    filter_values(attribute, is_choice_value_included)
}

fn filter_values(
    attribute: &ChoiceAttribute,
    predicate: fn(&ChoiceValue) -> bool,
) -> Vec<ChoiceValue> {
    attribute.values.iter().filter(|v| predicate(v)).cloned().collect()
}

/// Whether `candidate` lives below the component `parent`.
///
/// Descendants belong to the same shared model and their component path
/// starts with the parent's path followed by the parent's local id.
pub fn is_in_component_subtree(parent: &GlobalAttributeId, candidate: &GlobalAttributeId) -> bool {
    if candidate.shared_configuration_model_id != parent.shared_configuration_model_id {
        return false;
    }
    let prefix = parent.child_path();
    candidate.component_path.starts_with(&prefix)
}

/// Attributes of the recursive subtree of `parent`.
pub fn attributes_of_component<'a, I>(
    parent: &GlobalAttributeId,
    attributes: I,
    include_nested: bool,
) -> Vec<&'a Attribute>
where
    I: IntoIterator<Item = &'a Attribute>,
{
    let depth = parent.component_path.len() + 1;
    attributes
        .into_iter()
        .filter(|a| is_in_component_subtree(parent, a.id()))
        .filter(|a| include_nested || a.id().component_path.len() == depth)
        .collect()
}

/// Withdrawals for every explicit decision held by values of `attribute`.
pub fn choice_reset_decisions(attribute: &ChoiceAttribute) -> Vec<ExplicitDecision> {
    attribute
        .values
        .iter()
        .filter(|v| v.decision.as_ref().is_some_and(|d| d.is_explicit()))
        .map(|v| {
            ExplicitDecision::Choice(ExplicitChoiceDecision {
                attribute_id: attribute.id.clone(),
                choice_value_id: v.id.clone(),
                state: None,
            })
        })
        .collect()
}

fn numeric_reset_decision(attribute: &NumericAttribute) -> Option<ExplicitDecision> {
    attribute.decision.as_ref().filter(|d| d.is_explicit()).map(|_| {
        ExplicitDecision::Numeric(ExplicitNumericDecision {
            attribute_id: attribute.id.clone(),
            state: None,
        })
    })
}

fn boolean_reset_decision(attribute: &BooleanAttribute) -> Option<ExplicitDecision> {
    attribute.decision.as_ref().filter(|d| d.is_explicit()).map(|_| {
        ExplicitDecision::Boolean(ExplicitBooleanDecision {
            attribute_id: attribute.id.clone(),
            state: None,
        })
    })
}

fn component_reset_decision(attribute: &ComponentAttribute) -> Option<ExplicitDecision> {
    attribute.decision.as_ref().filter(|d| d.is_explicit()).map(|_| {
        ExplicitDecision::Component(ExplicitComponentDecision {
            attribute_id: attribute.id.clone(),
            state: None,
        })
    })
}

/// Withdrawals for every explicit decision in the subtree of `parent`,
/// the parent itself excluded.
pub fn component_subtree_reset_decisions<'a, I>(
    parent: &GlobalAttributeId,
    attributes: I,
) -> Vec<ExplicitDecision>
where
    I: IntoIterator<Item = &'a Attribute>,
{
    attributes_of_component(parent, attributes, true)
        .into_iter()
        .flat_map(|attribute| match attribute {
            Attribute::Choice(a) => choice_reset_decisions(a),
            Attribute::Numeric(a) => numeric_reset_decision(a).into_iter().collect(),
            Attribute::Boolean(a) => boolean_reset_decision(a).into_iter().collect(),
            Attribute::Component(a) => component_reset_decision(a).into_iter().collect(),
        })
        .collect()
}
