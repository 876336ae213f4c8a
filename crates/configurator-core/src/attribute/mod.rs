//! Attribute domain: identities, keys, snapshots and queries over them.

mod id;
pub mod interpreter;
mod model;

pub use id::{AttributeKey, GlobalAttributeId};
pub use model::{
    Attribute, AttributeType, BooleanAttribute, Cardinality, ChoiceAttribute, ChoiceValue,
    ChoiceValueDecisionState, ComponentAttribute, ComponentDecisionState, Decision, DecisionKind,
    NumericAttribute, NumericRange,
};
