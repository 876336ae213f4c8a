//! Per-attribute projection.
//!
//! An [`AttributeMember`] is a guarded cell keyed by attribute key. Its
//! value is the typed [`AttributeView`] of the attribute, or `None` when
//! the key is absent or names a different variant. `None` is a settled
//! answer: the member only reads as uninitialized while the graph itself
//! is.
//!
//! Views are cached per (snapshot version, session) pair, so the memoized
//! queries of a view survive every recomputation that did not touch the
//! attribute.

use crate::commands::{ExplainCommands, MakeDecisionCommands};
use crate::derived::Derived;
use crate::family::Family;
use crate::graph::Selectors;
use crate::registry::AttributeRegistry;
use crate::suspend::Suspended;
use configurator_core::Result;
use configurator_core::attribute::interpreter;
use configurator_core::attribute::{
    Attribute, AttributeKey, BooleanAttribute, ChoiceAttribute, ChoiceValue,
    ChoiceValueDecisionState, ComponentAttribute, ComponentDecisionState, GlobalAttributeId,
    NumericAttribute,
};
use configurator_core::decision::{
    ExplicitBooleanDecision, ExplicitChoiceDecision, ExplicitComponentDecision, ExplicitDecision,
    ExplicitNumericDecision, MakeManyDecisionsMode, MakeManyDecisionsResult,
};
use configurator_core::explain::{
    AnswerShape, AttributeQuestion, ChoiceValueState, ExplainAnswer, ExplainQuestion,
    ExplainQuestionSubject, ExplainQuestionType, ExplainSolution, ExplainState,
};
use configurator_core::session::same_handle;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// One attribute variant as the projection sees it.
pub trait AttributeVariant: Clone + Send + Sync + 'static {
    /// What a "why is this state not possible" question asks about.
    type State: Send;

    const SUBJECT: ExplainQuestionSubject;

    fn refine(attribute: &Attribute) -> Option<&Self>;

    fn id(&self) -> &GlobalAttributeId;

    fn explain_state(state: Self::State) -> ExplainState;

    fn family(families: &AttributeFamilies) -> &Family<AttributeMember<Self>>;
}

impl AttributeVariant for ChoiceAttribute {
    type State = ChoiceValueState;
    const SUBJECT: ExplainQuestionSubject = ExplainQuestionSubject::ChoiceValue;

    fn refine(attribute: &Attribute) -> Option<&Self> {
        attribute.as_choice()
    }

    fn id(&self) -> &GlobalAttributeId {
        &self.id
    }

    fn explain_state(state: Self::State) -> ExplainState {
        ExplainState::ChoiceValue(state)
    }

    fn family(families: &AttributeFamilies) -> &Family<AttributeMember<Self>> {
        &families.choice
    }
}

impl AttributeVariant for NumericAttribute {
    type State = f64;
    const SUBJECT: ExplainQuestionSubject = ExplainQuestionSubject::Numeric;

    fn refine(attribute: &Attribute) -> Option<&Self> {
        attribute.as_numeric()
    }

    fn id(&self) -> &GlobalAttributeId {
        &self.id
    }

    fn explain_state(state: Self::State) -> ExplainState {
        ExplainState::Numeric(state)
    }

    fn family(families: &AttributeFamilies) -> &Family<AttributeMember<Self>> {
        &families.numeric
    }
}

impl AttributeVariant for BooleanAttribute {
    type State = bool;
    const SUBJECT: ExplainQuestionSubject = ExplainQuestionSubject::Boolean;

    fn refine(attribute: &Attribute) -> Option<&Self> {
        attribute.as_boolean()
    }

    fn id(&self) -> &GlobalAttributeId {
        &self.id
    }

    fn explain_state(state: Self::State) -> ExplainState {
        ExplainState::Boolean(state)
    }

    fn family(families: &AttributeFamilies) -> &Family<AttributeMember<Self>> {
        &families.boolean
    }
}

impl AttributeVariant for ComponentAttribute {
    type State = ComponentDecisionState;
    const SUBJECT: ExplainQuestionSubject = ExplainQuestionSubject::Component;

    fn refine(attribute: &Attribute) -> Option<&Self> {
        attribute.as_component()
    }

    fn id(&self) -> &GlobalAttributeId {
        &self.id
    }

    fn explain_state(state: Self::State) -> ExplainState {
        ExplainState::Component(state)
    }

    fn family(families: &AttributeFamilies) -> &Family<AttributeMember<Self>> {
        &families.component
    }
}

#[derive(Default)]
struct ViewMemo {
    mandatory: OnceLock<bool>,
    multi_select: OnceLock<bool>,
    allowed: OnceLock<Vec<ChoiceValue>>,
    blocked: OnceLock<Vec<ChoiceValue>>,
    included: OnceLock<Vec<ChoiceValue>>,
}

/// An attribute snapshot bound to the commands of its session.
pub struct AttributeView<A> {
    attribute: Arc<A>,
    raw: Arc<Attribute>,
    version: u64,
    decisions: MakeDecisionCommands,
    explain: ExplainCommands,
    registry: Arc<AttributeRegistry>,
    memo: Arc<ViewMemo>,
}

pub type ChoiceAttributeView = AttributeView<ChoiceAttribute>;
pub type NumericAttributeView = AttributeView<NumericAttribute>;
pub type BooleanAttributeView = AttributeView<BooleanAttribute>;
pub type ComponentAttributeView = AttributeView<ComponentAttribute>;

impl<A> Clone for AttributeView<A> {
    fn clone(&self) -> Self {
        Self {
            attribute: self.attribute.clone(),
            raw: self.raw.clone(),
            version: self.version,
            decisions: self.decisions.clone(),
            explain: self.explain.clone(),
            registry: self.registry.clone(),
            memo: self.memo.clone(),
        }
    }
}

impl<A: fmt::Debug> fmt::Debug for AttributeView<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeView")
            .field("attribute", &self.attribute)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl<A: AttributeVariant> AttributeView<A> {
    /// The attribute snapshot.
    pub fn attribute(&self) -> &A {
        &self.attribute
    }

    pub fn id(&self) -> &GlobalAttributeId {
        self.attribute.id()
    }

    /// Version stamp of the snapshot this view was built from.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_mandatory(&self) -> bool {
        *self.memo.mandatory.get_or_init(|| interpreter::is_mandatory(&self.raw))
    }

    /// Explains a question about this attribute. The attribute id and the
    /// question subject are filled in here.
    pub async fn explain(
        &self,
        question: AttributeQuestion<A::State>,
        shape: AnswerShape,
    ) -> Result<ExplainAnswer> {
        self.explain.explain(self.question(question), shape).await
    }

    /// Like [`Self::explain`] with the answer shape given by name.
    pub async fn explain_as(
        &self,
        question: AttributeQuestion<A::State>,
        shape: &str,
    ) -> Result<ExplainAnswer> {
        let shape = AnswerShape::parse(shape)?;
        self.explain(question, shape).await
    }

    pub async fn apply_solution(
        &self,
        solution: ExplainSolution,
    ) -> Result<MakeManyDecisionsResult> {
        self.explain.apply_solution(solution).await
    }

    fn question(&self, question: AttributeQuestion<A::State>) -> ExplainQuestion {
        let (question, subject, state) = match question {
            AttributeQuestion::WhyIsNotSatisfied => {
                (ExplainQuestionType::WhyIsNotSatisfied, ExplainQuestionSubject::Attribute, None)
            }
            AttributeQuestion::WhyIsStateNotPossible(state) => (
                ExplainQuestionType::WhyIsStateNotPossible,
                A::SUBJECT,
                Some(A::explain_state(state)),
            ),
        };
        ExplainQuestion {
            question,
            subject,
            attribute_id: Some(self.id().clone()),
            state,
        }
    }

    async fn reset_batch(
        &self,
        decisions: Vec<ExplicitDecision>,
    ) -> Result<Option<MakeManyDecisionsResult>> {
        if decisions.is_empty() {
            debug!("[AttributeView] Nothing to reset for {}", self.id().key());
            return Ok(None);
        }
        let result = self
            .decisions
            .make_many_decisions(decisions, MakeManyDecisionsMode::KeepExistingDecisions)
            .await?;
        Ok(Some(result))
    }
}

impl AttributeView<ChoiceAttribute> {
    pub async fn make_decision(
        &self,
        choice_value_id: impl Into<String>,
        state: Option<ChoiceValueDecisionState>,
    ) -> Result<()> {
        self.decisions
            .make_decision(ExplicitDecision::Choice(ExplicitChoiceDecision {
                attribute_id: self.id().clone(),
                choice_value_id: choice_value_id.into(),
                state,
            }))
            .await
    }

    /// Withdraws every explicit value decision in one batch. Returns `None`
    /// without calling the session when there is nothing to withdraw.
    pub async fn clear_decisions(&self) -> Result<Option<MakeManyDecisionsResult>> {
        self.reset_batch(interpreter::choice_reset_decisions(&self.attribute)).await
    }

    pub fn is_multi_select(&self) -> bool {
        *self.memo.multi_select.get_or_init(|| interpreter::is_multi_select(&self.attribute))
    }

    pub fn allowed_choice_values(&self) -> &[ChoiceValue] {
        self.memo
            .allowed
            .get_or_init(|| interpreter::allowed_choice_values(&self.attribute))
    }

    pub fn blocked_choice_values(&self) -> &[ChoiceValue] {
        self.memo
            .blocked
            .get_or_init(|| interpreter::blocked_choice_values(&self.attribute))
    }

    pub fn included_choice_values(&self) -> &[ChoiceValue] {
        self.memo
            .included
            .get_or_init(|| interpreter::included_choice_values(&self.attribute))
    }

    pub fn is_choice_value_allowed(&self, choice_value_id: &str) -> bool {
        self.allowed_choice_values().iter().any(|v| v.id == choice_value_id)
    }

    pub fn is_choice_value_blocked(&self, choice_value_id: &str) -> bool {
        self.blocked_choice_values().iter().any(|v| v.id == choice_value_id)
    }
}

impl AttributeView<NumericAttribute> {
    pub async fn make_decision(&self, state: Option<f64>) -> Result<()> {
        self.decisions
            .make_decision(ExplicitDecision::Numeric(ExplicitNumericDecision {
                attribute_id: self.id().clone(),
                state,
            }))
            .await
    }
}

impl AttributeView<BooleanAttribute> {
    pub async fn make_decision(&self, state: Option<bool>) -> Result<()> {
        self.decisions
            .make_decision(ExplicitDecision::Boolean(ExplicitBooleanDecision {
                attribute_id: self.id().clone(),
                state,
            }))
            .await
    }
}

impl AttributeView<ComponentAttribute> {
    pub async fn make_decision(&self, state: Option<ComponentDecisionState>) -> Result<()> {
        self.decisions
            .make_decision(ExplicitDecision::Component(ExplicitComponentDecision {
                attribute_id: self.id().clone(),
                state,
            }))
            .await
    }

    /// Withdraws every explicit decision below this component, the
    /// component itself excluded, in one batch. Returns `None` without
    /// calling the session when the subtree holds no explicit decision.
    pub async fn clear_subtree(&self) -> Result<Option<MakeManyDecisionsResult>> {
        let attributes = self.registry.attributes();
        let decisions = interpreter::component_subtree_reset_decisions(
            self.id(),
            attributes.iter().map(Arc::as_ref),
        );
        self.reset_batch(decisions).await
    }
}

/// The cached member of an attribute family.
pub struct AttributeMember<A> {
    view: Derived<Option<AttributeView<A>>>,
    suspended: Suspended<Option<AttributeView<A>>>,
}

impl<A> Clone for AttributeMember<A> {
    fn clone(&self) -> Self {
        Self {
            view: self.view.clone(),
            suspended: self.suspended.clone(),
        }
    }
}

impl<A: AttributeVariant> AttributeMember<A> {
    fn new(selectors: &Selectors, key: AttributeKey) -> Self {
        let attributes = selectors.attributes.clone();
        let make_decision = selectors.make_decision.clone();
        let explain = selectors.explain.clone();
        let cache: Mutex<Option<AttributeView<A>>> = Mutex::new(None);

        let revision = attributes.revision().clone();
        let view = Derived::with_guard(&revision, move || {
            let registry = attributes.get()?;
            let decisions = make_decision.get()?;
            let explain = explain.get()?;

            let Some(entry) = registry.get(&key) else {
                return Ok(Some(None));
            };
            let Some(variant) = A::refine(&entry.attribute) else {
                return Ok(Some(None));
            };

            let mut cache = cache.lock();
            if let Some(view) = cache.as_ref().filter(|view| {
                view.version == entry.version
                    && same_handle(view.decisions.session(), decisions.session())
            }) {
                return Ok(Some(Some(view.clone())));
            }

            let view = AttributeView {
                attribute: Arc::new(variant.clone()),
                raw: entry.attribute.clone(),
                version: entry.version,
                decisions,
                explain,
                registry,
                memo: Arc::new(ViewMemo::default()),
            };
            *cache = Some(view.clone());
            Ok(Some(Some(view)))
        });

        Self {
            suspended: Suspended::new(view.clone()),
            view,
        }
    }

    pub fn view(&self) -> &Derived<Option<AttributeView<A>>> {
        &self.view
    }

    pub fn suspended(&self) -> &Suspended<Option<AttributeView<A>>> {
        &self.suspended
    }
}

/// Attribute families, one per variant.
#[derive(Default)]
pub struct AttributeFamilies {
    choice: Family<AttributeMember<ChoiceAttribute>>,
    numeric: Family<AttributeMember<NumericAttribute>>,
    boolean: Family<AttributeMember<BooleanAttribute>>,
    component: Family<AttributeMember<ComponentAttribute>>,
}

impl AttributeFamilies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn member<A: AttributeVariant>(
        &self,
        selectors: &Selectors,
        id: &GlobalAttributeId,
    ) -> AttributeMember<A> {
        let key = id.key();
        A::family(self).get_or_create(&key, || AttributeMember::new(selectors, key.clone()))
    }

    pub fn len(&self) -> usize {
        self.choice.len() + self.numeric.len() + self.boolean.len() + self.component.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops members whose attribute is absent from `registry`. Without a
    /// registry every member is absent.
    pub fn sweep(&self, registry: Option<&AttributeRegistry>) -> usize {
        let present = |key: &AttributeKey| registry.is_some_and(|r| r.contains(key));
        self.choice.retain(present)
            + self.numeric.retain(present)
            + self.boolean.retain(present)
            + self.component.retain(present)
    }
}

#[cfg(test)]
#[path = "attribute_test.rs"]
mod tests;
