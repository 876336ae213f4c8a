//! Command surfaces bound to one session instance.
//!
//! Each bundle captures the session once, when its guarded cell becomes
//! initialized, so call sites never re-resolve the session. Engine
//! failures come back as `ConfiguratorError::Failure`; nothing here retries.

use configurator_core::Result;
use configurator_core::configuration::StoredConfiguration;
use configurator_core::decision::{
    CollectedDecision, DecisionFilter, ExplicitDecision, MakeManyDecisionsMode,
    MakeManyDecisionsResult,
};
use configurator_core::explain::{AnswerShape, ExplainAnswer, ExplainQuestion, ExplainSolution};
use configurator_core::session::SessionHandle;
use std::fmt;
use tokio_util::sync::CancellationToken;

macro_rules! session_bound {
    ($name:ident) => {
        impl $name {
            pub(crate) fn new(session: SessionHandle) -> Self {
                Self { session }
            }

            pub(crate) fn session(&self) -> &SessionHandle {
                &self.session
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name)).finish_non_exhaustive()
            }
        }
    };
}

#[derive(Clone)]
pub struct MakeDecisionCommands {
    session: SessionHandle,
}

session_bound!(MakeDecisionCommands);

impl MakeDecisionCommands {
    pub async fn make_decision(&self, decision: ExplicitDecision) -> Result<()> {
        Ok(self.session.make_decision(decision).await?)
    }

    pub async fn make_many_decisions(
        &self,
        decisions: Vec<ExplicitDecision>,
        mode: MakeManyDecisionsMode,
    ) -> Result<MakeManyDecisionsResult> {
        Ok(self.session.make_many_decisions(decisions, mode).await?)
    }
}

#[derive(Clone)]
pub struct ExplainCommands {
    session: SessionHandle,
}

session_bound!(ExplainCommands);

impl ExplainCommands {
    pub async fn explain(
        &self,
        question: ExplainQuestion,
        shape: AnswerShape,
    ) -> Result<ExplainAnswer> {
        Ok(self.session.explain(question, shape).await?)
    }

    /// Like [`Self::explain`] with the shape given as `decisions`,
    /// `constraints` or `full`. Any other string is an error.
    pub async fn explain_as(
        &self,
        question: ExplainQuestion,
        shape: &str,
    ) -> Result<ExplainAnswer> {
        let shape = AnswerShape::parse(shape)?;
        self.explain(question, shape).await
    }

    pub async fn apply_solution(
        &self,
        solution: ExplainSolution,
    ) -> Result<MakeManyDecisionsResult> {
        Ok(self.session.apply_solution(solution).await?)
    }
}

#[derive(Clone)]
pub struct DecisionQueries {
    session: SessionHandle,
}

session_bound!(DecisionQueries);

impl DecisionQueries {
    pub fn decisions(&self, filter: DecisionFilter) -> Vec<CollectedDecision> {
        self.session.decisions(filter.kind())
    }

    /// Decisions as of after every queued session task.
    pub async fn decisions_queued(&self, filter: DecisionFilter) -> Result<Vec<CollectedDecision>> {
        Ok(self.session.decisions_queued(filter.kind()).await?)
    }
}

#[derive(Clone)]
pub struct StoringCommands {
    session: SessionHandle,
}

session_bound!(StoringCommands);

impl StoringCommands {
    pub async fn store_configuration(&self) -> Result<StoredConfiguration> {
        Ok(self.session.store_configuration().await?)
    }

    pub async fn restore_configuration(
        &self,
        stored: StoredConfiguration,
        mode: MakeManyDecisionsMode,
    ) -> Result<MakeManyDecisionsResult> {
        Ok(self.session.restore_configuration(stored, mode).await?)
    }
}

#[derive(Clone)]
pub struct ReinitializationCommands {
    session: SessionHandle,
}

session_bound!(ReinitializationCommands);

impl ReinitializationCommands {
    pub async fn reinitialize(&self) -> Result<()> {
        Ok(self.session.reinitialize().await?)
    }
}

#[derive(Clone)]
pub struct TaskSchedulingCommands {
    session: SessionHandle,
}

session_bound!(TaskSchedulingCommands);

impl TaskSchedulingCommands {
    pub async fn schedule_task(&self, cancel: Option<CancellationToken>) -> Result<()> {
        Ok(self.session.schedule_task(cancel).await?)
    }
}

#[derive(Clone)]
pub struct ResetCommands {
    can_reset: bool,
    session: SessionHandle,
}

impl ResetCommands {
    pub(crate) fn new(can_reset: bool, session: SessionHandle) -> Self {
        Self { can_reset, session }
    }

    pub fn can_reset(&self) -> bool {
        self.can_reset
    }

    pub async fn reset_configuration(&self) -> Result<()> {
        Ok(self.session.reset_configuration().await?)
    }
}

impl fmt::Debug for ResetCommands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResetCommands")
            .field("can_reset", &self.can_reset)
            .finish_non_exhaustive()
    }
}

/// Satisfaction flag plus "why is the configuration not satisfied".
#[derive(Clone)]
pub struct Satisfaction {
    is_satisfied: bool,
    explain: ExplainCommands,
}

impl Satisfaction {
    pub(crate) fn new(is_satisfied: bool, explain: ExplainCommands) -> Self {
        Self { is_satisfied, explain }
    }

    pub fn is_satisfied(&self) -> bool {
        self.is_satisfied
    }

    pub async fn explain(&self, shape: AnswerShape) -> Result<ExplainAnswer> {
        self.explain
            .explain(ExplainQuestion::why_is_configuration_not_satisfied(), shape)
            .await
    }

    pub async fn explain_as(&self, shape: &str) -> Result<ExplainAnswer> {
        self.explain(AnswerShape::parse(shape)?).await
    }

    pub async fn apply_solution(
        &self,
        solution: ExplainSolution,
    ) -> Result<MakeManyDecisionsResult> {
        self.explain.apply_solution(solution).await
    }
}

impl fmt::Debug for Satisfaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Satisfaction")
            .field("is_satisfied", &self.is_satisfied)
            .finish_non_exhaustive()
    }
}
