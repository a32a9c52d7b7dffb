//! Hypothesis and experiment status machines.
//!
//! The backend is authoritative: the projector applies whatever status the
//! stream reports. These tables say which changes are expected, so that an
//! unexpected one (evaluating a hypothesis that was never tested, completing
//! an experiment twice) is recorded as a [`TransitionAnomaly`] instead of
//! passing silently.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{ExperimentStatus, HypothesisStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HypothesisTransition {
    /// An experiment referencing the hypothesis started.
    StartTesting,
    /// The backend evaluated the hypothesis.
    Evaluate { outcome: HypothesisStatus },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExperimentTransition {
    /// planned → awaiting_approval
    RequestApproval,
    /// awaiting_approval → running
    Approve,
    /// planned → running
    Start,
    /// running → paused
    Pause,
    /// paused → running
    Resume,
    /// running → completed
    Complete,
    /// running|paused → failed
    Fail,
    /// any unfinished → cancelled
    Cancel,
}

impl ExperimentTransition {
    /// The transition that finishes an experiment with `outcome`, if any.
    pub fn finishing(outcome: ExperimentStatus) -> Option<Self> {
        match outcome {
            ExperimentStatus::Completed => Some(Self::Complete),
            ExperimentStatus::Failed => Some(Self::Fail),
            ExperimentStatus::Cancelled => Some(Self::Cancel),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot transition from {from}: {reason}")]
    InvalidTransition { from: String, reason: String },
    #[error("{0} is a finished state")]
    FinishedState(String),
}

impl HypothesisStatus {
    pub fn transition(self, transition: HypothesisTransition) -> Result<Self, TransitionError> {
        use HypothesisStatus::*;
        use HypothesisTransition::*;

        match (self, transition) {
            (Proposed | Testing | Revised, StartTesting) => Ok(Testing),
            (Testing, Evaluate { outcome }) if outcome.is_evaluated() => Ok(outcome),
            (from, Evaluate { outcome }) if !outcome.is_evaluated() => {
                Err(TransitionError::InvalidTransition {
                    from: from.to_string(),
                    reason: format!("{outcome} is not an evaluation outcome"),
                })
            }
            (from, transition) => Err(TransitionError::InvalidTransition {
                from: from.to_string(),
                reason: format!("{transition:?} not valid from {from}"),
            }),
        }
    }
}

impl ExperimentStatus {
    pub fn transition(self, transition: ExperimentTransition) -> Result<Self, TransitionError> {
        use ExperimentStatus::*;
        use ExperimentTransition::*;

        if self.is_finished() {
            return Err(TransitionError::FinishedState(self.to_string()));
        }

        match (self, transition) {
            (Planned, RequestApproval) => Ok(AwaitingApproval),
            (Planned, Start) => Ok(Running),
            (AwaitingApproval, Approve) => Ok(Running),
            (Running, Pause) => Ok(Paused),
            (Paused, Resume) => Ok(Running),
            (Running, Complete) => Ok(Completed),
            (Running | Paused, Fail) => Ok(Failed),
            (_, Cancel) => Ok(Cancelled),
            (from, transition) => Err(TransitionError::InvalidTransition {
                from: from.to_string(),
                reason: format!("{transition:?} not valid from {from}"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Hypothesis,
    Experiment,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hypothesis => write!(f, "hypothesis"),
            Self::Experiment => write!(f, "experiment"),
        }
    }
}

/// A status change the stream forced through even though the transition
/// table rejected it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionAnomaly {
    pub entity: EntityKind,
    pub id: String,
    pub from: String,
    pub to: String,
    pub reason: String,
}

impl TransitionAnomaly {
    pub fn new(entity: EntityKind, id: &str, to: impl fmt::Display, err: &TransitionError) -> Self {
        let from = match err {
            TransitionError::InvalidTransition { from, .. } => from.clone(),
            TransitionError::FinishedState(from) => from.clone(),
        };
        Self {
            entity,
            id: id.to_string(),
            from,
            to: to.to_string(),
            reason: err.to_string(),
        }
    }
}
