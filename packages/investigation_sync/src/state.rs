//! The projected investigation aggregate and the read-only snapshot handed to
//! display code.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::event::RawEvent;
use crate::lifecycle::TransitionAnomaly;
use crate::model::{Candidate, CostInfo, Experiment, Finding, Hypothesis, NegativeControl};

/// Everything derived from one investigation's event stream.
///
/// Built only by [`crate::reducer::project`]; a fresh value is the state of
/// an investigation that has not produced any events yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvestigationState {
    /// Every parsed message in arrival order, before projection.
    pub events: Vec<RawEvent>,

    pub hypotheses: Vec<Hypothesis>,
    pub experiments: Vec<Experiment>,
    pub findings: Vec<Finding>,
    pub negative_controls: Vec<NegativeControl>,
    pub candidates: Vec<Candidate>,

    pub prompt: Option<String>,
    pub summary: Option<String>,
    pub cost: Option<CostInfo>,
    /// Message of an upstream `error` event.
    pub error: Option<String>,

    /// A `completed` event was processed.
    pub completed: bool,
    /// A `completed` or `error` event was processed; the aggregate is frozen.
    pub terminal: bool,

    pub total_tool_calls: u64,
    pub active_tool: Option<String>,
    /// Tool calls since the current experiment started.
    pub experiment_tool_count: u32,
    /// Findings since the current experiment started.
    pub experiment_finding_count: u32,
    pub current_hypothesis_id: Option<String>,
    pub current_experiment_id: Option<String>,

    /// `tool_called` / `tool_result` events keyed by experiment id.
    pub experiment_logs: BTreeMap<String, Vec<RawEvent>>,

    pub anomalies: Vec<TransitionAnomaly>,
}

impl InvestigationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn hypothesis(&self, id: &str) -> Option<&Hypothesis> {
        self.hypotheses.iter().find(|h| h.id == id)
    }

    pub(crate) fn hypothesis_mut(&mut self, id: &str) -> Option<&mut Hypothesis> {
        self.hypotheses.iter_mut().find(|h| h.id == id)
    }

    pub fn experiment(&self, id: &str) -> Option<&Experiment> {
        self.experiments.iter().find(|e| e.id == id)
    }

    pub(crate) fn experiment_mut(&mut self, id: &str) -> Option<&mut Experiment> {
        self.experiments.iter_mut().find(|e| e.id == id)
    }

    pub fn findings_for<'a>(&'a self, hypothesis_id: &'a str) -> impl Iterator<Item = &'a Finding> {
        self.findings
            .iter()
            .filter(move |f| f.hypothesis_id == hypothesis_id)
    }

    pub fn experiments_for<'a>(
        &'a self,
        hypothesis_id: &'a str,
    ) -> impl Iterator<Item = &'a Experiment> {
        self.experiments
            .iter()
            .filter(move |e| e.hypothesis_id == hypothesis_id)
    }

    /// Sub-log of one experiment; empty when the experiment saw no tool traffic.
    pub fn experiment_log(&self, experiment_id: &str) -> &[RawEvent] {
        self.experiment_logs
            .get(experiment_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// What display code reads: the projection plus the connection flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvestigationSnapshot {
    pub target: Option<String>,
    pub connected: bool,
    pub reconnecting: bool,
    /// The connection failed and no retry is left. Cleared by a retarget.
    #[serde(default)]
    pub gave_up: bool,
    #[serde(flatten)]
    pub state: InvestigationState,
}

impl InvestigationSnapshot {
    pub fn for_target(target: Option<String>) -> Self {
        Self {
            target,
            ..Default::default()
        }
    }
}
