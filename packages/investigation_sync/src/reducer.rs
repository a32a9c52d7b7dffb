//! Event projector.
//!
//! [`project`] is the only way the aggregate changes: it appends the raw
//! event to the audit log, routes tool traffic to per-experiment sub-logs,
//! then hands the typed event to [`reduce`]. `reduce` is a single match over
//! the event union with one `apply_*` rule per event type. Every rule takes
//! the state by value and returns the next state.
//!
//! References to unknown hypothesis or experiment ids are lookup misses, not
//! errors: the rule finds nothing to change and the state passes through.

use tracing::{debug, trace, warn};

use crate::event::{
    EventKind, ExperimentCompleted, ExperimentStarted, HypothesisEvaluated, HypothesisFormulated,
    InvestigationEvent, RawEvent, ToolCalled, ToolResult, UpstreamError, classify,
};
use crate::hydration::{TerminalPayload, hydrate};
use crate::lifecycle::{EntityKind, ExperimentTransition, HypothesisTransition, TransitionAnomaly};
use crate::model::{
    Experiment, ExperimentStatus, Finding, Hypothesis, HypothesisStatus, NegativeControl,
};
use crate::state::InvestigationState;
use crate::transport::WireMessage;

const UNSPECIFIED_ERROR: &str = "investigation failed without a message";

/// Log and project one parsed event.
///
/// A `completed` or `error` event ends the investigation whatever its payload
/// holds.
pub fn project(mut state: InvestigationState, raw: RawEvent) -> InvestigationState {
    if state.is_terminal() {
        trace!(event = %raw.event_type, "aggregate is frozen, ignoring event");
        return state;
    }

    let kind = raw.event_type;
    state.events.push(raw.clone());

    let event = match InvestigationEvent::decode(&raw) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "event logged but not projected");
            if kind.is_terminal() {
                state.completed = kind == EventKind::Completed;
                state.terminal = true;
            }
            return state;
        }
    };

    if let Some(experiment_id) = sub_log_target(&event) {
        state
            .experiment_logs
            .entry(experiment_id.to_string())
            .or_default()
            .push(raw);
    }

    reduce(state, event)
}

/// Tool traffic that names an experiment also goes to that experiment's log.
fn sub_log_target(event: &InvestigationEvent) -> Option<&str> {
    match event {
        InvestigationEvent::ToolCalled(ToolCalled { experiment_id, .. })
        | InvestigationEvent::ToolResult(ToolResult { experiment_id, .. }) => {
            experiment_id.as_deref()
        }
        _ => None,
    }
}

/// Apply the update rule for one typed event.
pub fn reduce(state: InvestigationState, event: InvestigationEvent) -> InvestigationState {
    if state.is_terminal() {
        trace!(event = %event.kind(), "aggregate is frozen, ignoring event");
        return state;
    }

    match event {
        InvestigationEvent::HypothesisFormulated(p) => apply_hypothesis_formulated(state, p),
        InvestigationEvent::ExperimentStarted(p) => apply_experiment_started(state, p),
        InvestigationEvent::ExperimentCompleted(p) => apply_experiment_completed(state, p),
        InvestigationEvent::HypothesisEvaluated(p) => apply_hypothesis_evaluated(state, p),
        InvestigationEvent::NegativeControl(p) => apply_negative_control(state, p),
        InvestigationEvent::ToolCalled(p) => apply_tool_called(state, p),
        InvestigationEvent::ToolResult(p) => apply_tool_result(state, p),
        InvestigationEvent::FindingRecorded(p) => apply_finding_recorded(state, p),
        InvestigationEvent::Error(p) => apply_error(state, p),
        InvestigationEvent::Completed(p) => apply_completed(state, *p),
        // Live-display only; the raw log already has them.
        InvestigationEvent::Thinking | InvestigationEvent::OutputSummarized => state,
    }
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Set a hypothesis status, recording an anomaly when the transition table
/// disagrees. Returns false on a lookup miss.
fn drive_hypothesis(
    state: &mut InvestigationState,
    id: &str,
    transition: HypothesisTransition,
    target: HypothesisStatus,
) -> bool {
    let Some(hypothesis) = state.hypothesis_mut(id) else {
        return false;
    };
    let rejected = hypothesis.status.transition(transition).err();
    hypothesis.status = target;

    if let Some(err) = rejected {
        warn!(hypothesis = %id, error = %err, "unexpected hypothesis transition");
        state
            .anomalies
            .push(TransitionAnomaly::new(EntityKind::Hypothesis, id, target, &err));
    }
    true
}

fn apply_hypothesis_formulated(
    mut state: InvestigationState,
    p: HypothesisFormulated,
) -> InvestigationState {
    if state.hypothesis(&p.id).is_some() {
        debug!(hypothesis = %p.id, "duplicate hypothesis id, ignoring");
        return state;
    }

    state.current_hypothesis_id = Some(p.id.clone());
    state.hypotheses.push(Hypothesis {
        id: p.id,
        statement: p.statement,
        rationale: p.rationale,
        status: HypothesisStatus::Proposed,
        parent_id: p.parent_id,
        confidence: clamp_confidence(p.confidence.unwrap_or(0.0)),
    });
    state
}

fn apply_experiment_started(
    mut state: InvestigationState,
    p: ExperimentStarted,
) -> InvestigationState {
    if state.experiment(&p.id).is_some() {
        debug!(experiment = %p.id, "duplicate experiment id, ignoring");
        return state;
    }

    state.current_experiment_id = Some(p.id.clone());
    state.current_hypothesis_id = Some(p.hypothesis_id.clone());
    state.experiment_tool_count = 0;
    state.experiment_finding_count = 0;

    if !drive_hypothesis(
        &mut state,
        &p.hypothesis_id,
        HypothesisTransition::StartTesting,
        HypothesisStatus::Testing,
    ) {
        debug!(
            experiment = %p.id,
            hypothesis = %p.hypothesis_id,
            "experiment references unknown hypothesis"
        );
    }

    state.experiments.push(Experiment {
        id: p.id,
        hypothesis_id: p.hypothesis_id,
        description: p.description,
        status: ExperimentStatus::Running,
        tool_count: None,
        finding_count: None,
    });
    state
}

fn apply_experiment_completed(
    mut state: InvestigationState,
    p: ExperimentCompleted,
) -> InvestigationState {
    let outcome = p
        .status
        .as_deref()
        .and_then(|s| s.parse::<ExperimentStatus>().ok())
        .filter(ExperimentStatus::is_finished)
        .unwrap_or(ExperimentStatus::Completed);

    let is_current = state.current_experiment_id.as_deref() == Some(p.id.as_str());
    let observed_tools = is_current.then_some(state.experiment_tool_count);
    let observed_findings = is_current.then_some(state.experiment_finding_count);

    let Some(experiment) = state.experiment_mut(&p.id) else {
        debug!(experiment = %p.id, "completion for unknown experiment");
        return state;
    };

    let rejected = ExperimentTransition::finishing(outcome)
        .and_then(|transition| experiment.status.transition(transition).err());
    experiment.status = outcome;
    experiment.tool_count = p.tool_count.or(observed_tools);
    experiment.finding_count = p.finding_count.or(observed_findings);

    if let Some(err) = rejected {
        warn!(experiment = %p.id, error = %err, "unexpected experiment transition");
        state.anomalies.push(TransitionAnomaly::new(
            EntityKind::Experiment,
            &p.id,
            outcome,
            &err,
        ));
    }

    state.current_experiment_id = None;
    state
}

fn apply_hypothesis_evaluated(
    mut state: InvestigationState,
    p: HypothesisEvaluated,
) -> InvestigationState {
    let found = drive_hypothesis(
        &mut state,
        &p.id,
        HypothesisTransition::Evaluate { outcome: p.status },
        p.status,
    );
    if !found {
        debug!(hypothesis = %p.id, "evaluation for unknown hypothesis");
        return state;
    }

    if let Some(hypothesis) = state.hypothesis_mut(&p.id) {
        hypothesis.confidence = clamp_confidence(p.confidence);
    }
    state
}

fn apply_negative_control(
    mut state: InvestigationState,
    p: NegativeControl,
) -> InvestigationState {
    state.negative_controls.push(p);
    state
}

fn apply_tool_called(mut state: InvestigationState, p: ToolCalled) -> InvestigationState {
    state.total_tool_calls += 1;
    state.experiment_tool_count = state.experiment_tool_count.saturating_add(1);
    state.active_tool = Some(p.tool);
    state
}

fn apply_tool_result(mut state: InvestigationState, _p: ToolResult) -> InvestigationState {
    state.active_tool = None;
    state
}

fn apply_finding_recorded(mut state: InvestigationState, mut p: Finding) -> InvestigationState {
    state.experiment_finding_count = state.experiment_finding_count.saturating_add(1);
    if p.experiment_id.is_none() {
        p.experiment_id = state.current_experiment_id.clone();
    }
    state.findings.push(p);
    state
}

fn apply_error(mut state: InvestigationState, p: UpstreamError) -> InvestigationState {
    let message = if p.message.trim().is_empty() {
        UNSPECIFIED_ERROR.to_string()
    } else {
        p.message
    };
    warn!(error = %message, "investigation reported an error");
    state.error = Some(message);
    state.terminal = true;
    state
}

fn apply_completed(state: InvestigationState, p: TerminalPayload) -> InvestigationState {
    let mut state = hydrate(state, p);
    state.completed = true;
    state.terminal = true;
    state
}

/// Classify and project a finished sequence of wire messages, as if they had
/// arrived live on one connection.
pub fn replay<I>(messages: I) -> InvestigationState
where
    I: IntoIterator<Item = WireMessage>,
{
    messages
        .into_iter()
        .filter_map(|message| classify(&message.event, &message.data))
        .fold(InvestigationState::new(), project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EvidenceType;
    use serde_json::{Value, json};

    fn raw(kind: EventKind, payload: Value) -> RawEvent {
        RawEvent {
            event_type: kind,
            payload,
        }
    }

    fn run(events: Vec<RawEvent>) -> InvestigationState {
        events.into_iter().fold(InvestigationState::new(), project)
    }

    fn formulated(id: &str) -> RawEvent {
        raw(
            EventKind::HypothesisFormulated,
            json!({"id": id, "statement": format!("{id} holds"), "rationale": "prior work"}),
        )
    }

    fn started(id: &str, hypothesis_id: &str) -> RawEvent {
        raw(
            EventKind::ExperimentStarted,
            json!({"id": id, "hypothesis_id": hypothesis_id, "description": "dock it"}),
        )
    }

    fn evaluated(id: &str, status: &str, confidence: f64) -> RawEvent {
        raw(
            EventKind::HypothesisEvaluated,
            json!({"id": id, "status": status, "confidence": confidence}),
        )
    }

    #[test]
    fn formulated_appends_proposed_and_sets_current() {
        let state = run(vec![formulated("h1"), formulated("h2")]);
        assert_eq!(state.hypotheses.len(), 2);
        assert!(
            state
                .hypotheses
                .iter()
                .all(|h| h.status == HypothesisStatus::Proposed)
        );
        assert_eq!(state.current_hypothesis_id.as_deref(), Some("h2"));
        assert_eq!(state.events.len(), 2);
    }

    #[test]
    fn duplicate_hypothesis_id_is_ignored() {
        let state = run(vec![formulated("h1"), formulated("h1")]);
        assert_eq!(state.hypotheses.len(), 1);
        // Still logged.
        assert_eq!(state.events.len(), 2);
    }

    #[test]
    fn experiment_started_moves_hypothesis_to_testing() {
        let state = run(vec![formulated("h1"), formulated("h2"), started("e1", "h1")]);
        assert_eq!(state.hypothesis("h1").unwrap().status, HypothesisStatus::Testing);
        assert_eq!(state.hypothesis("h2").unwrap().status, HypothesisStatus::Proposed);
        assert_eq!(state.current_experiment_id.as_deref(), Some("e1"));
        assert_eq!(state.current_hypothesis_id.as_deref(), Some("h1"));
        assert_eq!(state.experiment("e1").unwrap().status, ExperimentStatus::Running);
        assert!(state.anomalies.is_empty());
    }

    #[test]
    fn experiment_started_resets_per_experiment_counters() {
        let state = run(vec![
            formulated("h1"),
            started("e1", "h1"),
            raw(EventKind::ToolCalled, json!({"tool": "a"})),
            raw(EventKind::ToolCalled, json!({"tool": "b"})),
            started("e2", "h1"),
        ]);
        assert_eq!(state.experiment_tool_count, 0);
        assert_eq!(state.total_tool_calls, 2);
    }

    #[test]
    fn experiment_for_unknown_hypothesis_still_recorded() {
        let state = run(vec![started("e1", "ghost")]);
        assert_eq!(state.experiments.len(), 1);
        assert!(state.hypotheses.is_empty());
    }

    #[test]
    fn experiment_completed_attaches_counts_and_clears_current() {
        let state = run(vec![
            formulated("h1"),
            started("e1", "h1"),
            raw(
                EventKind::ExperimentCompleted,
                json!({"id": "e1", "tool_count": 4, "finding_count": 2}),
            ),
        ]);
        let experiment = state.experiment("e1").unwrap();
        assert_eq!(experiment.status, ExperimentStatus::Completed);
        assert_eq!(experiment.tool_count, Some(4));
        assert_eq!(experiment.finding_count, Some(2));
        assert!(state.current_experiment_id.is_none());
    }

    #[test]
    fn experiment_completed_without_counts_uses_observed() {
        let state = run(vec![
            formulated("h1"),
            started("e1", "h1"),
            raw(EventKind::ToolCalled, json!({"tool": "a", "experiment_id": "e1"})),
            raw(EventKind::ToolResult, json!({"experiment_id": "e1"})),
            raw(
                EventKind::FindingRecorded,
                json!({"title": "t", "detail": "d", "hypothesis_id": "h1", "evidence_type": "neutral"}),
            ),
            raw(EventKind::ExperimentCompleted, json!({"id": "e1"})),
        ]);
        let experiment = state.experiment("e1").unwrap();
        assert_eq!(experiment.tool_count, Some(1));
        assert_eq!(experiment.finding_count, Some(1));
    }

    #[test]
    fn experiment_completed_with_failed_status() {
        let state = run(vec![
            formulated("h1"),
            started("e1", "h1"),
            raw(EventKind::ExperimentCompleted, json!({"id": "e1", "status": "failed"})),
        ]);
        assert_eq!(state.experiment("e1").unwrap().status, ExperimentStatus::Failed);
    }

    #[test]
    fn experiment_completed_unknown_status_means_completed() {
        let state = run(vec![
            started("e1", "h1"),
            raw(EventKind::ExperimentCompleted, json!({"id": "e1", "status": "weird"})),
        ]);
        assert_eq!(
            state.experiment("e1").unwrap().status,
            ExperimentStatus::Completed
        );
    }

    #[test]
    fn completing_twice_records_anomaly() {
        let state = run(vec![
            started("e1", "h1"),
            raw(EventKind::ExperimentCompleted, json!({"id": "e1"})),
            raw(EventKind::ExperimentCompleted, json!({"id": "e1"})),
        ]);
        assert_eq!(state.anomalies.len(), 1);
        assert_eq!(state.anomalies[0].entity, EntityKind::Experiment);
    }

    #[test]
    fn unknown_experiment_completion_is_a_no_op() {
        let before = run(vec![formulated("h1"), started("e1", "h1")]);
        let after = project(
            before.clone(),
            raw(EventKind::ExperimentCompleted, json!({"id": "e9"})),
        );
        assert_eq!(after.experiments, before.experiments);
        assert_eq!(after.current_experiment_id.as_deref(), Some("e1"));
        assert_eq!(after.events.len(), before.events.len() + 1);
    }

    #[test]
    fn evaluation_overwrites_status_and_confidence() {
        let state = run(vec![
            formulated("h1"),
            started("e1", "h1"),
            evaluated("h1", "refuted", 0.3),
        ]);
        let h = state.hypothesis("h1").unwrap();
        assert_eq!(h.status, HypothesisStatus::Refuted);
        assert_eq!(h.confidence, 0.3);
        assert!(state.anomalies.is_empty());
    }

    #[test]
    fn evaluating_untested_hypothesis_applies_and_flags() {
        let state = run(vec![formulated("h1"), evaluated("h1", "supported", 0.7)]);
        let h = state.hypothesis("h1").unwrap();
        assert_eq!(h.status, HypothesisStatus::Supported);
        assert_eq!(h.confidence, 0.7);
        assert_eq!(state.anomalies.len(), 1);
        assert_eq!(state.anomalies[0].from, "proposed");
        assert_eq!(state.anomalies[0].to, "supported");
    }

    #[test]
    fn evaluation_confidence_is_clamped() {
        let state = run(vec![
            formulated("h1"),
            started("e1", "h1"),
            evaluated("h1", "supported", 1.8),
        ]);
        assert_eq!(state.hypothesis("h1").unwrap().confidence, 1.0);
    }

    #[test]
    fn evaluation_of_unknown_hypothesis_is_a_no_op() {
        let state = run(vec![formulated("h1"), evaluated("h2", "supported", 0.9)]);
        assert_eq!(state.hypotheses.len(), 1);
        assert_eq!(state.hypothesis("h1").unwrap().status, HypothesisStatus::Proposed);
        assert!(state.anomalies.is_empty());
    }

    #[test]
    fn tool_events_update_counters_and_sub_logs() {
        let state = run(vec![
            formulated("h1"),
            started("e1", "h1"),
            raw(
                EventKind::ToolCalled,
                json!({"tool": "search_literature", "experiment_id": "e1"}),
            ),
        ]);
        assert_eq!(state.active_tool.as_deref(), Some("search_literature"));
        assert_eq!(state.total_tool_calls, 1);
        assert_eq!(state.experiment_tool_count, 1);
        assert_eq!(state.experiment_log("e1").len(), 1);

        let state = project(
            state,
            raw(
                EventKind::ToolResult,
                json!({"tool": "search_literature", "experiment_id": "e1"}),
            ),
        );
        assert!(state.active_tool.is_none());
        let log = state.experiment_log("e1");
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].event_type, EventKind::ToolCalled);
        assert_eq!(log[1].event_type, EventKind::ToolResult);
    }

    #[test]
    fn tool_events_without_experiment_skip_sub_log() {
        let state = run(vec![raw(EventKind::ToolCalled, json!({"tool": "x"}))]);
        assert!(state.experiment_logs.is_empty());
        assert_eq!(state.total_tool_calls, 1);
    }

    #[test]
    fn finding_inherits_current_experiment() {
        let state = run(vec![
            formulated("h1"),
            started("e1", "h1"),
            raw(
                EventKind::FindingRecorded,
                json!({"title": "binds", "detail": "Kd 4nM", "hypothesis_id": "h1", "evidence_type": "supporting"}),
            ),
        ]);
        assert_eq!(state.findings.len(), 1);
        assert_eq!(state.findings[0].evidence_type, EvidenceType::Supporting);
        assert_eq!(state.findings[0].experiment_id.as_deref(), Some("e1"));
        assert_eq!(state.experiment_finding_count, 1);
    }

    #[test]
    fn negative_controls_append() {
        let state = run(vec![
            raw(
                EventKind::NegativeControl,
                json!({"smiles": "CCO", "name": "ethanol", "prediction_score": 0.1, "correctly_classified": true}),
            ),
            raw(
                EventKind::NegativeControl,
                json!({"identifier": "O", "name": "water", "prediction_score": 0.6, "correctly_classified": false}),
            ),
        ]);
        assert_eq!(state.negative_controls.len(), 2);
        assert!(!state.negative_controls[1].correctly_classified);
    }

    #[test]
    fn thinking_and_summaries_only_log() {
        let state = run(vec![
            raw(EventKind::Thinking, json!({"content": "considering"})),
            raw(EventKind::OutputSummarized, json!({"summary": "so far"})),
        ]);
        assert_eq!(state.events.len(), 2);
        assert_eq!(
            InvestigationState {
                events: Vec::new(),
                ..state
            },
            InvestigationState::new()
        );
    }

    #[test]
    fn error_is_terminal_and_freezes() {
        let state = run(vec![
            formulated("h1"),
            raw(EventKind::Error, json!({"message": "backend crashed"})),
            formulated("h2"),
        ]);
        assert!(state.terminal);
        assert!(!state.completed);
        assert_eq!(state.error.as_deref(), Some("backend crashed"));
        assert_eq!(state.hypotheses.len(), 1);
        assert_eq!(state.events.len(), 2);
    }

    #[test]
    fn empty_error_message_gets_placeholder() {
        let state = run(vec![raw(EventKind::Error, json!({}))]);
        assert_eq!(state.error.as_deref(), Some(UNSPECIFIED_ERROR));
    }

    #[test]
    fn error_without_text_message_still_ends_the_run() {
        let state = run(vec![
            raw(EventKind::Error, json!({"message": null})),
            formulated("h1"),
        ]);
        assert!(state.terminal);
        assert!(!state.completed);
        assert_eq!(state.error.as_deref(), Some(UNSPECIFIED_ERROR));
        assert!(state.hypotheses.is_empty());

        let state = run(vec![raw(EventKind::Error, json!({"message": {"code": 503}}))]);
        assert!(state.terminal);
        assert_eq!(state.error.as_deref(), Some(r#"{"code":503}"#));
    }

    #[test]
    fn completed_with_malformed_snapshot_still_freezes() {
        let state = replay(vec![
            WireMessage::new("hypothesis_formulated", r#"{"data":{"id":"h1"}}"#),
            WireMessage::new(
                "completed",
                r#"{"data":{"candidates":[{"identifier":"CCO","scores":{"docking":null}},{"rank":1,"identifier":"CCN"}],"findings":[{"title":"t","evidence":{"assay":"SPR"}}],"cost":"n/a"}}"#,
            ),
            WireMessage::new("hypothesis_formulated", r#"{"data":{"id":"h2"}}"#),
        ]);
        assert!(state.completed);
        assert!(state.terminal);
        assert_eq!(state.hypotheses.len(), 1);
        assert_eq!(state.candidates.len(), 1);
        assert_eq!(state.candidates[0].identifier, "CCN");
        assert!(state.findings.is_empty());
        assert!(state.cost.is_none());
        assert_eq!(state.events.len(), 2);
    }

    #[test]
    fn undecodable_payload_is_logged_not_projected() {
        let state = run(vec![raw(EventKind::HypothesisFormulated, json!({"statement": "no id"}))]);
        assert_eq!(state.events.len(), 1);
        assert!(state.hypotheses.is_empty());
    }

    #[test]
    fn completed_hydrates_and_freezes() {
        let state = run(vec![
            formulated("h1"),
            raw(
                EventKind::Completed,
                json!({
                    "candidate_count": 1,
                    "candidates": [{"rank": 1, "identifier": "CCN", "name": "lead"}],
                    "hypotheses": [{"id": "bulk", "status": "supported"}],
                    "findings": [{"title": "bulk finding", "hypothesis_id": "bulk"}],
                    "cost": {"tokens": {"input": 10, "output": 20}, "total_cost": 0.01}
                }),
            ),
            raw(EventKind::NegativeControl, json!({"identifier": "O"})),
        ]);
        assert!(state.completed);
        assert!(state.terminal);
        assert_eq!(state.candidates.len(), 1);
        // Live hypotheses win over the bulk list; findings were empty so bulk is adopted.
        assert_eq!(state.hypotheses.len(), 1);
        assert_eq!(state.hypotheses[0].id, "h1");
        assert_eq!(state.findings.len(), 1);
        assert_eq!(state.cost.as_ref().unwrap().total_tokens, 30);
        assert!(state.negative_controls.is_empty());
    }

    #[test]
    fn malformed_message_between_valid_events_changes_nothing() {
        let first = classify("hypothesis_formulated", r#"{"data":{"id":"h1"}}"#).unwrap();
        let second = classify("hypothesis_formulated", r#"{"data":{"id":"h2"}}"#).unwrap();

        let clean = run(vec![first.clone(), second.clone()]);

        let mut noisy = project(InvestigationState::new(), first);
        if let Some(bad) = classify("hypothesis_formulated", "{\"data\": {oops") {
            noisy = project(noisy, bad);
        }
        let noisy = project(noisy, second);

        assert_eq!(clean, noisy);
    }

    #[test]
    fn reduce_ignores_events_after_terminal() {
        let state = InvestigationState {
            terminal: true,
            ..Default::default()
        };
        let state = reduce(
            state,
            InvestigationEvent::ToolCalled(ToolCalled {
                tool: "late".to_string(),
                experiment_id: None,
            }),
        );
        assert_eq!(state.total_tool_calls, 0);
        assert!(state.active_tool.is_none());
    }

    #[test]
    fn replay_skips_unknown_and_undefined() {
        let state = replay(vec![
            WireMessage::new("heartbeat", "{}"),
            WireMessage::new("hypothesis_formulated", r#"{"data":{"id":"h1"}}"#),
            WireMessage::new("tool_called", "undefined"),
            WireMessage::new("tool_called", r#"{"data":{"tool":"dock"}}"#),
        ]);
        assert_eq!(state.events.len(), 2);
        assert_eq!(state.hypotheses.len(), 1);
        assert_eq!(state.total_tool_calls, 1);
    }
}
