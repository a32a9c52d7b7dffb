//! Plain-text rendering of investigation progress.

use std::fmt::Write as _;

use chrono::{DateTime, Local};
use investigation_sync::{EventKind, InvestigationSnapshot, InvestigationState, RawEvent};
use serde_json::Value;

/// Remembers what was already printed so each snapshot only yields news.
#[derive(Debug, Default)]
pub struct Progress {
    printed: usize,
    link: Option<(bool, bool)>,
}

impl Progress {
    /// Events that arrived since the previous call.
    pub fn new_events<'a>(&mut self, snapshot: &'a InvestigationSnapshot) -> &'a [RawEvent] {
        let events = &snapshot.state.events;
        // A retarget empties the log.
        if events.len() < self.printed {
            self.printed = 0;
        }
        let fresh = &events[self.printed..];
        self.printed = events.len();
        fresh
    }

    /// A status line when the connection flags changed.
    pub fn link_change(&mut self, snapshot: &InvestigationSnapshot) -> Option<&'static str> {
        let link = (snapshot.connected, snapshot.reconnecting);
        if self.link == Some(link) {
            return None;
        }
        let first = self.link.is_none();
        self.link = Some(link);

        match link {
            (true, _) => Some("connected"),
            (false, true) => Some("connection lost, reconnecting"),
            (false, false) if first => None,
            (false, false) => Some("disconnected"),
        }
    }
}

fn str_field<'a>(payload: &'a Value, key: &str) -> &'a str {
    payload.get(key).and_then(Value::as_str).unwrap_or("")
}

/// One line describing a single event.
pub fn event_line(event: &RawEvent, at: Option<DateTime<Local>>) -> String {
    let p = &event.payload;
    let body = match event.event_type {
        EventKind::HypothesisFormulated => format!(
            "hypothesis {} proposed: {}",
            str_field(p, "id"),
            str_field(p, "statement")
        ),
        EventKind::ExperimentStarted => format!(
            "experiment {} started for {}: {}",
            str_field(p, "id"),
            str_field(p, "hypothesis_id"),
            str_field(p, "description")
        ),
        EventKind::ExperimentCompleted => {
            let status = p.get("status").and_then(Value::as_str).unwrap_or("completed");
            format!("experiment {} {}", str_field(p, "id"), status)
        }
        EventKind::HypothesisEvaluated => format!(
            "hypothesis {} {} (confidence {:.2})",
            str_field(p, "id"),
            str_field(p, "status"),
            p.get("confidence").and_then(Value::as_f64).unwrap_or(0.0)
        ),
        EventKind::NegativeControl => {
            let verdict = match p.get("correctly_classified").and_then(Value::as_bool) {
                Some(true) => "correctly classified",
                _ => "misclassified",
            };
            format!("negative control {}: {}", str_field(p, "name"), verdict)
        }
        EventKind::ToolCalled => {
            let tool = ["tool", "tool_name", "name"]
                .iter()
                .map(|key| str_field(p, key))
                .find(|name| !name.is_empty())
                .unwrap_or("?");
            format!("  -> {tool}")
        }
        EventKind::ToolResult => "  <- result".to_string(),
        EventKind::FindingRecorded => format!(
            "finding [{}] {}",
            p.get("evidence_type")
                .and_then(Value::as_str)
                .unwrap_or("neutral"),
            str_field(p, "title")
        ),
        EventKind::Thinking => "thinking...".to_string(),
        EventKind::OutputSummarized => "output summarized".to_string(),
        EventKind::Error => {
            let message = ["message", "error"]
                .iter()
                .map(|key| str_field(p, key))
                .find(|m| !m.is_empty())
                .unwrap_or("(no message)");
            format!("ERROR: {message}")
        }
        EventKind::Completed => "investigation completed".to_string(),
    };

    match at {
        Some(at) => format!("[{}] {}", at.format("%H:%M:%S"), body),
        None => body,
    }
}

/// Multi-line report of the final (or current) state.
pub fn summary(state: &InvestigationState) -> String {
    let mut out = String::new();

    if let Some(prompt) = &state.prompt {
        let _ = writeln!(out, "Prompt: {prompt}\n");
    }

    let _ = writeln!(
        out,
        "{:<10} {:<10} {:>10}  {}",
        "HYPOTHESIS", "STATUS", "CONFIDENCE", "STATEMENT"
    );
    let _ = writeln!(out, "{}", "-".repeat(80));
    for h in &state.hypotheses {
        let _ = writeln!(
            out,
            "{:<10} {:<10} {:>10.2}  {}",
            h.id,
            h.status.to_string(),
            h.confidence,
            h.statement
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<10} {:<10} {:<18} {:>5} {:>8}",
        "EXPERIMENT", "HYPOTHESIS", "STATUS", "TOOLS", "FINDINGS"
    );
    let _ = writeln!(out, "{}", "-".repeat(80));
    for e in &state.experiments {
        let count = |n: Option<u32>| n.map_or("-".to_string(), |n| n.to_string());
        let _ = writeln!(
            out,
            "{:<10} {:<10} {:<18} {:>5} {:>8}",
            e.id,
            e.hypothesis_id,
            e.status.to_string(),
            count(e.tool_count),
            count(e.finding_count)
        );
    }

    let _ = writeln!(
        out,
        "\n{} finding(s), {} negative control(s), {} tool call(s)",
        state.findings.len(),
        state.negative_controls.len(),
        state.total_tool_calls
    );

    if !state.candidates.is_empty() {
        let _ = writeln!(out, "\n{:<5} {:<24} {}", "RANK", "NAME", "IDENTIFIER");
        let _ = writeln!(out, "{}", "-".repeat(80));
        for c in &state.candidates {
            let _ = writeln!(out, "{:<5} {:<24} {}", c.rank, c.name, c.identifier);
        }
    }

    if let Some(cost) = &state.cost {
        let _ = writeln!(
            out,
            "\nCost: ${:.4} ({} tokens in, {} out)",
            cost.total_cost, cost.input_tokens, cost.output_tokens
        );
    }

    if let Some(summary) = &state.summary {
        let _ = writeln!(out, "\n{summary}");
    }

    for anomaly in &state.anomalies {
        let _ = writeln!(
            out,
            "note: {} {} went {} -> {} ({})",
            anomaly.entity, anomaly.id, anomaly.from, anomaly.to, anomaly.reason
        );
    }

    if let Some(error) = &state.error {
        let _ = writeln!(out, "\nInvestigation failed: {error}");
    }

    out
}
