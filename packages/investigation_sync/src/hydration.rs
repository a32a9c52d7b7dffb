//! Terminal snapshot merge.
//!
//! The `completed` event carries a bulk view of the investigation. A client
//! that watched the stream live already holds most of it; a client that
//! attached late holds nothing. Merging the snapshot with [`hydrate`] makes
//! both converge on the same final state without duplicating list entries.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::model::{Candidate, CostInfo, Finding, Hypothesis, ModelUsage, NegativeControl};
use crate::state::InvestigationState;

/// Payload of the `completed` event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TerminalPayload {
    pub candidate_count: Option<u32>,
    pub candidates: Option<Vec<Candidate>>,
    pub findings: Option<Vec<Finding>>,
    pub hypotheses: Option<Vec<Hypothesis>>,
    pub negative_controls: Option<Vec<NegativeControl>>,
    pub cost: Option<CostBreakdown>,
    pub prompt: Option<String>,
    pub summary: Option<String>,
}

impl TerminalPayload {
    /// Read the snapshot one field at a time. A malformed field is left out
    /// and a malformed list entry is dropped; everything else is kept.
    pub fn from_payload(payload: &Value) -> Self {
        Self {
            candidate_count: field(payload, "candidate_count"),
            candidates: list(payload, "candidates"),
            findings: list(payload, "findings"),
            hypotheses: list(payload, "hypotheses"),
            negative_controls: list(payload, "negative_controls"),
            cost: field(payload, "cost"),
            prompt: field(payload, "prompt"),
            summary: field(payload, "summary"),
        }
    }
}

fn field<T: DeserializeOwned>(payload: &Value, key: &str) -> Option<T> {
    let value = payload.get(key).filter(|value| !value.is_null())?;
    match T::deserialize(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            debug!(field = key, error = %e, "skipping malformed snapshot field");
            None
        }
    }
}

fn list<T: DeserializeOwned>(payload: &Value, key: &str) -> Option<Vec<T>> {
    let value = payload.get(key).filter(|value| !value.is_null())?;
    let Some(items) = value.as_array() else {
        debug!(field = key, "snapshot field is not a list, skipping");
        return None;
    };

    let parsed = items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match T::deserialize(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!(field = key, index, error = %e, "dropping malformed snapshot entry");
                None
            }
        })
        .collect();
    Some(parsed)
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TokenBreakdown {
    #[serde(default, alias = "input_tokens")]
    pub input: u64,
    #[serde(default, alias = "output_tokens")]
    pub output: u64,
    #[serde(default, alias = "total_tokens")]
    pub total: Option<u64>,
}

/// Cost as the backend reports it: either nested under `tokens` or flat,
/// snake_case or camelCase.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CostBreakdown {
    #[serde(default)]
    pub tokens: Option<TokenBreakdown>,
    #[serde(default, alias = "inputTokens")]
    pub input_tokens: Option<u64>,
    #[serde(default, alias = "outputTokens")]
    pub output_tokens: Option<u64>,
    #[serde(default, alias = "totalTokens")]
    pub total_tokens: Option<u64>,
    #[serde(default, alias = "totalCost", alias = "total_cost_usd")]
    pub total_cost: Option<f64>,
    #[serde(default, alias = "toolCalls")]
    pub tool_calls: Option<u64>,
    #[serde(default, alias = "byModel")]
    pub by_model: Option<BTreeMap<String, ModelUsage>>,
}

impl CostBreakdown {
    /// Flatten into [`CostInfo`]. `observed_tool_calls` fills in the tool
    /// call count when the backend omits it.
    pub fn normalize(self, observed_tool_calls: u64) -> CostInfo {
        let (input_tokens, output_tokens, nested_total) = match &self.tokens {
            Some(tokens) => (tokens.input, tokens.output, tokens.total),
            None => (
                self.input_tokens.unwrap_or(0),
                self.output_tokens.unwrap_or(0),
                None,
            ),
        };

        let total_tokens = nested_total
            .or(self.total_tokens)
            .unwrap_or(input_tokens + output_tokens);

        let total_cost = self.total_cost.unwrap_or_else(|| {
            self.by_model
                .as_ref()
                .map(|models| models.values().map(|m| m.cost).sum())
                .unwrap_or(0.0)
        });

        CostInfo {
            input_tokens,
            output_tokens,
            total_tokens,
            total_cost,
            tool_calls: self.tool_calls.unwrap_or(observed_tool_calls),
            by_model: self.by_model,
        }
    }
}

/// Merge the terminal snapshot into the incrementally built state.
///
/// - candidates: always replaced
/// - findings, hypotheses, negative controls: adopted only into an empty list
/// - cost: overwritten whenever the snapshot carries one
pub fn hydrate(mut state: InvestigationState, payload: TerminalPayload) -> InvestigationState {
    let candidates = payload.candidates.unwrap_or_default();
    if let Some(expected) = payload.candidate_count {
        if expected as usize != candidates.len() {
            debug!(
                expected,
                received = candidates.len(),
                "candidate count disagrees with candidate list"
            );
        }
    }
    state.candidates = candidates;

    adopt_if_empty(&mut state.findings, payload.findings);
    adopt_if_empty(&mut state.hypotheses, payload.hypotheses);
    adopt_if_empty(&mut state.negative_controls, payload.negative_controls);

    if let Some(cost) = payload.cost {
        state.cost = Some(cost.normalize(state.total_tool_calls));
    }
    if payload.prompt.is_some() {
        state.prompt = payload.prompt;
    }
    if payload.summary.is_some() {
        state.summary = payload.summary;
    }

    state
}

fn adopt_if_empty<T>(local: &mut Vec<T>, bulk: Option<Vec<T>>) {
    if local.is_empty() {
        if let Some(bulk) = bulk {
            *local = bulk;
        }
    }
}
