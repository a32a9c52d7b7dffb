//! Investigation entities: hypotheses, experiments, findings, controls,
//! candidates and cost accounting.
//!
//! Every entity here is created only as a side effect of a stream event. Wire
//! payloads use snake_case keys; camelCase aliases are accepted where the
//! backend is known to emit them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HypothesisStatus {
    #[default]
    Proposed,
    Testing,
    Supported,
    Refuted,
    Revised,
}

impl HypothesisStatus {
    /// Supported, refuted and revised are outcomes of an evaluation.
    pub fn is_evaluated(&self) -> bool {
        matches!(self, Self::Supported | Self::Refuted | Self::Revised)
    }
}

impl fmt::Display for HypothesisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proposed => write!(f, "proposed"),
            Self::Testing => write!(f, "testing"),
            Self::Supported => write!(f, "supported"),
            Self::Refuted => write!(f, "refuted"),
            Self::Revised => write!(f, "revised"),
        }
    }
}

impl FromStr for HypothesisStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "proposed" => Ok(Self::Proposed),
            "testing" => Ok(Self::Testing),
            "supported" => Ok(Self::Supported),
            "refuted" => Ok(Self::Refuted),
            "revised" => Ok(Self::Revised),
            _ => Err(format!("unknown hypothesis status: {s}")),
        }
    }
}

/// Experiment lifecycle. Only `Running` and `Completed` are driven by the
/// observed protocol; the rest are reserved by the backend taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    Planned,
    #[default]
    Running,
    AwaitingApproval,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl ExperimentStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Planned => write!(f, "planned"),
            Self::Running => write!(f, "running"),
            Self::AwaitingApproval => write!(f, "awaiting_approval"),
            Self::Paused => write!(f, "paused"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for ExperimentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planned" => Ok(Self::Planned),
            "running" => Ok(Self::Running),
            "awaiting_approval" => Ok(Self::AwaitingApproval),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("unknown experiment status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    Supporting,
    Contradicting,
    #[default]
    Neutral,
}

impl fmt::Display for EvidenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Supporting => write!(f, "supporting"),
            Self::Contradicting => write!(f, "contradicting"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub id: String,
    #[serde(default)]
    pub statement: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub status: HypothesisStatus,
    /// The hypothesis this one revises, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// In `[0, 1]`; only meaningful once the hypothesis has been evaluated.
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub id: String,
    pub hypothesis_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: ExperimentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finding_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub hypothesis_id: String,
    #[serde(default)]
    pub evidence_type: EvidenceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_id: Option<String>,
}

/// A known-answer compound used to audit the scoring model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegativeControl {
    #[serde(alias = "smiles")]
    pub identifier: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub prediction_score: f64,
    #[serde(default)]
    pub correctly_classified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub rank: u32,
    #[serde(alias = "smiles")]
    pub identifier: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelUsage {
    #[serde(default, alias = "inputTokens")]
    pub input_tokens: u64,
    #[serde(default, alias = "outputTokens")]
    pub output_tokens: u64,
    #[serde(default)]
    pub cost: f64,
}

/// Flat token and dollar accounting for one investigation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostInfo {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub tool_calls: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_model: Option<BTreeMap<String, ModelUsage>>,
}
