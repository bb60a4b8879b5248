//! UI-agnostic application state types
//!
//! Data structures shared by the orchestration layer and any front end
//! (TUI, CLI). Types that cross the wire deserialize straight from the
//! backend's JSON; required fields are enforced by serde at that boundary.

use serde::{Deserialize, Serialize};

/// A submitted question, immutable once dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub expert_role: String,
}

impl Query {
    pub fn new(text: impl Into<String>, expert_role: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            expert_role: expert_role.into(),
        }
    }
}

/// One response panel.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResponseSlot<T> {
    #[default]
    Empty,
    Loading,
    Success(T),
    Error(String),
}

impl<T> ResponseSlot<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, ResponseSlot::Loading)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResponseSlot::Success(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ResponseSlot::Error(_))
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            ResponseSlot::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ResponseSlot::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// One node of the backend's reasoning trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepLog {
    pub node: String,
    pub status: String,
    #[serde(default)]
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadmapStep {
    pub step: String,
    #[serde(rename = "desc", alias = "description", default)]
    pub description: String,
}

/// Answer from `ask-expert`, for either an expert role or the base model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpertAnswer {
    pub answer: String,
    #[serde(default)]
    pub citations: Vec<String>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub out_of_scope: bool,
    #[serde(default)]
    pub generated_by_model: Option<String>,
    #[serde(default)]
    pub steps: Vec<StepLog>,
    #[serde(default)]
    pub expert_rules: Vec<String>,
    #[serde(default)]
    pub roadmap: Vec<RoadmapStep>,
}

impl ExpertAnswer {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            citations: Vec::new(),
            accuracy: None,
            out_of_scope: false,
            generated_by_model: None,
            steps: Vec::new(),
            expert_rules: Vec::new(),
            roadmap: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    pub analysis: String,
    #[serde(default)]
    pub hallucination_score: Option<f64>,
}

impl AnalysisPayload {
    /// Placeholder shown when the comparison call fails.
    pub fn degraded() -> Self {
        Self {
            analysis: "Analysis failed.".to_string(),
            hallucination_score: Some(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub question: String,
    pub expert_role: String,
    pub timestamp: String,
}

/// Guardrails and roadmap of one role.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoleRules {
    #[serde(default)]
    pub expert_rules: Vec<String>,
    #[serde(default)]
    pub roadmap: Vec<RoadmapStep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectivityState {
    Online,
    #[default]
    Offline,
}

impl ConnectivityState {
    pub fn is_online(&self) -> bool {
        matches!(self, ConnectivityState::Online)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRole {
    pub role_name: String,
    #[serde(default)]
    pub core_directive: String,
    #[serde(default)]
    pub expert_rules: Vec<String>,
    #[serde(default)]
    pub roadmap: Vec<RoadmapStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_base: Option<String>,
}

/// Output of `generate-rules`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedRules {
    pub core_directive: String,
    #[serde(default)]
    pub expert_rules: Vec<String>,
    #[serde(default)]
    pub roadmap: Vec<RoadmapStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub llm_provider: Option<String>,
    #[serde(default)]
    pub chroma_db_dir: Option<String>,
}

impl HealthReport {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}
