//! The REST surface of the SME backend.
//!
//! [`Backend`] is the seam the orchestrator, monitor, prefetcher and builder
//! depend on; [`HttpBackend`] is the reqwest implementation.

pub mod http;

use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::{
    AnalysisPayload, CustomRole, ExpertAnswer, GeneratedRules, HealthReport, RoleRules,
};

pub use http::HttpBackend;

/// Body of `analyze-hallucination`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisRequest {
    pub expert_answer: String,
    pub base_answer: String,
    pub question: String,
    pub role: String,
}

/// A document handed to `extract-text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = guess_content_type(&file_name).map(str::to_string);
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(file_name, bytes))
    }
}

fn guess_content_type(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_lowercase();
    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "txt" => Some("text/plain"),
        "md" => Some("text/markdown"),
        "csv" => Some("text/csv"),
        "docx" => Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        _ => None,
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn health(&self) -> Result<HealthReport, ApiError>;

    /// `role` is an expert role name or [`crate::roles::BASE_ROLE`].
    async fn ask_expert(&self, question: &str, role: &str) -> Result<ExpertAnswer, ApiError>;

    async fn role_rules(&self, role: &str) -> Result<RoleRules, ApiError>;

    async fn analyze_hallucination(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisPayload, ApiError>;

    async fn list_custom_roles(&self) -> Result<Vec<CustomRole>, ApiError>;

    async fn save_custom_role(&self, role: &CustomRole) -> Result<(), ApiError>;

    async fn generate_rules(
        &self,
        role_name: &str,
        knowledge_base: Option<&str>,
    ) -> Result<GeneratedRules, ApiError>;

    async fn extract_text(&self, file: &Attachment) -> Result<String, ApiError>;
}
