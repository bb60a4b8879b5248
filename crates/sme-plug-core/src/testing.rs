//! Scripted in-memory [`Backend`] for unit tests.
//!
//! Every call is recorded with the tokio instant it started and resolved at,
//! so tests running on paused time can assert exact ordering and pacing.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::api::{AnalysisRequest, Attachment, Backend};
use crate::error::ApiError;
use crate::state::{
    AnalysisPayload, CustomRole, ExpertAnswer, GeneratedRules, HealthReport, RoadmapStep,
    RoleRules,
};

pub(crate) struct Reply<T> {
    pub delay: Duration,
    pub result: Result<T, ApiError>,
}

impl<T> Reply<T> {
    pub fn ok(value: T) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(value),
        }
    }

    pub fn err(err: ApiError) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(err),
        }
    }

    pub fn after_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }
}

pub(crate) fn server_error(status: u16, detail: &str) -> ApiError {
    ApiError::Server {
        status,
        detail: Some(detail.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Started,
    Resolved,
}

#[derive(Debug, Clone)]
pub(crate) struct CallEvent {
    pub op: &'static str,
    pub key: String,
    pub phase: Phase,
    pub at: Instant,
}

type AskFn = Box<dyn Fn(&str, &str) -> Reply<ExpertAnswer> + Send + Sync>;
type HealthFn = Box<dyn Fn() -> Reply<HealthReport> + Send + Sync>;
type RulesFn = Box<dyn Fn(&str) -> Reply<RoleRules> + Send + Sync>;
type AnalyzeFn = Box<dyn Fn(&AnalysisRequest) -> Reply<AnalysisPayload> + Send + Sync>;
type ExtractFn = Box<dyn Fn(&Attachment) -> Reply<String> + Send + Sync>;
type GenerateFn = Box<dyn Fn(&str, Option<&str>) -> Reply<GeneratedRules> + Send + Sync>;
type SaveFn = Box<dyn Fn(&CustomRole) -> Reply<()> + Send + Sync>;
type ListFn = Box<dyn Fn(&[CustomRole]) -> Reply<Vec<CustomRole>> + Send + Sync>;

pub(crate) struct ScriptedBackend {
    ask: AskFn,
    health: HealthFn,
    rules: RulesFn,
    analyze: AnalyzeFn,
    extract: ExtractFn,
    generate: GenerateFn,
    save: SaveFn,
    list: ListFn,
    saved: Mutex<Vec<CustomRole>>,
    events: Mutex<Vec<CallEvent>>,
    analysis_requests: Mutex<Vec<AnalysisRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            ask: Box::new(|question, role| {
                Reply::ok(ExpertAnswer::new(format!("{role} answer to {question}")))
            }),
            health: Box::new(|| {
                Reply::ok(HealthReport {
                    status: "ok".to_string(),
                    llm_provider: None,
                    chroma_db_dir: None,
                })
            }),
            rules: Box::new(|role| {
                Reply::ok(RoleRules {
                    expert_rules: vec![format!("{role} rule")],
                    roadmap: Vec::new(),
                })
            }),
            analyze: Box::new(|_| {
                Reply::ok(AnalysisPayload {
                    analysis: "The base model drifted off-topic.".to_string(),
                    hallucination_score: Some(40.0),
                })
            }),
            extract: Box::new(|file| Reply::ok(format!("text of {}", file.file_name))),
            generate: Box::new(|name, _| {
                Reply::ok(GeneratedRules {
                    core_directive: format!("You are a {name}."),
                    expert_rules: vec!["Cite a primary source.".to_string()],
                    roadmap: vec![RoadmapStep {
                        step: "Survey".to_string(),
                        description: "Map the field.".to_string(),
                    }],
                })
            }),
            save: Box::new(|_| Reply::ok(())),
            list: Box::new(|saved| Reply::ok(saved.to_vec())),
            saved: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            analysis_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn on_ask(
        mut self,
        f: impl Fn(&str, &str) -> Reply<ExpertAnswer> + Send + Sync + 'static,
    ) -> Self {
        self.ask = Box::new(f);
        self
    }

    pub fn on_health(mut self, f: impl Fn() -> Reply<HealthReport> + Send + Sync + 'static) -> Self {
        self.health = Box::new(f);
        self
    }

    pub fn on_rules(mut self, f: impl Fn(&str) -> Reply<RoleRules> + Send + Sync + 'static) -> Self {
        self.rules = Box::new(f);
        self
    }

    pub fn on_analyze(
        mut self,
        f: impl Fn(&AnalysisRequest) -> Reply<AnalysisPayload> + Send + Sync + 'static,
    ) -> Self {
        self.analyze = Box::new(f);
        self
    }

    pub fn on_extract(
        mut self,
        f: impl Fn(&Attachment) -> Reply<String> + Send + Sync + 'static,
    ) -> Self {
        self.extract = Box::new(f);
        self
    }

    pub fn on_generate(
        mut self,
        f: impl Fn(&str, Option<&str>) -> Reply<GeneratedRules> + Send + Sync + 'static,
    ) -> Self {
        self.generate = Box::new(f);
        self
    }

    pub fn on_save(mut self, f: impl Fn(&CustomRole) -> Reply<()> + Send + Sync + 'static) -> Self {
        self.save = Box::new(f);
        self
    }

    pub fn on_list(
        mut self,
        f: impl Fn(&[CustomRole]) -> Reply<Vec<CustomRole>> + Send + Sync + 'static,
    ) -> Self {
        self.list = Box::new(f);
        self
    }

    pub fn events(&self) -> Vec<CallEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Number of started calls of `op`, optionally filtered by key.
    pub fn calls(&self, op: &str, key: Option<&str>) -> usize {
        self.events()
            .iter()
            .filter(|e| e.phase == Phase::Started && e.op == op)
            .filter(|e| key.map_or(true, |k| e.key == k))
            .count()
    }

    pub fn instant(&self, op: &str, key: &str, phase: Phase) -> Option<Instant> {
        self.events()
            .iter()
            .find(|e| e.op == op && e.key == key && e.phase == phase)
            .map(|e| e.at)
    }

    pub fn saved_roles(&self) -> Vec<CustomRole> {
        self.saved.lock().unwrap().clone()
    }

    pub fn analysis_requests(&self) -> Vec<AnalysisRequest> {
        self.analysis_requests.lock().unwrap().clone()
    }

    fn record(&self, op: &'static str, key: &str, phase: Phase) {
        self.events.lock().unwrap().push(CallEvent {
            op,
            key: key.to_string(),
            phase,
            at: Instant::now(),
        });
    }

    async fn play<T>(&self, op: &'static str, key: &str, reply: Reply<T>) -> Result<T, ApiError> {
        self.record(op, key, Phase::Started);
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        self.record(op, key, Phase::Resolved);
        reply.result
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn health(&self) -> Result<HealthReport, ApiError> {
        let reply = (self.health)();
        self.play("health", "", reply).await
    }

    async fn ask_expert(&self, question: &str, role: &str) -> Result<ExpertAnswer, ApiError> {
        let reply = (self.ask)(question, role);
        self.play("ask-expert", role, reply).await
    }

    async fn role_rules(&self, role: &str) -> Result<RoleRules, ApiError> {
        let reply = (self.rules)(role);
        self.play("role-rules", role, reply).await
    }

    async fn analyze_hallucination(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisPayload, ApiError> {
        self.analysis_requests.lock().unwrap().push(request.clone());
        let reply = (self.analyze)(request);
        self.play("analyze-hallucination", &request.role, reply).await
    }

    async fn list_custom_roles(&self) -> Result<Vec<CustomRole>, ApiError> {
        let reply = {
            let saved = self.saved.lock().unwrap();
            (self.list)(&saved)
        };
        self.play("custom-roles", "list", reply).await
    }

    async fn save_custom_role(&self, role: &CustomRole) -> Result<(), ApiError> {
        let reply = (self.save)(role);
        self.play("custom-roles", "save", reply).await?;
        self.saved.lock().unwrap().push(role.clone());
        Ok(())
    }

    async fn generate_rules(
        &self,
        role_name: &str,
        knowledge_base: Option<&str>,
    ) -> Result<GeneratedRules, ApiError> {
        let reply = (self.generate)(role_name, knowledge_base);
        self.play("generate-rules", role_name, reply).await
    }

    async fn extract_text(&self, file: &Attachment) -> Result<String, ApiError> {
        let reply = (self.extract)(file);
        self.play("extract-text", &file.file_name, reply).await
    }
}
