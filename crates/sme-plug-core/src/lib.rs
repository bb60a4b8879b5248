pub mod api;
pub mod builder;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod history;
pub mod orchestrator;
pub mod prefetch;
pub mod provider;
pub mod roles;
pub mod state;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use api::{AnalysisRequest, Attachment, Backend, HttpBackend};
pub use builder::{BuildStatus, CustomRoleBuilder};
pub use config::{Config, CredentialProvider, Credentials};
pub use connectivity::ConnectivityMonitor;
pub use error::{ApiError, BuildError, ConfigError, CoreError};
pub use history::HistoryLedger;
pub use orchestrator::{ExchangeState, QueryOrchestrator, QueryOutcome};
pub use prefetch::{PrefetchOutcome, RoleRulesPrefetcher, RoleRulesView};
pub use provider::Provider;
pub use state::{
    AnalysisPayload, ConnectivityState, CustomRole, ExpertAnswer, GeneratedRules, HealthReport,
    HistoryEntry, Query, ResponseSlot, RoadmapStep, RoleRules, StepLog,
};
