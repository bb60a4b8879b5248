//! Expert → base → analysis query orchestration.
//!
//! One exchange is three strictly sequential backend calls feeding three
//! independent [`ResponseSlot`]s. State is published on a `watch` channel;
//! every write after dispatch is tagged with the exchange's sequence number
//! and dropped if a newer exchange (or a reset) has started since.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{AnalysisRequest, Backend};
use crate::error::CoreError;
use crate::history::HistoryLedger;
use crate::roles::BASE_ROLE;
use crate::state::{AnalysisPayload, ExpertAnswer, Query, ResponseSlot};

/// Everything a front end renders for the comparison view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeState {
    /// Bumped whenever a query starts or the session resets.
    pub sequence: u64,
    pub query: Option<Query>,
    /// The question being typed; cleared when an exchange completes.
    pub draft: String,
    pub expert: ResponseSlot<ExpertAnswer>,
    pub base: ResponseSlot<ExpertAnswer>,
    pub analysis: ResponseSlot<AnalysisPayload>,
    pub history: HistoryLedger,
    archived: bool,
}

impl ExchangeState {
    pub fn is_pending(&self) -> bool {
        self.expert.is_loading() || self.base.is_loading() || self.analysis.is_loading()
    }

    /// Archive the displayed exchange, at most once.
    fn archive_displayed(&mut self) {
        if self.archived || !self.expert.is_success() {
            return;
        }
        if let Some(query) = &self.query {
            self.history.archive(query);
            self.archived = true;
        }
    }
}

/// How a call to [`QueryOrchestrator::submit_query`] settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    /// Both answers arrived and the analysis ran (possibly degraded).
    Completed { analysis_degraded: bool },
    ExpertFailed,
    BaseFailed,
    /// A newer query or a reset took over before this one finished.
    Superseded,
}

pub struct QueryOrchestrator {
    backend: Arc<dyn Backend>,
    state: watch::Sender<ExchangeState>,
    pacing: Duration,
}

impl QueryOrchestrator {
    /// `pacing` is the pause between the expert and the base call.
    pub fn new(backend: Arc<dyn Backend>, pacing: Duration) -> Self {
        let (state, _) = watch::channel(ExchangeState::default());
        Self {
            backend,
            state,
            pacing,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ExchangeState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ExchangeState {
        self.state.borrow().clone()
    }

    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    pub fn set_draft(&self, draft: impl Into<String>) {
        let draft = draft.into();
        self.state.send_if_modified(|s| {
            if s.draft == draft {
                return false;
            }
            s.draft = draft;
            true
        });
    }

    /// Archive the displayed exchange and clear the panels. Queries still in
    /// flight become stale.
    pub fn reset(&self) {
        self.state.send_modify(|s| {
            s.archive_displayed();
            s.sequence += 1;
            s.query = None;
            s.expert = ResponseSlot::Empty;
            s.base = ResponseSlot::Empty;
            s.analysis = ResponseSlot::Empty;
            s.archived = false;
        });
        info!("session reset");
    }

    pub async fn submit_query(
        &self,
        question: &str,
        expert_role: &str,
    ) -> Result<QueryOutcome, CoreError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(CoreError::EmptyQuestion);
        }

        let query = Query::new(question, expert_role);
        let ticket = self.begin(query.clone());
        info!(seq = ticket, role = expert_role, "query submitted");

        let expert = match self.backend.ask_expert(question, expert_role).await {
            Ok(answer) => answer,
            Err(err) => {
                warn!(seq = ticket, error = %err, "expert call failed");
                let message = err.user_message();
                let current = self.commit(ticket, |s| {
                    s.expert = ResponseSlot::Error(message.clone());
                    s.base = ResponseSlot::Error(message);
                });
                return Ok(self.settle(ticket, current, QueryOutcome::ExpertFailed));
            }
        };
        if !self.commit(ticket, |s| s.expert = ResponseSlot::Success(expert.clone())) {
            return Ok(self.settle(ticket, false, QueryOutcome::Superseded));
        }

        tokio::time::sleep(self.pacing).await;
        if !self.is_current(ticket) {
            return Ok(self.settle(ticket, false, QueryOutcome::Superseded));
        }

        let base = match self.backend.ask_expert(question, BASE_ROLE).await {
            Ok(answer) => answer,
            Err(err) => {
                warn!(seq = ticket, error = %err, "base call failed");
                let message = err.user_message();
                let current = self.commit(ticket, |s| s.base = ResponseSlot::Error(message));
                return Ok(self.settle(ticket, current, QueryOutcome::BaseFailed));
            }
        };
        let current = self.commit(ticket, |s| {
            s.base = ResponseSlot::Success(base.clone());
            s.analysis = ResponseSlot::Loading;
        });
        if !current {
            return Ok(self.settle(ticket, false, QueryOutcome::Superseded));
        }

        let request = AnalysisRequest {
            expert_answer: expert.answer,
            base_answer: base.answer,
            question: query.text,
            role: query.expert_role,
        };
        let (analysis, analysis_degraded) =
            match self.backend.analyze_hallucination(&request).await {
                Ok(analysis) => (analysis, false),
                Err(err) => {
                    warn!(seq = ticket, error = %err, "analysis unavailable, using placeholder");
                    (AnalysisPayload::degraded(), true)
                }
            };

        let current = self.commit(ticket, |s| {
            s.analysis = ResponseSlot::Success(analysis);
            s.draft.clear();
        });
        Ok(self.settle(
            ticket,
            current,
            QueryOutcome::Completed { analysis_degraded },
        ))
    }

    fn begin(&self, query: Query) -> u64 {
        let mut ticket = 0;
        self.state.send_modify(|s| {
            s.archive_displayed();
            s.sequence += 1;
            s.query = Some(query);
            s.expert = ResponseSlot::Loading;
            s.base = ResponseSlot::Loading;
            s.analysis = ResponseSlot::Empty;
            s.archived = false;
            ticket = s.sequence;
        });
        ticket
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.state.borrow().sequence == ticket
    }

    /// Apply `update` only while `ticket` is still the live exchange.
    fn commit(&self, ticket: u64, update: impl FnOnce(&mut ExchangeState)) -> bool {
        self.state.send_if_modified(|s| {
            if s.sequence != ticket {
                return false;
            }
            update(s);
            true
        })
    }

    fn settle(&self, ticket: u64, current: bool, outcome: QueryOutcome) -> QueryOutcome {
        if current {
            info!(seq = ticket, ?outcome, "query settled");
            outcome
        } else {
            debug!(seq = ticket, "stale resolution discarded");
            QueryOutcome::Superseded
        }
    }
}
