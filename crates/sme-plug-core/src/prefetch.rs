//! Guardrails/roadmap prefetch for the selected expert role.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::api::Backend;
use crate::roles::is_base_role;
use crate::state::{ConnectivityState, RoleRules};

/// What the guardrails panel shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleRulesView {
    pub role: Option<String>,
    pub rules: Option<RoleRules>,
    pub loading: bool,
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchOutcome {
    Loaded,
    /// The fetch failed; no rules are shown.
    Cleared,
    /// A newer selection took over before this fetch resolved.
    Stale,
    Offline,
    /// The role was already selected.
    Unchanged,
    /// The base model has no guardrails.
    NotApplicable,
}

pub struct RoleRulesPrefetcher {
    backend: Arc<dyn Backend>,
    connectivity: watch::Receiver<ConnectivityState>,
    view: watch::Sender<RoleRulesView>,
}

impl RoleRulesPrefetcher {
    pub fn new(
        backend: Arc<dyn Backend>,
        connectivity: watch::Receiver<ConnectivityState>,
    ) -> Self {
        let (view, _) = watch::channel(RoleRulesView::default());
        Self {
            backend,
            connectivity,
            view,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<RoleRulesView> {
        self.view.subscribe()
    }

    pub fn snapshot(&self) -> RoleRulesView {
        self.view.borrow().clone()
    }

    /// Switch to `role` and fetch its rules. Rules of the previous role are
    /// dropped immediately, never merged.
    pub async fn select_role(&self, role: &str) -> PrefetchOutcome {
        let mut generation = None;
        self.view.send_if_modified(|view| {
            if view.role.as_deref() == Some(role) {
                return false;
            }
            view.role = Some(role.to_string());
            view.rules = None;
            view.loading = false;
            view.generation += 1;
            generation = Some(view.generation);
            true
        });

        match generation {
            Some(generation) => self.fetch(role, generation).await,
            None => PrefetchOutcome::Unchanged,
        }
    }

    /// Refetch the current role, e.g. after connectivity returns.
    pub async fn refresh(&self) -> PrefetchOutcome {
        let mut target = None;
        self.view.send_if_modified(|view| {
            let Some(role) = view.role.clone() else {
                return false;
            };
            view.generation += 1;
            target = Some((role, view.generation));
            // The superseded fetch will never commit, so it can't clear this.
            std::mem::replace(&mut view.loading, false)
        });

        match target {
            Some((role, generation)) => self.fetch(&role, generation).await,
            None => PrefetchOutcome::Unchanged,
        }
    }

    async fn fetch(&self, role: &str, generation: u64) -> PrefetchOutcome {
        if is_base_role(role) {
            return PrefetchOutcome::NotApplicable;
        }
        if !self.connectivity.borrow().is_online() {
            debug!(role, "offline, skipping role-rules fetch");
            return PrefetchOutcome::Offline;
        }

        self.commit(generation, |view| view.loading = true);
        let result = self.backend.role_rules(role).await;
        let outcome = match &result {
            Ok(_) => PrefetchOutcome::Loaded,
            Err(err) => {
                warn!(role, error = %err, "role-rules fetch failed");
                PrefetchOutcome::Cleared
            }
        };

        let current = self.commit(generation, |view| {
            view.loading = false;
            view.rules = result.ok();
        });
        if !current {
            debug!(role, "stale role-rules resolution discarded");
            return PrefetchOutcome::Stale;
        }
        outcome
    }

    fn commit(&self, generation: u64, update: impl FnOnce(&mut RoleRulesView)) -> bool {
        self.view.send_if_modified(|view| {
            if view.generation != generation {
                return false;
            }
            update(view);
            true
        })
    }
}
