use std::path::PathBuf;
use std::sync::Arc;

use ratatui::widgets::ListState;
use sme_plug_core::roles::{is_builtin, BASE_ROLE, BUILTIN_ROLES};
use sme_plug_core::{
    Backend, BuildStatus, Config, ConnectivityMonitor, ConnectivityState, CoreError, CustomRole,
    CustomRoleBuilder, ExchangeState, HttpBackend, Provider, QueryOrchestrator,
    RoleRulesPrefetcher, RoleRulesView,
};
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Input,
    Expert,
    Base,
    Analysis,
    Guardrails,
}

impl FocusPane {
    pub fn next(self) -> Self {
        match self {
            FocusPane::Input => FocusPane::Expert,
            FocusPane::Expert => FocusPane::Base,
            FocusPane::Base => FocusPane::Analysis,
            FocusPane::Analysis => FocusPane::Guardrails,
            FocusPane::Guardrails => FocusPane::Input,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Popup {
    RolePicker,
    CreateRole,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormField {
    #[default]
    Name,
    File,
}

/// The custom-role popup's two text fields.
#[derive(Debug, Clone, Default)]
pub struct RoleForm {
    pub name: String,
    pub file_path: String,
    pub field: FormField,
}

impl RoleForm {
    pub fn active_mut(&mut self) -> &mut String {
        match self.field {
            FormField::Name => &mut self.name,
            FormField::File => &mut self.file_path,
        }
    }

    pub fn toggle_field(&mut self) {
        self.field = match self.field {
            FormField::Name => FormField::File,
            FormField::File => FormField::Name,
        };
    }
}

/// Per-panel vertical scroll offsets.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scrolls {
    pub expert: u16,
    pub base: u16,
    pub analysis: u16,
    pub guardrails: u16,
}

impl Scrolls {
    pub fn get_mut(&mut self, pane: FocusPane) -> Option<&mut u16> {
        match pane {
            FocusPane::Input => None,
            FocusPane::Expert => Some(&mut self.expert),
            FocusPane::Base => Some(&mut self.base),
            FocusPane::Analysis => Some(&mut self.analysis),
            FocusPane::Guardrails => Some(&mut self.guardrails),
        }
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,
    pub popup: Option<Popup>,

    // Question input (the text itself lives in the orchestrator's draft)
    pub cursor: usize,

    pub selected_role: String,
    pub provider: Option<Provider>,
    pub base_url: String,

    // Popups
    pub role_picker_state: ListState,
    pub history_state: ListState,
    pub form: RoleForm,

    pub scrolls: Scrolls,
    pub animation_frame: u8,
    /// One-line message shown in the footer until the next keypress.
    pub notice: Option<String>,

    // Latest published state, refreshed by `sync`
    pub exchange: ExchangeState,
    pub rules: RoleRulesView,
    pub build_status: BuildStatus,
    pub custom_roles: Vec<CustomRole>,
    pub connectivity: ConnectivityState,

    // Core components
    pub orchestrator: Arc<QueryOrchestrator>,
    pub prefetcher: Arc<RoleRulesPrefetcher>,
    pub builder: Arc<CustomRoleBuilder>,
    monitor: Option<ConnectivityMonitor>,
    connectivity_rx: watch::Receiver<ConnectivityState>,
}

impl App {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let backend: Arc<dyn Backend> = Arc::new(HttpBackend::from_config(config)?);

        let orchestrator = Arc::new(QueryOrchestrator::new(backend.clone(), config.pacing()));
        let monitor = ConnectivityMonitor::spawn(backend.clone(), config.health_interval());
        let connectivity_rx = monitor.subscribe();
        let prefetcher = Arc::new(RoleRulesPrefetcher::new(
            backend.clone(),
            monitor.subscribe(),
        ));
        let builder = Arc::new(CustomRoleBuilder::new(backend));

        let selected_role = BUILTIN_ROLES[0].to_string();
        let mut app = Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            focus: FocusPane::Input,
            popup: None,

            cursor: 0,

            selected_role: selected_role.clone(),
            provider: config.provider(),
            base_url: config.base_url(),

            role_picker_state: ListState::default(),
            history_state: ListState::default(),
            form: RoleForm::default(),

            scrolls: Scrolls::default(),
            animation_frame: 0,
            notice: None,

            exchange: orchestrator.snapshot(),
            rules: prefetcher.snapshot(),
            build_status: builder.status(),
            custom_roles: Vec::new(),
            connectivity: ConnectivityState::Offline,

            orchestrator,
            prefetcher,
            builder,
            monitor: Some(monitor),
            connectivity_rx,
        };

        app.select_role(selected_role);
        app.load_custom_roles();
        Ok(app)
    }

    /// Pull the latest published state from the core components.
    pub fn sync(&mut self) {
        self.exchange = self.orchestrator.snapshot();
        self.rules = self.prefetcher.snapshot();
        self.build_status = self.builder.status();
        self.custom_roles = self.builder.roles();
        self.cursor = self.cursor.min(self.exchange.draft.chars().count());

        if self.connectivity_rx.has_changed().unwrap_or(false) {
            let now = *self.connectivity_rx.borrow_and_update();
            let came_online = !self.connectivity.is_online() && now.is_online();
            self.connectivity = now;
            if came_online {
                // Rules requested while offline were skipped
                let prefetcher = self.prefetcher.clone();
                tokio::spawn(async move {
                    prefetcher.refresh().await;
                });
                if self.custom_roles.is_empty() {
                    self.load_custom_roles();
                }
            }
        }
    }

    pub fn tick(&mut self) {
        self.sync();
        if self.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn is_busy(&self) -> bool {
        self.exchange.is_pending() || self.build_status.is_busy() || self.rules.loading
    }

    pub fn draft(&self) -> &str {
        &self.exchange.draft
    }

    /// Replace the question draft, keeping the cursor inside it.
    pub fn set_draft(&mut self, draft: String, cursor: usize) {
        self.cursor = cursor.min(draft.chars().count());
        self.orchestrator.set_draft(draft);
        self.exchange = self.orchestrator.snapshot();
    }

    pub fn submit_query(&mut self) {
        let question = self.exchange.draft.trim().to_string();
        if question.is_empty() {
            self.notice = Some("Type a question first.".to_string());
            return;
        }

        let orchestrator = self.orchestrator.clone();
        let role = self.selected_role.clone();
        self.scrolls = Scrolls::default();
        tokio::spawn(async move {
            match orchestrator.submit_query(&question, &role).await {
                Ok(outcome) => info!(?outcome, "exchange finished"),
                Err(CoreError::EmptyQuestion) => {}
                Err(err) => warn!(error = %err, "exchange failed"),
            }
        });
        // Loading is set synchronously before the first await
        self.sync();
    }

    pub fn new_session(&mut self) {
        self.orchestrator.reset();
        self.scrolls = Scrolls::default();
        self.sync();
    }

    /// Built-in roles, then custom roles, then the base model.
    pub fn role_options(&self) -> Vec<String> {
        let mut roles: Vec<String> = BUILTIN_ROLES.iter().map(|r| r.to_string()).collect();
        for role in &self.custom_roles {
            // A custom role saved under a built-in name is listed once
            if !is_builtin(&role.role_name) && !roles.contains(&role.role_name) {
                roles.push(role.role_name.clone());
            }
        }
        roles.push(BASE_ROLE.to_string());
        roles
    }

    pub fn select_role(&mut self, role: String) {
        self.selected_role = role.clone();
        self.scrolls.guardrails = 0;
        let prefetcher = self.prefetcher.clone();
        tokio::spawn(async move {
            prefetcher.select_role(&role).await;
        });
    }

    fn load_custom_roles(&self) {
        let builder = self.builder.clone();
        tokio::spawn(async move {
            if let Err(err) = builder.refresh_roles().await {
                warn!(error = %err, "could not load custom roles");
            }
        });
    }

    pub fn open_role_picker(&mut self) {
        let options = self.role_options();
        let current = options.iter().position(|r| *r == self.selected_role);
        self.role_picker_state.select(current.or(Some(0)));
        self.popup = Some(Popup::RolePicker);
    }

    pub fn confirm_role_picker(&mut self) {
        let options = self.role_options();
        if let Some(role) = self
            .role_picker_state
            .selected()
            .and_then(|i| options.get(i))
            .cloned()
        {
            self.select_role(role);
        }
        self.popup = None;
    }

    pub fn open_history(&mut self) {
        let selected = if self.exchange.history.is_empty() { None } else { Some(0) };
        self.history_state.select(selected);
        self.popup = Some(Popup::History);
    }

    /// Load a past question (and its role) back into the input.
    pub fn recall_history(&mut self) {
        let entry = self
            .history_state
            .selected()
            .and_then(|i| self.exchange.history.entries().get(i))
            .cloned();
        if let Some(entry) = entry {
            let len = entry.question.chars().count();
            self.set_draft(entry.question, len);
            if entry.expert_role != self.selected_role {
                self.select_role(entry.expert_role);
            }
            self.focus = FocusPane::Input;
            self.input_mode = InputMode::Editing;
        }
        self.popup = None;
    }

    pub fn open_role_form(&mut self) {
        if !self.build_status.is_busy() {
            self.form = RoleForm::default();
        }
        self.popup = Some(Popup::CreateRole);
    }

    pub fn submit_role_form(&mut self) {
        if self.build_status.is_busy() {
            return;
        }
        let name = self.form.name.trim().to_string();
        if name.is_empty() {
            self.notice = Some("Role name must not be empty.".to_string());
            return;
        }
        let path = match self.form.file_path.trim() {
            "" => None,
            path => Some(PathBuf::from(path)),
        };

        let builder = self.builder.clone();
        tokio::spawn(async move {
            if let Err(err) = builder
                .create_custom_role_from_path(&name, path.as_deref())
                .await
            {
                warn!(role = %name, error = %err, "custom role not created");
            }
        });
    }

    pub fn list_down(&mut self) {
        let roles = self.role_options().len();
        let (state, len) = match self.popup {
            Some(Popup::RolePicker) => (&mut self.role_picker_state, roles),
            Some(Popup::History) => (&mut self.history_state, self.exchange.history.len()),
            _ => return,
        };
        if len > 0 {
            let i = state.selected().unwrap_or(0);
            state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn list_up(&mut self) {
        let state = match self.popup {
            Some(Popup::RolePicker) => &mut self.role_picker_state,
            Some(Popup::History) => &mut self.history_state,
            _ => return,
        };
        let i = state.selected().unwrap_or(0);
        state.select(Some(i.saturating_sub(1)));
    }

    pub fn scroll_down(&mut self, lines: u16) {
        if let Some(offset) = self.scrolls.get_mut(self.focus) {
            *offset = offset.saturating_add(lines);
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        if let Some(offset) = self.scrolls.get_mut(self.focus) {
            *offset = offset.saturating_sub(lines);
        }
    }

    pub fn shutdown(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_focus_cycles_through_every_pane() {
        let mut pane = FocusPane::Input;
        let mut seen = Vec::new();
        for _ in 0..5 {
            pane = pane.next();
            seen.push(pane);
        }
        assert_eq!(pane, FocusPane::Input);
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn test_role_form_edits_active_field() {
        let mut form = RoleForm::default();
        form.active_mut().push_str("Pilot");
        form.toggle_field();
        form.active_mut().push_str("/tmp/manual.pdf");
        assert_eq!(form.name, "Pilot");
        assert_eq!(form.file_path, "/tmp/manual.pdf");
    }

    #[tokio::test]
    async fn test_role_options_list_custom_roles_before_base() {
        let mut config = Config::new();
        config.base_url = Some("http://127.0.0.1:9/api".to_string());
        let mut app = App::new(&config).unwrap();
        let custom = |name: &str| CustomRole {
            role_name: name.to_string(),
            core_directive: String::new(),
            expert_rules: Vec::new(),
            roadmap: Vec::new(),
            knowledge_base: None,
        };
        app.custom_roles = vec![custom("Sommelier"), custom("Educator"), custom("Sommelier")];

        let options = app.role_options();
        assert_eq!(options.len(), BUILTIN_ROLES.len() + 2);
        assert_eq!(options[BUILTIN_ROLES.len()], "Sommelier");
        assert_eq!(options.last().map(String::as_str), Some(BASE_ROLE));
        app.shutdown();
    }
}
