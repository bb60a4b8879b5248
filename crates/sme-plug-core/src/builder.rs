//! Custom-role pipeline: extract text → generate rules → save → reload.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::api::{Attachment, Backend};
use crate::error::{ApiError, BuildError};
use crate::state::CustomRole;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BuildStatus {
    #[default]
    Idle,
    Extracting,
    Generating,
    Saving,
    Success,
    Error(String),
}

impl BuildStatus {
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            BuildStatus::Extracting | BuildStatus::Generating | BuildStatus::Saving
        )
    }

    pub fn label(&self) -> &str {
        match self {
            BuildStatus::Idle => "",
            BuildStatus::Extracting => "Extracting text from document...",
            BuildStatus::Generating => "Generating expert rules...",
            BuildStatus::Saving => "Saving role...",
            BuildStatus::Success => "Role created.",
            BuildStatus::Error(message) => message,
        }
    }
}

pub struct CustomRoleBuilder {
    backend: Arc<dyn Backend>,
    status: watch::Sender<BuildStatus>,
    roles: watch::Sender<Vec<CustomRole>>,
}

impl CustomRoleBuilder {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let (status, _) = watch::channel(BuildStatus::Idle);
        let (roles, _) = watch::channel(Vec::new());
        Self {
            backend,
            status,
            roles,
        }
    }

    pub fn status(&self) -> BuildStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<BuildStatus> {
        self.status.subscribe()
    }

    pub fn roles(&self) -> Vec<CustomRole> {
        self.roles.borrow().clone()
    }

    pub fn subscribe_roles(&self) -> watch::Receiver<Vec<CustomRole>> {
        self.roles.subscribe()
    }

    /// Replace the in-memory list with the backend's.
    pub async fn refresh_roles(&self) -> Result<Vec<CustomRole>, ApiError> {
        let roles = self.backend.list_custom_roles().await?;
        self.roles.send_replace(roles.clone());
        Ok(roles)
    }

    /// Run the pipeline once. Any stage failure is terminal; nothing is
    /// retried.
    pub async fn create_custom_role(
        &self,
        name: &str,
        file: Option<Attachment>,
    ) -> Result<CustomRole, BuildError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BuildError::EmptyName);
        }

        let mut claimed = false;
        self.status.send_if_modified(|status| {
            if status.is_busy() {
                return false;
            }
            *status = if file.is_some() {
                BuildStatus::Extracting
            } else {
                BuildStatus::Generating
            };
            claimed = true;
            true
        });
        if !claimed {
            return Err(BuildError::Busy);
        }
        let claim = BuildClaim {
            status: &self.status,
            settled: false,
        };

        match self.run(name, file).await {
            Ok(role) => {
                info!(role = %role.role_name, "custom role created");
                claim.settle(BuildStatus::Success);
                Ok(role)
            }
            Err(err) => {
                warn!(role = name, error = %err, "custom role creation failed");
                claim.settle(BuildStatus::Error(err.to_string()));
                Err(err)
            }
        }
    }

    /// Like [`create_custom_role`](Self::create_custom_role), reading the
    /// document from disk first.
    pub async fn create_custom_role_from_path(
        &self,
        name: &str,
        path: Option<&Path>,
    ) -> Result<CustomRole, BuildError> {
        if name.trim().is_empty() {
            return Err(BuildError::EmptyName);
        }

        let file = match path {
            Some(path) => match Attachment::from_path(path).await {
                Ok(file) => Some(file),
                Err(err) => {
                    let err = BuildError::Attachment {
                        path: path.display().to_string(),
                        message: err.to_string(),
                    };
                    self.status.send_if_modified(|status| {
                        if status.is_busy() {
                            return false;
                        }
                        *status = BuildStatus::Error(err.to_string());
                        true
                    });
                    return Err(err);
                }
            },
            None => None,
        };
        self.create_custom_role(name, file).await
    }

    async fn run(&self, name: &str, file: Option<Attachment>) -> Result<CustomRole, BuildError> {
        let knowledge_base = match &file {
            Some(file) => Some(
                self.backend
                    .extract_text(file)
                    .await
                    .map_err(BuildError::Extraction)?,
            ),
            None => None,
        };

        self.status.send_replace(BuildStatus::Generating);
        let generated = self
            .backend
            .generate_rules(name, knowledge_base.as_deref())
            .await
            .map_err(BuildError::Generation)?;

        self.status.send_replace(BuildStatus::Saving);
        let role = CustomRole {
            role_name: name.to_string(),
            core_directive: generated.core_directive,
            expert_rules: generated.expert_rules,
            roadmap: generated.roadmap,
            knowledge_base,
        };
        self.backend
            .save_custom_role(&role)
            .await
            .map_err(BuildError::Persistence)?;

        self.refresh_roles().await.map_err(BuildError::Refresh)?;
        Ok(role)
    }
}

/// Releases the busy status if the build future is dropped before it
/// settles.
struct BuildClaim<'a> {
    status: &'a watch::Sender<BuildStatus>,
    settled: bool,
}

impl BuildClaim<'_> {
    fn settle(mut self, status: BuildStatus) {
        self.settled = true;
        self.status.send_replace(status);
    }
}

impl Drop for BuildClaim<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("custom role creation cancelled");
            self.status.send_replace(BuildStatus::Idle);
        }
    }
}
