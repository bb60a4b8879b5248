use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AnalysisRequest, Attachment, Backend};
use crate::config::{Config, CredentialProvider};
use crate::error::{ApiError, ConfigError};
use crate::provider::Provider;
use crate::state::{
    AnalysisPayload, CustomRole, ExpertAnswer, GeneratedRules, HealthReport, RoleRules,
};

#[derive(Serialize)]
struct AskRequest<'a> {
    question: &'a str,
    plugin: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider: Option<Provider>,
}

#[derive(Serialize)]
struct GenerateRulesRequest<'a> {
    role_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    knowledge_base: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider: Option<Provider>,
}

#[derive(Deserialize)]
struct ExtractResponse {
    text: String,
}

#[derive(Deserialize)]
struct CustomRolesResponse {
    roles: Vec<CustomRole>,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// reqwest client for the SME backend.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    provider: Option<Provider>,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpBackend {
    pub fn new(
        base_url: &str,
        provider: Option<Provider>,
        credentials: Arc<dyn CredentialProvider>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::BaseUrl(base_url.to_string());
        let base_url = Url::parse(base_url).map_err(|_| invalid())?;
        if base_url.cannot_be_a_base() {
            return Err(invalid());
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            provider,
            credentials,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Self::new(
            &config.base_url(),
            config.provider(),
            Arc::new(config.credentials()),
            config.request_timeout(),
        )
    }

    /// Append path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn with_credentials(&self, mut request: RequestBuilder) -> RequestBuilder {
        for provider in Provider::all() {
            if let Some(key) = self.credentials.key_for(provider) {
                request = request.header(provider.key_header(), key);
            }
        }
        request
    }

    /// Send and return the raw body of a successful response.
    async fn send_raw(&self, request: RequestBuilder) -> Result<String, ApiError> {
        let response = self.with_credentials(request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::Server {
                status: status.as_u16(),
                detail: server_detail(&body),
            });
        }
        Ok(body)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let body = self.send_raw(request).await?;
        serde_json::from_str(&body).map_err(|e| ApiError::Malformed(e.to_string()))
    }
}

/// The `detail` string of a FastAPI-style error body. Validation errors carry
/// an array there and yield `None`.
fn server_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .detail
        .as_str()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl Backend for HttpBackend {
    async fn health(&self) -> Result<HealthReport, ApiError> {
        let url = self.endpoint(&["health"]);
        debug!(%url, "health probe");
        self.send(self.client.get(url)).await
    }

    async fn ask_expert(&self, question: &str, role: &str) -> Result<ExpertAnswer, ApiError> {
        let url = self.endpoint(&["ask-expert"]);
        debug!(%url, role, "ask-expert");

        let request = AskRequest {
            question,
            plugin: role,
            provider: self.provider,
        };
        self.send(self.client.post(url).json(&request)).await
    }

    async fn role_rules(&self, role: &str) -> Result<RoleRules, ApiError> {
        let url = self.endpoint(&["role-rules", role]);
        debug!(%url, "role-rules");
        self.send(self.client.get(url)).await
    }

    async fn analyze_hallucination(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisPayload, ApiError> {
        let url = self.endpoint(&["analyze-hallucination"]);
        debug!(%url, role = %request.role, "analyze-hallucination");
        self.send(self.client.post(url).json(request)).await
    }

    async fn list_custom_roles(&self) -> Result<Vec<CustomRole>, ApiError> {
        let url = self.endpoint(&["custom-roles"]);
        let response: CustomRolesResponse = self.send(self.client.get(url)).await?;
        Ok(response.roles)
    }

    async fn save_custom_role(&self, role: &CustomRole) -> Result<(), ApiError> {
        let url = self.endpoint(&["custom-roles"]);
        debug!(%url, role = %role.role_name, "save custom role");
        self.send_raw(self.client.post(url).json(role)).await?;
        Ok(())
    }

    async fn generate_rules(
        &self,
        role_name: &str,
        knowledge_base: Option<&str>,
    ) -> Result<GeneratedRules, ApiError> {
        let url = self.endpoint(&["generate-rules"]);
        debug!(%url, role_name, grounded = knowledge_base.is_some(), "generate-rules");

        let request = GenerateRulesRequest {
            role_name,
            knowledge_base,
            provider: self.provider,
        };
        self.send(self.client.post(url).json(&request)).await
    }

    async fn extract_text(&self, file: &Attachment) -> Result<String, ApiError> {
        let url = self.endpoint(&["extract-text"]);
        debug!(%url, file = %file.file_name, bytes = file.bytes.len(), "extract-text");

        let mut part = Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
        if let Some(content_type) = &file.content_type {
            part = part
                .mime_str(content_type)
                .map_err(|e| {
                    ApiError::InvalidRequest(format!("unusable content type {content_type:?}: {e}"))
                })?;
        }
        let form = Form::new().part("file", part);

        let response: ExtractResponse = self.send(self.client.post(url).multipart(form)).await?;
        Ok(response.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;

    fn backend(base: &str) -> HttpBackend {
        HttpBackend::new(
            base,
            None,
            Arc::new(Credentials::default()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_joins_and_encodes_segments() {
        let api = backend("http://localhost:8000/api");
        assert_eq!(
            api.endpoint(&["role-rules", "Marine Biologist"]).as_str(),
            "http://localhost:8000/api/role-rules/Marine%20Biologist"
        );

        let trailing = backend("http://localhost:8000/api/");
        assert_eq!(
            trailing.endpoint(&["health"]).as_str(),
            "http://localhost:8000/api/health"
        );

        let root = backend("http://localhost:8000");
        assert_eq!(root.endpoint(&["health"]).as_str(), "http://localhost:8000/health");
    }

    #[test]
    fn test_rejects_unusable_base_url() {
        let result = HttpBackend::new(
            "not a url",
            None,
            Arc::new(Credentials::default()),
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(ConfigError::BaseUrl(_))));
    }

    #[test]
    fn test_server_detail_only_from_strings() {
        assert_eq!(
            server_detail(r#"{"detail":"rate limited"}"#),
            Some("rate limited".to_string())
        );
        assert_eq!(server_detail(r#"{"detail":[{"loc":["body"]}]}"#), None);
        assert_eq!(server_detail("<html>bad gateway</html>"), None);
        assert_eq!(server_detail(r#"{"detail":"  "}"#), None);
    }

    #[tokio::test]
    async fn test_bad_content_type_fails_before_sending() {
        // Nothing listens on port 9; reaching the network would be a Transport error
        let api = backend("http://127.0.0.1:9/api");
        let file = Attachment {
            file_name: "notes.bin".to_string(),
            content_type: Some("not a mime type".to_string()),
            bytes: b"data".to_vec(),
        };

        let err = api.extract_text(&file).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(ref m) if m.contains("not a mime type")));
    }
}
