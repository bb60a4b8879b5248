use serde::{Deserialize, Serialize};

/// LLM provider the backend should route a request to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Groq,
    #[serde(rename = "openai")]
    OpenAI,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Groq => "groq",
            Provider::OpenAI => "openai",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "groq" => Some(Provider::Groq),
            "openai" => Some(Provider::OpenAI),
            _ => None,
        }
    }

    pub fn all() -> Vec<Provider> {
        vec![Provider::Groq, Provider::OpenAI]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Groq => "Groq (Llama 3.3)",
            Provider::OpenAI => "OpenAI (GPT-4o)",
        }
    }

    /// Request header carrying the user's own key for this provider.
    pub fn key_header(&self) -> &'static str {
        match self {
            Provider::Groq => "x-groq-key",
            Provider::OpenAI => "x-openai-key",
        }
    }
}
