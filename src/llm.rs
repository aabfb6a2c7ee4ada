//! Language-model backends - Gemini (default), OpenAI-compatible, and Ollama (optional)
//!
//! Every call is a single blocking request/response. No conversation
//! history is sent; each prompt stands alone.

use crate::config::LlmConfig;
use crate::error::LlmError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Trait for language-model collaborators
pub trait LanguageModel: Send {
    /// Display name used in console output and generated files
    fn name(&self) -> &str;

    /// Generate a complete response for `prompt`
    fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Build the configured backend. A missing credential is reported as
/// `LlmError::Backend` so the caller can degrade to "model unavailable".
pub fn from_config(config: &LlmConfig) -> Result<Box<dyn LanguageModel>, LlmError> {
    match config {
        LlmConfig::Gemini { model, api_key } => {
            if api_key.trim().is_empty() {
                return Err(LlmError::Backend("gemini_api_key is not set".into()));
            }
            Ok(Box::new(gemini::GeminiBackend::new(model, api_key)?))
        }
        LlmConfig::OpenAiCompat {
            base_url,
            model,
            api_key,
            temperature,
            max_tokens,
            ..
        } => Ok(Box::new(openai_compat::OpenAiCompatBackend::new(
            base_url,
            model,
            api_key.as_deref().filter(|k| !k.is_empty()),
            *temperature,
            *max_tokens,
        )?)),
        #[cfg(feature = "ollama")]
        LlmConfig::Ollama { model } => Ok(Box::new(ollama::OllamaBackend::new(model)?)),
        #[cfg(not(feature = "ollama"))]
        LlmConfig::Ollama { .. } => Err(LlmError::Backend(
            "Ollama not enabled. Build with --features ollama".into(),
        )),
    }
}

fn http_client() -> Result<reqwest::blocking::Client, LlmError> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}

/// Turn a non-2xx response into `LlmError::Api`
fn check_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(LlmError::Api {
        status: status.as_u16(),
        body,
    })
}

// ============================================================================
// Gemini backend
// ============================================================================

pub mod gemini {
    use super::*;

    const ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

    #[derive(Serialize)]
    struct Request<'a> {
        contents: Vec<Content<'a>>,
    }

    #[derive(Serialize)]
    struct Content<'a> {
        parts: Vec<Part<'a>>,
    }

    #[derive(Serialize)]
    struct Part<'a> {
        text: &'a str,
    }

    #[derive(Deserialize)]
    pub(super) struct Response {
        #[serde(default)]
        candidates: Vec<Candidate>,
    }

    #[derive(Deserialize)]
    struct Candidate {
        content: Option<CandidateContent>,
    }

    #[derive(Deserialize)]
    struct CandidateContent {
        #[serde(default)]
        parts: Vec<CandidatePart>,
    }

    #[derive(Deserialize)]
    struct CandidatePart {
        #[serde(default)]
        text: String,
    }

    impl Response {
        /// Concatenated text of the first candidate
        pub(super) fn text(&self) -> Option<String> {
            let content = self.candidates.first()?.content.as_ref()?;
            let text: String = content.parts.iter().map(|p| p.text.as_str()).collect();
            (!text.trim().is_empty()).then_some(text)
        }
    }

    pub struct GeminiBackend {
        client: reqwest::blocking::Client,
        model: String,
        api_key: String,
    }

    impl GeminiBackend {
        pub fn new(model: &str, api_key: &str) -> Result<Self, LlmError> {
            Ok(Self {
                client: http_client()?,
                model: model.to_string(),
                api_key: api_key.to_string(),
            })
        }
    }

    impl LanguageModel for GeminiBackend {
        fn name(&self) -> &str {
            "Gemini"
        }

        #[hotpath::measure]
        fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            let url = format!("{}/{}:generateContent", ENDPOINT, self.model);
            debug!(model = %self.model, "gemini request");

            let body = Request {
                contents: vec![Content {
                    parts: vec![Part { text: prompt }],
                }],
            };

            let response = self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()?;
            let parsed: Response = check_status(response)?.json()?;
            parsed.text().ok_or(LlmError::EmptyResponse)
        }
    }
}

// ============================================================================
// OpenAI-compatible backend
// ============================================================================

pub mod openai_compat {
    use super::*;

    #[derive(Serialize)]
    struct Request<'a> {
        model: &'a str,
        messages: Vec<Message<'a>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        temperature: Option<f32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_tokens: Option<u32>,
    }

    #[derive(Serialize)]
    struct Message<'a> {
        role: &'a str,
        content: &'a str,
    }

    #[derive(Deserialize)]
    pub(super) struct Response {
        #[serde(default)]
        choices: Vec<Choice>,
    }

    #[derive(Deserialize)]
    struct Choice {
        message: ChoiceMessage,
    }

    #[derive(Deserialize)]
    struct ChoiceMessage {
        #[serde(default)]
        content: Option<String>,
    }

    impl Response {
        pub(super) fn text(self) -> Option<String> {
            self.choices
                .into_iter()
                .next()?
                .message
                .content
                .filter(|c| !c.trim().is_empty())
        }
    }

    pub struct OpenAiCompatBackend {
        client: reqwest::blocking::Client,
        base_url: String,
        model: String,
        api_key: Option<String>,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    }

    impl OpenAiCompatBackend {
        pub fn new(
            base_url: &str,
            model: &str,
            api_key: Option<&str>,
            temperature: Option<f32>,
            max_tokens: Option<u32>,
        ) -> Result<Self, LlmError> {
            Ok(Self {
                client: http_client()?,
                base_url: base_url.trim_end_matches('/').to_string(),
                model: model.to_string(),
                api_key: api_key.map(String::from),
                temperature,
                max_tokens,
            })
        }
    }

    impl LanguageModel for OpenAiCompatBackend {
        fn name(&self) -> &str {
            &self.model
        }

        #[hotpath::measure]
        fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            let url = format!("{}/chat/completions", self.base_url);
            debug!(model = %self.model, %url, "chat completion request");

            let body = Request {
                model: &self.model,
                messages: vec![Message {
                    role: "user",
                    content: prompt,
                }],
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            };

            let mut request = self.client.post(&url).json(&body);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }
            let parsed: Response = check_status(request.send()?)?.json()?;
            parsed.text().ok_or(LlmError::EmptyResponse)
        }
    }
}

// ============================================================================
// Ollama backend
// ============================================================================

#[cfg(feature = "ollama")]
pub mod ollama {
    use super::*;
    use ollama_rs::Ollama;
    use ollama_rs::generation::chat::ChatMessage;
    use ollama_rs::generation::chat::request::ChatMessageRequest;

    pub struct OllamaBackend {
        client: Ollama,
        model: String,
        runtime: tokio::runtime::Runtime,
    }

    impl OllamaBackend {
        pub fn new(model: &str) -> Result<Self, LlmError> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| LlmError::Backend(e.to_string()))?;
            Ok(Self {
                client: Ollama::default(),
                model: model.to_string(),
                runtime,
            })
        }
    }

    impl LanguageModel for OllamaBackend {
        fn name(&self) -> &str {
            &self.model
        }

        #[hotpath::measure]
        fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            let request = ChatMessageRequest::new(
                self.model.clone(),
                vec![ChatMessage::user(prompt.to_string())],
            );
            let response = self
                .runtime
                .block_on(self.client.send_chat_messages(request))
                .map_err(|e| LlmError::Backend(e.to_string()))?;
            let text = response.message.content;
            if text.trim().is_empty() {
                return Err(LlmError::EmptyResponse);
            }
            Ok(text)
        }
    }
}
