//! services/api/src/adapters/review_llm.rs
//!
//! The AI review providers. Four interchangeable HTTP backends implement the
//! `ReviewService` port; `ReviewDispatcher` picks whichever one has
//! credentials configured, in a fixed priority order, and turns a fully
//! unconfigured deployment into an instructional message rather than an error.

use std::sync::Arc;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use devotion_core::ports::{PortError, PortResult, ReviewService};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

/// The persona every provider is given.
const SYSTEM_PROMPT: &str = "You are a warm, encouraging devotional mentor who helps \
believers organize and look back on their devotional journey.";

const MAX_REVIEW_TOKENS: u32 = 2000;
const REVIEW_TEMPERATURE: f32 = 0.7;

//=========================================================================================
// Provider Selection
//=========================================================================================

/// The configured review backends, in selection priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewProvider {
    Gemini,
    HuggingFace,
    OpenAi,
    Cohere,
}

impl ReviewProvider {
    pub fn name(&self) -> &'static str {
        match self {
            ReviewProvider::Gemini => "gemini",
            ReviewProvider::HuggingFace => "huggingface",
            ReviewProvider::OpenAi => "openai",
            ReviewProvider::Cohere => "cohere",
        }
    }
}

/// What came back from dispatching a review request.
#[derive(Debug)]
pub enum ReviewOutcome {
    Generated {
        provider: ReviewProvider,
        text: String,
    },
    /// No provider has credentials; `message` explains how to configure one
    /// and carries the prepared prompt so nothing the user wrote is lost.
    MissingCredentials { message: String },
}

/// Dispatches review prompts to the highest-priority configured provider.
pub struct ReviewDispatcher {
    providers: Vec<(ReviewProvider, Arc<dyn ReviewService>)>,
}

impl ReviewDispatcher {
    /// `providers` must already be in priority order
    /// (Gemini > Hugging Face > OpenAI > Cohere).
    pub fn new(providers: Vec<(ReviewProvider, Arc<dyn ReviewService>)>) -> Self {
        Self { providers }
    }

    /// The provider requests will go to, or `None` when nothing is configured.
    pub fn active_provider(&self) -> Option<ReviewProvider> {
        self.providers.first().map(|(provider, _)| *provider)
    }

    pub async fn generate(&self, prompt: &str) -> PortResult<ReviewOutcome> {
        let Some((provider, service)) = self.providers.first() else {
            return Ok(ReviewOutcome::MissingCredentials {
                message: missing_credentials_message(prompt),
            });
        };

        info!(provider = provider.name(), "Generating AI review");
        match service.generate_review(prompt).await {
            Ok(text) => Ok(ReviewOutcome::Generated {
                provider: *provider,
                text,
            }),
            Err(e) => {
                warn!(provider = provider.name(), "Review generation failed: {e}");
                Err(PortError::Unexpected(format!(
                    "Review generation failed ({}): {e}",
                    provider.name()
                )))
            }
        }
    }
}

/// The instructional message shown when no LLM credential is configured.
/// Includes the prepared prompt so the user can paste it into any chat UI.
fn missing_credentials_message(prompt: &str) -> String {
    format!(
        "No AI API key is configured yet, so a review cannot be generated.\n\n\
         Set one of these environment variables and restart the server:\n\n\
         1. GEMINI_API_KEY - Google Gemini (recommended, free tier)\n   \
            https://makersuite.google.com/app/apikey\n\
         2. HUGGINGFACE_API_KEY - Hugging Face inference API (free)\n   \
            https://huggingface.co/settings/tokens\n\
         3. OPENAI_API_KEY - OpenAI\n   \
            https://platform.openai.com/\n\
         4. COHERE_API_KEY - Cohere (free monthly quota)\n   \
            https://cohere.com/\n\n\
         Here is the prepared review prompt:\n\n{prompt}"
    )
}

//=========================================================================================
// OpenAI
//=========================================================================================

/// Review backend using OpenAI chat completions.
#[derive(Clone)]
pub struct OpenAiReviewAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiReviewAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl ReviewService for OpenAiReviewAdapter {
    async fn generate_review(&self, prompt: &str) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(REVIEW_TEMPERATURE)
            .max_tokens(MAX_REVIEW_TOKENS)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("OpenAI response contained no text content.".to_string())
            })
    }
}

//=========================================================================================
// Google Gemini
//=========================================================================================

const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Review backend using the Gemini generateContent API. The free tier keeps
/// renaming models, so a list is tried in order and "model not found" errors
/// advance to the next candidate.
#[derive(Clone)]
pub struct GeminiReviewAdapter {
    http: reqwest::Client,
    api_key: String,
    models: Vec<String>,
}

impl GeminiReviewAdapter {
    pub fn new(http: reqwest::Client, api_key: String, models: Vec<String>) -> Self {
        Self {
            http,
            api_key,
            models,
        }
    }

    async fn try_model(&self, model: &str, prompt: &str) -> PortResult<String> {
        let url = format!("{GEMINI_BASE}/{model}:generateContent?key={}", self.api_key);
        let body = json!({
            "contents": [{
                "parts": [{ "text": format!("{SYSTEM_PROMPT}\n\n{prompt}") }]
            }],
            "generationConfig": {
                "temperature": REVIEW_TEMPERATURE,
                "maxOutputTokens": MAX_REVIEW_TOKENS,
                "topP": 0.95,
                "topK": 40
            }
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Gemini request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let raw = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiErrorBody>(&raw)
                .ok()
                .and_then(|b| b.error.and_then(|e| e.message))
                .unwrap_or(raw);
            let message = if message.is_empty() {
                format!("request failed ({status})")
            } else {
                message
            };
            return Err(PortError::Unexpected(message));
        }

        let body: GeminiResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Bad Gemini response: {e}")))?;

        let candidate = body
            .candidates
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| PortError::Unexpected("Gemini returned no candidates".to_string()))?;

        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(PortError::Unexpected(
                "Gemini blocked the response on safety grounds".to_string(),
            ));
        }

        candidate
            .content
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| PortError::Unexpected("Gemini returned no text".to_string()))
    }
}

fn is_unknown_model_error(e: &PortError) -> bool {
    let text = e.to_string();
    text.contains("not found") || text.contains("not supported")
}

/// Tries each model in order. An unknown-model error advances to the next
/// candidate; any other error stops the loop and is returned as-is.
async fn first_available_model<F, Fut>(models: &[String], mut attempt: F) -> PortResult<String>
where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = PortResult<String>>,
{
    let mut last_error = None;
    for model in models {
        match attempt(model.clone()).await {
            Ok(text) => return Ok(text),
            Err(e) if is_unknown_model_error(&e) => {
                warn!("Gemini model {model} unavailable: {e}");
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(PortError::Unexpected(format!(
        "No configured Gemini model is available; last error: {}",
        last_error.map_or_else(|| "unknown".to_string(), |e| e.to_string())
    )))
}

#[async_trait]
impl ReviewService for GeminiReviewAdapter {
    async fn generate_review(&self, prompt: &str) -> PortResult<String> {
        first_available_model(&self.models, |model| async move {
            self.try_model(&model, prompt).await
        })
        .await
    }
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
struct GeminiErrorBody {
    error: Option<GeminiErrorDetail>,
}

#[derive(Deserialize)]
struct GeminiErrorDetail {
    message: Option<String>,
}

//=========================================================================================
// Hugging Face
//=========================================================================================

const HUGGINGFACE_BASE: &str = "https://api-inference.huggingface.co/models";

/// Review backend using the Hugging Face inference API with a Llama-3 chat
/// template.
#[derive(Clone)]
pub struct HuggingFaceReviewAdapter {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl HuggingFaceReviewAdapter {
    pub fn new(http: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            http,
            api_key,
            model,
        }
    }

    fn llama_chat_input(prompt: &str) -> String {
        format!(
            "<|begin_of_text|><|start_header_id|>system<|end_header_id|>\n\n{SYSTEM_PROMPT}\
             <|eot_id|><|start_header_id|>user<|end_header_id|>\n\n{prompt}\
             <|eot_id|><|start_header_id|>assistant<|end_header_id|>\n\n"
        )
    }
}

#[async_trait]
impl ReviewService for HuggingFaceReviewAdapter {
    async fn generate_review(&self, prompt: &str) -> PortResult<String> {
        let body = json!({
            "inputs": Self::llama_chat_input(prompt),
            "parameters": {
                "max_new_tokens": MAX_REVIEW_TOKENS,
                "temperature": REVIEW_TEMPERATURE,
                "return_full_text": false
            }
        });

        let response = self
            .http
            .post(format!("{HUGGINGFACE_BASE}/{}", self.model))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Hugging Face request failed: {e}")))?;

        if !response.status().is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(PortError::Unexpected(format!(
                "Hugging Face API error: {detail}"
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Bad Hugging Face response: {e}")))?;

        if let Some(text) = body
            .get(0)
            .and_then(|entry| entry.get("generated_text"))
            .and_then(|t| t.as_str())
        {
            return Ok(text.trim().to_string());
        }
        if let Some(error) = body.get("error").and_then(|e| e.as_str()) {
            return Err(PortError::Unexpected(format!(
                "Hugging Face API error: {error}"
            )));
        }
        Err(PortError::Unexpected(format!(
            "Unrecognized Hugging Face response: {body}"
        )))
    }
}

//=========================================================================================
// Cohere
//=========================================================================================

const COHERE_GENERATE_URL: &str = "https://api.cohere.ai/v1/generate";

/// Review backend using Cohere's generate API.
#[derive(Clone)]
pub struct CohereReviewAdapter {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl CohereReviewAdapter {
    pub fn new(http: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            http,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl ReviewService for CohereReviewAdapter {
    async fn generate_review(&self, prompt: &str) -> PortResult<String> {
        let body = json!({
            "model": self.model,
            "prompt": format!("{SYSTEM_PROMPT}\n\n{prompt}"),
            "max_tokens": MAX_REVIEW_TOKENS,
            "temperature": REVIEW_TEMPERATURE
        });

        let response = self
            .http
            .post(COHERE_GENERATE_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Cohere request failed: {e}")))?;

        if !response.status().is_success() {
            let detail: CohereError = response.json().await.unwrap_or_default();
            return Err(PortError::Unexpected(format!(
                "Cohere API error: {}",
                detail.message.unwrap_or_else(|| "request failed".to_string())
            )));
        }

        let body: CohereResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Bad Cohere response: {e}")))?;

        body.generations
            .and_then(|g| g.into_iter().next())
            .map(|g| g.text)
            .ok_or_else(|| PortError::Unexpected("Cohere returned no generations".to_string()))
    }
}

#[derive(Deserialize)]
struct CohereResponse {
    generations: Option<Vec<CohereGeneration>>,
}

#[derive(Deserialize)]
struct CohereGeneration {
    text: String,
}

#[derive(Deserialize, Default)]
struct CohereError {
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedService(PortResult<String>);

    #[async_trait]
    impl ReviewService for CannedService {
        async fn generate_review(&self, _prompt: &str) -> PortResult<String> {
            match &self.0 {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(PortError::Unexpected(e.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn unconfigured_dispatcher_returns_instructions_with_the_prompt() {
        let dispatcher = ReviewDispatcher::new(vec![]);
        assert_eq!(dispatcher.active_provider(), None);
        let outcome = dispatcher.generate("my prepared prompt").await.unwrap();
        match outcome {
            ReviewOutcome::MissingCredentials { message } => {
                assert!(message.contains("GEMINI_API_KEY"));
                assert!(message.contains("COHERE_API_KEY"));
                assert!(message.contains("my prepared prompt"));
            }
            other => panic!("expected MissingCredentials, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dispatcher_uses_the_first_configured_provider() {
        let dispatcher = ReviewDispatcher::new(vec![
            (
                ReviewProvider::Gemini,
                Arc::new(CannedService(Ok("from gemini".to_string()))) as Arc<dyn ReviewService>,
            ),
            (
                ReviewProvider::OpenAi,
                Arc::new(CannedService(Ok("from openai".to_string()))),
            ),
        ]);
        assert_eq!(dispatcher.active_provider(), Some(ReviewProvider::Gemini));
        match dispatcher.generate("prompt").await.unwrap() {
            ReviewOutcome::Generated { provider, text } => {
                assert_eq!(provider, ReviewProvider::Gemini);
                assert_eq!(text, "from gemini");
            }
            other => panic!("expected Generated, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn provider_errors_carry_the_provider_name() {
        let dispatcher = ReviewDispatcher::new(vec![(
            ReviewProvider::Cohere,
            Arc::new(CannedService(Err(PortError::Unexpected(
                "quota exceeded".to_string(),
            )))) as Arc<dyn ReviewService>,
        )]);
        let err = dispatcher.generate("prompt").await.unwrap_err();
        let text = err.to_string();
        assert!(text.contains("cohere"));
        assert!(text.contains("quota exceeded"));
    }

    #[tokio::test]
    async fn gemini_fallback_advances_past_unknown_models() {
        let models: Vec<String> = ["gemini-old", "gemini-renamed", "gemini-current"]
            .iter()
            .map(|m| m.to_string())
            .collect();
        let attempts = std::sync::Mutex::new(Vec::new());

        let result = first_available_model(&models, |model| {
            attempts.lock().unwrap().push(model.clone());
            async move {
                if model == "gemini-current" {
                    Ok("a generated review".to_string())
                } else {
                    Err(PortError::Unexpected(format!(
                        "models/{model} is not found for API version v1beta"
                    )))
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "a generated review");
        assert_eq!(
            *attempts.lock().unwrap(),
            vec![
                "gemini-old".to_string(),
                "gemini-renamed".to_string(),
                "gemini-current".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn gemini_fallback_stops_on_a_real_error() {
        let models = vec!["gemini-old".to_string(), "gemini-current".to_string()];
        let attempts = std::sync::Mutex::new(0u32);

        let err = first_available_model(&models, |_| {
            *attempts.lock().unwrap() += 1;
            async { Err::<String, _>(PortError::Unexpected("quota exceeded".to_string())) }
        })
        .await
        .unwrap_err();

        assert!(err.to_string().contains("quota exceeded"));
        // A non-model error must not burn through the remaining candidates.
        assert_eq!(*attempts.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn gemini_fallback_reports_when_every_model_is_unknown() {
        let models = vec!["gemini-old".to_string()];
        let err = first_available_model(&models, |model| async move {
            Err::<String, _>(PortError::Unexpected(format!(
                "model {model} is not supported"
            )))
        })
        .await
        .unwrap_err();

        let text = err.to_string();
        assert!(text.contains("No configured Gemini model is available"));
        assert!(text.contains("not supported"));
    }

    #[test]
    fn llama_template_wraps_system_and_user_turns() {
        let input = HuggingFaceReviewAdapter::llama_chat_input("hello");
        assert!(input.starts_with("<|begin_of_text|>"));
        assert!(input.contains(SYSTEM_PROMPT));
        assert!(input.contains("hello"));
        assert!(input.ends_with("<|start_header_id|>assistant<|end_header_id|>\n\n"));
    }
}
