//! Gemini `generateContent` client with function calling
//!
//! Wire types mirror the v1beta REST shapes (camelCase). The [`ChatModel`]
//! trait is what the agent talks to, so tests can swap in a scripted model.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument};

/// Gemini-specific error types
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model {model} was not found: {message}")]
    NotFound { model: String, message: String },

    #[error("Quota exhausted for model {model}: {message}")]
    QuotaExhausted { model: String, message: String },

    #[error("Gemini API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Could not read model response: {0}")]
    InvalidResponse(String),

    #[error("Model returned no candidates")]
    EmptyResponse,

    #[error("Missing API key: GOOGLE_API_KEY is not set")]
    MissingApiKey,
}

impl ModelError {
    /// Errors that another model might not hit.
    pub fn is_fallback_candidate(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::QuotaExhausted { .. })
    }

    /// What the user can do about it.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => {
                "The configured model may not be available for your API version. \
                 Run `direct-flights models` to list models for your key and set GOOGLE_MODEL."
            }
            Self::QuotaExhausted { .. } => {
                "Quota exhausted. Check billing & quota at https://ai.google.dev/gemini-api/docs/rate-limits \
                 or add models to GOOGLE_FALLBACK_MODELS."
            }
            Self::MissingApiKey => "Set GOOGLE_API_KEY in your environment or .env file.",
            Self::HttpError(_) => "Check your network connection.",
            _ => "Check your model setting in GOOGLE_MODEL or your API key.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Some(Role::User),
            parts: vec![Part::text(text)],
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Some(Role::Model),
            parts: vec![Part::text(text)],
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
        }
    }

    pub fn function_responses(parts: Vec<Part>) -> Self {
        Self {
            role: Some(Role::User),
            parts,
        }
    }

    pub fn function_calls(&self) -> Vec<&FunctionCall> {
        self.parts.iter().filter_map(|p| p.function_call.as_ref()).collect()
    }

    /// All text parts joined with newlines.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }
}

/// One part of a message. Exactly one of the payload fields is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
    /// Opaque; must be sent back with the part it arrived on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn function_response(name: impl Into<String>, response: Value) -> Self {
        Self {
            function_response: Some(FunctionResponse {
                name: name.into(),
                response,
            }),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    pub contents: Vec<Content>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Summary of one entry from the models listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSummary {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelSummary>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// A hosted model that can answer a conversation, possibly with tool calls.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate the next model turn using the model named `model`.
    async fn generate(&self, model: &str, request: &GenerateContentRequest) -> Result<Content, ModelError>;
}

#[async_trait]
impl<T: ChatModel + ?Sized> ChatModel for Arc<T> {
    async fn generate(&self, model: &str, request: &GenerateContentRequest) -> Result<Content, ModelError> {
        (**self).generate(model, request).await
    }
}

/// Gemini REST client
pub struct GeminiClient {
    http_client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self, ModelError> {
        let api_key = config
            .google_api_key
            .clone()
            .ok_or(ModelError::MissingApiKey)?;
        Ok(Self {
            http_client: Client::new(),
            api_key,
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// List every model available to the configured key.
    #[instrument(level = "info", skip(self))]
    pub async fn list_models(&self) -> Result<Vec<ModelSummary>, ModelError> {
        let url = format!("{}/models", self.base_url);
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http_client
                .get(&url)
                .header("x-goog-api-key", &self.api_key)
                .query(&[("pageSize", "1000")]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request.send().await?;
            let status = response.status();
            let body = response.text().await?;
            if !status.is_success() {
                return Err(classify_error("models", status, &body));
            }

            let page: ListModelsResponse = serde_json::from_str(&body)
                .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
            models.extend(page.models);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        info!(models = models.len(), "Listed models");
        Ok(models)
    }
}

/// `models/` prefix is part of the resource name; accept it either way.
pub fn model_resource(model: &str) -> String {
    if model.starts_with("models/") || model.starts_with("tunedModels/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

fn classify_error(model: &str, status: StatusCode, body: &str) -> ModelError {
    let (message, api_status) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.message, envelope.error.status),
        Err(_) => (body.trim().to_string(), String::new()),
    };

    if status == StatusCode::NOT_FOUND || api_status == "NOT_FOUND" {
        ModelError::NotFound {
            model: model.to_string(),
            message,
        }
    } else if status == StatusCode::TOO_MANY_REQUESTS
        || api_status == "RESOURCE_EXHAUSTED"
        || message.to_lowercase().contains("quota")
    {
        ModelError::QuotaExhausted {
            model: model.to_string(),
            message,
        }
    } else {
        ModelError::ApiError {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    #[instrument(level = "info", skip(self, request), fields(turns = request.contents.len()))]
    async fn generate(&self, model: &str, request: &GenerateContentRequest) -> Result<Content, ModelError> {
        let url = format!("{}/{}:generateContent", self.base_url, model_resource(model));
        debug!(url = %url, "Calling Gemini");

        let start_time = std::time::Instant::now();
        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        info!(
            status = %status,
            duration_ms = start_time.elapsed().as_millis(),
            "Gemini request completed"
        );

        if !status.is_success() {
            let err = classify_error(model, status, &body);
            error!(error = %err, "Gemini request failed");
            return Err(err);
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        let candidate = parsed.candidates.into_iter().next().ok_or(ModelError::EmptyResponse)?;
        debug!(finish_reason = candidate.finish_reason.as_deref(), "Candidate received");

        let mut content = candidate.content.ok_or(ModelError::EmptyResponse)?;
        content.role = Some(Role::Model);
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let request = GenerateContentRequest {
            system_instruction: Some(Content::system("be brief")),
            contents: vec![
                Content::user_text("hi"),
                Content::function_responses(vec![Part::function_response(
                    "search_flights",
                    json!({"result": "none"}),
                )]),
            ],
            tools: vec![Tool {
                function_declarations: vec![FunctionDeclaration {
                    name: "search_flights".to_string(),
                    description: "d".to_string(),
                    parameters: json!({"type": "OBJECT"}),
                }],
            }],
            generation_config: Some(GenerationConfig { temperature: 0.0 }),
        };

        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["systemInstruction"], json!({"parts": [{"text": "be brief"}]}));
        assert_eq!(wire["contents"][0], json!({"role": "user", "parts": [{"text": "hi"}]}));
        assert_eq!(
            wire["contents"][1]["parts"][0]["functionResponse"]["name"],
            "search_flights"
        );
        assert_eq!(wire["tools"][0]["functionDeclarations"][0]["name"], "search_flights");
        assert_eq!(wire["generationConfig"]["temperature"], 0.0);
    }

    #[test]
    fn test_response_parts() {
        let content: Content = serde_json::from_value(json!({
            "role": "model",
            "parts": [
                {"text": "Let me look."},
                {"functionCall": {"name": "search_flights", "args": {"origin": "DEL"}}, "thoughtSignature": "sig"}
            ]
        }))
        .unwrap();

        assert_eq!(content.text(), "Let me look.");
        let calls = content.function_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args["origin"], "DEL");
        assert_eq!(content.parts[1].thought_signature.as_deref(), Some("sig"));

        // the signature survives a round trip back to the API
        let wire = serde_json::to_value(&content).unwrap();
        assert_eq!(wire["parts"][1]["thoughtSignature"], "sig");
    }

    #[test]
    fn test_classify_errors() {
        let not_found = r#"{"error": {"code": 404, "message": "models/x is not found", "status": "NOT_FOUND"}}"#;
        assert!(matches!(
            classify_error("x", StatusCode::NOT_FOUND, not_found),
            ModelError::NotFound { .. }
        ));

        let quota = r#"{"error": {"code": 429, "message": "You exceeded your current quota", "status": "RESOURCE_EXHAUSTED"}}"#;
        let err = classify_error("x", StatusCode::TOO_MANY_REQUESTS, quota);
        assert!(matches!(err, ModelError::QuotaExhausted { .. }));
        assert!(err.is_fallback_candidate());

        let bad = classify_error("x", StatusCode::BAD_REQUEST, "garbage");
        assert!(matches!(bad, ModelError::ApiError { status: 400, .. }));
        assert!(!bad.is_fallback_candidate());
    }

    #[test]
    fn test_model_resource() {
        assert_eq!(model_resource("models/gemini-2.5-pro"), "models/gemini-2.5-pro");
        assert_eq!(model_resource("gemini-2.5-flash"), "models/gemini-2.5-flash");
    }

    #[test]
    fn test_client_requires_key() {
        assert!(matches!(
            GeminiClient::new(&Config::default()),
            Err(ModelError::MissingApiKey)
        ));
    }
}
