// src/generation/backend.rs

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::error::{BackendFailure, GenerationError};

/// One completion call.
#[derive(Debug, Clone, Copy)]
pub struct BackendRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    /// Structural hint for the output; `None` sends JSON mode only.
    pub response_schema: Option<&'a Value>,
}

/// A generative-AI completion API.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Returns the raw completion text.
    async fn generate(&self, request: BackendRequest<'_>) -> Result<String, BackendFailure>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    role: &'static str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'static str,
    temperature: f64,
    top_p: f64,
    top_k: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<&'a Value>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Deserialize)]
struct GeminiCandidatePart {
    text: Option<String>,
}

/// Try to extract a clean error message from a Gemini error body.
fn extract_gemini_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct EWrap {
        error: EObj,
    }
    #[derive(Deserialize)]
    struct EObj {
        message: String,
    }
    serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

/// Google Gemini `generateContent` over HTTPS.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: Url,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: &str) -> Result<Self, GenerationError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            GenerationError::Configuration(format!("Invalid GEMINI_BASE_URL '{}': {}", base_url, e))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| GenerationError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            base_url,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.as_str().trim_end_matches('/'),
            model.trim()
        )
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn generate(&self, request: BackendRequest<'_>) -> Result<String, BackendFailure> {
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart {
                    text: request.prompt,
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                temperature: 0.95,
                top_p: 0.95,
                top_k: 40,
                response_schema: request.response_schema,
            },
        };

        let started = Instant::now();
        let response = self
            .client
            .post(self.endpoint(request.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                BackendFailure::new(
                    e.status().map(|s| s.as_u16()),
                    format!("Request failed: {}", e),
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let msg = extract_gemini_error(&text).unwrap_or(text);
            return Err(BackendFailure::new(
                Some(status.as_u16()),
                format!("[{}] {}", status, msg),
            ));
        }

        let json: GeminiResponse = response.json().await.map_err(|e| {
            BackendFailure::new(None, format!("Failed to decode Gemini response: {}", e))
        })?;

        let text: String = json
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        tracing::info!(
            model = request.model,
            schema = request.response_schema.is_some(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            response_bytes = text.len(),
            "Gemini call finished"
        );

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_and_model() {
        let client = GeminiClient::new("k".into(), "https://example.test/v1beta/").unwrap();
        assert_eq!(
            client.endpoint("gemini-2.5-flash"),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn invalid_base_url_is_a_configuration_error() {
        let err = GeminiClient::new("k".into(), "not a url").err().unwrap();
        assert!(matches!(err, GenerationError::Configuration(_)));
    }

    #[test]
    fn request_body_uses_gemini_field_names() {
        let schema = serde_json::json!({"type": "object"});
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart { text: "hi" }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                temperature: 0.95,
                top_p: 0.95,
                top_k: 40,
                response_schema: Some(&schema),
            },
        };
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(value["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(value["generationConfig"]["topK"], 40);
        assert_eq!(value["generationConfig"]["responseSchema"]["type"], "object");
    }

    #[test]
    fn schema_is_omitted_when_absent() {
        let config = GenerationConfig {
            response_mime_type: "application/json",
            temperature: 0.95,
            top_p: 0.95,
            top_k: 40,
            response_schema: None,
        };
        let value = serde_json::to_value(&config).unwrap();
        assert!(value.get("responseSchema").is_none());
    }

    #[test]
    fn error_body_message_is_extracted() {
        let body = r#"{"error":{"code":503,"message":"The model is overloaded.","status":"UNAVAILABLE"}}"#;
        assert_eq!(extract_gemini_error(body).as_deref(), Some("The model is overloaded."));
        assert_eq!(extract_gemini_error("<html>"), None);
    }
}
