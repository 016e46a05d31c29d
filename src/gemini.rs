//! Minimal Gemini client for lesson content generation.
//!
//! We only call `models/{model}:generateContent` with a JSON response schema.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, instrument};

use crate::config::{GeminiSettings, Prompts};
use crate::generator::{ContentGenerator, GeneratedBundle, GenerationError, GenerationRequest, GenerationResult};
use crate::util::{fill_template, strip_data_url, trunc_for_log};

/// Images are always sent with this MIME type.
const IMAGE_MIME: &str = "image/jpeg";

#[derive(Clone)]
pub struct Gemini {
  pub client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
  prompts: Prompts,
}

impl Gemini {
  pub fn new(settings: &GeminiSettings, prompts: Prompts) -> Result<Self, GenerationError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(settings.timeout_secs))
      .build()
      .map_err(|e| GenerationError::Transport(e.to_string()))?;
    Ok(Self {
      client,
      api_key: settings.api_key.clone(),
      base_url: settings.base_url.trim_end_matches('/').to_string(),
      model: settings.model.clone(),
      prompts,
    })
  }

  fn build_request(&self, request: &GenerationRequest) -> GenerationResult<GenerateContentRequest> {
    let prompt = fill_template(
      &self.prompts.generation_template,
      &[("title", request.title.as_str()), ("source_reference", request.source_reference.as_str())],
    );
    let mut parts = vec![Part::Text { text: prompt }];
    for (index, image) in request.images.iter().enumerate() {
      parts.push(Part::InlineData { inline_data: encode_image(index, image)? });
    }
    Ok(GenerateContentRequest {
      contents: vec![Content { parts }],
      generation_config: GenerationConfig {
        response_mime_type: "application/json".into(),
        response_schema: lesson_schema(),
      },
    })
  }

  /// JSON-schema constrained generation. Generic over the target type T.
  #[instrument(level = "info", skip(self, body), fields(model = %self.model))]
  async fn generate_json<T: for<'a> Deserialize<'a>>(&self, body: &GenerateContentRequest) -> GenerationResult<T> {
    let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "assist-learning/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header("x-goog-api-key", &self.api_key)
      .json(body)
      .send()
      .await
      .map_err(|e| GenerationError::Transport(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_gemini_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      return Err(GenerationError::Http { status, message });
    }

    let body: GenerateContentResponse = res
      .json()
      .await
      .map_err(|e| GenerationError::Malformed(e.to_string()))?;
    if let Some(usage) = &body.usage_metadata {
      info!(
        target: "generation",
        prompt_tokens = ?usage.prompt_token_count,
        candidates_tokens = ?usage.candidates_token_count,
        total_tokens = ?usage.total_token_count,
        "Gemini usage"
      );
    }

    let text = body.text();
    if text.trim().is_empty() {
      return Err(GenerationError::Empty);
    }
    serde_json::from_str::<T>(text.trim()).map_err(|e| GenerationError::Malformed(format!("JSON parse error: {e}")))
  }
}

#[async_trait]
impl ContentGenerator for Gemini {
  #[instrument(
    level = "info",
    skip(self, request),
    fields(model = %self.model, title_len = request.title.len(), images = request.images.len())
  )]
  async fn generate(&self, request: &GenerationRequest) -> GenerationResult<GeneratedBundle> {
    let body = self.build_request(request)?;
    let start = Instant::now();
    let result = self.generate_json::<GeneratedBundle>(&body).await;
    let elapsed = start.elapsed();

    match &result {
      Ok(bundle) => info!(
        target: "generation",
        ?elapsed,
        key_points = bundle.key_points.len(),
        exercises = bundle.exercises.len(),
        "Model response received successfully"
      ),
      Err(e) => error!(target: "generation", ?elapsed, error = %e, "Model call failed during lesson generation"),
    }
    result
  }
}

/// Decode an image string (plain base64 or data URL) and re-encode it for transport.
fn encode_image(index: usize, image: &str) -> GenerationResult<InlineData> {
  let bytes = STANDARD
    .decode(strip_data_url(image).trim())
    .map_err(|e| GenerationError::InvalidImage { index, reason: e.to_string() })?;
  if bytes.is_empty() {
    return Err(GenerationError::InvalidImage { index, reason: "empty payload".into() });
  }
  Ok(InlineData { mime_type: IMAGE_MIME.into(), data: STANDARD.encode(bytes) })
}

fn lesson_schema() -> Value {
  json!({
    "type": "OBJECT",
    "properties": {
      "summary": { "type": "STRING" },
      "keyPoints": { "type": "ARRAY", "items": { "type": "STRING" } },
      "exercises": {
        "type": "ARRAY",
        "items": {
          "type": "OBJECT",
          "properties": {
            "question": { "type": "STRING" },
            "answer": { "type": "STRING" },
            "explanation": { "type": "STRING" }
          },
          "required": ["question", "answer", "explanation"]
        }
      }
    },
    "required": ["summary", "keyPoints", "exercises"]
  })
}

// --- generateContent DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
  contents: Vec<Content>,
  generation_config: GenerationConfig,
}
#[derive(Serialize)]
struct Content { parts: Vec<Part> }
#[derive(Serialize)]
#[serde(untagged)]
enum Part {
  Text { text: String },
  InlineData {
    #[serde(rename = "inlineData")]
    inline_data: InlineData,
  },
}
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData { mime_type: String, data: String }
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig { response_mime_type: String, response_schema: Value }

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
  #[serde(default)] candidates: Vec<Candidate>,
  #[serde(default)] usage_metadata: Option<UsageMetadata>,
}
#[derive(Deserialize)]
struct Candidate { #[serde(default)] content: Option<CandidateContent> }
#[derive(Deserialize)]
struct CandidateContent { #[serde(default)] parts: Vec<CandidatePart> }
#[derive(Deserialize)]
struct CandidatePart { #[serde(default)] text: Option<String> }
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)] prompt_token_count: Option<u32>,
  #[serde(default)] candidates_token_count: Option<u32>,
  #[serde(default)] total_token_count: Option<u32>,
}

impl GenerateContentResponse {
  /// Text parts of the first candidate, concatenated.
  fn text(&self) -> String {
    self.candidates
      .first()
      .and_then(|c| c.content.as_ref())
      .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect())
      .unwrap_or_default()
  }
}

/// Try to extract a clean error message from a Gemini error body.
fn extract_gemini_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
