//! Content generator boundary.
//!
//! The session only cares whether a generation attempt succeeded. Adapters
//! return an id-less `GeneratedBundle`; ids are assigned here on receipt.

use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::{Exercise, GeneratedContent};

/// Everything the generator receives for one attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationRequest {
  pub title: String,
  pub source_reference: String,
  pub images: Vec<String>,
}

/// Structured output as returned by the generator.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedBundle {
  pub summary: String,
  pub key_points: Vec<String>,
  pub exercises: Vec<GeneratedExercise>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct GeneratedExercise {
  pub question: String,
  pub answer: String,
  pub explanation: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
  #[error("content generator is not configured")]
  NotConfigured,
  #[error("request failed: {0}")]
  Transport(String),
  #[error("generator HTTP {status}: {message}")]
  Http { status: u16, message: String },
  #[error("generator returned empty content")]
  Empty,
  #[error("malformed generator response: {0}")]
  Malformed(String),
  #[error("invalid image #{index}: {reason}")]
  InvalidImage { index: usize, reason: String },
}

pub type GenerationResult<T> = Result<T, GenerationError>;

#[async_trait]
pub trait ContentGenerator: Send + Sync {
  async fn generate(&self, request: &GenerationRequest) -> GenerationResult<GeneratedBundle>;
}

impl GeneratedBundle {
  /// Accept the bundle into the domain, assigning fresh exercise ids.
  /// A blank summary makes the whole bundle unusable.
  pub fn into_content(self) -> GenerationResult<GeneratedContent> {
    if self.summary.trim().is_empty() {
      return Err(GenerationError::Malformed("summary is empty".into()));
    }
    let exercises = self
      .exercises
      .into_iter()
      .map(|ex| Exercise {
        id: Uuid::new_v4().to_string(),
        question: ex.question,
        answer: ex.answer,
        explanation: ex.explanation,
      })
      .collect();
    Ok(GeneratedContent { summary: self.summary, key_points: self.key_points, exercises })
  }
}

/// Stand-in used when no API credential is configured: every attempt fails.
pub struct UnconfiguredGenerator;

#[async_trait]
impl ContentGenerator for UnconfiguredGenerator {
  async fn generate(&self, _request: &GenerationRequest) -> GenerationResult<GeneratedBundle> {
    Err(GenerationError::NotConfigured)
  }
}
