//! Domain models: lessons, their generated study content, and the screens of the learning flow.
//!
//! Field names follow the stored JSON layout (camelCase); the creation date is
//! stored as `date`. Older exports used `transcription` and `aiData`; those
//! names are still accepted when reading.

use serde::{Deserialize, Serialize};

/// One question/answer/explanation unit inside generated content.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Exercise {
  pub id: String,
  pub question: String,
  pub answer: String,
  pub explanation: String,
}

/// Summary, key points and exercises produced for a lesson.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedContent {
  pub summary: String,
  #[serde(default)] pub key_points: Vec<String>,
  #[serde(default)] pub exercises: Vec<Exercise>,
}

/// A registered lesson. Everything except `content` is fixed at creation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
  pub id: String,
  pub title: String,
  #[serde(rename = "date")]
  pub created_date: String,
  #[serde(alias = "transcription")]
  pub source_reference: String,
  /// Base64 image payloads (data URLs allowed).
  #[serde(default)] pub images: Vec<String>,
  #[serde(default, alias = "aiData", skip_serializing_if = "Option::is_none")]
  pub content: Option<GeneratedContent>,
}

impl Lesson {
  pub fn exercises(&self) -> &[Exercise] {
    self.content.as_ref().map(|c| c.exercises.as_slice()).unwrap_or(&[])
  }

  pub fn has_content(&self) -> bool {
    self.content.is_some()
  }
}

/// Screens of the learning flow.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
  #[default]
  Home,
  Upload,
  List,
  Summary,
  Exercise,
  Explanation,
  Finish,
}

impl Screen {
  /// Screens that render the selected lesson's generated content.
  pub fn shows_lesson(self) -> bool {
    matches!(self, Screen::Summary | Screen::Exercise | Screen::Explanation | Screen::Finish)
  }
}
