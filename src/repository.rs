//! In-memory lesson list with write-through persistence.
//!
//! Order is most-recently-created first. Every effective mutation rewrites the
//! whole list to the store; a failed write is logged and the in-memory list
//! stays authoritative for the rest of the session.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::domain::Lesson;
use crate::store::{LessonStore, LESSONS_KEY};

pub struct LessonRepository {
  lessons: Vec<Lesson>,
  store: Arc<dyn LessonStore>,
}

impl LessonRepository {
  /// Single read at startup. Missing, unreadable or malformed data starts empty.
  #[instrument(level = "info", skip_all)]
  pub fn load(store: Arc<dyn LessonStore>) -> Self {
    let lessons = match store.get(LESSONS_KEY) {
      Ok(Some(raw)) => match serde_json::from_str::<Vec<Lesson>>(&raw) {
        Ok(lessons) => lessons,
        Err(e) => {
          warn!(target: "lesson", error = %e, "Stored lessons are malformed; starting empty");
          Vec::new()
        }
      },
      Ok(None) => Vec::new(),
      Err(e) => {
        error!(target: "lesson", error = %e, "Failed to read stored lessons; starting empty");
        Vec::new()
      }
    };
    info!(target: "lesson", count = lessons.len(), "Lessons loaded");
    Self { lessons, store }
  }

  pub fn all(&self) -> &[Lesson] {
    &self.lessons
  }

  pub fn find_by_id(&self, id: &str) -> Option<&Lesson> {
    self.lessons.iter().find(|l| l.id == id)
  }

  /// Prepend a lesson. Callers hand in a freshly generated id.
  #[instrument(level = "debug", skip(self, lesson), fields(id = %lesson.id))]
  pub fn insert_front(&mut self, lesson: Lesson) {
    debug_assert!(self.find_by_id(&lesson.id).is_none(), "duplicate lesson id");
    self.lessons.insert(0, lesson);
    self.persist();
  }

  /// Remove by id. Unknown ids are a no-op; returns whether anything was removed.
  #[instrument(level = "debug", skip(self))]
  pub fn remove_by_id(&mut self, id: &str) -> bool {
    let before = self.lessons.len();
    self.lessons.retain(|l| l.id != id);
    let removed = self.lessons.len() != before;
    if removed {
      self.persist();
    }
    removed
  }

  fn persist(&self) {
    let json = match serde_json::to_string(&self.lessons) {
      Ok(json) => json,
      Err(e) => {
        error!(target: "lesson", error = %e, "Failed to serialize lessons");
        return;
      }
    };
    if let Err(e) = self.store.set(LESSONS_KEY, &json) {
      error!(target: "lesson", error = %e, "Failed to persist lessons");
    }
  }
}
