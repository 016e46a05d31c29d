//! The single learning session: view state, lesson repository and pending notices.
//!
//! Navigation goes through `machine::transition`. Generation is split in two
//! halves around the await point: `begin_upload` validates and raises the busy
//! flag, `finish_upload` consumes the generator outcome. Only one request can be
//! in flight because `begin_upload` refuses while `is_generating` is set.

use chrono::Local;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::Messages;
use crate::domain::{Lesson, Screen};
use crate::generator::{GeneratedBundle, GenerationRequest, GenerationResult};
use crate::machine::{selected_with_content, transition, Effect, Event, NoticeCode, NoticeKind, Rejection, ViewState};
use crate::repository::LessonRepository;
use crate::util::{display_date, is_filled};

#[derive(Clone, Debug, serde::Serialize, PartialEq, Eq)]
pub struct Notice {
  pub kind: NoticeKind,
  pub code: NoticeCode,
  pub message: String,
}

pub struct Session {
  state: ViewState,
  repository: LessonRepository,
  messages: Messages,
  notices: Vec<Notice>,
}

impl Session {
  pub fn new(repository: LessonRepository, messages: Messages) -> Self {
    Self { state: ViewState::default(), repository, messages, notices: Vec::new() }
  }

  pub fn state(&self) -> &ViewState {
    &self.state
  }

  pub fn lessons(&self) -> &[Lesson] {
    self.repository.all()
  }

  /// Selected lesson, only when it carries generated content.
  pub fn selected_lesson(&self) -> Option<&Lesson> {
    selected_with_content(&self.state, self.repository.all()).ok()
  }

  #[cfg(test)]
  pub(crate) fn force_state(&mut self, state: ViewState) {
    self.state = state;
  }

  /// Drain notices produced since the last call.
  pub fn take_notices(&mut self) -> Vec<Notice> {
    std::mem::take(&mut self.notices)
  }

  fn notify(&mut self, code: NoticeCode) {
    let message = match code {
      NoticeCode::MissingUploadFields => &self.messages.missing_upload_fields,
      NoticeCode::GenerationBusy => &self.messages.generation_busy,
      NoticeCode::GenerationFailed => &self.messages.generation_failed,
      NoticeCode::LessonCreated => &self.messages.lesson_created,
      NoticeCode::NoExercises => &self.messages.no_exercises,
    }
    .clone();
    self.notices.push(Notice { kind: code.kind(), code, message });
  }

  /// Apply a navigation event. A rejection leaves the state untouched.
  #[instrument(level = "info", skip(self), fields(event = event.name(), screen = ?self.state.screen))]
  pub fn apply(&mut self, event: Event) -> Result<(), Rejection> {
    let t = match transition(&self.state, &event, self.repository.all()) {
      Ok(t) => t,
      Err(rejection) => {
        debug!(target: "lesson", %rejection, "Event ignored");
        return Err(rejection);
      }
    };
    if let Some(Effect::RemoveLesson(id)) = &t.effect {
      let removed = self.repository.remove_by_id(id);
      info!(target: "lesson", %id, removed, "Lesson deleted");
    }
    if let Some(code) = t.notice {
      self.notify(code);
    }
    self.state = t.next;
    Ok(())
  }

  /// Validate an upload and mark generation as in flight.
  /// The returned request is what the generator must be called with.
  #[instrument(level = "info", skip(self, images), fields(title_len = title.len(), images = images.len()))]
  pub fn begin_upload(
    &mut self,
    title: String,
    source_reference: String,
    images: Vec<String>,
  ) -> Result<GenerationRequest, Rejection> {
    if self.state.screen != Screen::Upload {
      return Err(Rejection::WrongScreen { event: "submit_upload", screen: self.state.screen });
    }
    if !is_filled(&title) || !is_filled(&source_reference) {
      warn!(target: "generation", "Upload rejected: missing title or source reference");
      self.notify(NoticeCode::MissingUploadFields);
      return Err(Rejection::MissingUploadFields);
    }
    if self.state.is_generating {
      warn!(target: "generation", "Upload rejected: generation already in flight");
      self.notify(NoticeCode::GenerationBusy);
      return Err(Rejection::Busy);
    }
    self.state.is_generating = true;
    info!(target: "generation", "Generation started");
    Ok(GenerationRequest { title, source_reference, images })
  }

  /// Consume the generator outcome. On success the new lesson goes to the front
  /// of the list and the screen moves to List; on failure only the busy flag is
  /// cleared and a notice is queued.
  #[instrument(level = "info", skip_all, fields(ok = outcome.is_ok()))]
  pub fn finish_upload(
    &mut self,
    request: GenerationRequest,
    outcome: GenerationResult<GeneratedBundle>,
  ) -> GenerationResult<String> {
    self.state.is_generating = false;
    let content = match outcome.and_then(GeneratedBundle::into_content) {
      Ok(content) => content,
      Err(e) => {
        error!(target: "generation", error = %e, "Content generation failed");
        self.notify(NoticeCode::GenerationFailed);
        return Err(e);
      }
    };

    let lesson = Lesson {
      id: Uuid::new_v4().to_string(),
      title: request.title,
      created_date: display_date(&Local::now()),
      source_reference: request.source_reference,
      images: request.images,
      content: Some(content),
    };
    let id = lesson.id.clone();
    info!(target: "generation", %id, exercises = lesson.exercises().len(), "Lesson created");
    self.repository.insert_front(lesson);
    self.state.screen = Screen::List;
    self.notify(NoticeCode::LessonCreated);
    Ok(id)
  }
}
