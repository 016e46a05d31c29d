//! View-state machine for the learning flow.
//!
//! `transition` is a pure function of the current `ViewState`, an `Event` and the
//! lesson list. It never touches storage: repository changes come back as an
//! `Effect` for the caller to apply. Out-of-place events are rejected and leave
//! the state untouched.
//!
//! Generation (`submit_upload`) is asynchronous and lives in `session`.

use serde::{Deserialize, Serialize};

use crate::domain::{Lesson, Screen};

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ViewState {
  pub screen: Screen,
  pub selected_lesson_id: Option<String>,
  pub exercise_index: usize,
  pub is_generating: bool,
}

/// Synchronous user actions.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
  OpenUpload,
  OpenList,
  SelectLesson {
    #[serde(rename = "lessonId")]
    lesson_id: String,
  },
  DeleteLesson {
    #[serde(rename = "lessonId")]
    lesson_id: String,
    #[serde(default)]
    confirmed: bool,
  },
  ViewExercises,
  RevealExplanation,
  NextStep,
  RestartSummary,
  BackToList,
  BackToHome,
}

impl Event {
  pub fn name(&self) -> &'static str {
    match self {
      Event::OpenUpload => "open_upload",
      Event::OpenList => "open_list",
      Event::SelectLesson { .. } => "select_lesson",
      Event::DeleteLesson { .. } => "delete_lesson",
      Event::ViewExercises => "view_exercises",
      Event::RevealExplanation => "reveal_explanation",
      Event::NextStep => "next_step",
      Event::RestartSummary => "restart_summary",
      Event::BackToList => "back_to_list",
      Event::BackToHome => "back_to_home",
    }
  }
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
  Info,
  Error,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeCode {
  MissingUploadFields,
  GenerationBusy,
  GenerationFailed,
  LessonCreated,
  NoExercises,
}

impl NoticeCode {
  pub fn kind(self) -> NoticeKind {
    match self {
      NoticeCode::LessonCreated | NoticeCode::GenerationBusy => NoticeKind::Info,
      NoticeCode::MissingUploadFields | NoticeCode::GenerationFailed | NoticeCode::NoExercises => NoticeKind::Error,
    }
  }
}

/// Repository change requested by a transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
  RemoveLesson(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
  pub next: ViewState,
  pub effect: Option<Effect>,
  pub notice: Option<NoticeCode>,
}

impl Transition {
  fn to(next: ViewState) -> Self {
    Self { next, effect: None, notice: None }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
  #[error("{event} is not available on the {screen:?} screen")]
  WrongScreen { event: &'static str, screen: Screen },
  #[error("lesson {0} does not exist")]
  UnknownLesson(String),
  #[error("lesson {0} has no generated content")]
  NoContent(String),
  #[error("no lesson is selected")]
  NoSelection,
  #[error("exercise #{0} does not exist")]
  NoExercise(usize),
  #[error("deletion was not confirmed")]
  Unconfirmed,
  #[error("title and source reference are required")]
  MissingUploadFields,
  #[error("a generation request is already in flight")]
  Busy,
}

fn require(event: &Event, state: &ViewState, allowed: &[Screen]) -> Result<(), Rejection> {
  if allowed.contains(&state.screen) {
    Ok(())
  } else {
    Err(Rejection::WrongScreen { event: event.name(), screen: state.screen })
  }
}

/// Selected lesson, provided it exists and carries generated content.
pub fn selected_with_content<'a>(state: &ViewState, lessons: &'a [Lesson]) -> Result<&'a Lesson, Rejection> {
  let id = state.selected_lesson_id.as_deref().ok_or(Rejection::NoSelection)?;
  let lesson = lessons
    .iter()
    .find(|l| l.id == id)
    .ok_or_else(|| Rejection::UnknownLesson(id.to_string()))?;
  if lesson.has_content() {
    Ok(lesson)
  } else {
    Err(Rejection::NoContent(id.to_string()))
  }
}

pub fn transition(state: &ViewState, event: &Event, lessons: &[Lesson]) -> Result<Transition, Rejection> {
  let mut next = state.clone();
  match event {
    Event::OpenUpload => {
      require(event, state, &[Screen::Home])?;
      next.screen = Screen::Upload;
      Ok(Transition::to(next))
    }

    Event::OpenList => {
      require(event, state, &[Screen::Home, Screen::Summary, Screen::Finish])?;
      next.screen = Screen::List;
      Ok(Transition::to(next))
    }

    Event::SelectLesson { lesson_id } => {
      require(event, state, &[Screen::List])?;
      let lesson = lessons
        .iter()
        .find(|l| &l.id == lesson_id)
        .ok_or_else(|| Rejection::UnknownLesson(lesson_id.clone()))?;
      if !lesson.has_content() {
        return Err(Rejection::NoContent(lesson_id.clone()));
      }
      next.selected_lesson_id = Some(lesson_id.clone());
      next.exercise_index = 0;
      next.screen = Screen::Summary;
      Ok(Transition::to(next))
    }

    Event::DeleteLesson { lesson_id, confirmed } => {
      require(event, state, &[Screen::List])?;
      if !confirmed {
        return Err(Rejection::Unconfirmed);
      }
      if next.selected_lesson_id.as_deref() == Some(lesson_id.as_str()) {
        next.selected_lesson_id = None;
        next.exercise_index = 0;
      }
      Ok(Transition { next, effect: Some(Effect::RemoveLesson(lesson_id.clone())), notice: None })
    }

    Event::ViewExercises => {
      require(event, state, &[Screen::Summary])?;
      let lesson = selected_with_content(state, lessons)?;
      let count = lesson.exercises().len();
      if count == 0 {
        return Ok(Transition { next, effect: None, notice: Some(NoticeCode::NoExercises) });
      }
      if next.exercise_index >= count {
        next.exercise_index = 0;
      }
      next.screen = Screen::Exercise;
      Ok(Transition::to(next))
    }

    Event::RevealExplanation => {
      require(event, state, &[Screen::Exercise])?;
      let lesson = selected_with_content(state, lessons)?;
      if state.exercise_index >= lesson.exercises().len() {
        return Err(Rejection::NoExercise(state.exercise_index));
      }
      next.screen = Screen::Explanation;
      Ok(Transition::to(next))
    }

    Event::NextStep => {
      require(event, state, &[Screen::Explanation])?;
      let lesson = selected_with_content(state, lessons)?;
      let count = lesson.exercises().len();
      if count == 0 {
        next.screen = Screen::Summary;
        return Ok(Transition { next, effect: None, notice: Some(NoticeCode::NoExercises) });
      }
      if state.exercise_index + 1 >= count {
        next.screen = Screen::Finish;
      } else {
        next.exercise_index += 1;
        next.screen = Screen::Exercise;
      }
      Ok(Transition::to(next))
    }

    Event::RestartSummary => {
      require(event, state, &[Screen::Finish])?;
      next.screen = Screen::Summary;
      Ok(Transition::to(next))
    }

    Event::BackToList => {
      if state.screen == Screen::Home {
        return Err(Rejection::WrongScreen { event: event.name(), screen: state.screen });
      }
      next.screen = Screen::List;
      Ok(Transition::to(next))
    }

    Event::BackToHome => {
      next.screen = Screen::Home;
      Ok(Transition::to(next))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Exercise, GeneratedContent};

  fn lesson(id: &str, exercises: usize, with_content: bool) -> Lesson {
    Lesson {
      id: id.into(),
      title: "二次関数の基礎".into(),
      created_date: "2026/10/16".into(),
      source_reference: "https://drive.google.com/file/d/x".into(),
      images: vec![],
      content: with_content.then(|| GeneratedContent {
        summary: "summary".into(),
        key_points: vec!["a".into()],
        exercises: (0..exercises)
          .map(|i| Exercise {
            id: format!("ex-{i}"),
            question: format!("q{i}"),
            answer: format!("a{i}"),
            explanation: format!("e{i}"),
          })
          .collect(),
      }),
    }
  }

  fn on(screen: Screen, selected: Option<&str>, index: usize) -> ViewState {
    ViewState {
      screen,
      selected_lesson_id: selected.map(str::to_string),
      exercise_index: index,
      is_generating: false,
    }
  }

  fn step(state: &ViewState, event: Event, lessons: &[Lesson]) -> ViewState {
    transition(state, &event, lessons).unwrap().next
  }

  #[test]
  fn initial_state_is_home() {
    let s = ViewState::default();
    assert_eq!(s.screen, Screen::Home);
    assert_eq!(s.selected_lesson_id, None);
    assert_eq!(s.exercise_index, 0);
    assert!(!s.is_generating);
  }

  #[test]
  fn open_upload_only_from_home() {
    let home = ViewState::default();
    assert_eq!(step(&home, Event::OpenUpload, &[]).screen, Screen::Upload);
    let list = on(Screen::List, None, 0);
    assert!(matches!(
      transition(&list, &Event::OpenUpload, &[]),
      Err(Rejection::WrongScreen { event: "open_upload", screen: Screen::List })
    ));
  }

  #[test]
  fn open_list_from_home_summary_and_finish() {
    let lessons = [lesson("l1", 3, true)];
    for screen in [Screen::Home, Screen::Summary, Screen::Finish] {
      let s = on(screen, Some("l1"), 0);
      assert_eq!(step(&s, Event::OpenList, &lessons).screen, Screen::List);
    }
    assert!(transition(&on(Screen::Exercise, Some("l1"), 0), &Event::OpenList, &lessons).is_err());
  }

  #[test]
  fn select_lesson_resets_index() {
    let lessons = [lesson("l1", 3, true)];
    let s = on(Screen::List, Some("old"), 2);
    let next = step(&s, Event::SelectLesson { lesson_id: "l1".into() }, &lessons);
    assert_eq!(next.screen, Screen::Summary);
    assert_eq!(next.selected_lesson_id.as_deref(), Some("l1"));
    assert_eq!(next.exercise_index, 0);
  }

  #[test]
  fn select_unknown_lesson_stays_on_list() {
    let lessons = [lesson("l1", 3, true)];
    let s = on(Screen::List, None, 0);
    let err = transition(&s, &Event::SelectLesson { lesson_id: "ghost".into() }, &lessons).unwrap_err();
    assert_eq!(err, Rejection::UnknownLesson("ghost".into()));
  }

  #[test]
  fn select_lesson_without_content_is_rejected() {
    let lessons = [lesson("bare", 0, false)];
    let s = on(Screen::List, None, 0);
    let err = transition(&s, &Event::SelectLesson { lesson_id: "bare".into() }, &lessons).unwrap_err();
    assert_eq!(err, Rejection::NoContent("bare".into()));
  }

  #[test]
  fn delete_requires_confirmation_and_clears_selection() {
    let lessons = [lesson("l1", 3, true)];
    let s = on(Screen::List, Some("l1"), 1);
    let unconfirmed = Event::DeleteLesson { lesson_id: "l1".into(), confirmed: false };
    assert_eq!(transition(&s, &unconfirmed, &lessons).unwrap_err(), Rejection::Unconfirmed);

    let t = transition(&s, &Event::DeleteLesson { lesson_id: "l1".into(), confirmed: true }, &lessons).unwrap();
    assert_eq!(t.next.screen, Screen::List);
    assert_eq!(t.next.selected_lesson_id, None);
    assert_eq!(t.effect, Some(Effect::RemoveLesson("l1".into())));
  }

  #[test]
  fn delete_other_lesson_keeps_selection() {
    let lessons = [lesson("l1", 3, true), lesson("l2", 3, true)];
    let s = on(Screen::List, Some("l1"), 0);
    let t = transition(&s, &Event::DeleteLesson { lesson_id: "l2".into(), confirmed: true }, &lessons).unwrap();
    assert_eq!(t.next.selected_lesson_id.as_deref(), Some("l1"));
  }

  #[test]
  fn view_exercises_with_none_stays_on_summary() {
    let lessons = [lesson("l1", 0, true)];
    let s = on(Screen::Summary, Some("l1"), 0);
    let t = transition(&s, &Event::ViewExercises, &lessons).unwrap();
    assert_eq!(t.next.screen, Screen::Summary);
    assert_eq!(t.notice, Some(NoticeCode::NoExercises));
  }

  #[test]
  fn next_step_without_exercises_returns_to_summary() {
    let lessons = [lesson("l1", 0, true)];
    let s = on(Screen::Explanation, Some("l1"), 0);
    let t = transition(&s, &Event::NextStep, &lessons).unwrap();
    assert_eq!(t.next.screen, Screen::Summary);
    assert_eq!(t.next.selected_lesson_id.as_deref(), Some("l1"));
    assert_eq!(t.notice, Some(NoticeCode::NoExercises));
  }

  #[test]
  fn reveal_without_exercises_is_rejected() {
    let lessons = [lesson("l1", 0, true)];
    let s = on(Screen::Exercise, Some("l1"), 0);
    assert_eq!(transition(&s, &Event::RevealExplanation, &lessons).unwrap_err(), Rejection::NoExercise(0));
  }

  #[test]
  fn view_exercises_without_selection_is_rejected() {
    let s = on(Screen::Summary, None, 0);
    assert_eq!(transition(&s, &Event::ViewExercises, &[]).unwrap_err(), Rejection::NoSelection);
  }

  #[test]
  fn traversal_reaches_finish_after_n_steps() {
    let n = 3;
    let lessons = [lesson("l1", n, true)];
    let mut s = on(Screen::Exercise, Some("l1"), 0);
    for i in 0..n {
      s = step(&s, Event::RevealExplanation, &lessons);
      assert_eq!(s.screen, Screen::Explanation);
      s = step(&s, Event::NextStep, &lessons);
      if i + 1 < n {
        assert_eq!(s.screen, Screen::Exercise);
        assert_eq!(s.exercise_index, i + 1);
      }
    }
    assert_eq!(s.screen, Screen::Finish);
  }

  #[test]
  fn traversal_n_minus_one_steps_never_finishes_early() {
    let n = 4;
    let lessons = [lesson("l1", n, true)];
    let mut s = on(Screen::Exercise, Some("l1"), 0);
    for _ in 0..n - 1 {
      s = step(&s, Event::RevealExplanation, &lessons);
      s = step(&s, Event::NextStep, &lessons);
      assert_ne!(s.screen, Screen::Finish);
    }
    assert_eq!(s.screen, Screen::Exercise);
    assert_eq!(s.exercise_index, n - 1);
  }

  #[test]
  fn single_exercise_finishes_immediately() {
    let lessons = [lesson("l1", 1, true)];
    let s = on(Screen::Explanation, Some("l1"), 0);
    assert_eq!(step(&s, Event::NextStep, &lessons).screen, Screen::Finish);
  }

  #[test]
  fn restart_summary_changes_screen_only() {
    let lessons = [lesson("l1", 3, true)];
    let s = on(Screen::Finish, Some("l1"), 2);
    let next = step(&s, Event::RestartSummary, &lessons);
    assert_eq!(next.screen, Screen::Summary);
    assert_eq!(next.exercise_index, 2);
    assert_eq!(next.selected_lesson_id.as_deref(), Some("l1"));
  }

  #[test]
  fn back_to_home_from_anywhere_back_to_list_not_from_home() {
    let s = on(Screen::Explanation, Some("l1"), 1);
    assert_eq!(step(&s, Event::BackToHome, &[]).screen, Screen::Home);
    assert_eq!(step(&s, Event::BackToList, &[]).screen, Screen::List);
    assert!(transition(&ViewState::default(), &Event::BackToList, &[]).is_err());
  }

  #[test]
  fn reveal_with_out_of_range_index_is_rejected() {
    let lessons = [lesson("l1", 2, true)];
    let s = on(Screen::Exercise, Some("l1"), 5);
    assert_eq!(transition(&s, &Event::RevealExplanation, &lessons).unwrap_err(), Rejection::NoExercise(5));
  }

  #[test]
  fn events_parse_from_tagged_json() {
    let e: Event = serde_json::from_str(r#"{"type":"select_lesson","lessonId":"l1"}"#).unwrap();
    assert_eq!(e, Event::SelectLesson { lesson_id: "l1".into() });
    let e: Event = serde_json::from_str(r#"{"type":"delete_lesson","lessonId":"l1"}"#).unwrap();
    assert_eq!(e, Event::DeleteLesson { lesson_id: "l1".into(), confirmed: false });
    let e: Event = serde_json::from_str(r#"{"type":"next_step"}"#).unwrap();
    assert_eq!(e, Event::NextStep);
  }
}
