//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve the process and the renderer independently.

use serde::{Deserialize, Serialize};

use crate::domain::{Lesson, Screen};
use crate::machine::Event;
use crate::session::{Notice, Session};

/// Messages the client can send over WebSocket. Navigation events share the
/// `type` tag space with `machine::Event` and are parsed by it.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    GetState,
    SubmitUpload(UploadIn),
    #[serde(untagged)]
    Navigate(Event),
}

/// Messages the process sends over WebSocket (replies and pushed updates).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    State { state: ViewSnapshot },
    Notice { notice: Notice },
    Error { message: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadIn {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub source_reference: String,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Everything a renderer needs for the current screen.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ViewSnapshot {
    pub screen: Screen,
    pub is_generating: bool,
    pub exercise_index: usize,
    pub lessons: Vec<LessonRowOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson: Option<LessonOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exercise: Option<ExerciseOut>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LessonRowOut {
    pub id: String,
    pub title: String,
    pub date: String,
    pub has_content: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LessonOut {
    pub id: String,
    pub title: String,
    pub date: String,
    pub source_reference: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub exercise_count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseOut {
    pub id: String,
    /// 1-based position for display.
    pub number: usize,
    pub total: usize,
    pub question: String,
    pub progress_percent: u8,
    pub is_last: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

fn row(l: &Lesson) -> LessonRowOut {
    LessonRowOut {
        id: l.id.clone(),
        title: l.title.clone(),
        date: l.created_date.clone(),
        has_content: l.has_content(),
    }
}

/// Build the read model. Lesson details only appear on content screens and only
/// for a selected lesson that actually has generated content.
pub fn snapshot(session: &Session) -> ViewSnapshot {
    let state = session.state();
    let lesson = session.selected_lesson().filter(|_| state.screen.shows_lesson());

    let lesson_out = lesson.and_then(|l| {
        let content = l.content.as_ref()?;
        Some(LessonOut {
            id: l.id.clone(),
            title: l.title.clone(),
            date: l.created_date.clone(),
            source_reference: l.source_reference.clone(),
            summary: content.summary.clone(),
            key_points: content.key_points.clone(),
            exercise_count: content.exercises.len(),
        })
    });

    let exercise_out = lesson
        .filter(|_| matches!(state.screen, Screen::Exercise | Screen::Explanation))
        .and_then(|l| {
            let exercises = l.exercises();
            let ex = exercises.get(state.exercise_index)?;
            let total = exercises.len();
            let number = state.exercise_index + 1;
            let reveal = state.screen == Screen::Explanation;
            Some(ExerciseOut {
                id: ex.id.clone(),
                number,
                total,
                question: ex.question.clone(),
                progress_percent: ((number * 100) / total) as u8,
                is_last: number == total,
                answer: reveal.then(|| ex.answer.clone()),
                explanation: reveal.then(|| ex.explanation.clone()),
            })
        });

    ViewSnapshot {
        screen: state.screen,
        is_generating: state.is_generating,
        exercise_index: state.exercise_index,
        lessons: session.lessons().iter().map(row).collect(),
        lesson: lesson_out,
        exercise: exercise_out,
    }
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub generator: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOut {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub notices: Vec<Notice>,
    pub state: ViewSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Messages;
    use crate::generator::{GeneratedBundle, GeneratedExercise};
    use crate::machine::{NoticeCode, ViewState};
    use crate::repository::LessonRepository;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn session_with_lesson(exercises: usize) -> (Session, String) {
        let mut s = Session::new(LessonRepository::load(Arc::new(MemoryStore::new())), Messages::default());
        s.apply(Event::OpenUpload).unwrap();
        let req = s.begin_upload("title".into(), "https://example.com".into(), vec![]).unwrap();
        let bundle = GeneratedBundle {
            summary: "summary".into(),
            key_points: vec!["k".into()],
            exercises: (0..exercises)
                .map(|i| GeneratedExercise {
                    question: format!("q{i}"),
                    answer: format!("a{i}"),
                    explanation: format!("e{i}"),
                })
                .collect(),
        };
        let id = s.finish_upload(req, Ok(bundle)).unwrap();
        (s, id)
    }

    #[test]
    fn list_snapshot_has_rows_but_no_lesson() {
        let (s, id) = session_with_lesson(3);
        let snap = snapshot(&s);
        assert_eq!(snap.screen, Screen::List);
        assert_eq!(snap.lessons.len(), 1);
        assert_eq!(snap.lessons[0].id, id);
        assert!(snap.lessons[0].has_content);
        assert!(snap.lesson.is_none());
        assert!(snap.exercise.is_none());
    }

    #[test]
    fn exercise_hides_answer_until_explanation() {
        let (mut s, id) = session_with_lesson(3);
        s.apply(Event::SelectLesson { lesson_id: id }).unwrap();
        let summary = snapshot(&s);
        assert_eq!(summary.lesson.as_ref().unwrap().exercise_count, 3);
        assert!(summary.exercise.is_none());

        s.apply(Event::ViewExercises).unwrap();
        let ex = snapshot(&s).exercise.unwrap();
        assert_eq!(ex.number, 1);
        assert_eq!(ex.progress_percent, 33);
        assert!(ex.answer.is_none());
        assert!(!ex.is_last);

        s.apply(Event::RevealExplanation).unwrap();
        let ex = snapshot(&s).exercise.unwrap();
        assert_eq!(ex.answer.as_deref(), Some("a0"));
        assert_eq!(ex.explanation.as_deref(), Some("e0"));
    }

    #[test]
    fn last_exercise_is_flagged() {
        let (mut s, id) = session_with_lesson(2);
        s.apply(Event::SelectLesson { lesson_id: id }).unwrap();
        s.apply(Event::ViewExercises).unwrap();
        s.apply(Event::RevealExplanation).unwrap();
        s.apply(Event::NextStep).unwrap();
        let ex = snapshot(&s).exercise.unwrap();
        assert!(ex.is_last);
        assert_eq!(ex.progress_percent, 100);
    }

    #[test]
    fn exercise_screen_with_index_out_of_range_has_no_exercise() {
        let (mut s, id) = session_with_lesson(2);
        s.force_state(ViewState {
            screen: Screen::Exercise,
            selected_lesson_id: Some(id),
            exercise_index: 5,
            is_generating: false,
        });
        let snap = snapshot(&s);
        assert_eq!(snap.screen, Screen::Exercise);
        assert_eq!(snap.lesson.as_ref().unwrap().exercise_count, 2);
        assert!(snap.exercise.is_none());
    }

    #[test]
    fn exercise_screen_without_exercises_has_no_exercise() {
        let (mut s, id) = session_with_lesson(0);
        s.force_state(ViewState {
            screen: Screen::Explanation,
            selected_lesson_id: Some(id),
            exercise_index: 0,
            is_generating: false,
        });
        assert!(snapshot(&s).exercise.is_none());

        s.apply(Event::NextStep).unwrap();
        assert_eq!(s.state().screen, Screen::Summary);
        assert_eq!(s.take_notices().last().unwrap().code, NoticeCode::NoExercises);
    }

    #[test]
    fn client_messages_map_to_events() {
        let msg: ClientWsMessage =
            serde_json::from_str(r#"{"type":"delete_lesson","lessonId":"l1","confirmed":true}"#).unwrap();
        match msg {
            ClientWsMessage::Navigate(Event::DeleteLesson { lesson_id, confirmed }) => {
                assert_eq!(lesson_id, "l1");
                assert!(confirmed);
            }
            other => panic!("expected delete_lesson, got {other:?}"),
        }

        let msg: ClientWsMessage = serde_json::from_str(r#"{"type":"next_step"}"#).unwrap();
        assert!(matches!(msg, ClientWsMessage::Navigate(Event::NextStep)));

        let msg: ClientWsMessage = serde_json::from_str(
            r#"{"type":"submit_upload","title":"t","sourceReference":"u","images":["QUJD"]}"#,
        )
        .unwrap();
        match msg {
            ClientWsMessage::SubmitUpload(body) => {
                assert_eq!(body.source_reference, "u");
                assert_eq!(body.images.len(), 1);
            }
            other => panic!("expected submit_upload, got {other:?}"),
        }
    }

    #[test]
    fn unknown_client_message_is_an_error() {
        assert!(serde_json::from_str::<ClientWsMessage>(r#"{"type":"launch"}"#).is_err());
        assert!(serde_json::from_str::<ClientWsMessage>(r#"{"type":"select_lesson"}"#).is_err());
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let (s, _) = session_with_lesson(1);
        let json = serde_json::to_value(snapshot(&s)).unwrap();
        assert_eq!(json["screen"], "list");
        assert_eq!(json["isGenerating"], false);
        assert_eq!(json["lessons"][0]["hasContent"], true);
        assert!(json.get("lesson").is_none());
    }
}
