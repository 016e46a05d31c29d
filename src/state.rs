//! Application state: the one learning session, the content generator and the update channel.
//!
//! This module owns:
//!   - the session (view state + lesson repository) behind an async mutex
//!   - the content generator (Gemini, or a stand-in that always fails)
//!   - a broadcast channel pushing snapshots/notices to connected sockets
//!
//! Transitions are serialized by the mutex. A generation round-trip releases the
//! lock while the generator runs, so navigation stays responsive.

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use crate::config::{load_file_config_from_env, FileConfig, Settings};
use crate::gemini::Gemini;
use crate::generator::{ContentGenerator, UnconfiguredGenerator};
use crate::machine::{Event, Rejection};
use crate::protocol::{snapshot, ServerWsMessage, UploadIn, ViewSnapshot};
use crate::repository::LessonRepository;
use crate::session::{Notice, Session};
use crate::store::{FileStore, LessonStore};

const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Result of one client action.
#[derive(Debug, Clone)]
pub struct ActionReport {
  pub rejection: Option<Rejection>,
  pub notices: Vec<Notice>,
  pub state: ViewSnapshot,
}

pub struct AppState {
  session: Mutex<Session>,
  generator: Arc<dyn ContentGenerator>,
  updates: broadcast::Sender<ServerWsMessage>,
  pub generator_name: &'static str,
}

impl AppState {
  /// Build state from settings: optional TOML overrides, file store, generator.
  #[instrument(level = "info", skip_all)]
  pub fn from_settings(settings: &Settings) -> Self {
    let cfg = load_file_config_from_env().unwrap_or_default();
    let file_store = FileStore::new(&settings.data_dir);
    info!(target: "assist_learning", data_dir = %file_store.dir().display(), "Using file store");
    let store: Arc<dyn LessonStore> = Arc::new(file_store);

    let (generator, name): (Arc<dyn ContentGenerator>, &'static str) = match &settings.gemini {
      Some(g) => match Gemini::new(g, cfg.prompts.clone()) {
        Ok(client) => {
          info!(target: "assist_learning", base_url = %client.base_url, model = %client.model, "Gemini enabled.");
          (Arc::new(client), "gemini")
        }
        Err(e) => {
          error!(target: "assist_learning", error = %e, "Failed to build Gemini client; generation disabled");
          (Arc::new(UnconfiguredGenerator), "unconfigured")
        }
      },
      None => {
        info!(target: "assist_learning", "Gemini disabled (no GEMINI_API_KEY). Uploads will fail until configured.");
        (Arc::new(UnconfiguredGenerator), "unconfigured")
      }
    };

    let mut state = Self::new(store, generator, cfg);
    state.generator_name = name;
    state
  }

  pub fn new(store: Arc<dyn LessonStore>, generator: Arc<dyn ContentGenerator>, cfg: FileConfig) -> Self {
    let repository = LessonRepository::load(store);
    let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
    Self {
      session: Mutex::new(Session::new(repository, cfg.messages)),
      generator,
      updates,
      generator_name: "custom",
    }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<ServerWsMessage> {
    self.updates.subscribe()
  }

  pub async fn snapshot(&self) -> ViewSnapshot {
    snapshot(&*self.session.lock().await)
  }

  /// Apply a navigation event and publish the outcome.
  #[instrument(level = "info", skip(self), fields(event = event.name()))]
  pub async fn apply(&self, event: Event) -> ActionReport {
    let mut session = self.session.lock().await;
    let rejection = session.apply(event).err();
    self.report(&mut session, rejection)
  }

  /// Start a generation round-trip. Validation happens synchronously; the
  /// generator call runs in a spawned task whose handle is returned.
  #[instrument(level = "info", skip(self, body), fields(title_len = body.title.len(), images = body.images.len()))]
  pub async fn submit_upload(self: &Arc<Self>, body: UploadIn) -> (ActionReport, Option<JoinHandle<()>>) {
    let mut session = self.session.lock().await;
    let request = match session.begin_upload(body.title, body.source_reference, body.images) {
      Ok(request) => request,
      Err(rejection) => return (self.report(&mut session, Some(rejection)), None),
    };
    let report = self.report(&mut session, None);
    drop(session);

    let this = Arc::clone(self);
    let handle = tokio::spawn(async move {
      let outcome = this.generator.generate(&request).await;
      let mut session = this.session.lock().await;
      match session.finish_upload(request, outcome) {
        Ok(id) => info!(target: "generation", %id, "Generation round-trip finished"),
        Err(e) => debug!(target: "generation", error = %e, "Generation round-trip failed"),
      }
      this.report(&mut session, None);
    });
    (report, Some(handle))
  }

  /// Drain notices, build a snapshot and push both to subscribers.
  fn report(&self, session: &mut Session, rejection: Option<Rejection>) -> ActionReport {
    let notices = session.take_notices();
    let state = snapshot(session);
    for notice in &notices {
      let _ = self.updates.send(ServerWsMessage::Notice { notice: notice.clone() });
    }
    if rejection.is_none() {
      // No receivers is fine: nobody is connected.
      let _ = self.updates.send(ServerWsMessage::State { state: state.clone() });
    }
    ActionReport { rejection, notices, state }
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::domain::Screen;
  use crate::generator::{GeneratedBundle, GeneratedExercise, GenerationError, GenerationRequest, GenerationResult};
  use crate::machine::NoticeCode;
  use crate::store::{MemoryStore, LESSONS_KEY};
  use async_trait::async_trait;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use tokio::sync::Notify;

  /// Generator returning a fixed outcome, optionally parked until released.
  pub(crate) struct ScriptedGenerator {
    pub fail: bool,
    pub calls: AtomicUsize,
    pub gate: Option<Arc<Notify>>,
  }

  impl ScriptedGenerator {
    pub(crate) fn ok() -> Self {
      Self { fail: false, calls: AtomicUsize::new(0), gate: None }
    }

    pub(crate) fn failing() -> Self {
      Self { fail: true, calls: AtomicUsize::new(0), gate: None }
    }
  }

  #[async_trait]
  impl ContentGenerator for ScriptedGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> GenerationResult<GeneratedBundle> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      if let Some(gate) = &self.gate {
        gate.notified().await;
      }
      if self.fail {
        return Err(GenerationError::Transport("boom".into()));
      }
      Ok(GeneratedBundle {
        summary: "要約".into(),
        key_points: vec!["a".into(), "b".into(), "c".into()],
        exercises: (1..=3)
          .map(|i| GeneratedExercise {
            question: format!("q{i}"),
            answer: format!("a{i}"),
            explanation: format!("e{i}"),
          })
          .collect(),
      })
    }
  }

  pub(crate) fn app_with(generator: Arc<ScriptedGenerator>, store: Arc<MemoryStore>) -> Arc<AppState> {
    Arc::new(AppState::new(store, generator, FileConfig::default()))
  }

  fn upload(title: &str, reference: &str) -> UploadIn {
    UploadIn { title: title.into(), source_reference: reference.into(), images: vec![] }
  }

  #[tokio::test]
  async fn upload_round_trip_creates_lesson() {
    let generator = Arc::new(ScriptedGenerator::ok());
    let app = app_with(generator.clone(), Arc::new(MemoryStore::new()));
    app.apply(Event::OpenUpload).await;

    let (report, handle) = app.submit_upload(upload("二次関数の基礎", "https://drive.google.com/x")).await;
    assert!(report.rejection.is_none());
    assert!(report.state.is_generating);
    handle.unwrap().await.unwrap();

    let snap = app.snapshot().await;
    assert!(!snap.is_generating);
    assert_eq!(snap.screen, Screen::List);
    assert_eq!(snap.lessons[0].title, "二次関数の基礎");
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn invalid_upload_never_calls_generator() {
    let generator = Arc::new(ScriptedGenerator::ok());
    let store = Arc::new(MemoryStore::new());
    let app = app_with(generator.clone(), store.clone());
    app.apply(Event::OpenUpload).await;

    let (report, handle) = app.submit_upload(upload("", "https://drive.google.com/x")).await;
    assert!(handle.is_none());
    assert_eq!(report.rejection, Some(Rejection::MissingUploadFields));
    assert_eq!(report.notices[0].code, NoticeCode::MissingUploadFields);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    assert!(store.get(LESSONS_KEY).unwrap().is_none());
  }

  #[tokio::test]
  async fn failure_keeps_upload_screen_and_pushes_notice() {
    let app = app_with(Arc::new(ScriptedGenerator::failing()), Arc::new(MemoryStore::new()));
    let mut updates = app.subscribe();
    app.apply(Event::OpenUpload).await;

    let (_, handle) = app.submit_upload(upload("t", "u")).await;
    handle.unwrap().await.unwrap();

    let snap = app.snapshot().await;
    assert_eq!(snap.screen, Screen::Upload);
    assert!(!snap.is_generating);
    assert!(snap.lessons.is_empty());

    let mut saw_failure = false;
    while let Ok(msg) = updates.try_recv() {
      if let ServerWsMessage::Notice { notice } = msg {
        saw_failure |= notice.code == NoticeCode::GenerationFailed;
      }
    }
    assert!(saw_failure);
  }

  #[tokio::test]
  async fn navigation_works_while_generating_and_second_submit_is_refused() {
    let gate = Arc::new(Notify::new());
    let generator = Arc::new(ScriptedGenerator { fail: false, calls: AtomicUsize::new(0), gate: Some(gate.clone()) });
    let app = app_with(generator.clone(), Arc::new(MemoryStore::new()));
    app.apply(Event::OpenUpload).await;

    let (_, handle) = app.submit_upload(upload("t", "u")).await;
    let (busy, none) = app.submit_upload(upload("t", "u")).await;
    assert!(none.is_none());
    assert_eq!(busy.rejection, Some(Rejection::Busy));

    let report = app.apply(Event::BackToHome).await;
    assert!(report.rejection.is_none());
    assert_eq!(report.state.screen, Screen::Home);
    assert!(report.state.is_generating);

    gate.notify_one();
    handle.unwrap().await.unwrap();
    let snap = app.snapshot().await;
    assert_eq!(snap.screen, Screen::List);
    assert_eq!(snap.lessons.len(), 1);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn lessons_survive_restart() {
    let store = Arc::new(MemoryStore::new());
    let app = app_with(Arc::new(ScriptedGenerator::ok()), store.clone());
    app.apply(Event::OpenUpload).await;
    let (_, handle) = app.submit_upload(upload("t", "u")).await;
    handle.unwrap().await.unwrap();
    let before = app.snapshot().await.lessons;

    let restarted = app_with(Arc::new(ScriptedGenerator::ok()), store);
    assert_eq!(restarted.snapshot().await.lessons, before);
  }
}
