//! Key-value persistence surface for the lesson collection.
//!
//! Values are opaque strings; the repository decides the encoding. `FileStore`
//! keeps one `<key>.json` file per key under the data directory, `MemoryStore`
//! backs tests.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, instrument};

/// Fixed key identifying the lesson collection.
pub const LESSONS_KEY: &str = "assist_learning_lessons";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("store I/O error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("store lock poisoned")]
  Poisoned,
}

pub trait LessonStore: Send + Sync {
  /// Stored value for `key`, or `None` when nothing was written yet.
  fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
  /// Replace the value for `key` in full.
  fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Run blocking file I/O. On a multi-threaded runtime the worker hands its
/// other tasks off first; elsewhere the closure just runs.
fn blocking_io<T>(f: impl FnOnce() -> T) -> T {
  match Handle::try_current() {
    Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => tokio::task::block_in_place(f),
    _ => f(),
  }
}

#[derive(Debug, Clone)]
pub struct FileStore {
  dir: PathBuf,
}

impl FileStore {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  fn path_for(&self, key: &str) -> PathBuf {
    self.dir.join(format!("{key}.json"))
  }

  fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
    fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io { path: self.dir.clone(), source })?;
    let path = self.path_for(key);
    // Write next to the target and rename so a crash never leaves half a file.
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, value).map_err(|source| StoreError::Io { path: tmp.clone(), source })?;
    fs::rename(&tmp, &path).map_err(|source| StoreError::Io { path, source })?;
    Ok(())
  }
}

impl LessonStore for FileStore {
  #[instrument(level = "debug", skip(self))]
  fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    let path = self.path_for(key);
    match fs::read_to_string(&path) {
      Ok(s) => Ok(Some(s)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        debug!(target: "lesson", path = %path.display(), "No stored value yet");
        Ok(None)
      }
      Err(source) => Err(StoreError::Io { path, source }),
    }
  }

  #[instrument(level = "debug", skip(self, value), fields(bytes = value.len()))]
  fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
    blocking_io(|| self.write(key, value))
  }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
  values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Store pre-populated with a single value.
  pub fn with_value(key: &str, value: impl Into<String>) -> Self {
    let values = HashMap::from([(key.to_string(), value.into())]);
    Self { values: Mutex::new(values) }
  }
}

impl LessonStore for MemoryStore {
  fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    let values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
    Ok(values.get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
    let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
    values.insert(key.to_string(), value.to_string());
    Ok(())
  }
}
