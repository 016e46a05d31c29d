//! Runtime configuration: environment settings plus an optional TOML file
//! (prompt template + notice messages).
//!
//! See `FileConfig`, `Prompts` and `Messages` for the expected TOML schema:
//!
//! ```toml
//! [prompts]
//! generation_template = "... {title} ... {source_reference} ..."
//!
//! [messages]
//! generation_failed = "..."
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info};

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:3000";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-flash-preview";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("Invalid value for the environment variable {0}: {1}")]
  InvalidValue(String, String),
}

/// Process settings read from the environment.
#[derive(Clone, Debug)]
pub struct Settings {
  pub bind_address: SocketAddr,
  pub data_dir: PathBuf,
  pub gemini: Option<GeminiSettings>,
}

#[derive(Clone, Debug)]
pub struct GeminiSettings {
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub timeout_secs: u64,
}

impl Settings {
  pub fn from_env() -> Result<Self, ConfigError> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  /// Same as `from_env`, with the variable source injected.
  pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let bind_address = match (lookup("BIND_ADDRESS"), lookup("PORT")) {
      (Some(addr), _) => addr
        .parse::<SocketAddr>()
        .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".into(), e.to_string()))?,
      (None, Some(port)) => {
        let port = port
          .parse::<u16>()
          .map_err(|e| ConfigError::InvalidValue("PORT".into(), e.to_string()))?;
        SocketAddr::from(([127, 0, 0, 1], port))
      }
      (None, None) => DEFAULT_BIND_ADDRESS
        .parse()
        .map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue("BIND_ADDRESS".into(), e.to_string()))?,
    };

    let data_dir = lookup("DATA_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("./data"));

    let gemini = match lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty()) {
      Some(api_key) => {
        let timeout_secs = match lookup("GEMINI_TIMEOUT_SECS") {
          Some(v) => v
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue("GEMINI_TIMEOUT_SECS".into(), e.to_string()))?,
          None => 120,
        };
        Some(GeminiSettings {
          api_key,
          base_url: lookup("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.into()),
          model: lookup("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.into()),
          timeout_secs,
        })
      }
      None => None,
    };

    Ok(Self { bind_address, data_dir, gemini })
  }
}

/// Optional TOML overrides.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct FileConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub messages: Messages,
}

/// Prompt sent to the content generator. `{title}` and `{source_reference}` are filled in.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub generation_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      generation_template: r#"以下の授業資料をもとに、授業内容を自動で文字起こし・解析し、休んだ生徒が内容を理解できるように情報を整理してください。

【授業タイトル】
{title}

【提供されたGoogle Drive資料URL】
{source_reference}

【画像データ】
（添付された黒板やスライドの画像も解析に含めてください）

以下の手順で処理してください：
1. URL先のドキュメントまたは動画の内容を推論・解析し、重要な発言や説明を抽出する。
2. 画像内の文字や図表を読み取り、テキスト情報と統合する。
3. 以下のJSON形式で出力する：

- summary: 中高生向けに噛み砕いた、授業全体のわかりやすい要約（200〜400文字程度）。
- keyPoints: 重要なポイントを3〜5つの箇条書き形式。
- exercises: 授業内容の理解を確認するための例題を3問。
  - question: 問題文。
  - answer: 正解（単語や短い文章）。
  - explanation: なぜその答えになるのか、丁寧な解説。"#
        .into(),
    }
  }
}

/// User-visible notice texts.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Messages {
  pub missing_upload_fields: String,
  pub generation_busy: String,
  pub generation_failed: String,
  pub lesson_created: String,
  pub no_exercises: String,
}

impl Default for Messages {
  fn default() -> Self {
    Self {
      missing_upload_fields: "タイトルと、Google DriveのURLを入力してください。".into(),
      generation_busy: "URLを読み込んでいます。そのまま少しお待ちください。".into(),
      generation_failed: "AIによる解析に失敗しました。正しいURLかどうか確認し、もう一度試してください。".into(),
      lesson_created: "授業を保存しました。".into(),
      no_exercises: "この授業には例題がありません。".into(),
    }
  }
}

/// Attempt to load `FileConfig` from ASSIST_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_file_config_from_env() -> Option<FileConfig> {
  let path = std::env::var("ASSIST_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<FileConfig>(&s) {
      Ok(cfg) => {
        info!(target: "assist_learning", %path, "Loaded config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "assist_learning", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "assist_learning", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
