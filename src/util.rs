//! Small utility helpers used across modules.

use chrono::{DateTime, Datelike, TimeZone};

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let head: String = s.chars().take(max).collect();
    format!("{}… ({} bytes total)", head, s.len())
  }
}

/// Payload part of an image string: `data:image/png;base64,AAAA` -> `AAAA`.
/// Plain base64 input is returned unchanged.
pub fn strip_data_url(image: &str) -> &str {
  match image.split_once(',') {
    Some((_, payload)) if !payload.is_empty() => payload,
    _ => image,
  }
}

/// Display date in the Japanese locale style, e.g. `2026/10/6`.
pub fn display_date<Tz: TimeZone>(at: &DateTime<Tz>) -> String {
  format!("{}/{}/{}", at.year(), at.month(), at.day())
}

/// True when the string has something besides whitespace.
pub fn is_filled(s: &str) -> bool {
  !s.trim().is_empty()
}
