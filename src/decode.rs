//! Payload normalization for the utility's loosely structured responses.
//!
//! The server replies with whatever its ASP.NET handlers feel like on a given
//! day: a bare JSON array, an object wrapping a JSON-encoded string, an HTML
//! error page with HTTP 200, or an array buried in surrounding noise. All of
//! that funnels through [`parse_record_array`].

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{Datelike, NaiveDate};
use log::warn;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::error::Error;
use std::fmt::{self, Display, Formatter};

/// Nested `Data` strings are unwrapped at most this many times. The server
/// has only ever been seen to nest once.
const MAX_UNWRAP_DEPTH: usize = 4;

const SNIPPET_CHARS: usize = 80;

#[derive(Debug)]
pub enum DecodeError {
    /// The body located an array but it failed to parse as JSON.
    Json {
        context: &'static str,
        source: serde_json::Error,
    },
    /// No recognizable array anywhere in the body.
    Unexpected { context: &'static str, snippet: String },
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Json { context, source } => write!(f, "invalid {} payload: {}", context, source),
            DecodeError::Unexpected { context, snippet } => {
                write!(f, "unexpected {} payload: {}", context, snippet)
            }
        }
    }
}

impl Error for DecodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DecodeError::Json { source, .. } => Some(source),
            DecodeError::Unexpected { .. } => None,
        }
    }
}

fn snippet_of(text: &str) -> String {
    text.chars().take(SNIPPET_CHARS).collect()
}

/// Extract a list of records from a raw response body.
///
/// Handling, in priority order:
/// 1. empty/whitespace body → empty list
/// 2. leading `<` → HTML error page, logged and treated as empty
/// 3. JSON object → unwrap its `Data` string and start over (bounded depth)
/// 4. JSON array → parse directly
/// 5. first `[` to last `]` substring → parse that
/// 6. otherwise an error carrying a truncated snippet for diagnostics
pub fn parse_record_array<T: DeserializeOwned>(text: &str, context: &'static str) -> Result<Vec<T>, DecodeError> {
    let mut current = text.to_owned();

    for _ in 0..MAX_UNWRAP_DEPTH {
        let cleaned = current.trim_start_matches('\u{feff}').trim();
        if cleaned.is_empty() {
            return Ok(Vec::new());
        }

        if cleaned.starts_with('<') {
            warn!("Received HTML response for {} payload", context);
            return Ok(Vec::new());
        }

        if cleaned.starts_with('{') && cleaned.ends_with('}') {
            // A malformed object-looking body falls through to the bracket
            // scan below, same as any other noise.
            if let Ok(Value::Object(mut map)) = serde_json::from_str::<Value>(cleaned) {
                match map.remove("Data") {
                    Some(Value::String(nested)) => {
                        current = nested;
                        continue;
                    }
                    _ => return Ok(Vec::new()),
                }
            }
        }

        if cleaned.starts_with('[') && cleaned.ends_with(']') {
            return serde_json::from_str(cleaned).map_err(|e| DecodeError::Json { context, source: e });
        }

        // Tolerate leading/trailing noise around the array.
        if let (Some(start), Some(end)) = (cleaned.find('['), cleaned.rfind(']'))
            && end > start
        {
            return serde_json::from_str(&cleaned[start..=end]).map_err(|e| DecodeError::Json { context, source: e });
        }

        return Err(DecodeError::Unexpected {
            context,
            snippet: snippet_of(cleaned),
        });
    }

    Err(DecodeError::Unexpected {
        context,
        snippet: format!("payload nested deeper than {} levels", MAX_UNWRAP_DEPTH),
    })
}

/// Compute the `YYYYMM` tags spanning the 12 most recent calendar months,
/// ending at the current month. Pure; exact across year boundaries.
pub fn month_range(today: NaiveDate) -> (String, String) {
    let end = format!("{}{:02}", today.year(), today.month());

    let mut year = today.year();
    let mut month = today.month();
    for _ in 0..11 {
        if month == 1 {
            month = 12;
            year -= 1;
        } else {
            month -= 1;
        }
    }
    let start = format!("{}{:02}", year, month);
    (start, end)
}

/// Return the raw APID and its base64 form.
///
/// Users paste the token straight out of the portal URL, which hands it out
/// base64-encoded; older portal pages used the raw form. Accept either: if
/// the input base64-decodes to non-empty UTF-8 that is the raw token,
/// otherwise the input itself is.
pub fn derive_apid_pair(input: &str) -> (String, String) {
    let trimmed = input.trim();
    let raw = base64_to_utf8(trimmed).unwrap_or_else(|| trimmed.to_string());
    let encoded = BASE64.encode(raw.as_bytes());
    (raw, encoded)
}

fn base64_to_utf8(input: &str) -> Option<String> {
    if input.is_empty() {
        return None;
    }
    let padded = format!("{}{}", input, "=".repeat((4 - input.len() % 4) % 4));
    let decoded = BASE64.decode(padded).ok()?;
    let raw = String::from_utf8(decoded).ok()?;
    if raw.is_empty() { None } else { Some(raw) }
}
