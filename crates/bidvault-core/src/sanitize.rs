//! Recovery of a strictly typed question/answer list from a noisy reply.
//!
//! Generation services do not reliably honour "output only JSON": replies
//! arrive wrapped in prose or markdown fences. The sanitizer slices from the
//! first `[` to the last `]`, parses that as JSON and validates every element
//! before accepting the list. Nothing partial is ever returned.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::QaPair;

/// Extract the ordered QA list from a raw reply.
///
/// # Errors
///
/// - [`Error::EmptyResponse`] if the reply is blank.
/// - [`Error::MalformedResponse`] if the recovered text is not JSON, is not
///   an array, or any element lacks a string `question` or `answer`.
pub fn sanitize_reply(raw: &str) -> Result<Vec<QaPair>> {
    if raw.trim().is_empty() {
        return Err(Error::EmptyResponse);
    }

    let candidate = match bracket_slice(raw) {
        Some(slice) => slice,
        None => {
            tracing::warn!("JSON brackets not found in reply, attempting raw parse");
            raw
        }
    };

    let parsed: Value = serde_json::from_str(candidate).map_err(|e| {
        tracing::warn!(reply_chars = raw.len(), "reply is not valid JSON");
        Error::MalformedResponse(e.to_string())
    })?;

    let items = match parsed {
        Value::Array(items) => items,
        other => {
            return Err(Error::MalformedResponse(format!(
                "expected an array, got {}",
                json_kind(&other)
            )))
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| to_pair(i, item))
        .collect()
}

/// The text between the first `[` and the last `]`, inclusive.
fn bracket_slice(raw: &str) -> Option<&str> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

fn to_pair(index: usize, item: &Value) -> Result<QaPair> {
    let obj = item.as_object().ok_or_else(|| {
        Error::MalformedResponse(format!(
            "element {} is {}, expected an object",
            index,
            json_kind(item)
        ))
    })?;
    let field = |name: &str| -> Result<String> {
        obj.get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::MalformedResponse(format!(
                    "element {} is missing string field '{}'",
                    index, name
                ))
            })
    };
    Ok(QaPair {
        question: field("question")?,
        answer: field("answer")?,
    })
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
