//! Turning provider completions into results

use log::{debug, trace};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{ProviderError, ProviderResult};

static FENCE_RE: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"(?i)```json|```").expect("fence pattern is valid")
});

/// Remove Markdown code-fence markers. Text without markers is
/// returned untouched.
pub fn strip_fences(text: &str) -> String
{   if !FENCE_RE.is_match(text)
    {   return text.to_string();
    }
    FENCE_RE.replace_all(text, "").trim().to_string()
}

/// Decode the completion text of one operation.
///
/// A missing completion is read as the operation's empty shape. A parse
/// failure keeps the text as the provider sent it.
pub fn decode_completion(
  completion: Option<String>
, kind: crate::OperationKind
) -> ProviderResult
{   let text = completion
      .unwrap_or_else(|| kind.empty_shape().to_string());
    let cleaned = strip_fences(&text);
    trace!("Decoding {:?} completion: {}", kind, cleaned);
    let value = match serde_json::from_str::<Value>(&cleaned)
    {   Ok(value) => value
      , Err(e) => {
          debug!("Completion is not JSON: {}", e);
          return Err(ProviderError::malformed(text));
        }
    };
    if !has_expected_shape(&value, kind)
    {   debug!("{:?} completion has the wrong top-level shape", kind);
        return Err(ProviderError::malformed(text));
    }
    Ok(value)
}

/// Questions come as an array or a `{"questions": [...]}` wrapper, every
/// other operation as an object. In-band error objects always pass so
/// `classify` can report them.
pub fn has_expected_shape(value: &Value, kind: crate::OperationKind) -> bool
{   if is_error_flagged(value)
    {   return true;
    }
    match kind
    {   crate::OperationKind::Questions => {
          value.is_array()
            || value.get("questions").map_or(false, Value::is_array)
        }
      , _ => value.is_object()
    }
}

fn is_error_flagged(value: &Value) -> bool
{   value
      .as_object()
      .and_then(|map| map.get("error"))
      .map(|flag| flag == &Value::Bool(true))
      .unwrap_or(false)
}

/// Classify an already decoded value. An object with `"error": true`
/// is the provider reporting its own failure in-band.
pub fn classify(value: Value) -> ProviderResult
{   if !is_error_flagged(&value)
    {   return Ok(value);
    }

    let message = value
      .get("message")
      .and_then(Value::as_str)
      .unwrap_or("provider reported an error")
      .to_string();
    debug!("In-band error payload: {}", message);
    Err(ProviderError::application(message, value))
}

/// Apply in-band classification on top of a client's own result.
pub fn normalize(result: ProviderResult) -> ProviderResult
{   result.and_then(classify)
}
