use serde::de::DeserializeOwned;

use crate::error::GenerationError;

/// Decodes model output that is supposed to be a single JSON object.
///
/// The whole text is tried first; failing that, the span from the first `{`
/// to the last `}` is decoded, which recovers prose- or fence-wrapped output.
pub fn decode_lenient<T: DeserializeOwned>(
    text: &str,
    what: &'static str,
) -> Result<T, GenerationError> {
    let direct = match serde_json::from_str(text.trim()) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    let Some(span) = extract_json_object(text) else {
        return Err(GenerationError::Parse {
            what,
            source: Some(direct),
        });
    };

    serde_json::from_str(span).map_err(|err| {
        tracing::debug!(what, error = %err, "brace-delimited json span did not decode");
        GenerationError::Parse {
            what,
            source: Some(err),
        }
    })
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}
