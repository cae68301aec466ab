//! Prompting the local model and digging target parameters out of whatever it
//! answers. Models wrap JSON in prose or code fences often enough that the
//! parser tries three strategies before giving up.

use crate::types::{MoodTargetParams, TempoRange};
use serde::Deserialize;
use serde_json::Value;

pub const SYSTEM_PROMPT: &str = "You are a music mood analyst. \
You translate descriptions of feelings, situations and activities into audio feature targets. \
You answer with a single JSON object and nothing else.";

/// Instruction sent to the model, with the user's text embedded verbatim.
pub fn build_prompt(input: &str) -> String {
    format!(
        r#"Describe the music that fits this mood: "{input}"

Respond with a JSON object using exactly these fields:
{{
  "energy": number between 0 and 1,
  "valence": number between 0 and 1 (0 = sad, 1 = happy),
  "danceability": number between 0 and 1,
  "tempo": {{ "min": BPM, "max": BPM }},
  "acousticness": number between 0 and 1,
  "instrumentalness": number between 0 and 1
}}"#
    )
}

#[derive(Debug, Deserialize)]
struct RawTempo {
    min: f64,
    max: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawModelParams {
    energy: f64,
    valence: f64,
    danceability: f64,
    #[serde(alias = "tempoRange", alias = "tempo_range")]
    tempo: RawTempo,
    #[serde(default)]
    acousticness: Option<f64>,
    #[serde(default)]
    instrumentalness: Option<f64>,
}

/// Finds a JSON object in model output: whole text, fenced block, then the
/// first balanced `{...}` substring.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    if let Some(block) = fenced_block(trimmed) {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(block.trim()) {
            return Some(value);
        }
    }

    first_balanced_object(trimmed)
        .and_then(|candidate| serde_json::from_str::<Value>(candidate).ok())
        .filter(Value::is_object)
}

/// Parses model output into clamped target parameters, or `None` on any failure.
pub fn parse_model_params(text: &str) -> Option<MoodTargetParams> {
    let value = extract_json(text)?;
    let raw: RawModelParams = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(e) => {
            log::debug!("Model JSON has the wrong shape: {e}");
            return None;
        }
    };

    let params = MoodTargetParams {
        energy: raw.energy,
        valence: raw.valence,
        danceability: raw.danceability,
        tempo_range: TempoRange {
            min: raw.tempo.min,
            max: raw.tempo.max,
        },
        acousticness: raw.acousticness,
        instrumentalness: raw.instrumentalness,
    };
    Some(params.clamped())
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // skip an optional language tag such as `json`
    let body_start = after_fence.find('\n').map_or(0, |i| i + 1);
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0_usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}
