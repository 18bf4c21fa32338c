//! # Generation Metadata
//!
//! WebUI writes the generation parameters of an image as plain text:
//!
//! ```text
//! 1girl, solo, cat ears
//! Negative prompt: lowres, bad anatomy
//! Steps: 20, Sampler: Euler a, CFG scale: 7, Seed: 42, Size: 512x768, Lora hashes: "a: 1f2e, b: 3c4d"
//! ```
//!
//! [`WebuiParametersParser`] splits that into the prompt, the negative prompt and a
//! key/value map. The last line only counts as the parameter line when it holds at
//! least three `Key: value` pairs; otherwise it belongs to the prompt. Values may be
//! double-quoted to carry commas.
//!
//! Value typing: integers and finite floats become JSON numbers, `Size: WxH`
//! becomes `[W, H]`, and everything else stays a string.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

const NEGATIVE_PREFIX: &str = "Negative prompt:";
const MIN_PARAMS_ON_LAST_LINE: usize = 3;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedMeta {
    pub prompt: Option<String>,
    pub neg_prompt: Option<String>,
    pub parameters: BTreeMap<String, Value>,
}

pub trait MetadataParser: Send + Sync {
    fn parse(&self, text: &str) -> ParsedMeta;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WebuiParametersParser;

impl MetadataParser for WebuiParametersParser {
    fn parse(&self, text: &str) -> ParsedMeta {
        let mut lines: Vec<&str> = text.trim().lines().collect();
        let mut parameters = BTreeMap::new();

        if let Some(last) = lines.last() {
            let pairs = split_param_line(last);
            if pairs.len() >= MIN_PARAMS_ON_LAST_LINE {
                for (key, raw, quoted) in pairs {
                    parameters.insert(key.clone(), typed_value(&key, raw, quoted));
                }
                lines.pop();
            }
        }

        let mut prompt = Vec::new();
        let mut negative = Vec::new();
        let mut in_negative = false;
        for line in lines {
            if let Some(rest) = line.strip_prefix(NEGATIVE_PREFIX) {
                in_negative = true;
                negative.push(rest.trim());
            } else if in_negative {
                negative.push(line);
            } else {
                prompt.push(line);
            }
        }

        ParsedMeta {
            prompt: non_empty(prompt.join("\n")),
            neg_prompt: non_empty(negative.join("\n")),
            parameters,
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// One `Key: value` pair; the value is either a double-quoted string with
/// backslash escapes or runs to the next comma.
static PARAM_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\s*([\w ]+):\s*("(?:\\.|[^\\"])+"|[^,]*)(?:,|$)"#)
        .expect("failed to build regex")
});

/// Splits `Key: value, Key: "quoted, value"` into `(key, raw value, was quoted)`.
/// Segments that do not look like a pair are skipped.
fn split_param_line(line: &str) -> Vec<(String, String, bool)> {
    PARAM_PAIR
        .captures_iter(line)
        .map(|caps| {
            let key = caps[1].trim().to_string();
            let value = caps[2].trim();
            if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
                let unquoted = serde_json::from_str::<String>(value)
                    .unwrap_or_else(|_| value.trim_matches('"').to_string());
                (key, unquoted, true)
            } else {
                (key, value.to_string(), false)
            }
        })
        .collect()
}

fn typed_value(key: &str, raw: String, quoted: bool) -> Value {
    if quoted {
        return Value::String(raw);
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }
    if key == "Size" {
        if let Some((w, h)) = raw.split_once('x') {
            if let (Ok(w), Ok(h)) = (w.trim().parse::<u32>(), h.trim().parse::<u32>()) {
                return Value::Array(vec![Value::from(w), Value::from(h)]);
            }
        }
    }
    Value::String(raw)
}
