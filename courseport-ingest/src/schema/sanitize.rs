//! Field sanitization and coercion
//!
//! `sanitize_field` turns one raw cell into a typed value, or `None` when
//! the cell is empty or unusable. Lossy coercions produce a warning rather
//! than an error; the entity model queues warnings per row so they can be
//! attributed to the entity once its internal id is known.

use super::{FieldKind, FieldRule};
use ammonia::Builder;
use courseport_common::slug::slugify;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Typed value produced by sanitization
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            FieldValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// True for text values that are empty after trimming
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// String form used for key/value metadata storage
    pub fn storage_string(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Int(i) => i.to_string(),
            FieldValue::Float(f) => f.to_string(),
            FieldValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        }
    }
}

/// Result of sanitizing one cell
#[derive(Debug)]
pub struct Sanitized {
    pub value: Option<FieldValue>,
    pub warning: Option<String>,
    /// Set when a configured pattern rejected the value
    pub pattern_failed: bool,
}

impl Sanitized {
    fn value(value: FieldValue) -> Self {
        Self {
            value: Some(value),
            warning: None,
            pattern_failed: false,
        }
    }

    fn empty() -> Self {
        Self {
            value: None,
            warning: None,
            pattern_failed: false,
        }
    }

    fn warned(value: Option<FieldValue>, warning: String) -> Self {
        Self {
            value,
            warning: Some(warning),
            pattern_failed: false,
        }
    }
}

static STRIP_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

static EMAIL_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"));

static INT_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?[0-9]+").expect("valid regex"));

static FLOAT_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?[0-9]*\.?[0-9]+").expect("valid regex"));

/// Embed-safe HTML cleaner for video fields: the default allowlist plus
/// iframe and media elements
static VIDEO_CLEANER: Lazy<Builder<'static>> = Lazy::new(|| {
    let mut builder = Builder::default();
    builder.add_tags(["iframe", "video", "audio", "source", "embed"]);
    builder.add_tag_attributes(
        "iframe",
        [
            "src",
            "width",
            "height",
            "frameborder",
            "allow",
            "allowfullscreen",
            "title",
        ],
    );
    builder.add_tag_attributes("video", ["src", "width", "height", "controls", "poster"]);
    builder.add_tag_attributes("audio", ["src", "controls", "preload"]);
    builder.add_tag_attributes("source", ["src", "type"]);
    builder.add_tag_attributes("embed", ["src", "type", "width", "height"]);
    builder
});

/// Sanitize one raw cell against its field rule
///
/// Custom validators are not applied here; the entity model runs them
/// against effective values as part of row validation.
pub fn sanitize_field(raw: &str, rule: &FieldRule) -> Sanitized {
    let sanitized = sanitize_kind(raw, rule);

    // Pattern check applies to whatever text the type-level sanitizer kept
    if let (Some(pattern), Some(FieldValue::Text(text))) = (&rule.pattern, &sanitized.value) {
        if !text.is_empty() && !pattern.is_match(text) {
            return Sanitized {
                value: None,
                warning: Some(format!(
                    "\"{}\" does not match the expected format for \"{}\"",
                    raw, rule.name
                )),
                pattern_failed: true,
            };
        }
    }

    sanitized
}

fn sanitize_kind(raw: &str, rule: &FieldRule) -> Sanitized {
    let trimmed = raw.trim();

    match rule.kind {
        FieldKind::Int => {
            if trimmed.is_empty() {
                return Sanitized::empty();
            }
            match trimmed.parse::<i64>() {
                Ok(i) => Sanitized::value(FieldValue::Int(i)),
                Err(_) => {
                    let cast = lenient_int(trimmed);
                    Sanitized::warned(
                        Some(FieldValue::Int(cast)),
                        format!("\"{}\" is not a whole number; imported as {}", raw, cast),
                    )
                }
            }
        }
        FieldKind::Float => {
            if trimmed.is_empty() {
                return Sanitized::empty();
            }
            match trimmed.parse::<f64>() {
                Ok(f) => Sanitized::value(FieldValue::Float(f)),
                Err(_) => {
                    let cast = lenient_float(trimmed);
                    Sanitized::warned(
                        Some(FieldValue::Float(cast)),
                        format!("\"{}\" is not numeric; imported as {}", raw, cast),
                    )
                }
            }
        }
        FieldKind::Bool => match trimmed {
            "1" | "true" => Sanitized::value(FieldValue::Bool(true)),
            "0" | "false" => Sanitized::value(FieldValue::Bool(false)),
            "" => {
                if rule.required {
                    Sanitized::warned(None, format!("\"{}\" is required but empty", rule.name))
                } else {
                    Sanitized::empty()
                }
            }
            other => Sanitized::warned(
                None,
                format!(
                    "\"{}\" is not a recognized boolean for \"{}\" (use 0, 1, true or false)",
                    other, rule.name
                ),
            ),
        },
        FieldKind::Slug => {
            if trimmed.is_empty() {
                return Sanitized::empty();
            }
            let slug = slugify(trimmed);
            if slug.is_empty() {
                Sanitized::warned(
                    None,
                    format!("\"{}\" contains no usable characters for a slug", raw),
                )
            } else if slug != trimmed {
                Sanitized::warned(
                    Some(FieldValue::Text(slug.clone())),
                    format!("\"{}\" contained disallowed characters; imported as \"{}\"", raw, slug),
                )
            } else {
                Sanitized::value(FieldValue::Text(slug))
            }
        }
        FieldKind::Email => {
            if trimmed.is_empty() {
                return Sanitized::empty();
            }
            let stripped: String = trimmed
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || "@.!#$%&'*+/=?^_`{|}~-".contains(*c))
                .collect();
            if EMAIL_SHAPE.is_match(&stripped) {
                if stripped != trimmed {
                    Sanitized::warned(
                        Some(FieldValue::Text(stripped.clone())),
                        format!("\"{}\" contained invalid characters; imported as \"{}\"", raw, stripped),
                    )
                } else {
                    Sanitized::value(FieldValue::Text(stripped))
                }
            } else {
                Sanitized::warned(None, format!("\"{}\" is not a valid email address", raw))
            }
        }
        FieldKind::UrlOrFile => {
            if trimmed.is_empty() {
                return Sanitized::empty();
            }
            if let Ok(parsed) = Url::parse(trimmed) {
                if matches!(parsed.scheme(), "http" | "https") {
                    return Sanitized::value(FieldValue::Text(parsed.to_string()));
                }
            }
            let filename = sanitize_filename(trimmed);
            if filename.is_empty() {
                Sanitized::warned(
                    None,
                    format!("\"{}\" is neither a URL nor a usable filename", raw),
                )
            } else if filename != trimmed {
                Sanitized::warned(
                    Some(FieldValue::Text(filename.clone())),
                    format!("\"{}\" sanitized to filename \"{}\"", raw, filename),
                )
            } else {
                Sanitized::value(FieldValue::Text(filename))
            }
        }
        FieldKind::Username => {
            if trimmed.is_empty() {
                return Sanitized::empty();
            }
            let cleaned: String = trimmed
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || " _.-@".contains(*c))
                .collect();
            let cleaned = cleaned.trim().to_string();
            if cleaned.is_empty() {
                Sanitized::warned(None, format!("\"{}\" is not a usable login name", raw))
            } else if cleaned != trimmed {
                Sanitized::warned(
                    Some(FieldValue::Text(cleaned.clone())),
                    format!("\"{}\" contained invalid characters; imported as \"{}\"", raw, cleaned),
                )
            } else {
                Sanitized::value(FieldValue::Text(cleaned))
            }
        }
        FieldKind::Video => {
            if trimmed.is_empty() {
                return Sanitized::empty();
            }
            let cleaned = VIDEO_CLEANER.clean(trimmed).to_string();
            Sanitized::value(FieldValue::Text(cleaned))
        }
        FieldKind::Html => {
            if trimmed.is_empty() {
                return Sanitized::value(FieldValue::Text(String::new()));
            }
            Sanitized::value(FieldValue::Text(ammonia::clean(trimmed)))
        }
        FieldKind::Text => {
            let cleaned = STRIP_TAGS.replace_all(trimmed, "").trim().to_string();
            Sanitized::value(FieldValue::Text(cleaned))
        }
    }
}

/// Best-effort integer cast for non-integral input
fn lenient_int(input: &str) -> i64 {
    if let Ok(f) = input.parse::<f64>() {
        return f.trunc() as i64;
    }
    INT_PREFIX
        .find(input)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

fn lenient_float(input: &str) -> f64 {
    FLOAT_PREFIX
        .find(input)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0.0)
}

/// Keep only the final path component with safe characters
fn sanitize_filename(input: &str) -> String {
    let name = input
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(input);
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || "._-".contains(*c))
        .collect()
}
