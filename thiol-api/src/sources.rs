use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::types::{Source, SourceMetadata};

const REQUIRED_FIELDS: [&str; 4] = ["document", "page", "paragraph", "text"];

/// Why a raw source record was left out of the rendered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotAnObject,
    MissingField(&'static str),
    NotANumber(&'static str),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotAnObject => write!(f, "not an object"),
            SkipReason::MissingField(field) => write!(f, "missing field `{}`", field),
            SkipReason::NotANumber(field) => write!(f, "field `{}` is not a number", field),
        }
    }
}

/// Result of validating one raw source record.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedSource {
    Source(Source),
    Skipped(SkipReason),
}

/// Normalizes a raw `sources` payload into a renderable, ordered list.
///
/// Never fails: anything that is not an array yields an empty list, and
/// individual records that do not validate are dropped.
pub fn normalize_sources(raw: &Value) -> Vec<Source> {
    normalize_sources_at(raw, Utc::now())
}

/// Same as [`normalize_sources`], with an explicit clock for metadata defaults.
pub fn normalize_sources_at(raw: &Value, now: DateTime<Utc>) -> Vec<Source> {
    let Some(items) = raw.as_array() else {
        if !raw.is_null() {
            debug!("Ignoring non-array sources payload");
        }
        return Vec::new();
    };

    let mut sources: Vec<Source> = items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match parse_source(item, now) {
            ParsedSource::Source(source) => Some(source),
            ParsedSource::Skipped(reason) => {
                warn!(index, %reason, "Skipping source record");
                None
            }
        })
        .collect();

    sources.sort_by(|a, b| {
        a.document
            .cmp(&b.document)
            .then(a.page.total_cmp(&b.page))
    });
    sources
}

/// Validates and coerces a single source record.
pub fn parse_source(raw: &Value, now: DateTime<Utc>) -> ParsedSource {
    let Some(obj) = raw.as_object() else {
        return ParsedSource::Skipped(SkipReason::NotAnObject);
    };

    // A null value counts as absent.
    if let Some(field) = REQUIRED_FIELDS
        .iter()
        .find(|field| obj.get(**field).is_none_or(Value::is_null))
    {
        return ParsedSource::Skipped(SkipReason::MissingField(field));
    }

    let Some(page) = coerce_number(&obj["page"]) else {
        return ParsedSource::Skipped(SkipReason::NotANumber("page"));
    };
    let Some(paragraph) = coerce_number(&obj["paragraph"]) else {
        return ParsedSource::Skipped(SkipReason::NotANumber("paragraph"));
    };

    let metadata = obj
        .get("metadata")
        .and_then(Value::as_object)
        .map(|meta| parse_metadata(meta, now))
        .unwrap_or_else(|| SourceMetadata::fallback(now));

    ParsedSource::Source(Source {
        document: coerce_text(&obj["document"]),
        page,
        paragraph,
        text: coerce_text(&obj["text"]).trim().to_string(),
        metadata,
    })
}

fn parse_metadata(meta: &Map<String, Value>, now: DateTime<Utc>) -> SourceMetadata {
    let fallback = SourceMetadata::fallback(now);

    let size = meta
        .get("size")
        .and_then(coerce_number)
        .filter(|n| *n >= 0.0)
        .map(|n| n as u64)
        .unwrap_or(fallback.size);

    let last_modified = ["last_modified", "lastModified"]
        .iter()
        .find_map(|key| meta.get(*key))
        .and_then(Value::as_str)
        .and_then(parse_timestamp)
        .unwrap_or(fallback.last_modified);

    let file_type = ["file_type", "fileType"]
        .iter()
        .find_map(|key| meta.get(*key))
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.trim().to_string())
        .unwrap_or(fallback.file_type);

    SourceMetadata {
        size,
        last_modified,
        file_type,
    }
}

/// Numbers pass through; numeric strings are parsed. Non-finite results are rejected.
fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn coerce_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Parses RFC 3339 timestamps, and naive ISO timestamps as UTC.
pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}
