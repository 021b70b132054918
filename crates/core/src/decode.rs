//! Wire payload decoding
//!
//! Payloads arrive in one of two formats:
//! - a JSON object: `{"event": "...", "path"|"from": "...", "to": "...",
//!   "time": "...", "size": ...}`
//! - the legacy pipe format: `type|path[|target]`, 2–3 fields, no metadata
//!
//! Decoding never fails the caller: malformed, out-of-scope, or
//! unknown-kind payloads yield `None` and a diagnostic on the sink.

use crate::change::{Change, ChangeKind};
use crate::template::PathTemplate;
use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use std::sync::Arc;

/// Callback receiving human-readable decode anomaly messages
///
/// Invoked only when a payload is dropped, never on the hot success path.
pub type DiagnosticSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Decodes raw queue payloads into changes
pub struct EventDecoder {
    base_path: String,
    template: PathTemplate,
    diag: DiagnosticSink,
}

impl EventDecoder {
    /// Build a decoder for one base path and template
    ///
    /// Trailing separators on `base_path` are dropped so the prefix check
    /// lines up with incoming absolute paths.
    pub fn new(base_path: &str, template: PathTemplate, diag: DiagnosticSink) -> Self {
        Self {
            base_path: base_path.trim_end_matches('/').to_string(),
            template,
            diag,
        }
    }

    /// Decode one raw payload into zero or one change
    pub fn decode(&self, raw: &str) -> Option<Change> {
        let Some(event) = RawEvent::parse(raw) else {
            (self.diag)(&format!("malformed event: '{raw}'"));
            return None;
        };

        let path = match self.template.resolve(&event.path, &self.base_path) {
            Ok(path) => path,
            Err(err) => {
                (self.diag)(&err.to_string());
                return None;
            }
        };

        match event.kind.as_str() {
            "write" | "modify" => {
                Some(Change::new(ChangeKind::Modified, path).with_meta(event.time, event.size))
            }
            "remove" | "delete" => {
                Some(Change::new(ChangeKind::Removed, path).with_meta(event.time, event.size))
            }
            "rename" | "move" => {
                let Some(target) = event.target.as_deref() else {
                    (self.diag)(&format!("malformed event: '{raw}'"));
                    return None;
                };
                match self.template.resolve(target, &self.base_path) {
                    Ok(target) => Some(Change::renamed(path, target, event.time)),
                    Err(err) => {
                        (self.diag)(&err.to_string());
                        None
                    }
                }
            }
            other => {
                (self.diag)(&format!("invalid event type {other}"));
                None
            }
        }
    }
}

/// Fields pulled off the wire before any path remapping
struct RawEvent {
    kind: String,
    path: String,
    target: Option<String>,
    time: Option<DateTime<FixedOffset>>,
    size: Option<u64>,
}

impl RawEvent {
    fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(fields)) => Self::from_json(&fields),
            _ => Self::from_legacy(raw),
        }
    }

    /// JSON object form; `from`/`to` take precedence over `path` for moves
    fn from_json(fields: &serde_json::Map<String, Value>) -> Option<Self> {
        let kind = fields.get("event")?.as_str()?.to_string();
        let path = fields
            .get("from")
            .or_else(|| fields.get("path"))?
            .as_str()?
            .to_string();
        let target = fields
            .get("to")
            .and_then(Value::as_str)
            .map(str::to_string);
        let time = fields
            .get("time")
            .and_then(Value::as_str)
            .and_then(parse_event_time);
        let size = fields.get("size").and_then(coerce_size);

        Some(Self {
            kind,
            path,
            target,
            time,
            size,
        })
    }

    /// Legacy `type|path[|target]` form, no metadata
    fn from_legacy(raw: &str) -> Option<Self> {
        let parts: Vec<&str> = raw.split('|').collect();
        if !(2..=3).contains(&parts.len()) {
            return None;
        }

        Some(Self {
            kind: parts[0].to_string(),
            path: parts[1].to_string(),
            target: parts.get(2).map(|s| s.to_string()),
            time: None,
            size: None,
        })
    }
}

/// Parse a producer timestamp, tolerating `±hhmm` as well as `±hh:mm` offsets
///
/// A timestamp that fails to parse degrades to absent rather than dropping
/// the whole event.
fn parse_event_time(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z"))
        .ok()
}

/// Accept integer sizes as JSON numbers or numeric strings
fn coerce_size(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}
