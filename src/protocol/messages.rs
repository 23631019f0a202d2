//! Message types published and received on component topics
//!
//! Retained documents (`metadata`, `status`, `state`, `cfg`) are JSON objects.
//! Commands arrive as [`CommandPayload`]s and every one of them is answered by
//! exactly one [`ResultEnvelope`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// JSON object used for every retained document and the `applied` mapping
pub type JsonMap = Map<String, Value>;

/// Lifecycle status of a component
///
/// # Examples
/// ```
/// use lucid_component::protocol::ComponentStatus;
///
/// let json = serde_json::to_string(&ComponentStatus::Running).unwrap();
/// assert_eq!(json, "\"running\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
}

impl ComponentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retained `status` document mirroring the component's lifecycle state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusDocument {
    pub component_id: String,
    pub status: ComponentStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
}

/// Outcome of one command, published on `evt/{action}/result`
///
/// `error` and `applied` are always serialized, as `null` when absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultEnvelope {
    /// Correlation id echoed verbatim from the command (empty when missing)
    pub request_id: String,
    pub ok: bool,
    pub error: Option<String>,
    /// Effective values applied by the command, if it applied any
    pub applied: Option<JsonMap>,
    pub ts: DateTime<Utc>,
}

impl ResultEnvelope {
    pub fn success<S: Into<String>>(request_id: S) -> Self {
        Self {
            request_id: request_id.into(),
            ok: true,
            error: None,
            applied: None,
            ts: Utc::now(),
        }
    }

    pub fn failure<S: Into<String>, E: Into<String>>(request_id: S, error: E) -> Self {
        Self {
            request_id: request_id.into(),
            ok: false,
            error: Some(error.into()),
            applied: None,
            ts: Utc::now(),
        }
    }

    /// Attach the applied mapping; an empty mapping is published as `null`
    pub fn with_applied(mut self, applied: JsonMap) -> Self {
        self.applied = if applied.is_empty() {
            None
        } else {
            Some(applied)
        };
        self
    }
}

/// One line on the component's `logs` stream
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogRecord {
    pub ts: DateTime<Utc>,
    pub level: String,
    pub component_id: String,
    pub message: String,
}

/// A decoded inbound command
///
/// Decoding never fails: an empty payload is `{}`, and malformed JSON or a
/// non-object payload degrades to an empty body with `request_id = ""`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandPayload {
    request_id: String,
    body: JsonMap,
    decode_error: Option<String>,
}

impl CommandPayload {
    pub fn decode(raw: &[u8]) -> Self {
        let (body, decode_error) = match Self::parse_body(raw) {
            Ok(body) => (body, None),
            Err(reason) => (JsonMap::new(), Some(reason)),
        };

        let request_id = body
            .get("request_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Self {
            request_id,
            body,
            decode_error,
        }
    }

    fn parse_body(raw: &[u8]) -> Result<JsonMap, String> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(JsonMap::new());
        }

        match serde_json::from_slice::<Value>(raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(format!("payload must be a JSON object, got {}", json_kind(&other))),
            Err(e) => Err(format!("malformed JSON payload: {e}")),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn body(&self) -> &JsonMap {
        &self.body
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Why the payload degraded to defaults, if it did
    pub fn decode_error(&self) -> Option<&str> {
        self.decode_error.as_deref()
    }

    /// Read an optional object-valued field
    ///
    /// Absent or `null` yields an empty mapping; any other non-object value is
    /// rejected with `"payload '{key}' must be an object"`.
    pub fn object_field(&self, key: &str) -> Result<JsonMap, String> {
        match self.body.get(key) {
            None | Some(Value::Null) => Ok(JsonMap::new()),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(_) => Err(format!("payload '{key}' must be an object")),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Coerce a JSON value to a boolean the way loosely-typed senders expect
///
/// Numbers are true when non-zero, strings when non-empty and not a common
/// false spelling, containers when non-empty. This is stricter than plain
/// truthiness, under which any non-empty string is true: here `"false"`,
/// `"0"`, `"off"` and `"no"` all read as false.
pub fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "" | "false" | "0" | "off" | "no"
        ),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
