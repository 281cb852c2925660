//! Transaction record model
//!
//! Records arrive from two sources with slightly different shapes: history
//! pages carry a stable integer id and a persisted timestamp, live pushes
//! carry neither. Every field is parsed leniently so that a malformed
//! payload degrades to defaults instead of failing the whole message.

use std::fmt;

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity of a record inside the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecordId {
    /// The source did not provide an id and none has been stamped yet
    #[default]
    Unassigned,
    /// Id assigned by the capture store (history pages)
    Stored(u64),
    /// Token stamped locally when a live message arrived
    Live(u64),
    /// Token stamped locally on a pulled row that carried no usable id
    Local(u64),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Unassigned => write!(f, "unassigned"),
            RecordId::Stored(id) => write!(f, "{}", id),
            RecordId::Live(token) => write!(f, "live-{}", token),
            RecordId::Local(token) => write!(f, "local-{}", token),
        }
    }
}

impl std::str::FromStr for RecordId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Some(token) = s.strip_prefix("live-") {
            return token.parse().map(RecordId::Live);
        }
        if let Some(token) = s.strip_prefix("local-") {
            return token.parse().map(RecordId::Local);
        }
        s.parse().map(RecordId::Stored)
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let id = match value {
            Value::Number(n) => n.as_u64().map(RecordId::Stored),
            Value::String(s) => s.parse().ok(),
            _ => None,
        };
        Ok(id.unwrap_or_default())
    }
}

/// Ordered string-keyed mapping used for headers and cookies
///
/// Keeps the order the capture engine reported. Non-string values are
/// rendered to their JSON text; a non-object payload becomes an empty map.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldMap(Vec<(String, String)>);

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Case-insensitive lookup of the first value for `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// JSON object form, in original order
    pub fn to_json(&self) -> Value {
        let map = self
            .0
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect::<serde_json::Map<_, _>>();
        Value::Object(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl Serialize for FieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FieldMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let Value::Object(map) = value else {
            return Ok(FieldMap::default());
        };
        Ok(map
            .into_iter()
            .map(|(k, v)| {
                let text = match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, text)
            })
            .collect())
    }
}

/// One side (request or response) of a captured exchange
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MessagePart {
    #[serde(default)]
    pub headers: FieldMap,
    #[serde(default)]
    pub cookies: FieldMap,
    #[serde(default, deserialize_with = "lenient_text")]
    pub body: Option<String>,
}

/// A captured request/response transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(default)]
    pub id: RecordId,
    #[serde(default, deserialize_with = "lenient_string")]
    pub method: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub status: Option<String>,
    /// Elapsed time as reported, e.g. `"123ms"`
    #[serde(default, deserialize_with = "lenient_text")]
    pub time: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient_part")]
    pub request: MessagePart,
    #[serde(default, deserialize_with = "lenient_part")]
    pub response: MessagePart,
}

impl TransactionRecord {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: RecordId::Unassigned,
            method: method.into(),
            url: url.into(),
            status: None,
            time: None,
            timestamp: None,
            request: MessagePart::default(),
            response: MessagePart::default(),
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = Some(time.into());
        self
    }

    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = id;
        self
    }

    /// Elapsed milliseconds; absent or unparseable time counts as 0
    pub fn elapsed_ms(&self) -> u64 {
        self.time.as_deref().map(parse_leading_int).unwrap_or(0)
    }

    /// Only a status whose text starts with `4` or `5` is a failure.
    /// Absent or malformed status counts as success.
    pub fn is_failure(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.starts_with('4') || s.starts_with('5'))
    }

    pub fn is_success(&self) -> bool {
        !self.is_failure()
    }
}

/// Parse the leading decimal integer of `text`, ignoring any suffix.
///
/// Leading whitespace and a `+` sign are skipped. Text with no leading
/// digits (including negative values) yields 0. Saturates on overflow.
pub fn parse_leading_int(text: &str) -> u64 {
    let trimmed = text.trim_start();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0u64, |acc, b| {
            acc.saturating_mul(10).saturating_add(u64::from(b - b'0'))
        })
}

/// Parse a count or latency that may be a JSON number or a string like `"120ms"`
pub fn lenient_u64(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => parse_leading_int(s),
        _ => 0,
    }
}

pub(crate) fn deserialize_lenient_u64<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<u64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(lenient_u64(&value))
}

pub(crate) fn lenient_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    })
}

pub(crate) fn lenient_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<String, D::Error> {
    lenient_text(deserializer).map(Option::unwrap_or_default)
}

fn lenient_part<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<MessagePart, D::Error> {
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Object(_) => Ok(serde_json::from_value(value).unwrap_or_default()),
        _ => Ok(MessagePart::default()),
    }
}
