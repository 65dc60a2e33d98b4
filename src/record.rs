//! Decoding of one JSON access-log line into an [`AccessRecord`].

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// How to treat required fields that are missing from a line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strictness {
    /// Missing required fields take their zero value.
    #[default]
    Lenient,
    /// Missing required fields are a decode error.
    Strict,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("timestamp {0} is out of range")]
    TimestampOutOfRange(f64),
}

/// One HTTP request as described by a single input line.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessRecord {
    pub level: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub client_address: String,
    pub protocol: String,
    pub method: String,
    pub host: String,
    pub uri: String,
    pub referer: Vec<String>,
    pub user_agent: Vec<String>,
    /// Authenticated identity; `None` or empty means anonymous.
    pub user_id: Option<String>,
    pub size: i64,
    pub status: i64,
}

impl AccessRecord {
    pub fn referer(&self) -> Option<&str> {
        self.referer.first().map(String::as_str)
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.first().map(String::as_str)
    }
}

// JSON `null` is accepted wherever a value is and means the same as absence.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireRecord {
    level: Option<String>,
    ts: Option<f64>,
    request: Option<WireRequest>,
    user_id: Option<String>,
    size: Option<i64>,
    status: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireRequest {
    client_ip: Option<String>,
    proto: Option<String>,
    method: Option<String>,
    host: Option<String>,
    uri: Option<String>,
    headers: Option<WireHeaders>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireHeaders {
    #[serde(rename = "Referer")]
    referer: Option<Vec<Option<String>>>,
    #[serde(rename = "User-Agent")]
    user_agent: Option<Vec<Option<String>>>,
}

const RECORD_KEYS: &[&str] = &["level", "ts", "request", "user_id", "size", "status"];
const REQUEST_KEYS: &[&str] = &["client_ip", "proto", "method", "host", "uri", "headers"];
const HEADER_KEYS: &[&str] = &["Referer", "User-Agent"];

/// Decode one raw line. A single trailing `\r` is ignored.
///
/// Invalid UTF-8 is replaced with U+FFFD, keys match their field names
/// regardless of ASCII case, and a bare `null` is an empty record.
pub fn decode(line: &[u8], strictness: Strictness) -> Result<AccessRecord, DecodeError> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let text = String::from_utf8_lossy(line);

    // Top-level arrays must be rejected here; serde would otherwise accept
    // them as a positional struct.
    let mut object = match serde_json::from_str::<Value>(&text)? {
        Value::Object(object) => object,
        Value::Null => Map::new(),
        _ => return Err(DecodeError::NotAnObject),
    };
    fold_keys(&mut object, RECORD_KEYS);
    if let Some(Value::Object(request)) = object.get_mut("request") {
        fold_keys(request, REQUEST_KEYS);
        if let Some(Value::Object(headers)) = request.get_mut("headers") {
            fold_keys(headers, HEADER_KEYS);
        }
    }
    let wire: WireRecord = serde_json::from_value(Value::Object(object))?;

    let request = wire.request.unwrap_or_default();
    let headers = request.headers.unwrap_or_default();

    let required = Required(strictness);

    let ts = required.get(wire.ts, "ts")?;
    let timestamp = epoch_to_datetime(ts).ok_or(DecodeError::TimestampOutOfRange(ts))?;

    Ok(AccessRecord {
        level: wire.level,
        timestamp,
        client_address: required.get(request.client_ip, "request.client_ip")?,
        protocol: required.get(request.proto, "request.proto")?,
        method: required.get(request.method, "request.method")?,
        host: request.host.unwrap_or_default(),
        uri: required.get(request.uri, "request.uri")?,
        referer: flatten_header(headers.referer),
        user_agent: flatten_header(headers.user_agent),
        user_id: wire.user_id,
        size: required.get(wire.size, "size")?,
        status: required.get(wire.status, "status")?,
    })
}

/// Rename keys that differ from a known field name only in ASCII case.
/// An exact match always wins over a case-folded one.
fn fold_keys(object: &mut Map<String, Value>, known: &[&str]) {
    let renames: Vec<(String, &str)> = object
        .keys()
        .filter(|key| !known.contains(&key.as_str()))
        .filter_map(|key| {
            known
                .iter()
                .find(|name| name.eq_ignore_ascii_case(key))
                .map(|name| (key.clone(), *name))
        })
        .collect();

    for (key, name) in renames {
        if let Some(value) = object.remove(&key) {
            if !object.contains_key(name) {
                object.insert(name.to_string(), value);
            }
        }
    }
}

struct Required(Strictness);

impl Required {
    fn get<T: Default>(&self, value: Option<T>, name: &'static str) -> Result<T, DecodeError> {
        match (value, self.0) {
            (Some(v), _) => Ok(v),
            (None, Strictness::Lenient) => Ok(T::default()),
            (None, Strictness::Strict) => Err(DecodeError::MissingField(name)),
        }
    }
}

fn flatten_header(values: Option<Vec<Option<String>>>) -> Vec<String> {
    values
        .unwrap_or_default()
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect()
}

/// Split fractional epoch seconds into whole seconds and nanoseconds, both
/// truncated toward zero, then build the instant they name.
pub fn epoch_to_datetime(ts: f64) -> Option<DateTime<Utc>> {
    if !ts.is_finite() {
        return None;
    }
    let whole = ts.trunc();
    let mut secs = whole as i64;
    let mut nanos = ((ts - whole) * 1e9) as i64;
    if nanos < 0 {
        secs = secs.checked_sub(1)?;
        nanos += 1_000_000_000;
    }
    DateTime::from_timestamp(secs, u32::try_from(nanos).ok()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    const FULL: &str = r#"{"level":"info","ts":1700000000.5,"request":{"client_ip":"10.0.0.1","proto":"HTTP/2.0","method":"GET","host":"example.com","uri":"/index.html","headers":{"Referer":["https://example.com/"],"User-Agent":["curl/8.4.0","second"]}},"user_id":"alice","size":512,"status":200}"#;

    #[test]
    fn test_decode_full_record() {
        let record = decode(FULL.as_bytes(), Strictness::Lenient).unwrap();
        assert_eq!(record.level.as_deref(), Some("info"));
        assert_eq!(record.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(record.timestamp.nanosecond(), 500_000_000);
        assert_eq!(record.client_address, "10.0.0.1");
        assert_eq!(record.protocol, "HTTP/2.0");
        assert_eq!(record.method, "GET");
        assert_eq!(record.host, "example.com");
        assert_eq!(record.uri, "/index.html");
        assert_eq!(record.referer(), Some("https://example.com/"));
        assert_eq!(record.user_agent(), Some("curl/8.4.0"));
        assert_eq!(record.user_agent.len(), 2);
        assert_eq!(record.user_id.as_deref(), Some("alice"));
        assert_eq!(record.size, 512);
        assert_eq!(record.status, 200);
    }

    #[test]
    fn test_decode_is_repeatable() {
        let a = decode(FULL.as_bytes(), Strictness::Lenient).unwrap();
        let b = decode(FULL.as_bytes(), Strictness::Lenient).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_decode_optional_fields_absent() {
        let line = r#"{"ts":1,"request":{"client_ip":"::1","proto":"HTTP/1.1","method":"HEAD","uri":"/"},"size":0,"status":204}"#;
        let record = decode(line.as_bytes(), Strictness::Strict).unwrap();
        assert_eq!(record.level, None);
        assert_eq!(record.host, "");
        assert!(record.referer.is_empty());
        assert_eq!(record.user_agent(), None);
        assert_eq!(record.user_id, None);
    }

    #[test]
    fn test_decode_empty_header_lists() {
        let line = r#"{"ts":1,"request":{"headers":{"Referer":[],"User-Agent":null}}}"#;
        let record = decode(line.as_bytes(), Strictness::Lenient).unwrap();
        assert_eq!(record.referer(), None);
        assert_eq!(record.user_agent(), None);
    }

    #[test]
    fn test_decode_lenient_zero_fills() {
        let record = decode(b"{}", Strictness::Lenient).unwrap();
        assert_eq!(record.timestamp.timestamp(), 0);
        assert_eq!(record.client_address, "");
        assert_eq!(record.method, "");
        assert_eq!(record.size, 0);
        assert_eq!(record.status, 0);
    }

    #[test]
    fn test_decode_strict_reports_missing_field() {
        let line = r#"{"ts":1,"request":{"client_ip":"a","proto":"p","method":"m","uri":"/"},"size":1}"#;
        match decode(line.as_bytes(), Strictness::Strict) {
            Err(DecodeError::MissingField(name)) => assert_eq!(name, "status"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(matches!(
            decode(b"{\"ts\": ", Strictness::Lenient),
            Err(DecodeError::Json(_))
        ));
        assert!(decode(b"", Strictness::Lenient).is_err());
        assert!(matches!(
            decode(b"[]", Strictness::Lenient),
            Err(DecodeError::NotAnObject)
        ));
        assert!(matches!(
            decode(b"\"GET /\"", Strictness::Lenient),
            Err(DecodeError::NotAnObject)
        ));
    }

    #[test]
    fn test_decode_null_line_is_empty_record() {
        let record = decode(b"null", Strictness::Lenient).unwrap();
        assert_eq!(record, decode(b"{}", Strictness::Lenient).unwrap());
        assert!(matches!(
            decode(b"null", Strictness::Strict),
            Err(DecodeError::MissingField("ts"))
        ));
    }

    #[test]
    fn test_decode_replaces_invalid_utf8() {
        let mut line = br#"{"ts":1,"request":{"headers":{"User-Agent":[""#.to_vec();
        line.push(0xff);
        line.extend_from_slice(br#""]}},"status":200}"#);
        let record = decode(&line, Strictness::Lenient).unwrap();
        assert_eq!(record.user_agent(), Some("\u{FFFD}"));
        assert_eq!(record.status, 200);
    }

    #[test]
    fn test_decode_escaped_lone_surrogate_is_rejected() {
        let line = br#"{"request":{"headers":{"User-Agent":["\ud800"]}}}"#;
        assert!(matches!(
            decode(line, Strictness::Lenient),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn test_decode_keys_ignore_case() {
        let line = br#"{"TS":1700000000,"Request":{"Client_IP":"1.2.3.4","HEADERS":{"user-agent":["ua"]}},"Status":200}"#;
        let record = decode(line, Strictness::Lenient).unwrap();
        assert_eq!(record.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(record.client_address, "1.2.3.4");
        assert_eq!(record.user_agent(), Some("ua"));
        assert_eq!(record.status, 200);
    }

    #[test]
    fn test_decode_exact_key_wins_over_folded() {
        let record = decode(br#"{"STATUS":500,"status":200}"#, Strictness::Lenient).unwrap();
        assert_eq!(record.status, 200);
        let record = decode(br#"{"status":200,"Status":500}"#, Strictness::Lenient).unwrap();
        assert_eq!(record.status, 200);
    }

    #[test]
    fn test_decode_rejects_wrong_types() {
        assert!(decode(br#"{"ts":"yesterday"}"#, Strictness::Lenient).is_err());
        assert!(decode(br#"{"status":"200"}"#, Strictness::Lenient).is_err());
        assert!(decode(br#"{"size":1.5}"#, Strictness::Lenient).is_err());
        assert!(decode(br#"{"request":{"uri":7}}"#, Strictness::Lenient).is_err());
        assert!(
            decode(br#"{"request":{"headers":{"Referer":"x"}}}"#, Strictness::Lenient).is_err()
        );
    }

    #[test]
    fn test_decode_ignores_carriage_return() {
        let record = decode(b"{\"status\":301}\r", Strictness::Lenient).unwrap();
        assert_eq!(record.status, 301);
    }

    #[test]
    fn test_epoch_to_datetime_negative_fraction() {
        let dt = epoch_to_datetime(-1.25).unwrap();
        assert_eq!(dt.timestamp(), -2);
        assert_eq!(dt.nanosecond(), 750_000_000);
    }

    #[test]
    fn test_epoch_to_datetime_out_of_range() {
        assert_eq!(epoch_to_datetime(1e300), None);
        assert_eq!(epoch_to_datetime(f64::NAN), None);
        assert!(matches!(
            decode(br#"{"ts":1e300}"#, Strictness::Lenient),
            Err(DecodeError::TimestampOutOfRange(_))
        ));
    }
}
