//! Query string codec for playground URLs
//!
//! Parameter values travel as JSON. Plain strings are written bare so URLs
//! stay readable; every other value, and any string that would read back as
//! something other than itself (`"25"`, `"true"`), is written as serialized
//! JSON. Both keys and values are percent-encoded.

use serde_json::{Map, Value};

/// Flat mapping of parameter names to structured values, in insertion order
pub type QueryParams = Map<String, Value>;

/// Encode params into a query string prefixed with `?`.
///
/// An empty mapping encodes to an empty string.
pub fn encode(params: &QueryParams) -> String {
    if params.is_empty() {
        return String::new();
    }

    let pairs: Vec<String> = params
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(&stringify_value(value))
            )
        })
        .collect();

    format!("?{}", pairs.join("&"))
}

/// Decode the query part of a location (or a bare query string).
///
/// Everything before the first `?` is ignored, as is any `#fragment`.
/// Values that fail to decode or parse are kept as literal strings.
pub fn decode(location: &str) -> QueryParams {
    let mut params = QueryParams::new();

    let Some((_, query)) = location.split_once('?') else {
        return params;
    };
    let query = query.split_once('#').map_or(query, |(q, _)| q);

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(raw_key);
        let value = decode_component(raw_value);
        params.insert(key, parse_value(value));
    }

    params
}

fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(s) if serde_json::from_str::<Value>(s).is_err() => s.clone(),
        other => other.to_string(),
    }
}

/// Percent-decode one component.
///
/// `+` is a form-encoded space only while still in raw form; the swap happens
/// before percent-decoding so an escaped `%2B` comes out as a literal `+`.
fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_string(),
    }
}

fn parse_value(decoded: String) -> Value {
    match serde_json::from_str(&decoded) {
        Ok(value) => value,
        Err(_) => Value::String(decoded),
    }
}
