use serde::Serialize;
use serde_json::{ser::PrettyFormatter, Map, Serializer, Value};

use super::models::ResponseEnvelope;

pub const MASK: &str = "***masked***";

const SENSITIVE_KEYS: [&str; 2] = ["authorization", "Authorization"];

/// Redacts sensitive top-level keys. Nested objects are left as they are.
pub fn mask_sensitive(data: &Map<String, Value>) -> Map<String, Value> {
    let mut masked = data.clone();
    for key in SENSITIVE_KEYS {
        if let Some(value) = masked.get_mut(key) {
            *value = Value::String(MASK.to_string());
        }
    }
    masked
}

/// Four-space indented JSON with sorted keys.
pub fn pretty_json(value: &Value) -> String {
    let mut out = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    match sort_keys(value).serialize(&mut serializer) {
        Ok(()) => String::from_utf8_lossy(&out).into_owned(),
        Err(_) => value.to_string(),
    }
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.clone(), sort_keys(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Repeated headers are joined with `", "` in arrival order.
pub fn headers_to_map(headers: &[(String, String)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (name, value) in headers {
        match map.get_mut(name) {
            Some(Value::String(joined)) => {
                joined.push_str(", ");
                joined.push_str(value);
            }
            _ => {
                map.insert(name.clone(), Value::String(value.clone()));
            }
        }
    }
    map
}

/// Multi-line record of one exchange, with credentials masked.
pub fn describe_exchange(response: &ResponseEnvelope, request_body: &Map<String, Value>) -> String {
    let request_headers = mask_sensitive(&headers_to_map(&response.request.headers));
    let response_headers = mask_sensitive(&headers_to_map(&response.headers));

    let mut lines = vec![
        "--------- API Call Details ---------".to_string(),
        format!("URL: {}", response.request.url),
        format!("Method: {}", response.request.method),
        format!(
            "Request Headers: {}",
            pretty_json(&Value::Object(request_headers))
        ),
        format!(
            "Request Body: {}",
            pretty_json(&Value::Object(mask_sensitive(request_body)))
        ),
        format!("Response Status: {}", response.status),
        format!(
            "Response Headers: {}",
            pretty_json(&Value::Object(response_headers))
        ),
    ];

    if response.is_json() {
        let body = match response.json() {
            Ok(value) => pretty_json(&value),
            Err(_) => response.text.clone(),
        };
        lines.push(format!("Response Body (JSON): {body}"));
    } else {
        lines.push(
            "Response Body: Response is not in JSON format. Printing response headers instead."
                .to_string(),
        );
        lines.push(pretty_json(&Value::Object(headers_to_map(&response.headers))));
    }

    lines.join("\n")
}
