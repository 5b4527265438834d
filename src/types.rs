use std::collections::BTreeMap;

use opentelemetry_proto::tonic::common::v1::any_value::Value;

/// Milliseconds since epoch
pub type TimePoint = f64;

pub const NANOSECONDS_PER_MILLISECOND: f64 = 1_000_000.0;

pub fn time_point_from_unix_nano(unix_nano: u64) -> TimePoint {
    unix_nano as f64 / NANOSECONDS_PER_MILLISECOND
}

pub fn time_point_to_utc_string(time: TimePoint) -> String {
    let date_time =
        chrono::DateTime::from_timestamp_nanos((time * NANOSECONDS_PER_MILLISECOND) as i64);
    date_time.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/// One timed operation of a trace, as received from the backend.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    #[serde(default, alias = "spanId", deserialize_with = "null_as_empty")]
    pub id: String,
    /// Empty when the span has no parent.
    #[serde(default, alias = "parentSpanId", deserialize_with = "null_as_empty")]
    pub parent_id: String,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "startTimeMillis")]
    pub start_time: TimePoint,
    #[serde(default, alias = "durationMillis")]
    pub duration: f64,
    #[serde(default, deserialize_with = "attributes_as_text")]
    pub attributes: BTreeMap<String, String>,
}

impl Span {
    pub fn end_time(&self) -> TimePoint {
        self.start_time + self.duration
    }

    pub fn has_parent(&self) -> bool {
        !self.parent_id.is_empty()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = serde::Deserialize::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

/// Attribute values may arrive as any JSON scalar, they're kept as text.
fn attributes_as_text<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Option<BTreeMap<String, serde_json::Value>> =
        serde::Deserialize::deserialize(deserializer)?;
    Ok(values
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| match value {
            serde_json::Value::String(text) => (key, text),
            other => (key, other.to_string()),
        })
        .collect())
}

/// Text form of an OTLP attribute value. Bytes are shown as hex, lists and maps inline.
pub fn any_value_text(value: Option<&Value>) -> String {
    match value {
        None => "empty".to_string(),
        Some(Value::StringValue(text)) => text.clone(),
        Some(Value::BoolValue(flag)) => flag.to_string(),
        Some(Value::IntValue(number)) => number.to_string(),
        Some(Value::DoubleValue(number)) => number.to_string(),
        Some(Value::BytesValue(bytes)) => hex::encode(bytes),
        Some(Value::ArrayValue(array)) => {
            let items: Vec<String> = array
                .values
                .iter()
                .map(|item| any_value_text(item.value.as_ref()))
                .collect();
            format!("[{}]", items.join(", "))
        }
        Some(Value::KvlistValue(list)) => {
            let entries: Vec<String> = list
                .values
                .iter()
                .map(|entry| {
                    let value = entry.value.as_ref().and_then(|v| v.value.as_ref());
                    format!("{}: {}", entry.key, any_value_text(value))
                })
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
    }
}

pub fn stringify_attributes(attributes: &BTreeMap<String, String>) -> String {
    let mut s = "{".to_string();
    for (key, value) in attributes {
        s.push_str(&format!("\n {} = {},", key, value));
    }
    s.push('}');
    s
}
