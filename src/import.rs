//! Loading span lists from trace files.
//!
//! Two formats are understood: the native trace payload (a JSON object with a `spans` or `events`
//! list, a JSON array of such objects, or a bare JSON array of spans) and OTLP JSON exports (a list
//! of `ExportTraceServiceRequest`). Gzip-compressed files are decompressed first.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use anyhow::Result;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::common::v1::any_value::Value;
use opentelemetry_proto::tonic::common::v1::KeyValue;

use crate::task_timer::TaskTimer;
use crate::types::{any_value_text, time_point_from_unix_nano, Span, TimePoint};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Spans of one trace as delivered by the backend.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TracePayload {
    #[serde(alias = "events")]
    pub spans: Vec<Span>,
    #[serde(default)]
    pub start_timestamp_millis: Option<TimePoint>,
    #[serde(default)]
    pub end_timestamp_millis: Option<TimePoint>,
    /// The backend returned only part of a larger trace.
    #[serde(default)]
    pub is_sub_tree: bool,
}

impl TracePayload {
    pub fn from_spans(spans: Vec<Span>) -> TracePayload {
        TracePayload {
            spans,
            ..Default::default()
        }
    }

    /// Combine a list of payloads into one covering all of their spans.
    pub fn merge(payloads: Vec<TracePayload>) -> TracePayload {
        let mut merged = TracePayload::default();
        for payload in payloads {
            merged.spans.extend(payload.spans);
            merged.start_timestamp_millis = combine_times(
                merged.start_timestamp_millis,
                payload.start_timestamp_millis,
                f64::min,
            );
            merged.end_timestamp_millis = combine_times(
                merged.end_timestamp_millis,
                payload.end_timestamp_millis,
                f64::max,
            );
            merged.is_sub_tree |= payload.is_sub_tree;
        }
        merged
    }
}

fn combine_times(
    a: Option<TimePoint>,
    b: Option<TimePoint>,
    pick: fn(f64, f64) -> f64,
) -> Option<TimePoint> {
    match (a, b) {
        (Some(a), Some(b)) => Some(pick(a, b)),
        (a, b) => a.or(b),
    }
}

pub fn load_trace_file(path: &Path) -> Result<TracePayload> {
    let mut file_bytes = Vec::new();
    std::fs::File::open(path)
        .map_err(|e| anyhow::anyhow!("Failed to open {}: {}", path.display(), e))?
        .read_to_end(&mut file_bytes)?;
    parse_trace_bytes(&file_bytes)
}

pub fn parse_trace_bytes(file_bytes: &[u8]) -> Result<TracePayload> {
    let t = TaskTimer::new("Parsing trace file");

    let decompressed;
    let file_bytes = if file_bytes.starts_with(&GZIP_MAGIC) {
        let mut decoder = flate2::read::GzDecoder::new(file_bytes);
        let mut buffer = Vec::new();
        decoder
            .read_to_end(&mut buffer)
            .map_err(|e| anyhow::anyhow!("Failed to decompress trace file: {}", e))?;
        decompressed = buffer;
        decompressed.as_slice()
    } else {
        file_bytes
    };

    let file_str =
        std::str::from_utf8(file_bytes).map_err(|e| anyhow::anyhow!("File is not UTF8!: {}", e))?;
    let payload = parse_trace_json(file_str)?;

    t.stop();
    Ok(payload)
}

pub fn parse_trace_json(text: &str) -> Result<TracePayload> {
    let value: serde_json::Value = serde_json::from_str(text)?;

    if is_otlp_export(&value) {
        let requests: Vec<ExportTraceServiceRequest> = match value {
            serde_json::Value::Array(_) => serde_json::from_value(value)?,
            _ => vec![serde_json::from_value(value)?],
        };
        return Ok(TracePayload::from_spans(spans_from_otlp(&requests)));
    }

    // The backend answers with a list of payloads
    if is_payload_list(&value) {
        let payloads: Vec<TracePayload> = serde_json::from_value(value)
            .map_err(|e| anyhow::anyhow!("Invalid trace payload list: {}", e))?;
        return Ok(TracePayload::merge(payloads));
    }

    match value {
        serde_json::Value::Array(_) => Ok(TracePayload::from_spans(serde_json::from_value(value)?)),
        serde_json::Value::Object(_) => Ok(serde_json::from_value(value)?),
        _ => anyhow::bail!("Trace file must contain a JSON object or array"),
    }
}

fn is_otlp_export(value: &serde_json::Value) -> bool {
    let has_resource_spans = |v: &serde_json::Value| {
        v.get("resourceSpans").is_some() || v.get("resource_spans").is_some()
    };
    match value {
        serde_json::Value::Array(items) => items.first().is_some_and(has_resource_spans),
        other => has_resource_spans(other),
    }
}

fn is_payload_list(value: &serde_json::Value) -> bool {
    let Some(items) = value.as_array() else {
        return false;
    };
    items
        .iter()
        .any(|item| item.get("events").is_some() || item.get("spans").is_some())
}

/// Flatten OTLP export requests into spans. The service name comes from the `service.name`
/// resource attribute.
pub fn spans_from_otlp(requests: &[ExportTraceServiceRequest]) -> Vec<Span> {
    let mut spans = Vec::new();
    for request in requests {
        for rs in &request.resource_spans {
            let service_name = rs
                .resource
                .as_ref()
                .and_then(|r| r.attributes.iter().find(|kv| kv.key == "service.name"))
                .and_then(|kv| kv.value.as_ref())
                .and_then(|v| match &v.value {
                    Some(Value::StringValue(name)) => Some(name.clone()),
                    _ => None,
                })
                .unwrap_or_else(|| "unknown".to_string());

            for ss in &rs.scope_spans {
                for span in &ss.spans {
                    let start_time = time_point_from_unix_nano(span.start_time_unix_nano);
                    let end_time = time_point_from_unix_nano(span.end_time_unix_nano);

                    spans.push(Span {
                        id: hex::encode(&span.span_id),
                        parent_id: hex::encode(&span.parent_span_id),
                        service_name: service_name.clone(),
                        name: span.name.clone(),
                        start_time,
                        duration: (end_time - start_time).max(0.0),
                        attributes: attributes_to_text(&span.attributes),
                    });
                }
            }
        }
    }
    spans
}

fn attributes_to_text(attributes: &[KeyValue]) -> BTreeMap<String, String> {
    attributes
        .iter()
        .map(|attribute| {
            let value = attribute.value.as_ref().and_then(|v| v.value.as_ref());
            (attribute.key.clone(), any_value_text(value))
        })
        .collect()
}
