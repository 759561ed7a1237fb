use crate::{Controller, MetricsSnapshot};
use serde_json::{Map, Value};
use thiserror::Error;

pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

pub const EVENT_CTRLS: &str = "ctrls";
pub const EVENT_METRICS: &str = "metrics";

/// Decoded `{event, data}` envelope. `data` is left untyped until routing.
#[derive(Debug, Clone, PartialEq)]
pub struct WireFrame {
    pub event: String,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame exceeds max size: {size} > {max}")]
    OversizedFrame { size: usize, max: usize },
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("frame encode failed: {0}")]
    Encode(String),
}

/// Control frames the dashboard sends to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    RequestTopology,
    Subscribe { ctrl_id: String },
    Unsubscribe,
}

impl OutboundFrame {
    pub fn event(&self) -> Option<&'static str> {
        match self {
            OutboundFrame::RequestTopology => Some(EVENT_CTRLS),
            OutboundFrame::Subscribe { .. } => Some(EVENT_METRICS),
            // The server treats an event-less frame as a plain state update.
            OutboundFrame::Unsubscribe => None,
        }
    }

    pub fn data(&self) -> Value {
        match self {
            OutboundFrame::RequestTopology => Value::Object(Map::new()),
            OutboundFrame::Subscribe { ctrl_id } => serde_json::json!({ "ctrl_id": ctrl_id }),
            OutboundFrame::Unsubscribe => serde_json::json!({ "ctrl_id": "" }),
        }
    }

    pub fn encode(&self) -> Result<String, FrameError> {
        encode_frame(self.event(), &self.data())
    }
}

/// Inbound frame after routing on its event tag.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Topology(Vec<Controller>),
    Metrics(MetricsSnapshot),
    Other(String),
}

impl InboundEvent {
    pub fn from_frame(frame: WireFrame) -> Result<Self, FrameError> {
        match frame.event.as_str() {
            EVENT_CTRLS => {
                let controllers = match frame.data {
                    Value::Null => Vec::new(),
                    data => serde_json::from_value(data)
                        .map_err(|err| FrameError::Malformed(format!("ctrls data: {err}")))?,
                };
                Ok(InboundEvent::Topology(controllers))
            }
            EVENT_METRICS => {
                let snapshot = match frame.data {
                    Value::Null => MetricsSnapshot::default(),
                    data => serde_json::from_value(data)
                        .map_err(|err| FrameError::Malformed(format!("metrics data: {err}")))?,
                };
                Ok(InboundEvent::Metrics(snapshot))
            }
            _ => Ok(InboundEvent::Other(frame.event)),
        }
    }
}

/// Flat outbound encoding: `data`'s fields sit beside `event` at the top level.
pub fn encode_frame(event: Option<&str>, data: &Value) -> Result<String, FrameError> {
    let mut object = match data {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            return Err(FrameError::Encode(format!(
                "frame data must be an object, got {other}"
            )))
        }
    };
    if let Some(event) = event {
        object.insert("event".to_string(), Value::String(event.to_string()));
    }
    serde_json::to_string(&Value::Object(object)).map_err(|err| FrameError::Encode(err.to_string()))
}

pub fn decode_frame(text: &str, max_frame_bytes: usize) -> Result<WireFrame, FrameError> {
    let raw = text.trim_end_matches(|ch| ch == '\n' || ch == '\r');
    if raw.len() > max_frame_bytes {
        return Err(FrameError::OversizedFrame {
            size: raw.len(),
            max: max_frame_bytes,
        });
    }
    let value: Value =
        serde_json::from_str(raw).map_err(|err| FrameError::Malformed(err.to_string()))?;
    let Value::Object(mut object) = value else {
        return Err(FrameError::Malformed("frame is not a JSON object".to_string()));
    };
    let event = match object.remove("event") {
        Some(Value::String(event)) => event,
        Some(other) => {
            return Err(FrameError::Malformed(format!(
                "event field is not a string: {other}"
            )))
        }
        None => return Err(FrameError::Malformed("missing event field".to_string())),
    };
    let data = object.remove("data").unwrap_or(Value::Null);
    Ok(WireFrame { event, data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RunnerStatus;

    #[test]
    fn outbound_frames_match_server_shape() {
        let topology: Value =
            serde_json::from_str(&OutboundFrame::RequestTopology.encode().expect("encode"))
                .expect("json");
        assert_eq!(topology, serde_json::json!({"event": "ctrls"}));

        let subscribe: Value = serde_json::from_str(
            &OutboundFrame::Subscribe {
                ctrl_id: "A".to_string(),
            }
            .encode()
            .expect("encode"),
        )
        .expect("json");
        assert_eq!(subscribe, serde_json::json!({"event": "metrics", "ctrl_id": "A"}));

        let unsubscribe: Value =
            serde_json::from_str(&OutboundFrame::Unsubscribe.encode().expect("encode"))
                .expect("json");
        assert_eq!(unsubscribe, serde_json::json!({"ctrl_id": ""}));
        assert!(unsubscribe.get("event").is_none());
    }

    #[test]
    fn encoder_rejects_non_object_data() {
        let result = encode_frame(Some("ctrls"), &serde_json::json!([1, 2]));
        assert!(matches!(result, Err(FrameError::Encode(_))));
    }

    #[test]
    fn decoder_rejects_missing_event_and_bad_json() {
        assert!(matches!(
            decode_frame(r#"{"data": []}"#, DEFAULT_MAX_FRAME_BYTES),
            Err(FrameError::Malformed(_))
        ));
        assert!(matches!(
            decode_frame(r#"{"event": 4}"#, DEFAULT_MAX_FRAME_BYTES),
            Err(FrameError::Malformed(_))
        ));
        assert!(matches!(
            decode_frame("{\"event\":\"ctrls\"", DEFAULT_MAX_FRAME_BYTES),
            Err(FrameError::Malformed(_))
        ));
        assert!(matches!(
            decode_frame("[]", DEFAULT_MAX_FRAME_BYTES),
            Err(FrameError::Malformed(_))
        ));
    }

    #[test]
    fn decoder_rejects_oversized_frame() {
        let text = format!(r#"{{"event":"ctrls","data":"{}"}}"#, "x".repeat(2_000));
        assert!(matches!(
            decode_frame(&text, 1_024),
            Err(FrameError::OversizedFrame { .. })
        ));
    }

    #[test]
    fn unknown_event_decodes_and_routes_to_other() {
        let frame = decode_frame(r#"{"event":"logs","data":{"line":"x"}}"#, DEFAULT_MAX_FRAME_BYTES)
            .expect("decode");
        assert_eq!(frame.event, "logs");
        assert_eq!(
            InboundEvent::from_frame(frame).expect("route"),
            InboundEvent::Other("logs".to_string())
        );
    }

    #[test]
    fn ctrls_frame_routes_to_topology() {
        let frame = decode_frame(
            r#"{"event":"ctrls","empty":false,"data":[{"id":"A","name":"ctrl-A","runners":[
                {"name":"r1","private_ipv4":"172.31.36.190","status":"busy"},
                {"name":"r2","private_ipv4":"172.31.43.32","status":"finished"}]}]}"#,
            DEFAULT_MAX_FRAME_BYTES,
        )
        .expect("decode");
        let InboundEvent::Topology(controllers) = InboundEvent::from_frame(frame).expect("route")
        else {
            panic!("expected topology event");
        };
        assert_eq!(controllers.len(), 1);
        assert_eq!(controllers[0].runners[1].status, RunnerStatus::Finished);
    }

    #[test]
    fn ctrls_frame_with_wrong_shape_is_malformed() {
        let frame = decode_frame(r#"{"event":"ctrls","data":{"id":"A"}}"#, DEFAULT_MAX_FRAME_BYTES)
            .expect("decode");
        assert!(matches!(
            InboundEvent::from_frame(frame),
            Err(FrameError::Malformed(_))
        ));
    }

    #[test]
    fn metrics_frame_routes_runner_samples() {
        let frame = decode_frame(
            r#"{"event":"metrics","data":{"runners":[{"name":"r1","metrics":[
                {"timestamp":"2024-06-01T00:00:00Z","metadata":{"ecs_memory_bytes":2000000}}]}]}}"#,
            DEFAULT_MAX_FRAME_BYTES,
        )
        .expect("decode");
        let InboundEvent::Metrics(snapshot) = InboundEvent::from_frame(frame).expect("route")
        else {
            panic!("expected metrics event");
        };
        assert_eq!(snapshot.runners.len(), 1);
        assert_eq!(snapshot.runners[0].samples.len(), 1);
    }
}
