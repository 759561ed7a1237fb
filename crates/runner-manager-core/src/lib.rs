use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub mod projector;
pub mod session;
pub mod store;
pub mod subscription;
pub mod wire;

pub use projector::{project, Projection, Rgb, Series, TimeWindow, PALETTE};
pub use session::{FrameSink, InboundOutcome, Session, SyncError};
pub use store::{MetricsStore, TopologyStore};
pub use subscription::{SubscriptionAction, SubscriptionController, SubscriptionState};
pub use wire::{decode_frame, encode_frame, FrameError, InboundEvent, OutboundFrame, WireFrame};

/// Metadata key carrying resident memory in bytes.
pub const MEMORY_METRIC_KEY: &str = "ecs_memory_bytes";
/// Metadata key carrying CPU time in hundredths of a core-second.
pub const CPU_METRIC_KEY: &str = "ecs_cpu_seconds_total";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Controller {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub runners: Vec<Runner>,
}

impl Controller {
    /// Runner names in the canonical order used to pair them with metric series.
    pub fn sorted_runner_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.runners.iter().map(|r| r.name.clone()).collect();
        names.sort();
        names
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Runner {
    pub name: String,
    #[serde(default)]
    pub private_ipv4: String,
    #[serde(default)]
    pub status: RunnerStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RunnerStatus {
    Idle,
    Busy,
    Finished,
    Error,
    Ready,
    Failed,
    #[serde(other)]
    Unknown,
}

impl Default for RunnerStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

impl RunnerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunnerStatus::Idle => "idle",
            RunnerStatus::Busy => "busy",
            RunnerStatus::Finished => "finished",
            RunnerStatus::Error => "error",
            RunnerStatus::Ready => "ready",
            RunnerStatus::Failed => "failed",
            RunnerStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RunnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl Sample {
    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).and_then(Value::as_f64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunnerMetrics {
    pub name: String,
    #[serde(default, rename = "metrics", deserialize_with = "deserialize_null_default")]
    pub samples: Vec<Sample>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricsSnapshot {
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub runners: Vec<RunnerMetrics>,
}

/// Deserialize an ID that can be either a string or a number into a String
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let val: Value = Value::deserialize(deserializer)?;
    match val {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(serde::de::Error::custom("expected string or number for id")),
    }
}

// The server marshals empty slices as `null`.
fn deserialize_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
