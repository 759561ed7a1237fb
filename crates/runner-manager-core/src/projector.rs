use crate::store::MetricsStore;
use crate::{RunnerMetrics, CPU_METRIC_KEY, MEMORY_METRIC_KEY};
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::str::FromStr;

const BYTES_PER_MB: f64 = 1_000_000.0;
const CPU_DIVISOR: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

pub const PALETTE: [Rgb; 8] = [
    Rgb(75, 192, 192),
    Rgb(255, 60, 60),
    Rgb(250, 189, 47),
    Rgb(131, 165, 152),
    Rgb(211, 134, 155),
    Rgb(142, 192, 124),
    Rgb(254, 128, 25),
    Rgb(104, 157, 106),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeWindow {
    #[default]
    Unbounded,
    Last(Duration),
}

impl TimeWindow {
    pub const PRESETS: [&'static str; 6] = ["all", "5m", "15m", "1h", "6h", "24h"];

    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TimeWindow::Unbounded => None,
            // a span reaching past the earliest representable instant keeps everything
            TimeWindow::Last(span) => now.checked_sub_signed(*span),
        }
    }

    pub fn next(&self) -> Self {
        let current = self.to_string();
        let idx = Self::PRESETS
            .iter()
            .position(|preset| *preset == current)
            .map(|idx| (idx + 1) % Self::PRESETS.len())
            .unwrap_or(0);
        Self::PRESETS[idx].parse().unwrap_or_default()
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeWindow::Unbounded => f.write_str("all"),
            TimeWindow::Last(span) => {
                let secs = span.num_seconds();
                if secs % 3600 == 0 {
                    write!(f, "{}h", secs / 3600)
                } else if secs % 60 == 0 {
                    write!(f, "{}m", secs / 60)
                } else {
                    write!(f, "{secs}s")
                }
            }
        }
    }
}

impl FromStr for TimeWindow {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_ascii_lowercase();
        if matches!(normalized.as_str(), "all" | "unbounded" | "") {
            return Ok(TimeWindow::Unbounded);
        }
        let split = normalized
            .find(|ch: char| !ch.is_ascii_digit())
            .ok_or_else(|| format!("missing unit in window: {input}"))?;
        let (amount, unit) = normalized.split_at(split);
        let amount: i64 = amount
            .parse()
            .map_err(|_| format!("invalid window amount: {input}"))?;
        if amount <= 0 {
            return Err(format!("window must be positive: {input}"));
        }
        let span = match unit {
            "s" => Duration::try_seconds(amount),
            "m" => Duration::try_minutes(amount),
            "h" => Duration::try_hours(amount),
            "d" => Duration::try_days(amount),
            other => return Err(format!("unknown window unit '{other}'")),
        };
        span.map(TimeWindow::Last)
            .ok_or_else(|| format!("window out of range: {input}"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub points: Vec<(DateTime<Utc>, f64)>,
    pub color: Rgb,
}

// memory[i] and cpu[i] are the same runner
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    pub memory: Vec<Series>,
    pub cpu: Vec<Series>,
}

impl Projection {
    pub fn is_empty(&self) -> bool {
        self.memory.is_empty() && self.cpu.is_empty()
    }

    pub fn point_count(&self) -> usize {
        self.memory
            .iter()
            .chain(self.cpu.iter())
            .map(|series| series.points.len())
            .sum()
    }
}

/// `runner_names` must already be sorted the same way (lexicographically).
pub fn project(
    metrics: &MetricsStore,
    runner_names: &[String],
    cutoff: Option<DateTime<Utc>>,
) -> Projection {
    let mut runners: Vec<&RunnerMetrics> = metrics.runners().iter().collect();
    runners.sort_by(|a, b| a.name.cmp(&b.name));

    let mut projection = Projection::default();
    for (index, runner) in runners.into_iter().enumerate() {
        let label = runner_names
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("Runner {}", index + 1));
        let color = PALETTE[index % PALETTE.len()];
        projection.memory.push(Series {
            label: label.clone(),
            points: points(runner, MEMORY_METRIC_KEY, BYTES_PER_MB, cutoff),
            color,
        });
        projection.cpu.push(Series {
            label,
            points: points(runner, CPU_METRIC_KEY, CPU_DIVISOR, cutoff),
            color,
        });
    }
    projection
}

fn points(
    runner: &RunnerMetrics,
    key: &str,
    divisor: f64,
    cutoff: Option<DateTime<Utc>>,
) -> Vec<(DateTime<Utc>, f64)> {
    runner
        .samples
        .iter()
        .filter(|sample| cutoff.map_or(true, |cutoff| sample.timestamp >= cutoff))
        .filter_map(|sample| {
            sample
                .metric(key)
                .map(|value| (sample.timestamp, value / divisor))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Sample;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, minute, 0)
            .single()
            .expect("valid timestamp")
    }

    fn sample(minute: u32, mem: Option<f64>, cpu: Option<f64>) -> Sample {
        let mut metadata = BTreeMap::new();
        if let Some(mem) = mem {
            metadata.insert(MEMORY_METRIC_KEY.to_string(), serde_json::json!(mem));
        }
        if let Some(cpu) = cpu {
            metadata.insert(CPU_METRIC_KEY.to_string(), serde_json::json!(cpu));
        }
        Sample {
            timestamp: ts(minute),
            metadata,
        }
    }

    fn store(runners: Vec<(&str, Vec<Sample>)>) -> MetricsStore {
        let mut store = MetricsStore::default();
        store.replace(
            runners
                .into_iter()
                .map(|(name, samples)| RunnerMetrics {
                    name: name.to_string(),
                    samples,
                })
                .collect(),
        );
        store
    }

    #[test]
    fn converts_units_and_shares_color_per_runner() {
        let metrics = store(vec![(
            "r1",
            vec![sample(0, Some(2_000_000.0), Some(250.0))],
        )]);
        let projection = project(&metrics, &["runner-1".to_string()], None);

        assert_eq!(projection.memory.len(), 1);
        assert_eq!(projection.memory[0].label, "runner-1");
        assert_eq!(projection.memory[0].points, vec![(ts(0), 2.0)]);
        assert_eq!(projection.cpu[0].points, vec![(ts(0), 2.5)]);
        assert_eq!(projection.memory[0].color, projection.cpu[0].color);
    }

    #[test]
    fn runners_sorted_by_name_and_missing_labels_fall_back() {
        let metrics = store(vec![
            ("r2", vec![sample(0, Some(1.0), None)]),
            ("r1", vec![sample(0, Some(1.0), None)]),
            ("r3", Vec::new()),
        ]);
        let names = vec!["alpha".to_string(), "beta".to_string()];
        let projection = project(&metrics, &names, None);

        let labels: Vec<&str> = projection.memory.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["alpha", "beta", "Runner 3"]);
        assert_eq!(projection.memory[0].color, PALETTE[0]);
        assert_eq!(projection.memory[2].color, PALETTE[2]);
    }

    #[test]
    fn palette_wraps_around() {
        let names: Vec<String> = (0..PALETTE.len() + 1).map(|i| format!("r{i:02}")).collect();
        let metrics = store(names.iter().map(|n| (n.as_str(), Vec::new())).collect());
        let projection = project(&metrics, &names, None);
        assert_eq!(projection.cpu[PALETTE.len()].color, PALETTE[0]);
    }

    #[test]
    fn runner_without_known_keys_keeps_empty_series() {
        let mut other = sample(0, None, None);
        other
            .metadata
            .insert("ecs_network_rx_bytes".to_string(), serde_json::json!(9));
        let metrics = store(vec![
            ("r1", vec![other]),
            ("r2", vec![sample(1, Some(3_000_000.0), Some(100.0))]),
        ]);
        let projection = project(&metrics, &[], None);
        assert_eq!(projection.memory.len(), 2);
        assert!(projection.memory[0].points.is_empty());
        assert!(projection.cpu[0].points.is_empty());
        assert_eq!(projection.memory[1].points.len(), 1);
    }

    #[test]
    fn cutoff_is_inclusive_and_future_cutoff_yields_empty_series() {
        let metrics = store(vec![(
            "r1",
            vec![
                sample(0, Some(1.0), Some(1.0)),
                sample(5, Some(2.0), Some(2.0)),
                sample(10, Some(3.0), Some(3.0)),
            ],
        )]);
        let windowed = project(&metrics, &[], Some(ts(5)));
        assert_eq!(windowed.memory[0].points.len(), 2);

        let future = project(&metrics, &[], Some(ts(30)));
        assert_eq!(future.memory.len(), 1);
        assert!(future.memory[0].points.is_empty());
        assert!(future.cpu[0].points.is_empty());
    }

    #[test]
    fn unbounded_projection_preserves_every_sample_and_is_idempotent() {
        let metrics = store(vec![
            ("r1", vec![sample(0, Some(1.0), Some(1.0)), sample(1, Some(1.0), Some(1.0))]),
            ("r2", vec![sample(2, Some(1.0), Some(1.0))]),
        ]);
        let first = project(&metrics, &[], None);
        let second = project(&metrics, &[], None);
        assert_eq!(first, second);
        let memory_points: usize = first.memory.iter().map(|s| s.points.len()).sum();
        assert_eq!(memory_points, metrics.sample_count());
    }

    #[test]
    fn empty_store_projects_nothing() {
        let projection = project(&MetricsStore::default(), &["r1".to_string()], None);
        assert!(projection.is_empty());
    }

    #[test]
    fn window_parses_presets_and_cycles() {
        assert_eq!("all".parse::<TimeWindow>(), Ok(TimeWindow::Unbounded));
        assert_eq!(
            "15m".parse::<TimeWindow>(),
            Ok(TimeWindow::Last(Duration::minutes(15)))
        );
        assert!("15x".parse::<TimeWindow>().is_err());
        assert!("0m".parse::<TimeWindow>().is_err());
        assert_eq!(TimeWindow::Last(Duration::hours(1)).to_string(), "1h");
        assert_eq!(TimeWindow::Unbounded.next().to_string(), "5m");
        assert_eq!(
            TimeWindow::Last(Duration::hours(24)).next(),
            TimeWindow::Unbounded
        );
        assert_eq!(
            TimeWindow::Last(Duration::minutes(5)).cutoff(ts(10)),
            Some(ts(5))
        );
        assert_eq!(TimeWindow::Unbounded.cutoff(ts(10)), None);
    }

    #[test]
    fn oversized_window_is_rejected() {
        assert_eq!(
            "9999999999999h".parse::<TimeWindow>(),
            Err("window out of range: 9999999999999h".to_string())
        );
        assert!("99999999999999999999d".parse::<TimeWindow>().is_err());
    }

    #[test]
    fn huge_window_cutoff_falls_back_to_unbounded() {
        let window: TimeWindow = "100000000d".parse().expect("in range");
        assert_eq!(window.cutoff(Utc::now()), None);

        let metrics = store(vec![("r1", vec![sample(0, Some(1.0), Some(1.0))])]);
        let projection = project(&metrics, &[], window.cutoff(Utc::now()));
        assert_eq!(projection.point_count(), 2);
    }
}
