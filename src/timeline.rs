use crate::metadata::TraceMetadata;
use crate::types::TimePoint;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalUnit {
    pub name: &'static str,
    /// Converts milliseconds to this unit.
    pub multiplier: f64,
}

pub const INTERVAL_UNITS: [IntervalUnit; 3] = [
    IntervalUnit {
        name: "ms",
        multiplier: 1.0,
    },
    IntervalUnit {
        name: "s",
        multiplier: 1.0 / 1_000.0,
    },
    IntervalUnit {
        name: "m",
        multiplier: 1.0 / 60_000.0,
    },
];

pub fn interval_unit_by_name(name: &str) -> Option<IntervalUnit> {
    INTERVAL_UNITS.iter().find(|unit| unit.name == name).copied()
}

/// The largest unit in which `spread_ms` is at least one.
pub fn pick_interval_unit(spread_ms: f64) -> IntervalUnit {
    INTERVAL_UNITS
        .iter()
        .rev()
        .find(|unit| spread_ms * unit.multiplier >= 1.0)
        .copied()
        .unwrap_or(INTERVAL_UNITS[0])
}

/// Round tick positions between `start_time` and `end_time`, between 5 and 100 of them.
pub fn tick_times(start_time: TimePoint, end_time: TimePoint) -> Vec<TimePoint> {
    if end_time <= start_time {
        return vec![start_time];
    }

    let mut delta = 10.0f64.powf((end_time - start_time).log10().ceil() + 10.0);
    let mut iterations: usize = 0;
    loop {
        let num_points = (end_time - start_time) / delta;
        if (5.0..100.0).contains(&num_points) {
            break;
        }
        delta /= 10.0;
        iterations += 1;
        if iterations > 10000 {
            tracing::warn!(start_time, end_time, "tick_times looped");
            return vec![];
        }
    }
    let rounded_start = (start_time / delta).round() * delta;

    let mut ticks = vec![];
    let mut cur_time = rounded_start;
    while cur_time < end_time {
        ticks.push(cur_time);
        cur_time += delta;
    }
    ticks
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    /// Offset from the start of the trace, in milliseconds.
    pub offset: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub start: TimePoint,
    pub end: TimePoint,
    pub unit: IntervalUnit,
    pub ticks: Vec<Tick>,
}

impl Timeline {
    /// `None` when the metadata has no time range, in which case the timeline shouldn't be shown.
    pub fn from_metadata(metadata: &TraceMetadata, unit: Option<IntervalUnit>) -> Option<Timeline> {
        let start = metadata.global_start?;
        let end = metadata.global_end?;
        let spread = end - start;
        let unit = unit.unwrap_or_else(|| pick_interval_unit(spread));

        let offsets = tick_times(0.0, spread);
        let step = match offsets.as_slice() {
            [first, second, ..] => second - first,
            _ => spread,
        };
        let ticks = offsets
            .into_iter()
            .map(|offset| Tick {
                offset,
                label: format_in_unit(offset, step, unit),
            })
            .collect();

        Some(Timeline {
            start,
            end,
            unit,
            ticks,
        })
    }
}

/// Format a millisecond value in `unit`, with as many decimals as `step` needs.
pub fn format_in_unit(value_ms: f64, step_ms: f64, unit: IntervalUnit) -> String {
    let step = step_ms * unit.multiplier;
    let decimals = if step > 0.0 && step < 1.0 {
        (-step.log10().floor()) as usize
    } else {
        0
    };
    format!(
        "{:.decimals$}{}",
        value_ms * unit.multiplier,
        unit.name,
        decimals = decimals
    )
}

/// Label for the trace start shown next to the timeline, e.g. `03:04:05 pm 01/31`.
pub fn format_global_start(time: TimePoint) -> String {
    match chrono::DateTime::from_timestamp_millis(time as i64) {
        Some(date_time) => date_time.format("%I:%M:%S %P %m/%d").to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_unit_from_spread() {
        assert_eq!(pick_interval_unit(0.5).name, "ms");
        assert_eq!(pick_interval_unit(250.0).name, "ms");
        assert_eq!(pick_interval_unit(1_500.0).name, "s");
        assert_eq!(pick_interval_unit(120_000.0).name, "m");
    }

    #[test]
    fn tick_count_is_bounded() {
        for (start, end) in [(0.0, 110.0), (0.001234, 0.00235), (1.0e12, 1.0e12 + 7.0)] {
            let ticks = tick_times(start, end);
            assert!((5..=100).contains(&ticks.len()), "{} ticks", ticks.len());
            assert!(ticks.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn ticks_for_zero_length_trace() {
        assert_eq!(tick_times(5.0, 5.0), vec![5.0]);
    }

    #[test]
    fn labels_use_unit() {
        let seconds = interval_unit_by_name("s").unwrap();
        assert_eq!(format_in_unit(1500.0, 500.0, seconds), "1.5s");
        assert_eq!(format_in_unit(20.0, 10.0, INTERVAL_UNITS[0]), "20ms");
        assert!(interval_unit_by_name("h").is_none());
    }

    #[test]
    fn timeline_for_trace_metadata() {
        let metadata = TraceMetadata {
            global_start: Some(1_000.0),
            global_end: Some(1_110.0),
            total_spans: 3,
            levels: 1,
        };
        let timeline = Timeline::from_metadata(&metadata, None).unwrap();
        assert_eq!(timeline.start, 1_000.0);
        assert_eq!(timeline.end, 1_110.0);
        assert_eq!(timeline.unit.name, "ms");
        assert_eq!(timeline.ticks.len(), 11);
        for (i, tick) in timeline.ticks.iter().enumerate() {
            approx::assert_relative_eq!(tick.offset, 10.0 * i as f64);
        }
        assert_eq!(timeline.ticks[0].label, "0ms");
        assert_eq!(timeline.ticks[10].label, "100ms");

        let seconds = interval_unit_by_name("s");
        let timeline = Timeline::from_metadata(&metadata, seconds).unwrap();
        assert_eq!(timeline.ticks[1].label, "0.01s");
        assert_eq!(timeline.ticks[10].label, "0.10s");

        assert!(Timeline::from_metadata(&TraceMetadata::default(), None).is_none());
    }

    #[test]
    fn global_start_label() {
        // 2021-01-01 15:04:05 UTC
        assert_eq!(format_global_start(1_609_513_445_000.0), "03:04:05 pm 01/01");
    }
}
