//! Chart projection of the telemetry history
//!
//! Turns the aligned history into per-chart `(x, y)` point lists for the
//! renderer: x is the sample time in epoch seconds, y the metric value.
//! Absent values are dropped per series, so one sparse metric never thins
//! out the others.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::telemetry::TelemetrySnapshot;

/// Number of most recent samples drawn
pub const DEFAULT_CHART_WINDOW: usize = 100;

pub const NO_DATA_LABEL: &str = "NO DATA";

/// One chart of the dashboard and the metric it plots
#[derive(Debug, Clone, Copy)]
pub struct ChartSpec {
    pub title: &'static str,
    pub metric: &'static str,
    pub label: &'static str,
}

pub const DASHBOARD_CHARTS: [ChartSpec; 4] = [
    ChartSpec { title: "CPU Load", metric: "cpu_load", label: "CPU Load" },
    ChartSpec { title: "Memory Load", metric: "occupied_memory", label: "Occupied Memory" },
    ChartSpec { title: "GPU Load", metric: "gpu_load", label: "GPU Load" },
    ChartSpec { title: "GPU Memory Load", metric: "gpu_occupied_memory", label: "Occupied GPU Memory" },
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    /// Pen color for series drawn on this theme's background
    pub fn series_color(self) -> &'static str {
        match self {
            Theme::Dark => "white",
            Theme::Light => "black",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartSeries {
    Line { x: Vec<f64>, y: Vec<f64> },
    /// Single marker point at the origin
    NoData,
}

impl ChartSeries {
    pub fn points(&self) -> usize {
        match self {
            ChartSeries::Line { x, .. } => x.len(),
            ChartSeries::NoData => 0,
        }
    }
}

/// Everything the renderer needs to redraw one chart
#[derive(Debug, Clone, PartialEq)]
pub struct ChartFrame {
    pub title: &'static str,
    pub label: &'static str,
    pub color: &'static str,
    pub series: ChartSeries,
    /// Bottom axis caption, `Time (start to end)` when the window has samples
    pub axis_label: String,
}

impl ChartFrame {
    /// Label drawn next to the series, `NO DATA` for the marker point
    pub fn legend(&self) -> &'static str {
        match self.series {
            ChartSeries::Line { .. } => self.label,
            ChartSeries::NoData => NO_DATA_LABEL,
        }
    }
}

/// Chart drawing backend
pub trait ChartRenderer {
    fn draw(&mut self, frame: &ChartFrame);
}

/// Parse an ISO-8601 timestamp into epoch seconds; naive times are local
pub fn parse_timestamp(raw: &str) -> Option<f64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_micros() as f64 / 1e6);
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|dt| dt.timestamp_micros() as f64 / 1e6)
}

/// Pair up timestamps and values, keeping points where both are present
pub fn project_series(x: &[Option<f64>], y: &[Option<f64>]) -> ChartSeries {
    let (x, y): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .unzip();
    if x.is_empty() {
        ChartSeries::NoData
    } else {
        ChartSeries::Line { x, y }
    }
}

/// Frames for the four dashboard charts over the last `limit` samples
pub fn project_charts(snapshot: &TelemetrySnapshot, limit: usize, theme: Theme) -> Vec<ChartFrame> {
    let start = snapshot.len().saturating_sub(limit);
    let x: Vec<Option<f64>> = snapshot.timestamps[start..]
        .iter()
        .map(|ts| parse_timestamp(ts))
        .collect();
    let axis_label = axis_label(&x);

    DASHBOARD_CHARTS
        .iter()
        .map(|spec| {
            let series = match snapshot.series(spec.metric) {
                Some(values) => project_series(&x, &values[start..]),
                None => ChartSeries::NoData,
            };
            ChartFrame {
                title: spec.title,
                label: spec.label,
                color: theme.series_color(),
                series,
                axis_label: axis_label.clone(),
            }
        })
        .collect()
}

fn axis_label(x: &[Option<f64>]) -> String {
    let mut times = x.iter().flatten();
    let first = times.next().copied();
    let last = times.last().copied().or(first);
    match (first.and_then(format_local), last.and_then(format_local)) {
        (Some(start), Some(end)) => format!("Time ({} to {})", start, end),
        _ => "Time".to_string(),
    }
}

fn format_local(secs: f64) -> Option<String> {
    Local
        .timestamp_opt(secs.floor() as i64, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
}
