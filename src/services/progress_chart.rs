use std::fmt::Write as _;

use time::OffsetDateTime;

use crate::core::time::format_day_month;
use crate::models::Analysis;

pub(crate) const PLACEHOLDER: &str = "No historical data available to plot.";

const WIDTH: f64 = 600.0;
const HEIGHT: f64 = 240.0;
const PADDING: f64 = 36.0;
const MAX_TICKS: usize = 6;
const GRID_LINES: [f64; 5] = [0.0, 25.0, 50.0, 75.0, 100.0];

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ChartPoint {
    pub(crate) at: OffsetDateTime,
    pub(crate) error_percentage: f64,
}

impl ChartPoint {
    /// Turns a most-recent-first history into an ascending series, skipping
    /// entries without a timestamp.
    pub(crate) fn from_history(history: &[Analysis]) -> Vec<Self> {
        history
            .iter()
            .rev()
            .filter_map(|analysis| {
                analysis.timestamp.map(|at| Self { at, error_percentage: analysis.data.error_percentage })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Tick {
    pub(crate) index: usize,
    pub(crate) x: f64,
    pub(crate) label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ChartPlot {
    pub(crate) path: String,
    pub(crate) points: Vec<(f64, f64)>,
    pub(crate) ticks: Vec<Tick>,
    pub(crate) svg: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ChartOutput {
    Placeholder(&'static str),
    Plot(ChartPlot),
}

impl ChartOutput {
    pub(crate) fn markup(&self) -> &str {
        match self {
            Self::Placeholder(text) => text,
            Self::Plot(plot) => &plot.svg,
        }
    }
}

struct Scale {
    min_x: f64,
    span_x: f64,
    min_y: f64,
    span_y: f64,
}

impl Scale {
    fn new(points: &[(f64, f64)]) -> Self {
        let min_x = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
        let max_x = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
        let low_y = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let high_y = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);

        let min_y = (low_y - 5.0).max(0.0);
        let max_y = (high_y + 5.0).min(100.0);

        Self { min_x, span_x: non_zero(max_x - min_x), min_y, span_y: non_zero(max_y - min_y) }
    }

    fn x(&self, value: f64) -> f64 {
        PADDING + ((value - self.min_x) / self.span_x) * (WIDTH - PADDING * 2.0)
    }

    fn y(&self, value: f64) -> f64 {
        HEIGHT - PADDING - ((value - self.min_y) / self.span_y) * (HEIGHT - PADDING * 2.0)
    }
}

fn non_zero(span: f64) -> f64 {
    if span == 0.0 || !span.is_finite() {
        1.0
    } else {
        span
    }
}

/// Evenly spaced, deduplicated tick indexes; the first and last point are
/// always included.
pub(crate) fn tick_indexes(len: usize) -> Vec<usize> {
    let max_ticks = MAX_TICKS.min(len);
    if len <= max_ticks {
        return (0..len).collect();
    }

    let mut ticks: Vec<usize> = (0..max_ticks)
        .map(|t| ((t * (len - 1)) as f64 / (max_ticks - 1) as f64).round() as usize)
        .collect();
    ticks.dedup();
    ticks
}

pub(crate) fn render(points: &[ChartPoint]) -> ChartOutput {
    if points.is_empty() {
        return ChartOutput::Placeholder(PLACEHOLDER);
    }

    let raw: Vec<(f64, f64)> = points
        .iter()
        .map(|point| ((point.at.unix_timestamp_nanos() / 1_000_000) as f64, point.error_percentage))
        .collect();
    let scale = Scale::new(&raw);

    let scaled: Vec<(f64, f64)> = raw.iter().map(|(x, y)| (scale.x(*x), scale.y(*y))).collect();
    let path = scaled
        .iter()
        .enumerate()
        .map(|(index, (x, y))| format!("{} {} {}", if index == 0 { "M" } else { "L" }, coord(*x), coord(*y)))
        .collect::<Vec<_>>()
        .join(" ");

    let ticks: Vec<Tick> = tick_indexes(points.len())
        .into_iter()
        .map(|index| Tick { index, x: scaled[index].0, label: format_day_month(points[index].at) })
        .collect();

    let svg = svg_markup(&scale, &path, &scaled, &ticks);

    ChartOutput::Plot(ChartPlot { path, points: scaled, ticks, svg })
}

fn svg_markup(scale: &Scale, path: &str, points: &[(f64, f64)], ticks: &[Tick]) -> String {
    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}" width="100%" height="{h}">"#,
        w = WIDTH,
        h = HEIGHT
    );

    for grid in GRID_LINES {
        let y = coord(scale.y(grid));
        let _ = writeln!(
            svg,
            r##"  <line x1="{x1}" x2="{x2}" y1="{y}" y2="{y}" stroke="#6b7280" stroke-opacity="0.08"/>"##,
            x1 = PADDING,
            x2 = WIDTH - PADDING
        );
    }

    let _ = writeln!(
        svg,
        r##"  <path d="{path}" fill="none" stroke="#2563eb" stroke-width="2.5" stroke-linecap="round" stroke-linejoin="round"/>"##
    );

    for (x, y) in points {
        let _ = writeln!(
            svg,
            r##"  <circle cx="{}" cy="{}" r="4" fill="white" stroke="#2563eb" stroke-width="2"/>"##,
            coord(*x),
            coord(*y)
        );
    }

    let baseline = HEIGHT - 6.0;
    for tick in ticks {
        let x = coord(tick.x);
        let _ = writeln!(
            svg,
            r##"  <line x1="{x}" x2="{x}" y1="{bottom}" y2="{top}" stroke="#6b7280" stroke-opacity="0.02"/>"##,
            bottom = HEIGHT - PADDING,
            top = PADDING
        );
        let _ = writeln!(
            svg,
            r##"  <text x="{x}" y="{baseline}" font-size="11" fill="#666" text-anchor="end" transform="rotate(-30 {x} {baseline})">{label}</text>"##,
            label = tick.label
        );
    }

    svg.push_str("</svg>\n");
    svg
}

fn coord(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded}")
}
