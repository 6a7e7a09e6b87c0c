//! SVG charts
//!
//! Two views over the store:
//! - a time cactus plot: per mode, the sorted log-times of every benchmark
//!   that finished, followed by a dashed tail of timed-out benchmarks drawn
//!   at log(timeout);
//! - a grouped bar chart of log10 artifact size per benchmark and mode.

use crate::harness::{Field, Mode, ResultDocument};
use std::fmt::Write as _;

const PALETTE: [&str; 9] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22",
];

const WIDTH: f64 = 960.0;
const HEIGHT: f64 = 600.0;
const MARGIN: f64 = 60.0;

/// Points for one mode of the cactus plot
#[derive(Debug, Clone, PartialEq)]
pub struct CactusSeries {
    pub mode: Mode,
    /// `(x, ln seconds)` for finished benchmarks, ascending
    pub finished: Vec<(f64, f64)>,
    /// Starts at the last finished point, then one point per timeout
    pub timed_out: Vec<(f64, f64)>,
}

/// Bars for one mode of the size chart, in benchmark order
#[derive(Debug, Clone, PartialEq)]
pub struct SizeSeries {
    pub mode: Mode,
    pub log10_sizes: Vec<f64>,
}

pub fn cactus_series(document: &ResultDocument, modes: &[Mode]) -> Vec<CactusSeries> {
    let results = &document.results;
    modes
        .iter()
        .map(|mode| {
            let mut finished = Vec::new();
            let mut timeouts = 0usize;
            for bench in results.benchmarks() {
                match results.get(bench, Field::Time, *mode).measurement() {
                    Some(m) if m.as_f64() > 0.0 => finished.push(m.as_f64().ln()),
                    _ => timeouts += 1,
                }
            }
            finished.sort_by(|a, b| a.total_cmp(b));

            let finished: Vec<(f64, f64)> = finished
                .into_iter()
                .enumerate()
                .map(|(i, y)| (i as f64, y))
                .collect();

            let mut timed_out = Vec::new();
            if let Some(limit) = document.timeout_for(*mode).filter(|t| *t > 0) {
                if timeouts > 0 {
                    timed_out.extend(finished.last().copied());
                    let start = finished.len().saturating_sub(1);
                    let y = (limit as f64).ln();
                    let offset = usize::from(!finished.is_empty());
                    timed_out.extend((0..timeouts).map(|i| ((start + i + offset) as f64, y)));
                }
            }

            CactusSeries {
                mode: *mode,
                finished,
                timed_out,
            }
        })
        .collect()
}

pub fn size_series(document: &ResultDocument, modes: &[Mode]) -> Vec<SizeSeries> {
    let results = &document.results;
    modes
        .iter()
        .map(|mode| SizeSeries {
            mode: *mode,
            log10_sizes: results
                .benchmarks()
                .map(|bench| match results.get(bench, Field::Size, *mode).measurement() {
                    Some(m) if m.as_f64() > 0.0 => m.as_f64().log10(),
                    _ => 0.0,
                })
                .collect(),
        })
        .collect()
}

/// Linear map from data space to the plot area
struct Frame {
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

impl Frame {
    fn new(x_max: f64, y_min: f64, y_max: f64) -> Self {
        let (y_min, y_max) = if y_max - y_min < f64::EPSILON {
            (y_min - 1.0, y_max + 1.0)
        } else {
            (y_min, y_max)
        };
        Self {
            x_max: x_max.max(1.0),
            y_min,
            y_max,
        }
    }

    fn x(&self, x: f64) -> f64 {
        MARGIN + x / self.x_max * (WIDTH - 2.0 * MARGIN)
    }

    fn y(&self, y: f64) -> f64 {
        HEIGHT - MARGIN - (y - self.y_min) / (self.y_max - self.y_min) * (HEIGHT - 2.0 * MARGIN)
    }
}

fn open_svg(out: &mut String, x_label: &str, y_label: &str) {
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" font-family="sans-serif" font-size="12">"#
    );
    let _ = writeln!(out, r#"<rect width="100%" height="100%" fill="white"/>"#);
    let _ = writeln!(
        out,
        r#"<line x1="{m}" y1="{b}" x2="{r}" y2="{b}" stroke="black"/><line x1="{m}" y1="{m}" x2="{m}" y2="{b}" stroke="black"/>"#,
        m = MARGIN,
        b = HEIGHT - MARGIN,
        r = WIDTH - MARGIN,
    );
    let _ = writeln!(
        out,
        r#"<text x="{}" y="{}" text-anchor="middle">{}</text>"#,
        WIDTH / 2.0,
        HEIGHT - 15.0,
        x_label
    );
    let _ = writeln!(
        out,
        r#"<text x="15" y="{y}" text-anchor="middle" transform="rotate(-90 15 {y})">{label}</text>"#,
        y = HEIGHT / 2.0,
        label = y_label
    );
}

fn legend(out: &mut String, modes: &[Mode]) {
    for (i, mode) in modes.iter().enumerate() {
        let y = MARGIN + 18.0 * i as f64;
        let _ = writeln!(
            out,
            r#"<rect x="{x}" y="{y}" width="12" height="12" fill="{c}"/><text x="{tx}" y="{ty}">{label}</text>"#,
            x = WIDTH - MARGIN - 130.0,
            c = PALETTE[i % PALETTE.len()],
            tx = WIDTH - MARGIN - 112.0,
            ty = y + 10.0,
            label = mode.label(),
        );
    }
}

fn polyline(out: &mut String, frame: &Frame, points: &[(f64, f64)], color: &str, dashed: bool) {
    if points.is_empty() {
        return;
    }
    let coords: Vec<String> = points
        .iter()
        .map(|(x, y)| format!("{:.1},{:.1}", frame.x(*x), frame.y(*y)))
        .collect();
    let dash = if dashed { r#" stroke-dasharray="6 4""# } else { "" };
    let _ = writeln!(
        out,
        r#"<polyline points="{}" fill="none" stroke="{}"{}/>"#,
        coords.join(" "),
        color,
        dash
    );
}

/// Cactus plot of elapsed time, log scale
pub fn render_time_cactus(document: &ResultDocument, modes: &[Mode]) -> String {
    let series = cactus_series(document, modes);
    let all_points = series
        .iter()
        .flat_map(|s| s.finished.iter().chain(s.timed_out.iter()));
    let (x_max, y_min, y_max) = all_points.fold(
        (0.0f64, f64::INFINITY, f64::NEG_INFINITY),
        |(xm, lo, hi), (x, y)| (xm.max(*x), lo.min(*y), hi.max(*y)),
    );
    let frame = if y_min.is_finite() {
        Frame::new(x_max, y_min, y_max)
    } else {
        Frame::new(1.0, 0.0, 1.0)
    };

    let mut out = String::new();
    open_svg(&mut out, "Benchmarks", "Time (log s)");
    for (i, s) in series.iter().enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        polyline(&mut out, &frame, &s.finished, color, false);
        for (x, y) in &s.finished {
            let _ = writeln!(
                out,
                r#"<circle cx="{:.1}" cy="{:.1}" r="3" fill="{}"/>"#,
                frame.x(*x),
                frame.y(*y),
                color
            );
        }
        polyline(&mut out, &frame, &s.timed_out, color, true);
        for (x, y) in s.timed_out.iter().skip(usize::from(!s.finished.is_empty())) {
            let (cx, cy) = (frame.x(*x), frame.y(*y));
            let _ = writeln!(
                out,
                r#"<path d="M{} {} L{} {} M{} {} L{} {}" stroke="{}"/>"#,
                cx - 4.0, cy - 4.0, cx + 4.0, cy + 4.0, cx - 4.0, cy + 4.0, cx + 4.0, cy - 4.0, color
            );
        }
    }
    legend(&mut out, modes);
    out.push_str("</svg>\n");
    out
}

/// Grouped bars of artifact size per benchmark, log10 scale
pub fn render_size_bars(document: &ResultDocument, modes: &[Mode]) -> String {
    let series = size_series(document, modes);
    let names: Vec<&str> = document.results.benchmarks().collect();
    let y_max = series
        .iter()
        .flat_map(|s| s.log10_sizes.iter().copied())
        .fold(1.0f64, f64::max);
    let frame = Frame::new(names.len() as f64, 0.0, y_max);

    let group = (WIDTH - 2.0 * MARGIN) / names.len().max(1) as f64;
    let bar = group * 0.8 / modes.len().max(1) as f64;

    let mut out = String::new();
    open_svg(&mut out, "Benchmarks", "Size (log10)");
    for (i, s) in series.iter().enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        for (j, value) in s.log10_sizes.iter().enumerate() {
            let x = MARGIN + group * j as f64 + group * 0.1 + bar * i as f64;
            let top = frame.y(*value);
            let _ = writeln!(
                out,
                r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}"/>"#,
                x,
                top,
                bar,
                (HEIGHT - MARGIN - top).max(0.0),
                color
            );
        }
    }
    for (j, name) in names.iter().enumerate() {
        let x = MARGIN + group * (j as f64 + 0.5);
        let y = HEIGHT - MARGIN + 12.0;
        let stem = xml_escape(name.split('.').next().unwrap_or(name));
        let _ = writeln!(
            out,
            r#"<text x="{x:.1}" y="{y:.1}" text-anchor="start" transform="rotate(45 {x:.1} {y:.1})">{stem}</text>"#
        );
    }
    legend(&mut out, modes);
    out.push_str("</svg>\n");
    out
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
