//! MB-013: Chart data and terminal charts for a run history.
//!
//! Two views, both against `Time / 60` in minutes:
//! - every key ending in `.PV` as a process-value trace
//! - every key starting with `Shutter.` as a gate timeline, scaled by
//!   `0.9 + i / 20` so stacked gates stay visually apart
//!
//! Charts draw with Unicode blocks, or plain ASCII when the terminal does
//! not advertise UTF-8.

use crate::core::error::{Result, SimError};
use crate::core::store::{SHUTTER_PREFIX, TIME_KEY};
use crate::core::types::History;
use std::fmt::Write as _;
use std::io::{BufWriter, Write};
use std::path::Path;

const PV_SUFFIX: &str = ".PV";
const BLOCKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const ASCII_LEVELS: [char; 8] = ['_', '.', '-', '~', '=', '+', '*', '#'];

/// One plotted trace: `(minutes, value)` points.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub key: String,
    pub points: Vec<(f64, f64)>,
}

impl Series {
    pub fn min(&self) -> Option<f64> {
        self.points.iter().map(|p| p.1).reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.points.iter().map(|p| p.1).reduce(f64::max)
    }
}

/// Keys in order of first appearance across the history.
fn keys_matching(history: &History, pred: impl Fn(&str) -> bool) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for snap in history {
        for key in snap.keys() {
            if pred(key) && !keys.contains(key) {
                keys.push(key.clone());
            }
        }
    }
    keys
}

fn minutes(snap: &crate::core::types::Snapshot) -> f64 {
    snap.get(TIME_KEY).map_or(0.0, |t| t.as_f64()) / 60.0
}

fn collect(history: &History, key: &str, scale: f64) -> Series {
    Series {
        key: key.to_string(),
        points: history
            .iter()
            .filter_map(|snap| snap.get(key).map(|v| (minutes(snap), v.as_f64() * scale)))
            .collect(),
    }
}

/// Process-value traces.
pub fn pv_series(history: &History) -> Vec<Series> {
    keys_matching(history, |k| k.ends_with(PV_SUFFIX))
        .iter()
        .map(|k| collect(history, k, 1.0))
        .collect()
}

/// Gate timelines, offset per gate.
pub fn shutter_series(history: &History) -> Vec<Series> {
    keys_matching(history, |k| k.starts_with(SHUTTER_PREFIX))
        .iter()
        .enumerate()
        .map(|(i, k)| collect(history, k, 0.9 + i as f64 / 20.0))
        .collect()
}

/// Write both views as one CSV table, first column `TimeInMin`.
pub fn write_csv(path: &Path, history: &History) -> Result<()> {
    let pv = keys_matching(history, |k| k.ends_with(PV_SUFFIX));
    let gates = keys_matching(history, |k| k.starts_with(SHUTTER_PREFIX));

    let file = std::fs::File::create(path).map_err(|e| SimError::io(path, e))?;
    let mut out = BufWriter::new(file);
    let mut write_all = || -> std::io::Result<()> {
        let header: Vec<&str> = std::iter::once("TimeInMin")
            .chain(pv.iter().map(String::as_str))
            .chain(gates.iter().map(String::as_str))
            .collect();
        writeln!(out, "{}", header.join(","))?;

        for snap in history {
            let mut row = vec![minutes(snap).to_string()];
            for key in &pv {
                row.push(snap.get(key).map(|v| v.as_f64().to_string()).unwrap_or_default());
            }
            for (i, key) in gates.iter().enumerate() {
                let offset = 0.9 + i as f64 / 20.0;
                row.push(
                    snap.get(key)
                        .map(|v| (v.as_f64() * offset).to_string())
                        .unwrap_or_default(),
                );
            }
            writeln!(out, "{}", row.join(","))?;
        }
        out.flush()
    };
    write_all().map_err(|e| SimError::io(path, e))
}

/// Glyph set used for charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartStyle {
    Blocks,
    Ascii,
}

impl ChartStyle {
    /// Blocks when the locale advertises UTF-8, ASCII otherwise.
    pub fn detect() -> Self {
        let utf8 = ["LC_ALL", "LC_CTYPE", "LANG"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|v| !v.is_empty())
            .is_some_and(|v| {
                let v = v.to_ascii_lowercase();
                v.contains("utf-8") || v.contains("utf8")
            });
        if utf8 {
            Self::Blocks
        } else {
            Self::Ascii
        }
    }

    fn levels(&self) -> &'static [char; 8] {
        match self {
            Self::Blocks => &BLOCKS,
            Self::Ascii => &ASCII_LEVELS,
        }
    }

    fn gate(&self, open: bool) -> char {
        match (self, open) {
            (Self::Blocks, true) => '█',
            (Self::Blocks, false) => '·',
            (Self::Ascii, true) => '#',
            (Self::Ascii, false) => '.',
        }
    }
}

/// Split `n` samples into at most `width` contiguous buckets.
fn buckets(n: usize, width: usize) -> Vec<std::ops::Range<usize>> {
    let width = width.max(1).min(n);
    (0..width)
        .map(|b| (b * n / width)..((b + 1) * n / width))
        .collect()
}

fn sparkline(series: &Series, width: usize, style: ChartStyle) -> String {
    let (Some(lo), Some(hi)) = (series.min(), series.max()) else {
        return String::new();
    };
    let levels = style.levels();
    buckets(series.points.len(), width)
        .into_iter()
        .map(|r| {
            let bucket = &series.points[r];
            let mean = bucket.iter().map(|p| p.1).sum::<f64>() / bucket.len() as f64;
            if hi > lo {
                let idx = ((mean - lo) / (hi - lo) * 7.0).round() as usize;
                levels[idx.min(7)]
            } else {
                levels[3]
            }
        })
        .collect()
}

fn timeline(series: &Series, width: usize, style: ChartStyle) -> String {
    buckets(series.points.len(), width)
        .into_iter()
        .map(|r| style.gate(series.points[r].iter().any(|p| p.1 > 0.0)))
        .collect()
}

/// Render both views as text, `width` columns of chart per row.
pub fn render(history: &History, style: ChartStyle, width: usize) -> String {
    if history.is_empty() {
        return "Nothing to plot: the recipe never waited.\n".to_string();
    }
    let pv = pv_series(history);
    let gates = shutter_series(history);
    let label_width = pv
        .iter()
        .chain(gates.iter())
        .map(|s| s.key.len())
        .max()
        .unwrap_or(0);
    let end = history.last().map_or(0.0, minutes);

    let mut out = String::new();
    let _ = writeln!(out, "Process values (min .. max), 0 to {:.1} min", end);
    for s in &pv {
        let _ = writeln!(
            out,
            "  {:<lw$}  {:>8.1} {} {:<8.1}",
            s.key,
            s.min().unwrap_or(0.0),
            sparkline(s, width, style),
            s.max().unwrap_or(0.0),
            lw = label_width
        );
    }
    let _ = writeln!(out, "Shutters");
    for s in &gates {
        let _ = writeln!(
            out,
            "  {:<lw$}  {:>8} {}",
            s.key,
            "",
            timeline(s, width, style),
            lw = label_width
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SimConfig;
    use crate::core::executor::simulate;
    use crate::core::recipe::parse_recipe_text;

    fn run(text: &str) -> History {
        let program = parse_recipe_text("t", text).parse().unwrap();
        simulate(&program, &SimConfig::default()).unwrap().history
    }

    #[test]
    fn test_mb013_pv_series() {
        let h = run("Set Ga.PV.TSP = 560\nWait 1 min\n");
        let series = pv_series(&h);
        let keys: Vec<_> = series.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["Manip.PV", "Ga.PV", "In.PV", "As.PV", "AsCracker.PV", "Sb.PV", "SbCracker.PV", "Al.PV"]
        );
        let ga = &series[1];
        assert_eq!(ga.points.len(), 60);
        assert_eq!(ga.points[0], (1.0 / 60.0, 550.5));
        assert_eq!(ga.points[59], (1.0, 560.0));
        assert_eq!(ga.min(), Some(550.5));
        assert_eq!(ga.max(), Some(560.0));
    }

    #[test]
    fn test_mb013_shutter_offsets() {
        let h = run("Open In, Ga\nWait 2 s\n");
        let gates = shutter_series(&h);
        assert_eq!(gates[0].key, "Shutter.In");
        assert_eq!(gates[0].points[0].1, 0.9);
        assert_eq!(gates[1].key, "Shutter.Ga");
        assert_eq!(gates[1].points[0].1, 0.9 + 1.0 / 20.0);
        // Closed gates sit at zero
        assert_eq!(gates[2].points[0].1, 0.0);
    }

    #[test]
    fn test_mb013_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series.csv");
        let h = run("Open Ga\nWait 3 s\n");
        write_csv(&path, &h).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("TimeInMin,Manip.PV,Ga.PV"));
        assert!(lines[0].contains("Shutter.Ga"));
        let cols = lines[0].split(',').count();
        assert!(lines[1..].iter().all(|l| l.split(',').count() == cols));
        assert!(lines[3].starts_with("0.05,"));
    }

    #[test]
    fn test_mb013_render_empty() {
        let text = render(&History::new(), ChartStyle::Blocks, 40);
        assert!(text.contains("Nothing to plot"));
    }

    #[test]
    fn test_mb013_render_styles() {
        let h = run("Set Ga.PV.TSP = 600\nOpen Ga\nWait 100 s\nClose Ga\nWait 100 s\n");
        let blocks = render(&h, ChartStyle::Blocks, 20);
        assert!(blocks.contains('█'));
        assert!(blocks.contains("Shutter.Ga"));
        assert!(blocks.contains("0 to 3.3 min"));

        let ascii = render(&h, ChartStyle::Ascii, 20);
        assert!(ascii.is_ascii());
        let ga_gate = ascii.lines().find(|l| l.contains("Shutter.Ga")).unwrap();
        assert!(ga_gate.ends_with("##########.........."));
    }

    #[test]
    fn test_mb013_buckets() {
        assert_eq!(buckets(10, 5), vec![0..2, 2..4, 4..6, 6..8, 8..10]);
        assert_eq!(buckets(3, 10), vec![0..1, 1..2, 2..3]);
        assert_eq!(buckets(7, 2), vec![0..3, 3..7]);
    }
}
