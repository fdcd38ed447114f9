use std::collections::HashMap;

use serde::Serialize;

use crate::model::VitalsEntry;
use crate::view::entry_time;

/// Plot-ready columns for a ledger. Unparsable readings become `0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub systolic: Vec<i64>,
    pub diastolic: Vec<i64>,
    pub sugar: Vec<f64>,
    pub pulse: Vec<f64>,
    pub weight: Vec<f64>,
}

impl ChartSeries {
    pub fn from_entries(entries: &[VitalsEntry]) -> Self {
        let mut series = ChartSeries::default();
        for entry in entries {
            let bp = if entry.bp.is_empty() { "0/0" } else { entry.bp.as_str() };
            let mut parts = bp.split('/');
            series.labels.push(date_label(entry.ts));
            series.systolic.push(parse_int_prefix(parts.next().unwrap_or("")));
            series.diastolic.push(parse_int_prefix(parts.next().unwrap_or("")));
            series.sugar.push(parse_float_prefix(&entry.sugar));
            series.pulse.push(parse_float_prefix(&entry.pulse));
            series.weight.push(parse_float_prefix(&entry.weight));
        }
        series
    }
}

fn date_label(ts: i64) -> String {
    entry_time(ts).format("%Y-%m-%d").to_string()
}

/// Leading optional sign and digits, as a browser's `parseInt` reads them.
pub fn parse_int_prefix(raw: &str) -> i64 {
    let s = raw.trim_start();
    let digits_from = usize::from(s.starts_with(['-', '+']));
    let end = s[digits_from..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(s.len(), |i| i + digits_from);
    s[..end].parse().unwrap_or(0)
}

/// Longest leading decimal literal with an optional exponent, as a
/// browser's `parseFloat` reads it. `Infinity` is not recognised.
pub fn parse_float_prefix(raw: &str) -> f64 {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let mut end = usize::from(s.starts_with(['-', '+']));
    let mut seen_digit = false;
    let mut seen_dot = false;
    while let Some(&b) = bytes.get(end) {
        match b {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }
    if !seen_digit {
        return 0.0;
    }
    // The exponent only counts when digits follow it.
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let digits = bytes[exp..].iter().take_while(|b| b.is_ascii_digit()).count();
        if digits > 0 {
            end = exp + digits;
        }
    }
    s[..end].parse().unwrap_or(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Canvas {
    #[serde(rename = "chartBP")]
    BloodPressure,
    #[serde(rename = "chartSugar")]
    Sugar,
    #[serde(rename = "chartPulse")]
    Pulse,
    #[serde(rename = "chartWeight")]
    Weight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub label: &'static str,
    pub data: Vec<f64>,
    pub color: &'static str,
}

/// One chart as handed to the browser's charting library.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub canvas: Canvas,
    pub kind: ChartKind,
    pub generation: u64,
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

/// Live chart per canvas. Regenerating disposes the old chart first.
#[derive(Debug, Default)]
pub struct ChartBoard {
    live: HashMap<Canvas, ChartSpec>,
    generation: u64,
    disposed: u64,
}

impl ChartBoard {
    pub fn regenerate(&mut self, entries: &[VitalsEntry]) -> Vec<ChartSpec> {
        let series = ChartSeries::from_entries(entries);
        self.generation += 1;
        let as_f64 = |v: &[i64]| v.iter().map(|&x| x as f64).collect::<Vec<_>>();

        let charts = vec![
            self.chart(
                Canvas::BloodPressure,
                ChartKind::Bar,
                &series.labels,
                vec![
                    Dataset { label: "Systolic", data: as_f64(&series.systolic), color: "rgba(255,90,149,0.9)" },
                    Dataset { label: "Diastolic", data: as_f64(&series.diastolic), color: "rgba(59,130,246,0.85)" },
                ],
            ),
            self.chart(
                Canvas::Sugar,
                ChartKind::Line,
                &series.labels,
                vec![Dataset { label: "Sugar (mg/dL)", data: series.sugar.clone(), color: "#16a34a" }],
            ),
            self.chart(
                Canvas::Pulse,
                ChartKind::Line,
                &series.labels,
                vec![Dataset { label: "Pulse (bpm)", data: series.pulse.clone(), color: "#f59e0b" }],
            ),
            self.chart(
                Canvas::Weight,
                ChartKind::Line,
                &series.labels,
                vec![Dataset { label: "Weight (kg)", data: series.weight.clone(), color: "#6366f1" }],
            ),
        ];

        for chart in &charts {
            if let Some(old) = self.live.insert(chart.canvas, chart.clone()) {
                self.disposed += 1;
                log::debug!("🗑️ Disposed {:?} chart generation {}", old.canvas, old.generation);
            }
        }
        charts
    }

    pub fn disposed(&self) -> u64 {
        self.disposed
    }

    pub fn live(&self, canvas: Canvas) -> Option<&ChartSpec> {
        self.live.get(&canvas)
    }

    fn chart(&self, canvas: Canvas, kind: ChartKind, labels: &[String], datasets: Vec<Dataset>) -> ChartSpec {
        ChartSpec {
            canvas,
            kind,
            generation: self.generation,
            labels: labels.to_vec(),
            datasets,
        }
    }
}
