//! Per-run tallies and their plain-text rendering.

use std::{collections::BTreeMap, fmt::Write as _};

use crate::geocode::{GeocodeOutcome, GeocodeStatus};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub rows: usize,
    pub requests: u64,
    by_status: BTreeMap<GeocodeStatus, usize>,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &GeocodeOutcome) {
        self.rows += 1;
        self.requests += u64::from(outcome.attempts);
        *self.by_status.entry(outcome.status).or_default() += 1;
    }

    pub fn count(&self, status: GeocodeStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn succeeded(&self) -> usize {
        self.count(GeocodeStatus::Ok)
    }

    pub fn failed(&self) -> usize {
        self.rows - self.succeeded()
    }

    /// Status table with one line per status seen, in status order.
    pub fn render_table(&self) -> String {
        let headers = ["status", "rows", "share"];
        let body = self
            .by_status
            .iter()
            .map(|(status, count)| {
                let share = if self.rows == 0 {
                    0.0
                } else {
                    *count as f64 * 100.0 / self.rows as f64
                };
                [
                    status.as_str().to_string(),
                    count.to_string(),
                    format!("{share:.1}%"),
                ]
            })
            .collect::<Vec<_>>();

        let mut widths = headers.map(str::len);
        for line in &body {
            for (width, cell) in widths.iter_mut().zip(line) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let mut output = String::new();
        let _ = writeln!(
            output,
            "{:<w0$}  {:>w1$}  {:>w2$}",
            headers[0],
            headers[1],
            headers[2],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2]
        );
        let _ = writeln!(
            output,
            "{}  {}  {}",
            "-".repeat(widths[0]),
            "-".repeat(widths[1]),
            "-".repeat(widths[2])
        );
        for [status, count, share] in &body {
            let _ = writeln!(
                output,
                "{status:<w0$}  {count:>w1$}  {share:>w2$}",
                w0 = widths[0],
                w1 = widths[1],
                w2 = widths[2]
            );
        }
        output
    }
}
