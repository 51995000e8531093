//! Progress bar for the geocoding loop.
//!
//! Purely observational: nothing in here touches row data.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::debug;

pub struct ProgressReporter {
    progress_bar: Option<ProgressBar>,
    succeeded: usize,
    failed: usize,
}

impl ProgressReporter {
    /// A reporter drawing to stderr. indicatif hides the bar on its own when
    /// stderr is not a terminal.
    pub fn new(total_rows: usize) -> Self {
        let pb = ProgressBar::with_draw_target(
            Some(total_rows as u64),
            ProgressDrawTarget::stderr(),
        );
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} rows ({eta}) | {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        pb.set_message("Geocoding");
        debug!("Progress bar initialized for {total_rows} row(s)");
        Self {
            progress_bar: Some(pb),
            succeeded: 0,
            failed: 0,
        }
    }

    pub fn hidden() -> Self {
        Self {
            progress_bar: None,
            succeeded: 0,
            failed: 0,
        }
    }

    /// Records one finished row and refreshes the tally.
    pub fn record(&mut self, success: bool) {
        if success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        if let Some(ref pb) = self.progress_bar {
            pb.set_message(format!("{} ok, {} failed", self.succeeded, self.failed));
            pb.inc(1);
        }
    }

    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_with_message(format!(
                "Done: {} ok, {} failed",
                self.succeeded, self.failed
            ));
        }
    }
}
