//! Row range selection.
//!
//! A [`RowRange`] restricts geocoding to a contiguous slice of the input.
//! Indices outside the table are rejected instead of clamped so a typo never
//! turns into a silently partial run.

use std::ops::Range;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("--start {start} is out of range for {rows} row(s)")]
    StartOutOfBounds { start: usize, rows: usize },
    #[error("--end {end} is out of range for {rows} row(s)")]
    EndOutOfBounds { end: usize, rows: usize },
    #[error("--start {start} is greater than --end {end}")]
    Inverted { start: usize, end: usize },
    #[error("--limit {limit} from row {start} exceeds the {rows} available row(s)")]
    LimitOutOfBounds { start: usize, limit: usize, rows: usize },
    #[error("--end and --limit cannot be used together")]
    EndAndLimit,
    #[error("--limit must be greater than zero")]
    ZeroLimit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowRange {
    pub start: Option<usize>,
    pub end: Option<usize>,
    pub limit: Option<usize>,
}

impl RowRange {
    pub fn new(start: Option<usize>, end: Option<usize>, limit: Option<usize>) -> Self {
        Self { start, end, limit }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none() && self.limit.is_none()
    }

    /// Resolves the selection against a table of `rows` rows.
    pub fn resolve(&self, rows: usize) -> Result<Range<usize>, RangeError> {
        if self.end.is_some() && self.limit.is_some() {
            return Err(RangeError::EndAndLimit);
        }
        if self.limit == Some(0) {
            return Err(RangeError::ZeroLimit);
        }

        let start = match self.start {
            Some(start) if start >= rows => {
                return Err(RangeError::StartOutOfBounds { start, rows });
            }
            Some(start) => start,
            None => 0,
        };

        let end = match (self.end, self.limit) {
            (Some(end), _) if end > rows => return Err(RangeError::EndOutOfBounds { end, rows }),
            (Some(end), _) if end < start => return Err(RangeError::Inverted { start, end }),
            (Some(end), _) => end,
            (None, Some(limit)) => match start.checked_add(limit) {
                Some(end) if end <= rows => end,
                _ => return Err(RangeError::LimitOutOfBounds { start, limit, rows }),
            },
            (None, None) => rows,
        };

        Ok(start..end)
    }
}
