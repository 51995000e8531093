//! In-memory address table: loading, column lookup and writing.

use std::{io::Write, path::Path};

use anyhow::{Context, Result, anyhow};
use encoding_rs::Encoding;
use log::debug;

use crate::io_utils;

const ADDRESS_HEADER_CANDIDATES: &[&str] = &["address", "address_text", "full_address"];

#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub delimiter: u8,
    pub has_headers: bool,
    pub encoding: &'static Encoding,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub has_headers: bool,
}

impl AddressTable {
    pub fn load(path: &Path, options: &LoadOptions) -> Result<Self> {
        let mut reader =
            io_utils::open_csv_reader_from_path(path, options.delimiter, options.has_headers)?;
        let mut headers = if options.has_headers {
            io_utils::reader_headers(&mut reader, options.encoding)
                .with_context(|| format!("Reading headers from {path:?}"))?
        } else {
            Vec::new()
        };

        let first_data_line = if options.has_headers { 2 } else { 1 };
        let mut rows = Vec::new();
        for (idx, record) in reader.byte_records().enumerate() {
            let line = idx + first_data_line;
            let record = record.with_context(|| format!("Reading row {line} in {path:?}"))?;
            let decoded = io_utils::decode_record(&record, options.encoding)
                .with_context(|| format!("Decoding row {line} in {path:?}"))?;
            rows.push(decoded);
        }

        if !options.has_headers {
            let width = rows.first().map(Vec::len).unwrap_or(0);
            headers = synthesize_headers(width);
        }
        debug!(
            "Loaded {} row(s) x {} column(s) from {:?}",
            rows.len(),
            headers.len(),
            path
        );

        Ok(Self {
            headers,
            rows,
            has_headers: options.has_headers,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Finds the address column from an explicit name/position or by
    /// recognising a conventional header.
    pub fn resolve_address_column(&self, requested: Option<&str>) -> Result<usize> {
        if let Some(requested) = requested.map(str::trim).filter(|r| !r.is_empty()) {
            return self.resolve_column(requested);
        }
        if self.has_headers {
            return ADDRESS_HEADER_CANDIDATES
                .iter()
                .find_map(|candidate| {
                    self.headers
                        .iter()
                        .position(|header| normalize_header(header) == *candidate)
                })
                .ok_or_else(|| {
                    anyhow!(
                        "No address column found in headers {:?}; use --address-column",
                        self.headers
                    )
                });
        }
        match self.headers.len() {
            0 => Err(anyhow!("Input has no columns")),
            1 => Ok(0),
            _ => Ok(1),
        }
    }

    /// Resolves a header name (case-insensitive) or 1-based position.
    pub fn resolve_column(&self, requested: &str) -> Result<usize> {
        if let Some(idx) = self
            .headers
            .iter()
            .position(|header| header.trim().eq_ignore_ascii_case(requested))
        {
            return Ok(idx);
        }
        if let Ok(position) = requested.parse::<usize>() {
            if (1..=self.headers.len()).contains(&position) {
                return Ok(position - 1);
            }
            return Err(anyhow!(
                "Column position {position} is out of range for {} column(s)",
                self.headers.len()
            ));
        }
        Err(anyhow!(
            "Column '{requested}' not found in headers {:?}",
            self.headers
        ))
    }

    /// Returns the index of `name`, appending an empty column when absent.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self
            .headers
            .iter()
            .position(|header| header.trim().eq_ignore_ascii_case(name))
        {
            return idx;
        }
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
        self.headers.len() - 1
    }

    /// Keeps only the rows inside `range`, preserving their order.
    pub fn retain_range(&mut self, range: std::ops::Range<usize>) {
        self.rows.truncate(range.end);
        self.rows.drain(..range.start);
    }

    pub fn write(&self, path: Option<&Path>, delimiter: u8) -> Result<()> {
        let mut writer = io_utils::open_csv_writer(path, delimiter)?;
        self.write_to(&mut writer)
    }

    pub fn write_to<W: Write>(&self, writer: &mut csv::Writer<W>) -> Result<()> {
        if self.has_headers && !self.headers.is_empty() {
            writer
                .write_record(self.headers.iter())
                .with_context(|| "Writing output headers")?;
        }
        for (idx, row) in self.rows.iter().enumerate() {
            writer
                .write_record(row.iter())
                .with_context(|| format!("Writing output row {}", idx + 1))?;
        }
        writer.flush().with_context(|| "Flushing output")?;
        Ok(())
    }
}

fn synthesize_headers(width: usize) -> Vec<String> {
    (1..=width).map(|idx| format!("column_{idx}")).collect()
}

fn normalize_header(header: &str) -> String {
    header
        .trim()
        .chars()
        .map(|ch| match ch {
            ' ' | '-' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}
