//! The `geocode` command: load, select, geocode row by row, write.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use log::{debug, info};

use crate::{
    cli::GeocodeArgs,
    config::{GeocoderConfig, RetryPolicy},
    dataset::{AddressTable, LoadOptions},
    geocode::{GeocodeOutcome, Geocoder, GoogleGeocoder, geocode_address},
    io_utils,
    progress::ProgressReporter,
    range::RowRange,
    summary::RunSummary,
};

pub const LATITUDE_COLUMN: &str = "Latitude";
pub const LONGITUDE_COLUMN: &str = "Longitude";
pub const STATUS_COLUMN: &str = "Status";
pub const FORMATTED_ADDRESS_COLUMN: &str = "Formatted_Address";

/// Positions of the result columns inside an [`AddressTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultColumns {
    pub latitude: usize,
    pub longitude: usize,
    pub status: usize,
    pub formatted_address: Option<usize>,
}

impl ResultColumns {
    /// Reuses same-named columns already in the table, appends the rest.
    pub fn attach(table: &mut AddressTable, formatted_address: bool) -> Self {
        Self {
            latitude: table.ensure_column(LATITUDE_COLUMN),
            longitude: table.ensure_column(LONGITUDE_COLUMN),
            status: table.ensure_column(STATUS_COLUMN),
            formatted_address: formatted_address
                .then(|| table.ensure_column(FORMATTED_ADDRESS_COLUMN)),
        }
    }

    fn fill(&self, row: &mut [String], outcome: &GeocodeOutcome) {
        let (latitude, longitude) = match outcome.coordinates {
            Some(coords) => (coords.latitude().to_string(), coords.longitude().to_string()),
            None => (String::new(), String::new()),
        };
        row[self.latitude] = latitude;
        row[self.longitude] = longitude;
        row[self.status] = outcome.status.as_str().to_string();
        if let Some(idx) = self.formatted_address {
            row[idx] = outcome.formatted_address.clone().unwrap_or_default();
        }
    }
}

/// Geocodes every row of `table` in order, recording the outcome in the
/// result columns. Per-row failures land in the status column.
pub fn geocode_table<G>(
    table: &mut AddressTable,
    address_column: usize,
    columns: &ResultColumns,
    geocoder: &G,
    retry: &RetryPolicy,
    progress: &mut ProgressReporter,
) -> RunSummary
where
    G: Geocoder + ?Sized,
{
    let mut summary = RunSummary::default();
    for (idx, row) in table.rows.iter_mut().enumerate() {
        let address = row.get(address_column).map(String::as_str).unwrap_or("");
        let outcome = geocode_address(geocoder, address, retry);
        debug!("Row {}: {} ({} attempt(s))", idx, outcome.status, outcome.attempts);
        columns.fill(row, &outcome);
        progress.record(outcome.is_success());
        summary.record(&outcome);
    }
    progress.finish();
    summary
}

pub fn execute(args: &GeocodeArgs) -> Result<()> {
    let config = GeocoderConfig::from_args(&args.service)?;
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let output_path = args.output.as_deref();
    let output_delimiter =
        io_utils::resolve_output_delimiter(output_path, args.output_delimiter, delimiter);
    if args.summary && output_path.is_none_or(io_utils::is_dash) {
        return Err(anyhow!("--summary requires --output to name a file"));
    }

    info!(
        "Geocoding '{}' -> {} (delimiter '{}', output '{}')",
        args.input.display(),
        describe_output(output_path),
        crate::printable_delimiter(delimiter),
        crate::printable_delimiter(output_delimiter)
    );

    let options = LoadOptions {
        delimiter,
        has_headers: !args.no_headers,
        encoding,
    };
    let mut table = AddressTable::load(&args.input, &options)
        .with_context(|| format!("Loading addresses from {:?}", args.input))?;

    let range = RowRange::new(
        args.start,
        args.end,
        args.limit.map(|limit| usize::try_from(limit).unwrap_or(usize::MAX)),
    );
    let selected = range.resolve(table.len())?;
    if !range.is_unbounded() {
        info!(
            "Selected rows {}..{} of {}",
            selected.start,
            selected.end,
            table.len()
        );
    }
    table.retain_range(selected);

    let address_column = if table.headers.is_empty() {
        None
    } else {
        Some(table.resolve_address_column(args.address_column.as_deref())?)
    };

    let geocoder = GoogleGeocoder::new(&config).context("Building HTTP client")?;
    let mut writer = io_utils::open_csv_writer(output_path, output_delimiter)?;

    let summary = match address_column {
        Some(address_column) => {
            debug!(
                "Address column: {} ('{}')",
                address_column + 1,
                table.headers[address_column]
            );
            let columns = ResultColumns::attach(&mut table, args.formatted_address);
            let mut progress = if args.no_progress {
                ProgressReporter::hidden()
            } else {
                ProgressReporter::new(table.len())
            };
            geocode_table(
                &mut table,
                address_column,
                &columns,
                &geocoder,
                &config.retry,
                &mut progress,
            )
        }
        None => {
            info!("Input {:?} is empty; nothing to geocode", args.input);
            RunSummary::default()
        }
    };

    table
        .write_to(&mut writer)
        .with_context(|| format!("Writing {}", describe_output(output_path)))?;

    info!(
        "Geocoded {} row(s): {} succeeded, {} failed, {} request(s)",
        summary.rows,
        summary.succeeded(),
        summary.failed(),
        summary.requests
    );
    if args.summary {
        print!("{}", summary.render_table());
    }
    Ok(())
}

fn describe_output(path: Option<&Path>) -> String {
    path.filter(|p| !io_utils::is_dash(p))
        .map(|p| format!("{:?}", p.display().to_string()))
        .unwrap_or_else(|| "stdout".into())
}
