//! The `normalize` command: turn component address columns into one
//! free-text address per row.
//!
//! Output has two columns, `Index` and `Address`, which `geocode` picks up
//! without further flags.

use std::sync::OnceLock;

use anyhow::{Context, Result};
use log::info;
use regex::Regex;

use crate::{
    cli::NormalizeArgs,
    dataset::{AddressTable, LoadOptions},
    io_utils,
};

/// The pieces of one postal address, any of which may be blank.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AddressParts<'a> {
    pub street: &'a str,
    pub city: &'a str,
    pub state: &'a str,
    pub postal_code: &'a str,
    pub country: &'a str,
}

/// Joins parts as `street, city, state postal, country`, skipping blanks.
pub fn compose_address(parts: &AddressParts<'_>) -> String {
    let mut result = String::new();
    let postal = parts.postal_code.split('-').next().unwrap_or("");
    for (separator, piece) in [
        (", ", parts.street),
        (", ", parts.city),
        (", ", parts.state),
        (" ", postal),
        (", ", parts.country),
    ] {
        let piece = collapse_whitespace(piece);
        if piece.is_empty() {
            continue;
        }
        if !result.is_empty() {
            result.push_str(separator);
        }
        result.push_str(&piece);
    }
    result
}

fn collapse_whitespace(value: &str) -> String {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    let re = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"));
    re.replace_all(value.trim(), " ").into_owned()
}

struct ComponentColumns {
    id: usize,
    street: usize,
    city: usize,
    state: usize,
    postal_code: usize,
    country: usize,
}

impl ComponentColumns {
    fn resolve(table: &AddressTable, args: &NormalizeArgs) -> Result<Self> {
        let lookup = |name: &str| {
            table
                .resolve_column(name)
                .with_context(|| format!("Resolving component column '{name}'"))
        };
        Ok(Self {
            id: lookup(&args.id_column)?,
            street: lookup(&args.street_column)?,
            city: lookup(&args.city_column)?,
            state: lookup(&args.state_column)?,
            postal_code: lookup(&args.postal_column)?,
            country: lookup(&args.country_column)?,
        })
    }
}

pub fn normalize_table(table: &AddressTable, args: &NormalizeArgs) -> Result<AddressTable> {
    let columns = ComponentColumns::resolve(table, args)?;
    let rows = table
        .rows
        .iter()
        .map(|row| {
            let parts = AddressParts {
                street: row.get(columns.street).map_or("", String::as_str),
                city: row.get(columns.city).map_or("", String::as_str),
                state: row.get(columns.state).map_or("", String::as_str),
                postal_code: row.get(columns.postal_code).map_or("", String::as_str),
                country: row.get(columns.country).map_or("", String::as_str),
            };
            vec![
                row.get(columns.id).cloned().unwrap_or_default(),
                compose_address(&parts),
            ]
        })
        .collect();
    Ok(AddressTable {
        headers: vec!["Index".to_string(), "Address".to_string()],
        rows,
        has_headers: true,
    })
}

pub fn execute(args: &NormalizeArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let output_path = args.output.as_deref();
    let output_delimiter = io_utils::resolve_output_delimiter(output_path, None, delimiter);
    let options = LoadOptions {
        delimiter,
        has_headers: true,
        encoding,
    };
    let table = AddressTable::load(&args.input, &options)
        .with_context(|| format!("Loading address components from {:?}", args.input))?;
    let normalized = normalize_table(&table, args)?;
    normalized.write(output_path, output_delimiter)?;
    info!(
        "Normalized {} address(es) from {:?}",
        normalized.len(),
        args.input
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args() -> NormalizeArgs {
        NormalizeArgs {
            input: PathBuf::from("unused.csv"),
            output: None,
            id_column: "DIM_LOC_ID".into(),
            street_column: "Address Line 1".into(),
            city_column: "CTY_NM".into(),
            state_column: "State".into(),
            postal_column: "POSTAL_CD".into(),
            country_column: "ISO_CNTRY_NM".into(),
            delimiter: None,
            input_encoding: None,
        }
    }

    #[test]
    fn composes_full_address() {
        let parts = AddressParts {
            street: "1600 Amphitheatre  Parkway",
            city: "Mountain View",
            state: "CA",
            postal_code: "94043-1351",
            country: "United States",
        };
        assert_eq!(
            compose_address(&parts),
            "1600 Amphitheatre Parkway, Mountain View, CA 94043, United States"
        );
    }

    #[test]
    fn blank_parts_are_skipped_without_stray_separators() {
        let parts = AddressParts {
            city: "Vancouver",
            postal_code: "V5N 2W6",
            ..AddressParts::default()
        };
        assert_eq!(compose_address(&parts), "Vancouver V5N 2W6");

        let parts = AddressParts {
            postal_code: "10001",
            country: "USA",
            ..AddressParts::default()
        };
        assert_eq!(compose_address(&parts), "10001, USA");
        assert_eq!(compose_address(&AddressParts::default()), "");
    }

    #[test]
    fn normalizes_export_rows() {
        let table = AddressTable {
            headers: [
                "DIM_LOC_ID",
                "State",
                "Address Line 1",
                "POSTAL_CD",
                "CTY_NM",
                "ISO_CNTRY_NM",
            ]
            .iter()
            .map(|h| h.to_string())
            .collect(),
            rows: vec![
                ["17", "WA", "400 Broad St", "98109", "Seattle", "United States"]
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
            ],
            has_headers: true,
        };
        let normalized = normalize_table(&table, &args()).expect("normalize");
        assert_eq!(normalized.headers, vec!["Index", "Address"]);
        assert_eq!(
            normalized.rows,
            vec![vec![
                "17".to_string(),
                "400 Broad St, Seattle, WA 98109, United States".to_string()
            ]]
        );
    }

    #[test]
    fn missing_component_column_is_an_error() {
        let table = AddressTable {
            headers: vec!["DIM_LOC_ID".into()],
            rows: Vec::new(),
            has_headers: true,
        };
        let err = normalize_table(&table, &args()).err().expect("error");
        assert!(format!("{err:#}").contains("Address Line 1"));
    }
}
