use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{DEFAULT_API_KEY_ENV, DEFAULT_ENDPOINT};

#[derive(Debug, Parser)]
#[command(author, version, about = "Batch geocode CSV address files", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Geocode every selected row and append latitude, longitude and status columns
    Geocode(GeocodeArgs),
    /// Compose a single address column out of street/city/state/postal/country columns
    Normalize(NormalizeArgs),
    /// Verify the API key by geocoding a known address
    CheckKey(CheckKeyArgs),
}

#[derive(Debug, Args)]
pub struct GeocodeArgs {
    /// Input CSV file containing an address column ('-' for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Column holding the free-text address: a header name or a 1-based position
    #[arg(short = 'a', long = "address-column")]
    pub address_column: Option<String>,
    /// Input has no header row
    #[arg(long = "no-headers")]
    pub no_headers: bool,
    /// First row to geocode (0-based, inclusive)
    #[arg(long)]
    pub start: Option<usize>,
    /// Row to stop before (0-based, exclusive)
    #[arg(long, conflicts_with = "limit")]
    pub end: Option<usize>,
    /// Maximum number of rows to geocode, counted from --start
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub limit: Option<u64>,
    /// CSV delimiter character for reading input
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Delimiter to use for output (defaults to input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Also emit the formatted address returned by the service
    #[arg(long = "formatted-address")]
    pub formatted_address: bool,
    /// Print a per-status summary table after the run (requires --output)
    #[arg(long, requires = "output")]
    pub summary: bool,
    /// Disable the progress bar
    #[arg(long = "no-progress")]
    pub no_progress: bool,
    #[command(flatten)]
    pub service: ServiceArgs,
}

#[derive(Debug, Clone, Args)]
pub struct ServiceArgs {
    /// Geocoding endpoint URL
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
    /// Environment variable holding the API key
    #[arg(long = "api-key-env", default_value = DEFAULT_API_KEY_ENV)]
    pub api_key_env: String,
    /// Region bias (ccTLD code such as 'us' or 'uk')
    #[arg(long)]
    pub region: Option<String>,
    /// Language for formatted results
    #[arg(long)]
    pub language: Option<String>,
    /// Per-request timeout in seconds
    #[arg(long = "timeout-secs", default_value_t = 30)]
    pub timeout_secs: u64,
    /// Retries for rate-limited or transient failures
    #[arg(long, default_value_t = 2)]
    pub retries: u32,
    /// Base delay between retries in milliseconds (grows linearly per attempt)
    #[arg(long = "retry-delay-ms", default_value_t = 1000)]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Args)]
pub struct NormalizeArgs {
    /// Input CSV export with address component columns
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Column holding the record identifier
    #[arg(long = "id-column", default_value = "DIM_LOC_ID")]
    pub id_column: String,
    /// Column holding the street line
    #[arg(long = "street-column", default_value = "Address Line 1")]
    pub street_column: String,
    /// Column holding the city name
    #[arg(long = "city-column", default_value = "CTY_NM")]
    pub city_column: String,
    /// Column holding the state or province
    #[arg(long = "state-column", default_value = "State")]
    pub state_column: String,
    /// Column holding the postal code
    #[arg(long = "postal-column", default_value = "POSTAL_CD")]
    pub postal_column: String,
    /// Column holding the country name
    #[arg(long = "country-column", default_value = "ISO_CNTRY_NM")]
    pub country_column: String,
    /// CSV delimiter character for reading input
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct CheckKeyArgs {
    /// Address used to probe the service
    #[arg(long, default_value = "San Francisco, CA")]
    pub address: String,
    #[command(flatten)]
    pub service: ServiceArgs,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
