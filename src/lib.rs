pub mod cli;
pub mod config;
pub mod dataset;
pub mod geocode;
pub mod geocode_cmd;
pub mod io_utils;
pub mod normalize;
pub mod progress;
pub mod range;
pub mod summary;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, info, warn};

use crate::{
    cli::{Cli, Commands},
    config::GeocoderConfig,
    geocode::{GeocodeStatus, GoogleGeocoder, geocode_address},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("batch_geocoder", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Geocode(args) => geocode_cmd::execute(&args),
        Commands::Normalize(args) => normalize::execute(&args),
        Commands::CheckKey(args) => handle_check_key(&args),
    }
}

fn handle_check_key(args: &cli::CheckKeyArgs) -> Result<()> {
    let config = GeocoderConfig::from_args(&args.service)?;
    info!(
        "Checking key from ${} against {}",
        args.service.api_key_env, config.endpoint
    );
    let geocoder = GoogleGeocoder::new(&config).context("Building HTTP client")?;
    let outcome = geocode_address(&geocoder, &args.address, &config.retry);
    let key_env = &args.service.api_key_env;
    let failure = outcome
        .error
        .clone()
        .unwrap_or_else(|| format!("returned {}", outcome.status));
    match outcome.status {
        GeocodeStatus::Ok => {
            if let Some(coords) = outcome.coordinates {
                info!(
                    "Key accepted: '{}' -> ({}, {})",
                    args.address,
                    coords.latitude(),
                    coords.longitude()
                );
            }
            Ok(())
        }
        GeocodeStatus::ZeroResults | GeocodeStatus::InvalidCoordinates => {
            warn!(
                "Key accepted, but '{}' returned {}; try another --address",
                args.address, outcome.status
            );
            Ok(())
        }
        GeocodeStatus::EmptyAddress => Err(anyhow!("--address must not be blank")),
        GeocodeStatus::RequestDenied | GeocodeStatus::OverDailyLimit => {
            Err(anyhow!("${key_env} rejected: {failure}"))
        }
        _ => Err(anyhow!(
            "Could not verify ${key_env} with '{}': {failure}",
            args.address
        )),
    }
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
