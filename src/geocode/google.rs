//! Google Maps Geocoding API client.
//!
//! The service answers `200 OK` for most failures and reports them in the
//! body's `status` field, so the JSON is decoded before the HTTP status is
//! consulted.

use log::debug;
use reqwest::{StatusCode, blocking::Client};
use serde::Deserialize;

use super::{Candidate, GeocodeError, GeocodeStatus, Geocoder};
use crate::config::{ApiKey, GeocoderConfig};

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
    #[serde(default)]
    formatted_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Location,
}

#[derive(Debug, Deserialize)]
struct Location {
    lat: f64,
    lng: f64,
}

pub struct GoogleGeocoder {
    client: Client,
    endpoint: String,
    api_key: ApiKey,
    region: Option<String>,
    language: Option<String>,
}

impl GoogleGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(GeocodeError::transport)?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            region: config.region.clone(),
            language: config.language.clone(),
        })
    }

    fn query<'a>(&'a self, address: &'a str) -> Vec<(&'static str, &'a str)> {
        let mut params = vec![("address", address), ("key", self.api_key.expose())];
        if let Some(region) = &self.region {
            params.push(("region", region.as_str()));
        }
        if let Some(language) = &self.language {
            params.push(("language", language.as_str()));
        }
        params
    }
}

impl Geocoder for GoogleGeocoder {
    fn geocode(&self, address: &str) -> Result<Vec<Candidate>, GeocodeError> {
        debug!("GET {} address='{address}'", self.endpoint);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&self.query(address))
            .send()
            .map_err(GeocodeError::transport)?;
        let http_status = response.status();
        let body = response.text().map_err(GeocodeError::transport)?;
        match parse_response(&body) {
            Err(GeocodeError::Decode(reason)) if !http_status.is_success() => {
                Err(http_failure(http_status, reason))
            }
            other => other,
        }
    }
}

fn http_failure(http_status: StatusCode, reason: String) -> GeocodeError {
    let status = if http_status == StatusCode::TOO_MANY_REQUESTS {
        GeocodeStatus::OverQueryLimit
    } else {
        GeocodeStatus::HttpError
    };
    GeocodeError::Service {
        status,
        message: Some(format!("HTTP {http_status} ({reason})")),
    }
}

/// Decodes a geocoding response body into candidates.
pub fn parse_response(body: &str) -> Result<Vec<Candidate>, GeocodeError> {
    let response: GeocodeResponse =
        serde_json::from_str(body).map_err(|err| GeocodeError::Decode(err.to_string()))?;
    let status = response
        .status
        .parse::<GeocodeStatus>()
        .unwrap_or(GeocodeStatus::UnknownError);
    match status {
        GeocodeStatus::Ok => Ok(response
            .results
            .into_iter()
            .map(|result| Candidate {
                latitude: result.geometry.location.lat,
                longitude: result.geometry.location.lng,
                formatted_address: result.formatted_address,
            })
            .collect()),
        GeocodeStatus::ZeroResults => Ok(Vec::new()),
        other => Err(GeocodeError::Service {
            status: other,
            message: response.error_message,
        }),
    }
}
