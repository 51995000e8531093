//! Geocoding model and the per-address call policy.
//!
//! [`Geocoder`] is the seam between the row loop and the network: the Google
//! client lives in [`google`], tests swap in stubs. [`geocode_address`] turns
//! one call (plus bounded retries) into a [`GeocodeOutcome`] that never aborts
//! the run.

pub mod google;

use std::{fmt, str::FromStr, thread};

use log::{debug, warn};
use thiserror::Error;

use crate::config::RetryPolicy;

pub use google::GoogleGeocoder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GeocodeStatus {
    Ok,
    ZeroResults,
    OverQueryLimit,
    OverDailyLimit,
    RequestDenied,
    InvalidRequest,
    UnknownError,
    EmptyAddress,
    HttpError,
    InvalidResponse,
    InvalidCoordinates,
}

impl GeocodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeocodeStatus::Ok => "OK",
            GeocodeStatus::ZeroResults => "ZERO_RESULTS",
            GeocodeStatus::OverQueryLimit => "OVER_QUERY_LIMIT",
            GeocodeStatus::OverDailyLimit => "OVER_DAILY_LIMIT",
            GeocodeStatus::RequestDenied => "REQUEST_DENIED",
            GeocodeStatus::InvalidRequest => "INVALID_REQUEST",
            GeocodeStatus::UnknownError => "UNKNOWN_ERROR",
            GeocodeStatus::EmptyAddress => "EMPTY_ADDRESS",
            GeocodeStatus::HttpError => "HTTP_ERROR",
            GeocodeStatus::InvalidResponse => "INVALID_RESPONSE",
            GeocodeStatus::InvalidCoordinates => "INVALID_COORDINATES",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, GeocodeStatus::Ok)
    }

    /// Statuses worth another attempt after a pause.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GeocodeStatus::OverQueryLimit | GeocodeStatus::UnknownError | GeocodeStatus::HttpError
        )
    }
}

impl fmt::Display for GeocodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeocodeStatus {
    type Err = std::convert::Infallible;

    /// Parses a service status label. Labels the service may add later map to
    /// `UNKNOWN_ERROR`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value.trim().to_ascii_uppercase().as_str() {
            "OK" => GeocodeStatus::Ok,
            "ZERO_RESULTS" => GeocodeStatus::ZeroResults,
            "OVER_QUERY_LIMIT" => GeocodeStatus::OverQueryLimit,
            "OVER_DAILY_LIMIT" => GeocodeStatus::OverDailyLimit,
            "REQUEST_DENIED" => GeocodeStatus::RequestDenied,
            "INVALID_REQUEST" => GeocodeStatus::InvalidRequest,
            "EMPTY_ADDRESS" => GeocodeStatus::EmptyAddress,
            "HTTP_ERROR" => GeocodeStatus::HttpError,
            "INVALID_RESPONSE" => GeocodeStatus::InvalidResponse,
            "INVALID_COORDINATES" => GeocodeStatus::InvalidCoordinates,
            _ => GeocodeStatus::UnknownError,
        })
    }
}

/// A latitude/longitude pair guaranteed to be finite and on Earth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    latitude: f64,
    longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// One match returned by the service, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub latitude: f64,
    pub longitude: f64,
    pub formatted_address: Option<String>,
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("service returned {status}{}", detail(.message))]
    Service {
        status: GeocodeStatus,
        message: Option<String>,
    },
    #[error("request failed: {0}")]
    Transport(reqwest::Error),
    #[error("could not decode response: {0}")]
    Decode(String),
}

fn detail(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}

impl GeocodeError {
    /// Wraps a client error with its URL removed; the query string carries
    /// the API key.
    pub fn transport(err: reqwest::Error) -> Self {
        GeocodeError::Transport(err.without_url())
    }

    pub fn status(&self) -> GeocodeStatus {
        match self {
            GeocodeError::Service { status, .. } => *status,
            GeocodeError::Transport(_) => GeocodeStatus::HttpError,
            GeocodeError::Decode(_) => GeocodeStatus::InvalidResponse,
        }
    }
}

pub trait Geocoder {
    /// Looks up `address`. An empty vector means the service found nothing.
    fn geocode(&self, address: &str) -> Result<Vec<Candidate>, GeocodeError>;
}

/// What gets written into a row after geocoding it.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeOutcome {
    pub status: GeocodeStatus,
    pub coordinates: Option<Coordinates>,
    pub formatted_address: Option<String>,
    pub attempts: u32,
    /// Description of the last failure, including any service message.
    pub error: Option<String>,
}

impl GeocodeOutcome {
    pub fn failed(status: GeocodeStatus, attempts: u32) -> Self {
        debug_assert!(!status.is_success());
        Self {
            status,
            coordinates: None,
            formatted_address: None,
            attempts,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

pub fn geocode_address<G>(geocoder: &G, address: &str, retry: &RetryPolicy) -> GeocodeOutcome
where
    G: Geocoder + ?Sized,
{
    let address = address.trim();
    if address.is_empty() {
        return GeocodeOutcome::failed(GeocodeStatus::EmptyAddress, 0);
    }

    let mut attempts = 0;
    loop {
        attempts += 1;
        match geocoder.geocode(address) {
            Ok(candidates) => return outcome_from_candidates(candidates, attempts),
            Err(err) => {
                let status = err.status();
                if status.is_retryable() && attempts <= retry.max_retries {
                    let delay = retry.delay_for(attempts);
                    debug!("Retrying '{address}' after {status} in {delay:?}: {err}");
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    continue;
                }
                warn!("Geocoding '{address}' failed: {err}");
                return GeocodeOutcome {
                    error: Some(err.to_string()),
                    ..GeocodeOutcome::failed(status, attempts)
                };
            }
        }
    }
}

fn outcome_from_candidates(candidates: Vec<Candidate>, attempts: u32) -> GeocodeOutcome {
    let Some(first) = candidates.into_iter().next() else {
        return GeocodeOutcome::failed(GeocodeStatus::ZeroResults, attempts);
    };
    match Coordinates::new(first.latitude, first.longitude) {
        Some(coordinates) => GeocodeOutcome {
            status: GeocodeStatus::Ok,
            coordinates: Some(coordinates),
            formatted_address: first.formatted_address,
            attempts,
            error: None,
        },
        None => {
            warn!(
                "Discarding out-of-range coordinates ({}, {})",
                first.latitude, first.longitude
            );
            GeocodeOutcome::failed(GeocodeStatus::InvalidCoordinates, attempts)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, collections::VecDeque, time::Duration};

    struct ScriptedGeocoder {
        replies: RefCell<VecDeque<Result<Vec<Candidate>, GeocodeError>>>,
        calls: RefCell<Vec<String>>,
    }

    impl ScriptedGeocoder {
        fn new(replies: Vec<Result<Vec<Candidate>, GeocodeError>>) -> Self {
            Self {
                replies: RefCell::new(replies.into()),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Geocoder for ScriptedGeocoder {
        fn geocode(&self, address: &str) -> Result<Vec<Candidate>, GeocodeError> {
            self.calls.borrow_mut().push(address.to_string());
            self.replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn candidate(latitude: f64, longitude: f64) -> Candidate {
        Candidate {
            latitude,
            longitude,
            formatted_address: Some("somewhere".into()),
        }
    }

    fn service_error(status: GeocodeStatus) -> GeocodeError {
        GeocodeError::Service {
            status,
            message: None,
        }
    }

    fn retries(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::ZERO,
        }
    }

    #[test]
    fn first_candidate_wins() {
        let geocoder = ScriptedGeocoder::new(vec![Ok(vec![
            candidate(37.4224, -122.0842),
            candidate(1.0, 1.0),
        ])]);
        let outcome = geocode_address(&geocoder, "  1600 Amphitheatre Parkway  ", &retries(0));
        assert!(outcome.is_success());
        let coords = outcome.coordinates.expect("coordinates");
        assert!((coords.latitude() - 37.422).abs() < 0.01);
        assert!((coords.longitude() + 122.084).abs() < 0.01);
        assert_eq!(
            geocoder.calls.borrow().as_slice(),
            ["1600 Amphitheatre Parkway"]
        );
    }

    #[test]
    fn blank_address_skips_the_service() {
        let geocoder = ScriptedGeocoder::new(vec![]);
        let outcome = geocode_address(&geocoder, "   ", &retries(3));
        assert_eq!(outcome.status, GeocodeStatus::EmptyAddress);
        assert_eq!(outcome.attempts, 0);
        assert!(geocoder.calls.borrow().is_empty());
    }

    #[test]
    fn no_candidates_is_zero_results() {
        let geocoder = ScriptedGeocoder::new(vec![Ok(vec![])]);
        let outcome = geocode_address(&geocoder, "nowhere", &retries(0));
        assert_eq!(outcome.status, GeocodeStatus::ZeroResults);
        assert!(outcome.coordinates.is_none());
    }

    #[test]
    fn rate_limit_is_retried_until_success() {
        let geocoder = ScriptedGeocoder::new(vec![
            Err(service_error(GeocodeStatus::OverQueryLimit)),
            Err(service_error(GeocodeStatus::OverQueryLimit)),
            Ok(vec![candidate(10.0, 20.0)]),
        ]);
        let outcome = geocode_address(&geocoder, "busy", &retries(2));
        assert!(outcome.is_success());
        assert_eq!(outcome.attempts, 3);
    }

    #[test]
    fn retries_are_bounded() {
        let geocoder = ScriptedGeocoder::new(vec![
            Err(service_error(GeocodeStatus::OverQueryLimit)),
            Err(service_error(GeocodeStatus::OverQueryLimit)),
            Err(service_error(GeocodeStatus::OverQueryLimit)),
        ]);
        let outcome = geocode_address(&geocoder, "busy", &retries(1));
        assert_eq!(outcome.status, GeocodeStatus::OverQueryLimit);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(geocoder.calls.borrow().len(), 2);
    }

    #[test]
    fn denied_requests_are_not_retried() {
        let geocoder = ScriptedGeocoder::new(vec![Err(GeocodeError::Service {
            status: GeocodeStatus::RequestDenied,
            message: Some("The provided API key is invalid.".into()),
        })]);
        let outcome = geocode_address(&geocoder, "anywhere", &retries(5));
        assert_eq!(outcome.status, GeocodeStatus::RequestDenied);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(
            outcome.error.as_deref(),
            Some("service returned REQUEST_DENIED: The provided API key is invalid.")
        );
    }

    #[test]
    fn off_planet_coordinates_are_rejected() {
        let geocoder = ScriptedGeocoder::new(vec![Ok(vec![candidate(91.0, 0.0)])]);
        let outcome = geocode_address(&geocoder, "north of north", &retries(0));
        assert_eq!(outcome.status, GeocodeStatus::InvalidCoordinates);
        assert!(outcome.coordinates.is_none());
    }

    #[test]
    fn coordinates_reject_non_finite_values() {
        assert!(Coordinates::new(f64::NAN, 0.0).is_none());
        assert!(Coordinates::new(0.0, f64::INFINITY).is_none());
        assert!(Coordinates::new(0.0, -180.5).is_none());
        assert!(Coordinates::new(-90.0, 180.0).is_some());
    }

    #[test]
    fn status_labels_parse_and_print() {
        for status in [
            GeocodeStatus::Ok,
            GeocodeStatus::ZeroResults,
            GeocodeStatus::OverQueryLimit,
            GeocodeStatus::RequestDenied,
            GeocodeStatus::InvalidCoordinates,
        ] {
            assert_eq!(status.as_str().parse::<GeocodeStatus>(), Ok(status));
        }
        assert_eq!(
            "SOMETHING_NEW".parse::<GeocodeStatus>(),
            Ok(GeocodeStatus::UnknownError)
        );
    }

    #[test]
    fn service_error_message_includes_detail() {
        let err = GeocodeError::Service {
            status: GeocodeStatus::RequestDenied,
            message: Some("bad key".into()),
        };
        assert_eq!(err.to_string(), "service returned REQUEST_DENIED: bad key");
        assert_eq!(
            service_error(GeocodeStatus::InvalidRequest).to_string(),
            "service returned INVALID_REQUEST"
        );
    }

    #[test]
    fn transport_errors_drop_the_request_url() {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("client");
        let err = client
            .get("http://127.0.0.1:1/geocode/json?key=SECRET-KEY-123")
            .send()
            .expect_err("nothing listens on port 1");
        assert!(err.to_string().contains("SECRET-KEY-123"));
        let wrapped = GeocodeError::transport(err);
        assert_eq!(wrapped.status(), GeocodeStatus::HttpError);
        assert!(!wrapped.to_string().contains("SECRET-KEY-123"));
        assert!(!format!("{wrapped:?}").contains("SECRET-KEY-123"));
    }
}
