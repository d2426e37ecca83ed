//! # Direct Flights
//!
//! Finds direct flights through SerpApi's Google Flights engine and hands the
//! results to either a Gemini-backed chat agent or a small web form.
//!
//! The pipeline is City Resolver → Raw Fetcher → Flight Filter; see
//! [`search::DirectFlightSearch`] for the assembled version.

pub mod agent;
pub mod city;
pub mod client;
pub mod config;
pub mod filter;
pub mod gemini;
pub mod recommend;
pub mod search;
pub mod web;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Re-export main types for convenience
pub use agent::FlightAgent;
pub use city::resolve_city;
pub use client::SerpApiClient;
pub use config::Config;
pub use filter::{find_direct_flights, RawResponse};
pub use gemini::{GeminiClient, ModelError};
pub use recommend::{recommend, Recommendations};
pub use search::{DirectFlightSearch, FlightSearch};

/// Error types for the flights library
#[derive(Error, Debug)]
pub enum FlightError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Flight provider error: {0}")]
    ProviderError(String),

    #[error("Flight provider returned no results: {0}")]
    NoResults(String),

    #[error("City not found: {0}")]
    CityNotFound(String),

    #[error("Invalid airport code: {0}")]
    InvalidAirportCode(String),

    #[error("Invalid date format: {0}")]
    DateParseError(String),

    #[error("Missing API key: {0} is not set")]
    MissingApiKey(&'static str),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Date format used on every surface and on the provider wire.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(date: &str) -> Result<NaiveDate, FlightError> {
    NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)
        .map_err(|_| FlightError::DateParseError(format!("expected YYYY-MM-DD, got {:?}", date)))
}

/// One search against the provider. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    origin: String,
    destination: String,
    departure_date: NaiveDate,
    return_date: Option<NaiveDate>,
}

impl SearchRequest {
    /// Build a request from already-resolved airport codes.
    pub fn new(
        origin: &str,
        destination: &str,
        departure_date: NaiveDate,
        return_date: Option<NaiveDate>,
    ) -> Result<Self, FlightError> {
        let origin = validate_airport_code(origin)?;
        let destination = validate_airport_code(destination)?;

        if let Some(return_date) = return_date {
            if return_date < departure_date {
                return Err(FlightError::DateParseError(format!(
                    "return date {} is before departure date {}",
                    return_date, departure_date
                )));
            }
        }

        Ok(Self {
            origin,
            destination,
            departure_date,
            return_date,
        })
    }

    /// One-way convenience constructor taking a `YYYY-MM-DD` string.
    pub fn one_way(origin: &str, destination: &str, date: &str) -> Result<Self, FlightError> {
        Self::new(origin, destination, parse_date(date)?, None)
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn departure_date(&self) -> NaiveDate {
        self.departure_date
    }

    pub fn return_date(&self) -> Option<NaiveDate> {
        self.return_date
    }

    pub fn is_round_trip(&self) -> bool {
        self.return_date.is_some()
    }
}

fn validate_airport_code(code: &str) -> Result<String, FlightError> {
    if city::is_airport_code(code) {
        Ok(code.to_string())
    } else {
        Err(FlightError::InvalidAirportCode(code.to_string()))
    }
}

/// Price information with amount and currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightPrice {
    pub amount: i64,
    pub currency: String,
}

impl std::fmt::Display for FlightPrice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.currency, self.amount)
    }
}

/// A direct flight, normalized out of the provider's raw JSON.
///
/// Fields the provider left out (or sent in a shape we could not read) are
/// `None`; nothing here is ever filled with a made-up default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightOption {
    pub airline: Option<String>,
    pub flight_number: Option<String>,
    pub price: Option<FlightPrice>,
    pub duration_minutes: Option<u32>,
    pub departure: Option<NaiveDateTime>,
    pub arrival: Option<NaiveDateTime>,
    pub layovers: u32,
    pub booking_url: Option<String>,
    pub booking_token: Option<String>,
}

impl FlightOption {
    /// Price amount used for ordering; unknown prices sort last.
    pub fn price_key(&self) -> i64 {
        self.price.as_ref().map_or(i64::MAX, |p| p.amount)
    }

    pub fn airline_label(&self) -> &str {
        self.airline.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn flight_number_label(&self) -> &str {
        self.flight_number.as_deref().unwrap_or("N/A")
    }

    pub fn price_label(&self) -> String {
        self.price
            .as_ref()
            .map_or_else(|| UNKNOWN.to_string(), |p| p.to_string())
    }

    pub fn departure_label(&self) -> String {
        format_time(self.departure)
    }

    pub fn arrival_label(&self) -> String {
        format_time(self.arrival)
    }

    pub fn duration_label(&self) -> String {
        match self.duration_minutes {
            Some(minutes) => format!("{}h {:02}m", minutes / 60, minutes % 60),
            None => UNKNOWN.to_string(),
        }
    }
}

/// Placeholder shown for a field the provider did not give us.
pub const UNKNOWN: &str = "unknown";

fn format_time(time: Option<NaiveDateTime>) -> String {
    time.map_or_else(|| UNKNOWN.to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_request_creation() {
        let request = SearchRequest::one_way("DEL", "BOM", "2026-01-20").unwrap();
        assert_eq!(request.origin(), "DEL");
        assert_eq!(request.destination(), "BOM");
        assert_eq!(request.departure_date(), NaiveDate::from_ymd_opt(2026, 1, 20).unwrap());
        assert!(!request.is_round_trip());
    }

    #[test]
    fn test_search_request_rejects_bad_codes() {
        assert!(matches!(
            SearchRequest::one_way("del", "BOM", "2026-01-20"),
            Err(FlightError::InvalidAirportCode(_))
        ));
        assert!(matches!(
            SearchRequest::one_way("DELHI", "BOM", "2026-01-20"),
            Err(FlightError::InvalidAirportCode(_))
        ));
        assert!(matches!(
            SearchRequest::one_way("DEL", "BOM", "20-01-2026"),
            Err(FlightError::DateParseError(_))
        ));
    }

    #[test]
    fn test_search_request_return_before_departure() {
        let depart = NaiveDate::from_ymd_opt(2026, 1, 20).unwrap();
        let back = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        assert!(SearchRequest::new("DEL", "BOM", depart, Some(back)).is_err());

        let request = SearchRequest::new("DEL", "BOM", back, Some(depart)).unwrap();
        assert!(request.is_round_trip());
    }

    #[test]
    fn test_flight_option_labels() {
        let option = FlightOption {
            airline: None,
            flight_number: None,
            price: Some(FlightPrice {
                amount: 4500,
                currency: "INR".to_string(),
            }),
            duration_minutes: Some(130),
            departure: None,
            arrival: None,
            layovers: 0,
            booking_url: None,
            booking_token: None,
        };
        assert_eq!(option.airline_label(), UNKNOWN);
        assert_eq!(option.flight_number_label(), "N/A");
        assert_eq!(option.price_label(), "INR 4500");
        assert_eq!(option.duration_label(), "2h 10m");
        assert_eq!(option.departure_label(), UNKNOWN);
    }
}
