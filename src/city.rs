//! City name to IATA code resolution
//!
//! A small static table of common city names. Codes typed directly are passed
//! through; there is no fuzzy or partial matching.

use crate::FlightError;
use tracing::debug;

/// Common city names (lowercase) and their primary airport codes.
const CITY_CODES: &[(&str, &str)] = &[
    // India
    ("delhi", "DEL"),
    ("new delhi", "DEL"),
    ("mumbai", "BOM"),
    ("bombay", "BOM"),
    ("hyderabad", "HYD"),
    ("bangalore", "BLR"),
    ("bengaluru", "BLR"),
    ("lucknow", "LKO"),
    ("chennai", "MAA"),
    ("madras", "MAA"),
    ("kolkata", "CCU"),
    ("calcutta", "CCU"),
    ("pune", "PNQ"),
    ("ahmedabad", "AMD"),
    ("goa", "GOI"),
    ("cochin", "COK"),
    ("kochi", "COK"),
    ("jaipur", "JAI"),
    ("visakhapatnam", "VTZ"),
    ("vishakhapatnam", "VTZ"),
    ("trivandrum", "TRV"),
    ("thiruvananthapuram", "TRV"),
    ("kanpur", "KNU"),
    ("varanasi", "VNS"),
    ("nagpur", "NAG"),
    ("patna", "PAT"),
    ("srinagar", "SXR"),
    ("amritsar", "ATQ"),
    ("guwahati", "GAU"),
    ("chandigarh", "IXC"),
    // International
    ("dubai", "DXB"),
    ("singapore", "SIN"),
    ("bangkok", "BKK"),
    ("london", "LHR"),
    ("paris", "CDG"),
    ("frankfurt", "FRA"),
    ("new york", "JFK"),
    ("los angeles", "LAX"),
    ("san francisco", "SFO"),
    ("tokyo", "HND"),
    ("hong kong", "HKG"),
    ("sydney", "SYD"),
    ("kathmandu", "KTM"),
    ("colombo", "CMB"),
    ("doha", "DOH"),
];

/// True when `code` is exactly three uppercase ASCII letters.
pub fn is_airport_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())
}

/// Resolve free text to a 3-letter airport code.
///
/// Valid codes come back unchanged, known city names are matched exactly
/// (ignoring case), and a three-letter word that is not a known city is taken
/// as a code typed in the wrong case.
pub fn resolve_city(input: &str) -> Result<String, FlightError> {
    let trimmed = input.trim();
    if is_airport_code(trimmed) {
        return Ok(trimmed.to_string());
    }

    let key = trimmed.to_lowercase();
    if let Some((_, code)) = CITY_CODES.iter().find(|(name, _)| *name == key) {
        debug!(input = trimmed, code = *code, "Resolved city from table");
        return Ok(code.to_string());
    }

    if trimmed.len() == 3 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        return Ok(trimmed.to_ascii_uppercase());
    }

    Err(FlightError::CityNotFound(trimmed.to_string()))
}
