//! Direct-flight filter over SerpApi's raw Google Flights JSON
//!
//! Candidates are read into [`Candidate`], a record where every field is
//! optional, so one odd entry never takes the rest of the batch down with it.

use crate::{FlightOption, FlightPrice};
use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Time format SerpApi uses for segment departure/arrival.
const PROVIDER_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Opaque provider payload. Only this module looks inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawResponse(Value);

impl RawResponse {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Every flight candidate, `best_flights` first, in provider order.
    ///
    /// Falls back to the first top-level list that looks like flight entries,
    /// and treats a bare array as the candidate list itself.
    pub fn candidates(&self) -> Vec<&Value> {
        match &self.0 {
            Value::Array(entries) => entries.iter().collect(),
            Value::Object(map) => {
                let mut sources: Vec<&Value> = ["best_flights", "other_flights"]
                    .iter()
                    .filter_map(|key| map.get(*key).and_then(Value::as_array))
                    .flatten()
                    .collect();

                if sources.is_empty() {
                    let fallback = map.values().filter_map(Value::as_array).find(|list| {
                        list.first()
                            .and_then(Value::as_object)
                            .is_some_and(|first| first.contains_key("flights"))
                    });
                    if let Some(list) = fallback {
                        sources.extend(list.iter());
                    }
                }

                sources
            }
            _ => Vec::new(),
        }
    }

    /// Search-level Google Flights URL, used as the booking link of last resort.
    pub fn search_url(&self) -> Option<&str> {
        self.0
            .get("search_metadata")
            .and_then(|m| m.get("google_flights_url"))
            .and_then(Value::as_str)
    }
}

/// One flight candidate as the provider sends it.
#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    flights: Vec<Value>,
    #[serde(default)]
    layovers: Option<Vec<Value>>,
    #[serde(default)]
    stops: Option<u32>,
    #[serde(default)]
    price: Option<Value>,
    #[serde(default)]
    total_duration: Option<Value>,
    #[serde(default)]
    duration: Option<Value>,
    #[serde(default)]
    airline: Option<Value>,
    #[serde(default)]
    flight_number: Option<Value>,
    #[serde(default)]
    departure: Option<Value>,
    #[serde(default)]
    arrival: Option<Value>,
    #[serde(default)]
    booking_token: Option<Value>,
    #[serde(default)]
    google_flights_url: Option<Value>,
}

impl Candidate {
    fn stop_count(&self) -> u32 {
        if let Some(stops) = self.stops {
            return stops;
        }
        if let Some(layovers) = self.layovers.as_ref().filter(|l| !l.is_empty()) {
            return layovers.len() as u32;
        }
        self.flights.len().saturating_sub(1) as u32
    }

    fn first_segment(&self) -> Option<&Value> {
        self.flights.first()
    }

    fn last_segment(&self) -> Option<&Value> {
        self.flights.last()
    }
}

/// Keep only zero-layover candidates and normalize them.
///
/// Output follows provider order. `currency` labels prices the provider sent
/// as bare numbers.
pub fn find_direct_flights(raw: &RawResponse, currency: &str) -> Vec<FlightOption> {
    let candidates = raw.candidates();
    let search_url = raw.search_url();
    debug!(candidates = candidates.len(), "Analyzing flight options");

    let mut direct = Vec::new();
    let mut skipped_malformed = 0usize;

    for (index, entry) in candidates.into_iter().enumerate() {
        let candidate = match Candidate::deserialize(entry) {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!(index, error = %e, "Skipping a malformed flight entry");
                skipped_malformed += 1;
                continue;
            }
        };

        if candidate.stop_count() != 0 {
            continue;
        }

        direct.push(normalize(&candidate, search_url, currency));
    }

    debug!(
        direct_flights = direct.len(),
        skipped_malformed,
        "Direct-flight filter completed"
    );
    direct
}

fn normalize(candidate: &Candidate, search_url: Option<&str>, currency: &str) -> FlightOption {
    let first = candidate.first_segment();
    let last = candidate.last_segment();

    let airline = string_field(candidate.airline.as_ref())
        .or_else(|| string_field(first.and_then(|s| s.get("airline"))));
    let flight_number = string_field(candidate.flight_number.as_ref())
        .or_else(|| string_field(first.and_then(|s| s.get("flight_number"))));

    let departure = time_field(candidate.departure.as_ref())
        .or_else(|| time_field(first.and_then(|s| s.pointer("/departure_airport/time"))));
    let arrival = time_field(candidate.arrival.as_ref())
        .or_else(|| time_field(last.and_then(|s| s.pointer("/arrival_airport/time"))));

    let duration_minutes = candidate
        .total_duration
        .as_ref()
        .or(candidate.duration.as_ref())
        .and_then(parse_duration)
        .or_else(|| first.and_then(|s| s.get("duration")).and_then(parse_duration));

    let booking_token = string_field(candidate.booking_token.as_ref());
    let booking_url = booking_link(
        string_field(candidate.google_flights_url.as_ref()).as_deref(),
        booking_token.as_deref(),
        search_url,
    );

    FlightOption {
        airline,
        flight_number,
        price: candidate.price.as_ref().and_then(|p| parse_price(p, currency)),
        duration_minutes,
        departure,
        arrival,
        layovers: 0,
        booking_url,
        booking_token,
    }
}

/// Best-effort deep link. The token-on-search-URL form is a guess at the
/// provider's scheme, not a documented format.
pub fn booking_link(
    flight_url: Option<&str>,
    booking_token: Option<&str>,
    search_url: Option<&str>,
) -> Option<String> {
    match (flight_url, booking_token, search_url) {
        (Some(url), _, _) => Some(url.to_string()),
        (None, Some(token), Some(search)) => Some(format!("{}&booking_token={}", search, token)),
        (None, _, Some(search)) => Some(search.to_string()),
        _ => None,
    }
}

fn string_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn time_field(value: Option<&Value>) -> Option<NaiveDateTime> {
    let text = value?.as_str()?.trim();
    NaiveDateTime::parse_from_str(text, PROVIDER_TIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

fn price_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([^\d]*)(\d+)").expect("valid price regex"))
}

/// Price from either a bare number (`4500`) or display text (`"₹4,500"`).
pub fn parse_price(value: &Value, default_currency: &str) -> Option<FlightPrice> {
    match value {
        Value::Number(n) => {
            let amount = n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64))?;
            (amount >= 0).then(|| FlightPrice {
                amount,
                currency: default_currency.to_string(),
            })
        }
        Value::String(text) => {
            let cleaned = text.replace(',', "");
            let cleaned = cleaned.trim();
            let captures = price_regex().captures(cleaned)?;
            let amount = captures.get(2)?.as_str().parse::<i64>().ok()?;

            let symbol = captures.get(1).map_or("", |m| m.as_str().trim());
            let suffix = cleaned[captures.get(0)?.end()..].trim();
            let currency = [symbol, suffix]
                .into_iter()
                .find(|s| !s.is_empty() && !s.starts_with('.'))
                .unwrap_or(default_currency);

            Some(FlightPrice {
                amount,
                currency: currency.to_string(),
            })
        }
        _ => None,
    }
}

fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:(\d+)\s*h(?:r|rs|our|ours)?)?\s*(?:(\d+)\s*m(?:in|ins|inutes?)?)?\s*$")
            .expect("valid duration regex")
    })
}

/// Minutes from a bare number or text like `"2 hr 10 min"` / `"1h"`.
pub fn parse_duration(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|m| u32::try_from(m).ok()),
        Value::String(text) => {
            let text = text.trim();
            if let Ok(minutes) = text.parse::<u32>() {
                return Some(minutes);
            }
            let captures = duration_regex().captures(text)?;
            let hours = captures.get(1).map(|m| m.as_str().parse::<u32>());
            let minutes = captures.get(2).map(|m| m.as_str().parse::<u32>());
            match (hours, minutes) {
                (None, None) => None,
                (h, m) => {
                    let hours = h.unwrap_or(Ok(0)).ok()?;
                    let minutes = m.unwrap_or(Ok(0)).ok()?;
                    hours.checked_mul(60)?.checked_add(minutes)
                }
            }
        }
        _ => None,
    }
}
