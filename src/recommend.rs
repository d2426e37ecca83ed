//! Varied-airline picks and near-cheapest alternatives

use crate::FlightOption;
use chrono::NaiveDateTime;
use std::collections::HashSet;

pub const DEFAULT_TOP_N: usize = 3;
pub const DEFAULT_TOLERANCE_PCT: f64 = 5.0;

/// Recommendations drawn from a list of direct flights.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recommendations {
    /// Cheapest option per airline, cheapest first, padded with the next
    /// cheapest flights overall when there are too few airlines.
    pub picks: Vec<FlightOption>,
    /// Other flights within the tolerance of the cheapest price.
    pub alternatives: Vec<FlightOption>,
}

/// Flights ordered by price, unknown prices last. Ties keep provider order.
pub fn sort_by_price(flights: &[FlightOption]) -> Vec<FlightOption> {
    let mut sorted = flights.to_vec();
    sorted.sort_by_key(FlightOption::price_key);
    sorted
}

// Two flights count as the same pick when airline, number and departure match.
type FlightIdentity = (Option<String>, Option<String>, Option<NaiveDateTime>);

fn identity(flight: &FlightOption) -> FlightIdentity {
    (
        flight.airline.clone(),
        flight.flight_number.clone(),
        flight.departure,
    )
}

pub fn recommend(flights: &[FlightOption], top_n: usize, tolerance_pct: f64) -> Recommendations {
    let sorted = sort_by_price(flights);

    let mut seen_airlines = HashSet::new();
    let mut picks: Vec<FlightOption> = sorted
        .iter()
        .filter(|f| seen_airlines.insert(f.airline.clone()))
        .take(top_n)
        .cloned()
        .collect();

    let mut picked: HashSet<FlightIdentity> = picks.iter().map(identity).collect();
    for flight in &sorted {
        if picks.len() >= top_n {
            break;
        }
        if picked.insert(identity(flight)) {
            picks.push(flight.clone());
        }
    }

    let alternatives = match sorted.first().and_then(|f| f.price.as_ref()) {
        Some(cheapest) => {
            let threshold = cheapest.amount as f64 * (1.0 + tolerance_pct / 100.0);
            sorted
                .iter()
                .filter(|f| f.price.as_ref().is_some_and(|p| p.amount as f64 <= threshold))
                .filter(|f| !picked.contains(&identity(f)))
                .cloned()
                .collect()
        }
        None => Vec::new(),
    };

    Recommendations { picks, alternatives }
}

/// Plain-text summary handed back to the chat model as the tool result.
pub fn summarize(flights: &[FlightOption], max_alternatives: usize) -> String {
    if flights.is_empty() {
        return "I found flights, but none were direct.".to_string();
    }

    let recommendations = recommend(flights, DEFAULT_TOP_N, DEFAULT_TOLERANCE_PCT);
    let mut summary = format!(
        "Found {} direct flights. Recommended (varied airlines, up to {}):\n",
        flights.len(),
        DEFAULT_TOP_N
    );
    for flight in &recommendations.picks {
        summary.push_str(&summary_line(flight));
    }

    if !recommendations.alternatives.is_empty() {
        summary.push_str(&format!(
            "\nAlso near-cheapest alternatives within {}%:\n",
            DEFAULT_TOLERANCE_PCT
        ));
        for flight in recommendations.alternatives.iter().take(max_alternatives) {
            summary.push_str(&summary_line(flight));
        }
    }

    summary
}

fn summary_line(flight: &FlightOption) -> String {
    let mut line = format!(
        "- {} ({}): {}, Departs: {}, Arrives: {}, Duration: {}",
        flight.airline_label(),
        flight.flight_number_label(),
        flight.price_label(),
        flight.departure_label(),
        flight.arrival_label(),
        flight.duration_label(),
    );
    if let Some(url) = &flight.booking_url {
        line.push_str(&format!(", Link: {}", url));
    }
    line.push('\n');
    line
}
