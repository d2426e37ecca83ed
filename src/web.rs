//! One-page web form: resolve, fetch, filter, render. No LLM involved.

use crate::city::resolve_city;
use crate::recommend::{recommend, sort_by_price, Recommendations, DEFAULT_TOLERANCE_PCT, DEFAULT_TOP_N};
use crate::search::FlightSearch;
use crate::{parse_date, FlightError, FlightOption, DATE_FORMAT};
use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

const MAX_ALTERNATIVES: usize = 10;
const MAX_TOP_N: usize = 10;
const MAX_TOLERANCE_PCT: f64 = 20.0;
const DEFAULT_TABLE_ROWS: usize = 50;
const MAX_TABLE_ROWS: usize = 200;

// --- App State ---

pub struct AppState {
    /// `None` when no SerpApi key is configured.
    pub search: Option<Arc<dyn FlightSearch>>,
    pub today: NaiveDate,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(form_page))
        .route("/search", get(search_page))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
}

/// Query string of `/search`. Number inputs stay text; a cleared field
/// arrives as `top_n=` and falls back to the default.
#[derive(Debug, Default, Deserialize)]
pub struct SearchForm {
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub date: String,
    pub top_n: Option<String>,
    pub tolerance: Option<String>,
    pub max_rows: Option<String>,
}

impl SearchForm {
    fn defaults(today: NaiveDate) -> Self {
        Self {
            origin: "Delhi".to_string(),
            destination: "Hyderabad".to_string(),
            date: (today + chrono::Duration::days(30)).format(DATE_FORMAT).to_string(),
            top_n: Some(DEFAULT_TOP_N.to_string()),
            tolerance: Some(DEFAULT_TOLERANCE_PCT.to_string()),
            max_rows: Some(DEFAULT_TABLE_ROWS.to_string()),
        }
    }

    fn top_n(&self) -> usize {
        number_field(&self.top_n).unwrap_or(DEFAULT_TOP_N).clamp(1, MAX_TOP_N)
    }

    fn tolerance(&self) -> f64 {
        number_field::<f64>(&self.tolerance)
            .filter(|t| t.is_finite())
            .unwrap_or(DEFAULT_TOLERANCE_PCT)
            .clamp(0.0, MAX_TOLERANCE_PCT)
    }

    fn max_rows(&self) -> usize {
        number_field(&self.max_rows)
            .unwrap_or(DEFAULT_TABLE_ROWS)
            .clamp(1, MAX_TABLE_ROWS)
    }
}

fn number_field<T: FromStr>(value: &Option<String>) -> Option<T> {
    value.as_deref().map(str::trim).and_then(|v| v.parse().ok())
}

/// What one submission ended in; each failure kind gets its own message.
#[derive(Debug)]
pub enum SearchOutcome {
    Found {
        origin: String,
        destination: String,
        flights: Vec<FlightOption>,
        recommendations: Recommendations,
    },
    NoDirectFlights {
        origin: String,
        destination: String,
    },
    Failed(FlightError),
}

// --- Handlers ---

async fn form_page(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let form = SearchForm::defaults(state.today);
    Html(render_page(&form, None, state.search.is_some()))
}

async fn search_page(
    State(state): State<Arc<AppState>>,
    Query(form): Query<SearchForm>,
) -> impl IntoResponse {
    let outcome = run_search(&state, &form).await;
    Html(render_page(&form, Some(&outcome), state.search.is_some()))
}

pub async fn run_search(state: &AppState, form: &SearchForm) -> SearchOutcome {
    let Some(search) = &state.search else {
        return SearchOutcome::Failed(FlightError::MissingApiKey("SERPAPI_KEY"));
    };

    let resolved = resolve_city(&form.origin)
        .and_then(|origin| Ok((origin, resolve_city(&form.destination)?)))
        .and_then(|codes| parse_date(&form.date).map(|_| codes));
    let (origin, destination) = match resolved {
        Ok(codes) => codes,
        Err(e) => return SearchOutcome::Failed(e),
    };

    info!(origin = %origin, destination = %destination, date = %form.date, "Web search submitted");
    match search.search(&origin, &destination, &form.date).await {
        Ok(flights) if flights.is_empty() => SearchOutcome::NoDirectFlights { origin, destination },
        Ok(flights) => {
            let recommendations = recommend(&flights, form.top_n(), form.tolerance());
            SearchOutcome::Found {
                origin,
                destination,
                flights: sort_by_price(&flights),
                recommendations,
            }
        }
        Err(e) => {
            warn!(error = %e, "Web search failed");
            SearchOutcome::Failed(e)
        }
    }
}

// --- Templates ---

fn render_page(form: &SearchForm, outcome: Option<&SearchOutcome>, key_configured: bool) -> String {
    let mut content = render_form(form);

    if !key_configured {
        content.push_str(&alert(
            "warn",
            "No SerpApi key configured. Set SERPAPI_KEY in your environment or .env file to enable searches.",
        ));
    }

    if let Some(outcome) = outcome {
        content.push_str(&render_outcome(outcome, form));
    }

    build_page("Direct Flights", &content)
}

fn render_form(form: &SearchForm) -> String {
    format!(
        r#"<form method="get" action="/search" class="search">
    <label>Origin city or IATA <input name="origin" value="{origin}" placeholder="Delhi or DEL" required></label>
    <label>Destination city or IATA <input name="destination" value="{destination}" placeholder="Hyderabad or HYD" required></label>
    <label>Travel date <input type="date" name="date" value="{date}" required></label>
    <label>Recommendations <input type="number" name="top_n" min="1" max="{max_top_n}" value="{top_n}"></label>
    <label>Near-cheapest tolerance (%) <input type="number" name="tolerance" min="0" max="{max_tol}" step="1" value="{tolerance}"></label>
    <label>Max rows in table <input type="number" name="max_rows" min="1" max="{max_table}" value="{max_rows}"></label>
    <button type="submit">Search</button>
</form>
"#,
        origin = html_escape(&form.origin),
        destination = html_escape(&form.destination),
        date = html_escape(&form.date),
        max_top_n = MAX_TOP_N,
        top_n = form.top_n(),
        max_tol = MAX_TOLERANCE_PCT,
        tolerance = form.tolerance(),
        max_table = MAX_TABLE_ROWS,
        max_rows = form.max_rows(),
    )
}

fn render_outcome(outcome: &SearchOutcome, form: &SearchForm) -> String {
    match outcome {
        SearchOutcome::Failed(e) => alert("error", &failure_message(e, form)),
        SearchOutcome::NoDirectFlights { origin, destination } => {
            let mut html = codes_line(origin, destination);
            html.push_str(&alert("info", "No direct flights found for that route/date."));
            html
        }
        SearchOutcome::Found {
            origin,
            destination,
            flights,
            recommendations,
        } => {
            let mut html = codes_line(origin, destination);

            html.push_str("<h2>Recommended (varied airlines)</h2>\n<ul>\n");
            for flight in &recommendations.picks {
                html.push_str(&list_item(flight));
            }
            html.push_str("</ul>\n");

            if !recommendations.alternatives.is_empty() {
                html.push_str(&format!("<h2>Alternatives within {}%</h2>\n<ul>\n", form.tolerance()));
                for flight in recommendations.alternatives.iter().take(MAX_ALTERNATIVES) {
                    html.push_str(&list_item(flight));
                }
                html.push_str("</ul>\n");
            }

            html.push_str(&format!("<h2>All direct flights ({})</h2>\n", flights.len()));
            let shown = &flights[..flights.len().min(form.max_rows())];
            if shown.len() < flights.len() {
                html.push_str(&alert(
                    "info",
                    &format!("Showing the {} cheapest of {} flights.", shown.len(), flights.len()),
                ));
            }
            html.push_str(&render_table(shown));
            html
        }
    }
}

/// Human-readable text for each failure kind.
pub fn failure_message(error: &FlightError, form: &SearchForm) -> String {
    match error {
        FlightError::MissingApiKey(key) => format!(
            "No API key configured: set {} in your environment or .env file.",
            key
        ),
        FlightError::CityNotFound(city) => format!(
            "Could not determine an IATA code for {:?}. Enter a 3-letter code (e.g., DEL, BOM) or a common city name like Delhi or Mumbai.",
            city
        ),
        FlightError::InvalidAirportCode(code) => format!("{:?} is not a valid 3-letter airport code.", code),
        FlightError::DateParseError(_) => format!("Invalid travel date {:?}; use YYYY-MM-DD.", form.date),
        FlightError::NoResults(_) => format!(
            "The flight provider returned nothing for {} to {} on {}. Possible causes: invalid IATA codes, an expired SerpApi key, or no flights on that date.",
            form.origin, form.destination, form.date
        ),
        FlightError::ProviderError(message) => {
            format!("The flight provider rejected the request: {}", message)
        }
        other => format!("The flight provider could not be reached: {}", other),
    }
}

fn codes_line(origin: &str, destination: &str) -> String {
    alert(
        "info",
        &format!("Using IATA codes: Origin {}, Destination {}", origin, destination),
    )
}

fn book_link(flight: &FlightOption) -> String {
    match flight.booking_url.as_deref().filter(|u| u.starts_with("http")) {
        Some(url) => format!(
            r#"<a href="{}" target="_blank" rel="noopener">Book</a>"#,
            html_escape(url)
        ),
        None => "No link".to_string(),
    }
}

fn list_item(flight: &FlightOption) -> String {
    format!(
        "<li><strong>{} ({})</strong> · {} · Departs {} · {}</li>\n",
        html_escape(flight.airline_label()),
        html_escape(flight.flight_number_label()),
        html_escape(&flight.price_label()),
        html_escape(&flight.departure_label()),
        book_link(flight),
    )
}

fn render_table(flights: &[FlightOption]) -> String {
    let mut rows = String::new();
    for flight in flights {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            html_escape(&flight.price_label()),
            html_escape(flight.airline_label()),
            html_escape(flight.flight_number_label()),
            html_escape(&flight.departure_label()),
            html_escape(&flight.arrival_label()),
            html_escape(&flight.duration_label()),
            book_link(flight),
        ));
    }

    format!(
        r#"<table>
<thead><tr><th>Price</th><th>Airline</th><th>Flight</th><th>Departure</th><th>Arrival</th><th>Duration</th><th>Booking</th></tr></thead>
<tbody>
{rows}</tbody>
</table>
"#
    )
}

fn alert(kind: &str, message: &str) -> String {
    format!(r#"<p class="alert {}">{}</p>"#, kind, html_escape(message)) + "\n"
}

fn build_page(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
body {{ font-family: system-ui, sans-serif; max-width: 960px; margin: 0 auto; padding: 24px; color: #222; }}
form.search {{ display: grid; grid-template-columns: repeat(auto-fit, minmax(200px, 1fr)); gap: 12px; align-items: end; }}
form.search label {{ display: flex; flex-direction: column; font-size: 13px; color: #555; gap: 4px; }}
input, button {{ padding: 8px; font-size: 14px; }}
button {{ background: #1565c0; color: #fff; border: none; border-radius: 4px; cursor: pointer; }}
.alert {{ padding: 10px 14px; border-radius: 4px; }}
.alert.info {{ background: #e3f2fd; }}
.alert.warn {{ background: #fff8e1; }}
.alert.error {{ background: #ffebee; color: #b71c1c; }}
table {{ border-collapse: collapse; width: 100%; font-size: 14px; }}
th, td {{ border-bottom: 1px solid #eee; padding: 6px 8px; text-align: left; }}
</style>
</head>
<body>
<h1>{title}</h1>
<p>Find direct flights and see varied-airline recommendations.</p>
{content}
</body>
</html>
"#,
        title = html_escape(title),
        content = content,
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FlightPrice;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    enum Canned {
        Flights(Vec<FlightOption>),
        NoResults,
        Rejected,
        Unreachable,
    }

    #[async_trait]
    impl FlightSearch for Canned {
        async fn search(&self, _origin: &str, _destination: &str, _date: &str) -> Result<Vec<FlightOption>, FlightError> {
            match self {
                Canned::Flights(flights) => Ok(flights.clone()),
                Canned::NoResults => Err(FlightError::NoResults("empty".to_string())),
                Canned::Rejected => Err(FlightError::ProviderError("401: Invalid API key".to_string())),
                Canned::Unreachable => Err(FlightError::IoError(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                ))),
            }
        }
    }

    fn flight(airline: &str, number: &str, amount: i64, url: Option<&str>) -> FlightOption {
        FlightOption {
            airline: Some(airline.to_string()),
            flight_number: Some(number.to_string()),
            price: Some(FlightPrice {
                amount,
                currency: "INR".to_string(),
            }),
            duration_minutes: Some(125),
            departure: None,
            arrival: None,
            layovers: 0,
            booking_url: url.map(str::to_string),
            booking_token: None,
        }
    }

    fn state(search: Option<Canned>) -> Arc<AppState> {
        Arc::new(AppState {
            search: search.map(|s| Arc::new(s) as Arc<dyn FlightSearch>),
            today: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        })
    }

    async fn get_body(state: Arc<AppState>, uri: &str) -> (StatusCode, String) {
        let response = router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    const DEL_HYD: &str = "/search?origin=Delhi&destination=hyd&date=2026-02-01";

    #[tokio::test]
    async fn test_form_page_defaults() {
        let (status, body) = get_body(state(Some(Canned::NoResults)), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"name="origin" value="Delhi""#));
        assert!(body.contains(r#"value="2026-01-31""#));
        assert!(!body.contains("No SerpApi key configured"));
    }

    #[tokio::test]
    async fn test_results_table() {
        let flights = vec![
            flight("IndiGo", "6E 2131", 5200, Some("https://www.google.com/travel/flights?x=1&booking_token=t")),
            flight("Air India", "AI 540", 4100, None),
        ];
        let (status, body) = get_body(state(Some(Canned::Flights(flights))), DEL_HYD).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Origin DEL, Destination HYD"));
        assert!(body.contains("All direct flights (2)"));
        assert!(body.contains("<td>INR 4100</td><td>Air India</td>"));
        assert!(body.contains(r#"href="https://www.google.com/travel/flights?x=1&amp;booking_token=t""#));
        assert!(body.contains("No link"));
        // cheapest first
        assert!(body.find("AI 540").unwrap() < body.find("6E 2131").unwrap());
    }

    #[tokio::test]
    async fn test_failure_messages_are_distinct() {
        let (_, no_key) = get_body(state(None), DEL_HYD).await;
        assert!(no_key.contains("No API key configured: set SERPAPI_KEY"));

        let (_, nothing) = get_body(state(Some(Canned::NoResults)), DEL_HYD).await;
        assert!(nothing.contains("The flight provider returned nothing"));

        let (_, no_direct) = get_body(state(Some(Canned::Flights(vec![]))), DEL_HYD).await;
        assert!(no_direct.contains("No direct flights found for that route/date."));

        let (_, rejected) = get_body(state(Some(Canned::Rejected)), DEL_HYD).await;
        assert!(rejected.contains("The flight provider rejected the request: 401: Invalid API key"));
        assert!(!rejected.contains("could not be reached"));

        let (_, down) = get_body(state(Some(Canned::Unreachable)), DEL_HYD).await;
        assert!(down.contains("could not be reached"));
    }

    #[tokio::test]
    async fn test_cleared_number_fields_use_defaults() {
        let (status, body) = get_body(
            state(Some(Canned::Flights(vec![flight("IndiGo", "6E 2131", 5200, None)]))),
            "/search?origin=DEL&destination=BOM&date=2026-02-01&top_n=&tolerance=&max_rows=",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("All direct flights (1)"));
        assert!(body.contains(&format!(r#"name="top_n" min="1" max="{}" value="{}""#, MAX_TOP_N, DEFAULT_TOP_N)));
        assert!(body.contains(&format!(r#"name="max_rows" min="1" max="{}" value="{}""#, MAX_TABLE_ROWS, DEFAULT_TABLE_ROWS)));

        let (status, _) = get_body(
            state(Some(Canned::Flights(vec![]))),
            "/search?origin=DEL&destination=BOM&date=2026-02-01&top_n=lots&tolerance=abc",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_table_rows_are_capped() {
        let flights = vec![
            flight("IndiGo", "6E 1", 5200, None),
            flight("Air India", "AI 2", 4100, None),
            flight("Vistara", "UK 3", 4600, None),
        ];
        let (_, body) = get_body(
            state(Some(Canned::Flights(flights))),
            "/search?origin=DEL&destination=BOM&date=2026-02-01&max_rows=2",
        )
        .await;

        assert!(body.contains("All direct flights (3)"));
        assert!(body.contains("Showing the 2 cheapest of 3 flights."));
        assert_eq!(body.matches("<tr><td>").count(), 2);
        assert!(body.contains("<td>INR 4100</td>"));
        assert!(body.contains("<td>INR 4600</td>"));
        assert!(!body.contains("<td>INR 5200</td>"));
    }

    #[tokio::test]
    async fn test_bad_input_is_reported_inline() {
        let (status, body) = get_body(
            state(Some(Canned::Flights(vec![]))),
            "/search?origin=Atlantis&destination=BOM&date=2026-02-01",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Could not determine an IATA code for &quot;Atlantis&quot;"));

        let (_, body) = get_body(
            state(Some(Canned::Flights(vec![]))),
            "/search?origin=DEL&destination=BOM&date=next+week",
        )
        .await;
        assert!(body.contains("Invalid travel date"));
    }

    #[tokio::test]
    async fn test_user_input_is_escaped() {
        let (_, body) = get_body(
            state(Some(Canned::Flights(vec![]))),
            "/search?origin=%3Cscript%3E&destination=BOM&date=2026-02-01",
        )
        .await;
        assert!(!body.contains("<script>"));
        assert!(body.contains("&lt;script&gt;"));
    }

    #[tokio::test]
    async fn test_healthz() {
        let (status, body) = get_body(state(None), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }
}
