//! HTTP client for SerpApi's Google Flights engine

use crate::config::Config;
use crate::filter::RawResponse;
use crate::{FlightError, SearchRequest, DATE_FORMAT};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

/// SerpApi's way of saying the search ran but found nothing.
const NO_RESULTS_MARKER: &str = "hasn't returned any results";

/// Main flight client for making requests to SerpApi
pub struct SerpApiClient {
    http_client: Client,
    api_key: String,
    base_url: String,
    currency: String,
    language: String,
}

impl SerpApiClient {
    /// Create a new client from the startup configuration.
    pub fn new(config: &Config) -> Result<Self, FlightError> {
        let api_key = config.require_serpapi_key()?.to_string();
        debug!("Creating new SerpApi client");
        let http_client = Client::builder()
            .user_agent(concat!("direct-flights/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http_client,
            api_key,
            base_url: config.serpapi_base_url.trim_end_matches('/').to_string(),
            currency: config.currency.clone(),
            language: config.language.clone(),
        })
    }

    /// Query parameters for one search, without the API key.
    pub fn query_params(&self, request: &SearchRequest) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("engine", "google_flights".to_string()),
            ("departure_id", request.origin().to_string()),
            ("arrival_id", request.destination().to_string()),
            ("outbound_date", request.departure_date().format(DATE_FORMAT).to_string()),
            ("currency", self.currency.clone()),
            ("hl", self.language.clone()),
        ];

        match request.return_date() {
            Some(return_date) => {
                params.push(("type", "1".to_string()));
                params.push(("return_date", return_date.format(DATE_FORMAT).to_string()));
            }
            None => params.push(("type", "2".to_string())),
        }

        params
    }

    /// Run a single search and hand back the provider's JSON untouched.
    ///
    /// One attempt only; any failure goes straight back to the caller.
    #[instrument(level = "info", skip(self, request), fields(origin = request.origin(), destination = request.destination()))]
    pub async fn fetch_raw(&self, request: &SearchRequest) -> Result<RawResponse, FlightError> {
        let url = format!("{}/search.json", self.base_url);
        let params = self.query_params(request);
        info!(
            date = %request.departure_date(),
            round_trip = request.is_round_trip(),
            "Making HTTP request to SerpApi"
        );

        let start_time = std::time::Instant::now();
        let response = self
            .http_client
            .get(&url)
            .query(&params)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        info!(
            status = %status,
            duration_ms = start_time.elapsed().as_millis(),
            body_length = body.len(),
            "HTTP request completed"
        );

        let parsed: Option<Value> = serde_json::from_str(&body).ok();
        let api_error = parsed
            .as_ref()
            .and_then(|v| v.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string);

        if !status.is_success() {
            error!(status = %status, api_error = api_error.as_deref(), "SerpApi request failed");
            let message = api_error.unwrap_or_else(|| truncate(&body, 200));
            return Err(FlightError::ProviderError(format!("{}: {}", status, message)));
        }

        if let Some(message) = api_error {
            if message.contains(NO_RESULTS_MARKER) {
                warn!(message = %message, "SerpApi returned no results");
                return Err(FlightError::NoResults(message));
            }
            error!(message = %message, "SerpApi reported an error");
            return Err(FlightError::ProviderError(message));
        }

        match parsed {
            Some(value) => Ok(RawResponse::new(value)),
            None => Err(FlightError::ProviderError(
                "response body was not valid JSON".to_string(),
            )),
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}
