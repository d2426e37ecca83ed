//! The resolve → fetch → dump → filter pipeline behind one trait

use crate::city::resolve_city;
use crate::client::SerpApiClient;
use crate::config::Config;
use crate::filter::{find_direct_flights, RawResponse};
use crate::{parse_date, FlightError, FlightOption, SearchRequest};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// The one function both the chat agent and the web form search through.
#[async_trait]
pub trait FlightSearch: Send + Sync {
    /// Direct flights for one day. An empty list means the provider had
    /// flights but none of them were direct.
    async fn search(
        &self,
        origin: &str,
        destination: &str,
        date: &str,
    ) -> Result<Vec<FlightOption>, FlightError>;
}

#[async_trait]
impl<T: FlightSearch + ?Sized> FlightSearch for Arc<T> {
    async fn search(
        &self,
        origin: &str,
        destination: &str,
        date: &str,
    ) -> Result<Vec<FlightOption>, FlightError> {
        (**self).search(origin, destination, date).await
    }
}

/// [`FlightSearch`] backed by SerpApi.
pub struct DirectFlightSearch {
    client: SerpApiClient,
    currency: String,
    debug_dump_path: Option<PathBuf>,
}

impl DirectFlightSearch {
    pub fn new(config: &Config) -> Result<Self, FlightError> {
        Ok(Self {
            client: SerpApiClient::new(config)?,
            currency: config.currency.clone(),
            debug_dump_path: config.debug_dump_path.clone(),
        })
    }

    /// Search with an already-built request; handles round trips too.
    #[instrument(level = "info", skip(self, request))]
    pub async fn search_request(&self, request: &SearchRequest) -> Result<Vec<FlightOption>, FlightError> {
        let raw = self.client.fetch_raw(request).await?;

        if let Some(path) = &self.debug_dump_path {
            if let Err(e) = write_debug_dump(path, &raw) {
                warn!(path = %path.display(), error = %e, "Failed to write debug dump");
            }
        }

        if raw.candidates().is_empty() {
            return Err(FlightError::NoResults(format!(
                "no flight lists in the response for {} -> {} on {}",
                request.origin(),
                request.destination(),
                request.departure_date()
            )));
        }

        let flights = find_direct_flights(&raw, &self.currency);
        info!(direct_flights = flights.len(), "Search completed");
        Ok(flights)
    }
}

#[async_trait]
impl FlightSearch for DirectFlightSearch {
    async fn search(
        &self,
        origin: &str,
        destination: &str,
        date: &str,
    ) -> Result<Vec<FlightOption>, FlightError> {
        let origin = resolve_city(origin)?;
        let destination = resolve_city(destination)?;
        let request = SearchRequest::new(&origin, &destination, parse_date(date)?, None)?;
        self.search_request(&request).await
    }
}

/// Overwrite `path` with the pretty-printed raw response, for humans only.
pub fn write_debug_dump(path: &Path, raw: &RawResponse) -> Result<(), FlightError> {
    let json = serde_json::to_string_pretty(raw)?;
    std::fs::write(path, json)?;
    debug!(path = %path.display(), "Wrote raw response debug dump");
    Ok(())
}
