//! Process configuration, read once at startup

use crate::FlightError;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_MODEL: &str = "models/gemini-2.5-pro";
pub const DEFAULT_FALLBACK_MODELS: &str = "models/gemini-2.5-flash,models/gemini-flash-lite-latest";
pub const DEFAULT_SERPAPI_BASE_URL: &str = "https://serpapi.com";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_DEBUG_DUMP: &str = "temp_search.json";

/// Everything the binaries need, built once and passed into constructors.
#[derive(Debug, Clone)]
pub struct Config {
    pub serpapi_key: Option<String>,
    pub google_api_key: Option<String>,
    pub model: String,
    pub fallback_models: Vec<String>,
    pub currency: String,
    pub language: String,
    pub serpapi_base_url: String,
    pub gemini_base_url: String,
    /// Where the latest raw provider response is dumped; `None` disables it.
    pub debug_dump_path: Option<PathBuf>,
    pub web_host: String,
    pub web_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serpapi_key: None,
            google_api_key: None,
            model: DEFAULT_MODEL.to_string(),
            fallback_models: parse_model_list(DEFAULT_FALLBACK_MODELS),
            currency: "INR".to_string(),
            language: "en".to_string(),
            serpapi_base_url: DEFAULT_SERPAPI_BASE_URL.to_string(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            debug_dump_path: Some(PathBuf::from(DEFAULT_DEBUG_DUMP)),
            web_host: "127.0.0.1".to_string(),
            web_port: 8501,
        }
    }
}

impl Config {
    /// Load from the process environment. Call `dotenvy::dotenv()` first if a
    /// `.env` file should be honored.
    pub fn from_env() -> Result<Self, FlightError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, FlightError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let web_port = match get("WEB_PORT") {
            Some(port) => port
                .parse()
                .map_err(|_| FlightError::ConfigError(format!("WEB_PORT must be a number, got {:?}", port)))?,
            None => defaults.web_port,
        };

        // Set-but-empty disables the dump; unset keeps the default file.
        let debug_dump_path = match lookup("FLIGHT_DEBUG_DUMP") {
            Some(path) if path.trim().is_empty() => None,
            Some(path) => Some(PathBuf::from(path.trim())),
            None => defaults.debug_dump_path,
        };

        Ok(Self {
            serpapi_key: get("SERPAPI_KEY"),
            google_api_key: get("GOOGLE_API_KEY"),
            model: get("GOOGLE_MODEL").unwrap_or(defaults.model),
            fallback_models: get("GOOGLE_FALLBACK_MODELS")
                .map(|list| parse_model_list(&list))
                .unwrap_or(defaults.fallback_models),
            currency: get("SERPAPI_CURRENCY").unwrap_or(defaults.currency),
            language: get("SERPAPI_LANGUAGE").unwrap_or(defaults.language),
            serpapi_base_url: get("SERPAPI_BASE_URL").unwrap_or(defaults.serpapi_base_url),
            gemini_base_url: get("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            debug_dump_path,
            web_host: get("WEB_HOST").unwrap_or(defaults.web_host),
            web_port,
        })
    }

    pub fn require_serpapi_key(&self) -> Result<&str, FlightError> {
        self.serpapi_key
            .as_deref()
            .ok_or(FlightError::MissingApiKey("SERPAPI_KEY"))
    }

    pub fn require_google_api_key(&self) -> Result<&str, FlightError> {
        self.google_api_key
            .as_deref()
            .ok_or(FlightError::MissingApiKey("GOOGLE_API_KEY"))
    }
}

/// Split a comma-separated model list, dropping blanks.
pub fn parse_model_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, FlightError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = config_from(&[]).unwrap();
        assert!(config.serpapi_key.is_none());
        assert!(config.google_api_key.is_none());
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(
            config.fallback_models,
            vec!["models/gemini-2.5-flash", "models/gemini-flash-lite-latest"]
        );
        assert_eq!(config.currency, "INR");
        assert_eq!(config.web_port, 8501);
        assert_eq!(config.debug_dump_path, Some(PathBuf::from(DEFAULT_DEBUG_DUMP)));
        assert!(matches!(
            config.require_serpapi_key(),
            Err(FlightError::MissingApiKey("SERPAPI_KEY"))
        ));
    }

    #[test]
    fn test_values_from_lookup() {
        let config = config_from(&[
            ("SERPAPI_KEY", "serp"),
            ("GOOGLE_API_KEY", " goog "),
            ("GOOGLE_MODEL", "models/gemini-pro-latest"),
            ("GOOGLE_FALLBACK_MODELS", " a, ,b ,"),
            ("WEB_PORT", "9000"),
            ("FLIGHT_DEBUG_DUMP", ""),
        ])
        .unwrap();
        assert_eq!(config.require_serpapi_key().unwrap(), "serp");
        assert_eq!(config.require_google_api_key().unwrap(), "goog");
        assert_eq!(config.model, "models/gemini-pro-latest");
        assert_eq!(config.fallback_models, vec!["a", "b"]);
        assert_eq!(config.web_port, 9000);
        assert!(config.debug_dump_path.is_none());
    }

    #[test]
    fn test_bad_port() {
        assert!(matches!(
            config_from(&[("WEB_PORT", "eighty")]),
            Err(FlightError::ConfigError(_))
        ));
    }
}
