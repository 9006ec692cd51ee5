use std::sync::Arc;
use std::time::Duration;
use std::str::FromStr;
use std::{env, fmt, io};

use secrecy::SecretString;
use serde::Serialize;
use tracing::debug;

use crate::handlers::ResponseHandler;

pub const DEFAULT_DELAY_MS: u64 = 250;
pub const DEFAULT_CONCURRENCY: usize = 1;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_HANDLER: &str = "google";

/// Which response handler a run uses: a built-in provider by name, or a
/// caller-supplied implementation.
#[derive(Clone)]
pub enum HandlerChoice {
    Named(String),
    Custom(Arc<dyn ResponseHandler>),
}

impl Default for HandlerChoice {
    fn default() -> Self {
        HandlerChoice::Named(DEFAULT_HANDLER.to_string())
    }
}

impl fmt::Debug for HandlerChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerChoice::Named(name) => f.debug_tuple("Named").field(name).finish(),
            HandlerChoice::Custom(handler) => {
                f.debug_tuple("Custom").field(&handler.name()).finish()
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct GeocodeOptions {
    pub url: Option<String>,
    pub handler: HandlerChoice,
    pub address_field: Option<String>,
    pub lat_field: Option<String>,
    pub lng_field: Option<String>,
    pub force: bool,
    pub delay: Duration,
    pub concurrency: usize,
    pub request_timeout: Duration,
    pub google_api_key: Option<SecretString>,
    pub mapbox_access_token: Option<SecretString>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PublicGeocodeOptions {
    pub url: Option<String>,
    pub handler: String,
    pub address_field: Option<String>,
    pub lat_field: Option<String>,
    pub lng_field: Option<String>,
    pub force: bool,
    pub delay_ms: u64,
    pub concurrency: usize,
    pub request_timeout_secs: u64,
    pub has_google_api_key: bool,
    pub has_mapbox_access_token: bool,
}

impl Default for GeocodeOptions {
    fn default() -> Self {
        Self {
            url: None,
            handler: HandlerChoice::default(),
            address_field: None,
            lat_field: None,
            lng_field: None,
            force: false,
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
            concurrency: DEFAULT_CONCURRENCY,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            google_api_key: None,
            mapbox_access_token: None,
        }
    }
}

impl GeocodeOptions {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        Self {
            url: non_empty_var("GEOCODE_URL"),
            handler: non_empty_var("GEOCODE_HANDLER")
                .map(HandlerChoice::Named)
                .unwrap_or_default(),
            address_field: non_empty_var("GEOCODE_ADDRESS_COLUMN"),
            lat_field: non_empty_var("GEOCODE_LAT_COLUMN"),
            lng_field: non_empty_var("GEOCODE_LNG_COLUMN"),
            force: parse_bool("GEOCODE_FORCE", false),
            delay: Duration::from_millis(parse_var("GEOCODE_DELAY_MS", DEFAULT_DELAY_MS)),
            concurrency: parse_var("GEOCODE_CONCURRENCY", DEFAULT_CONCURRENCY).max(1),
            request_timeout: Duration::from_secs(
                parse_var("GEOCODE_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS).max(1),
            ),
            google_api_key: non_empty_var("GOOGLE_GEOCODING_API_KEY").map(SecretString::from),
            mapbox_access_token: non_empty_var("MAPBOX_ACCESS_TOKEN").map(SecretString::from),
        }
    }

    pub fn public_profile(&self) -> PublicGeocodeOptions {
        PublicGeocodeOptions {
            url: self.url.clone(),
            handler: match &self.handler {
                HandlerChoice::Named(name) => name.clone(),
                HandlerChoice::Custom(handler) => handler.name().to_string(),
            },
            address_field: self.address_field.clone(),
            lat_field: self.lat_field.clone(),
            lng_field: self.lng_field.clone(),
            force: self.force,
            delay_ms: self.delay.as_millis() as u64,
            concurrency: self.concurrency,
            request_timeout_secs: self.request_timeout.as_secs(),
            has_google_api_key: self.google_api_key.is_some(),
            has_mapbox_access_token: self.mapbox_access_token.is_some(),
        }
    }
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_public_profile_without_secrets() {
        env::set_var("GOOGLE_GEOCODING_API_KEY", "secret");
        env::set_var("GEOCODE_HANDLER", "mapbox");
        env::set_var("GEOCODE_DELAY_MS", "0");
        env::set_var("GEOCODE_CONCURRENCY", "0");
        env::set_var("GEOCODE_FORCE", "true");

        let options = GeocodeOptions::from_env();
        let public = options.public_profile();

        assert_eq!(public.handler, "mapbox");
        assert_eq!(public.delay_ms, 0);
        assert_eq!(public.concurrency, 1);
        assert!(public.force);
        assert!(public.has_google_api_key);
        assert!(options.google_api_key.is_some());
        assert!(!serde_json::to_string(&public).unwrap().contains("secret"));
    }

    #[test]
    fn defaults_match_documented_values() {
        let options = GeocodeOptions::default();
        assert_eq!(options.delay, Duration::from_millis(DEFAULT_DELAY_MS));
        assert_eq!(options.concurrency, 1);
        assert!(!options.force);
        assert!(matches!(&options.handler, HandlerChoice::Named(name) if name == "google"));
    }

    #[test]
    fn numeric_vars_fall_back_on_garbage() {
        env::set_var("CSVGEOCODE_TEST_NUMBER", " 42 ");
        assert_eq!(parse_var("CSVGEOCODE_TEST_NUMBER", 7u64), 42);
        env::set_var("CSVGEOCODE_TEST_NUMBER", "forty");
        assert_eq!(parse_var("CSVGEOCODE_TEST_NUMBER", 7usize), 7);
        assert_eq!(parse_var("CSVGEOCODE_TEST_UNSET", 3u64), 3);
    }
}
