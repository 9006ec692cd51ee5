use secrecy::ExposeSecret;
use serde::Deserialize;

use super::{Coordinates, LookupResult, ResponseHandler};
use crate::config::GeocodeOptions;
use crate::errors::{AppError, AppResult};

const GOOGLE_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json?address={{a}}";

/// Google Geocoding API (`/maps/api/geocode/json`).
pub struct GoogleHandler;

#[derive(Deserialize)]
struct Response {
    status: Option<String>,
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<ResponseResult>,
}

#[derive(Deserialize)]
struct ResponseResult {
    geometry: Geometry,
}

#[derive(Deserialize)]
struct Geometry {
    location: Coordinates,
}

impl ResponseHandler for GoogleHandler {
    fn name(&self) -> &str {
        "google"
    }

    fn default_url(&self, options: &GeocodeOptions) -> Option<String> {
        let url = match &options.google_api_key {
            Some(key) => format!("{GOOGLE_GEOCODE_URL}&key={}", key.expose_secret()),
            None => GOOGLE_GEOCODE_URL.to_string(),
        };
        Some(url)
    }

    fn parse(&self, body: &str, _address: &str) -> AppResult<LookupResult> {
        let response: Response = serde_json::from_str(body)?;

        if let Some(first) = response.results.into_iter().next() {
            return Ok(LookupResult::Found(first.geometry.location));
        }

        match response.status.as_deref() {
            Some("OK") | Some("ZERO_RESULTS") => Ok(LookupResult::NoMatch),
            Some(status) => Ok(LookupResult::Failed(match response.error_message {
                Some(message) => format!("[ERROR] {status}: {message}"),
                None => format!("[ERROR] {status}"),
            })),
            None => Err(AppError::Parse(
                "google response has neither results nor status".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn takes_first_result_location() {
        let body = json!({
            "status": "OK",
            "results": [
                {"geometry": {"location": {"lat": 40.7263, "lng": -74.0053}}},
                {"geometry": {"location": {"lat": 0.0, "lng": 0.0}}}
            ]
        })
        .to_string();
        assert_eq!(
            GoogleHandler.parse(&body, "160 Varick St").unwrap(),
            LookupResult::Found(Coordinates {
                lat: 40.7263,
                lng: -74.0053
            })
        );
    }

    #[test]
    fn zero_results_is_no_match() {
        let body = json!({"status": "ZERO_RESULTS", "results": []}).to_string();
        assert_eq!(
            GoogleHandler.parse(&body, "nowhere").unwrap(),
            LookupResult::NoMatch
        );
    }

    #[test]
    fn other_status_is_failure_with_message() {
        let body = json!({
            "status": "OVER_QUERY_LIMIT",
            "error_message": "You have exceeded your daily request quota",
            "results": []
        })
        .to_string();
        assert_eq!(
            GoogleHandler.parse(&body, "x").unwrap(),
            LookupResult::Failed(
                "[ERROR] OVER_QUERY_LIMIT: You have exceeded your daily request quota".into()
            )
        );
    }

    #[test]
    fn malformed_body_is_an_error() {
        assert!(GoogleHandler.parse("<html>", "x").is_err());
        assert!(GoogleHandler.parse("{}", "x").is_err());
        let partial = json!({"results": [{"geometry": {"location": {"lat": 1.0}}}]}).to_string();
        assert!(GoogleHandler.parse(&partial, "x").is_err());
    }

    #[test]
    fn default_url_appends_key() {
        let mut options = GeocodeOptions::default();
        assert_eq!(
            GoogleHandler.default_url(&options).unwrap(),
            GOOGLE_GEOCODE_URL
        );
        options.google_api_key = Some("abc".to_string().into());
        assert!(GoogleHandler
            .default_url(&options)
            .unwrap()
            .ends_with("&key=abc"));
    }
}
