use secrecy::ExposeSecret;
use serde::Deserialize;
use url::Url;

use super::{Coordinates, LookupResult, ResponseHandler};
use crate::config::GeocodeOptions;
use crate::errors::{AppError, AppResult};
use crate::rows::Row;
use crate::template::{encode_path, UrlTemplate};

const MAPBOX_GEOCODE_BASE: &str = "https://api.mapbox.com/geocoding/v5/mapbox.places";

/// Mapbox Geocoding API. The address is a path segment, so it is encoded
/// with `%20` rather than `+`.
pub struct MapboxHandler;

#[derive(Deserialize)]
struct Response {
    features: Option<Vec<Feature>>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct Feature {
    /// `[longitude, latitude]`
    center: [f64; 2],
}

impl ResponseHandler for MapboxHandler {
    fn name(&self) -> &str {
        "mapbox"
    }

    fn default_url(&self, options: &GeocodeOptions) -> Option<String> {
        options.mapbox_access_token.as_ref().map(|token| {
            format!(
                "{MAPBOX_GEOCODE_BASE}/{{{{a}}}}.json?access_token={}",
                token.expose_secret()
            )
        })
    }

    fn build_request(&self, template: &UrlTemplate, row: &Row, address: &str) -> AppResult<Url> {
        template.render(row, address, encode_path)
    }

    fn parse(&self, body: &str, _address: &str) -> AppResult<LookupResult> {
        let response: Response = serde_json::from_str(body)?;
        let Some(features) = response.features else {
            return match response.message {
                Some(message) => Ok(LookupResult::Failed(format!("[ERROR] {message}"))),
                None => Err(AppError::Parse(
                    "mapbox response has neither features nor message".into(),
                )),
            };
        };

        Ok(match features.first() {
            Some(feature) => LookupResult::Found(Coordinates {
                lat: feature.center[1],
                lng: feature.center[0],
            }),
            None => LookupResult::NoMatch,
        })
    }
}
