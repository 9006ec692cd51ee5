use serde_json::{Map, Value};

use super::{Coordinates, LookupResult, ResponseHandler};
use crate::errors::{AppError, AppResult};

const LAT_KEYS: &[&str] = &["lat", "latitude"];
const LNG_KEYS: &[&str] = &["lng", "lon", "longitude"];
const ERROR_KEYS: &[&str] = &["error", "message"];

/// Any service that answers with a flat JSON object such as
/// `{"lat": 40.7, "lng": -74.0}` or `{"error": "..."}`. A top-level array is
/// read as a result list and its first element is used.
pub struct GenericHandler;

impl ResponseHandler for GenericHandler {
    fn name(&self) -> &str {
        "generic"
    }

    fn parse(&self, body: &str, _address: &str) -> AppResult<LookupResult> {
        let value: Value = serde_json::from_str(body)?;
        match value {
            Value::Null => Ok(LookupResult::NoMatch),
            Value::Array(items) => match items.first() {
                Some(Value::Object(map)) => parse_object(map),
                Some(other) => Err(unrecognized(other)),
                None => Ok(LookupResult::NoMatch),
            },
            Value::Object(map) if map.is_empty() => Ok(LookupResult::NoMatch),
            Value::Object(map) => parse_object(&map),
            other => Err(unrecognized(&other)),
        }
    }
}

fn parse_object(map: &Map<String, Value>) -> AppResult<LookupResult> {
    let lat = first_coordinate(map, LAT_KEYS);
    let lng = first_coordinate(map, LNG_KEYS);
    if let (Some(lat), Some(lng)) = (lat, lng) {
        return Ok(LookupResult::Found(Coordinates { lat, lng }));
    }

    if let Some(reason) = ERROR_KEYS
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
    {
        return Ok(LookupResult::Failed(format!("[ERROR] {reason}")));
    }

    Err(AppError::Parse(format!(
        "response object has no usable coordinates: {}",
        Value::Object(map.clone())
    )))
}

fn first_coordinate(map: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find_map(|value| match value {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        })
        .filter(|value| value.is_finite())
}

fn unrecognized(value: &Value) -> AppError {
    AppError::Parse(format!("unrecognized response shape: {value}"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(value: Value) -> AppResult<LookupResult> {
        GenericHandler.parse(&value.to_string(), "somewhere")
    }

    #[test]
    fn reads_numeric_and_string_coordinates() {
        assert_eq!(
            parse(json!({"lat": 40.5, "lng": -73.25})).unwrap(),
            LookupResult::Found(Coordinates { lat: 40.5, lng: -73.25 })
        );
        assert_eq!(
            parse(json!([{"latitude": "59.9", "longitude": "10.75"}])).unwrap(),
            LookupResult::Found(Coordinates { lat: 59.9, lng: 10.75 })
        );
    }

    #[test]
    fn empty_shapes_are_no_match() {
        assert_eq!(parse(json!(null)).unwrap(), LookupResult::NoMatch);
        assert_eq!(parse(json!([])).unwrap(), LookupResult::NoMatch);
        assert_eq!(parse(json!({})).unwrap(), LookupResult::NoMatch);
    }

    #[test]
    fn error_text_is_failure() {
        assert_eq!(
            parse(json!({"error": "quota exceeded"})).unwrap(),
            LookupResult::Failed("[ERROR] quota exceeded".into())
        );
    }

    #[test]
    fn partial_coordinates_are_rejected() {
        assert!(parse(json!({"lat": 40.5})).is_err());
        assert!(parse(json!(42)).is_err());
        assert!(parse(json!(["nope"])).is_err());
    }
}
