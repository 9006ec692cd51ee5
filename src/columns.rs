use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::rows::Row;

pub const DEFAULT_LAT_FIELD: &str = "lat";
pub const DEFAULT_LNG_FIELD: &str = "lng";

static LAT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^lat(itude)?$").expect("valid latitude pattern"));
static LNG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(lo?ng|lon)(itude)?$").expect("valid longitude pattern"));
static ADDRESS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(street[^a-z]*)?addr(ess)?$").expect("valid address pattern")
});

/// Final field names for a run. Built once from the first row and never
/// changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedColumns {
    pub address: String,
    pub lat: String,
    pub lng: String,
}

/// Fills in whichever of the three field names were not configured by
/// scanning the sample row's field names in order.
pub fn resolve_columns(
    address: Option<&str>,
    lat: Option<&str>,
    lng: Option<&str>,
    sample: &Row,
) -> AppResult<ResolvedColumns> {
    let mut address = address.map(str::to_string);
    let mut lat = lat.map(str::to_string);
    let mut lng = lng.map(str::to_string);

    for name in sample.field_names() {
        let key = name.trim();
        if lat.is_none() && LAT_PATTERN.is_match(key) {
            lat = Some(name.to_string());
            continue;
        }
        if lng.is_none() && LNG_PATTERN.is_match(key) {
            lng = Some(name.to_string());
            continue;
        }
        if address.is_none() && ADDRESS_PATTERN.is_match(key) {
            address = Some(name.to_string());
        }
    }

    let address =
        address.ok_or_else(|| AppError::Config("Couldn't auto-detect address column.".into()))?;
    let resolved = ResolvedColumns {
        address,
        lat: lat.unwrap_or_else(|| DEFAULT_LAT_FIELD.to_string()),
        lng: lng.unwrap_or_else(|| DEFAULT_LNG_FIELD.to_string()),
    };
    debug!(
        address = %resolved.address,
        lat = %resolved.lat,
        lng = %resolved.lng,
        "resolved geocoding columns"
    );
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(names: &[&str]) -> Row {
        names.iter().map(|name| (*name, "")).collect()
    }

    #[test]
    fn discovers_columns_case_insensitively() {
        let row = sample(&["Name", " Street Address ", "LATITUDE", "Long"]);
        let columns = resolve_columns(None, None, None, &row).unwrap();
        assert_eq!(columns.address, " Street Address ");
        assert_eq!(columns.lat, "LATITUDE");
        assert_eq!(columns.lng, "Long");
    }

    #[test]
    fn accepts_short_longitude_spellings() {
        for name in ["lng", "lon", "long", "longitude", "LNG"] {
            let row = sample(&["addr", name]);
            let columns = resolve_columns(None, None, None, &row).unwrap();
            assert_eq!(columns.lng, name);
        }
    }

    #[test]
    fn first_match_wins() {
        let row = sample(&["address", "street_addr", "lat", "latitude"]);
        let columns = resolve_columns(None, None, None, &row).unwrap();
        assert_eq!(columns.address, "address");
        assert_eq!(columns.lat, "lat");
    }

    #[test]
    fn falls_back_to_default_coordinate_names() {
        let row = sample(&["address", "city"]);
        let columns = resolve_columns(None, None, None, &row).unwrap();
        assert_eq!(columns.lat, DEFAULT_LAT_FIELD);
        assert_eq!(columns.lng, DEFAULT_LNG_FIELD);
    }

    #[test]
    fn explicit_names_are_kept() {
        let row = sample(&["address", "lat", "lng"]);
        let columns =
            resolve_columns(Some("where"), Some("LERTITUDE"), Some("LANGITUDE"), &row).unwrap();
        assert_eq!(columns.address, "where");
        assert_eq!(columns.lat, "LERTITUDE");
        assert_eq!(columns.lng, "LANGITUDE");
    }

    #[test]
    fn unresolved_address_is_a_config_error() {
        let row = sample(&["name", "city", "lat", "lng"]);
        let err = resolve_columns(None, None, None, &row).unwrap_err();
        assert!(matches!(err, AppError::Config(message) if message.contains("address column")));
    }
}
