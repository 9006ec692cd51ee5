use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use url::{form_urlencoded, Url};

use crate::errors::{AppError, AppResult};
use crate::rows::Row;

/// `{{a}}` is the address; any other name is looked up as a row field.
pub const ADDRESS_PLACEHOLDER: &str = "a";

static PLACEHOLDER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("valid placeholder pattern"));

/// A lookup URL with `{{placeholder}}` slots filled per row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    raw: String,
}

impl UrlTemplate {
    pub fn new(raw: impl Into<String>) -> AppResult<Self> {
        let raw = raw.into();
        let sample = PLACEHOLDER_PATTERN.replace_all(&raw, "x");
        Url::parse(&sample)
            .map_err(|err| AppError::Config(format!("invalid url template '{raw}': {err}")))?;
        Ok(Self { raw })
    }

    /// Substitutes every placeholder with its encoded value. A placeholder
    /// naming a field the row lacks is a configuration error.
    pub fn render(&self, row: &Row, address: &str, encode: fn(&str) -> String) -> AppResult<Url> {
        let mut missing = None;
        let rendered = PLACEHOLDER_PATTERN.replace_all(&self.raw, |caps: &Captures<'_>| {
            let name = &caps[1];
            let value = if name == ADDRESS_PLACEHOLDER {
                Some(address)
            } else {
                row.get(name)
            };
            match value {
                Some(value) => encode(value),
                None => {
                    missing.get_or_insert_with(|| name.to_string());
                    String::new()
                }
            }
        });
        if let Some(name) = missing {
            return Err(AppError::Config(format!(
                "url template references unknown column '{name}'"
            )));
        }
        Ok(Url::parse(&rendered)?)
    }
}

/// Query-string encoding: spaces become `+`, reserved and non-ASCII bytes are
/// percent-encoded.
pub fn encode_query(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Path-segment encoding: like [`encode_query`] but spaces become `%20`.
pub fn encode_path(value: &str) -> String {
    encode_query(value).replace('+', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_address_and_row_fields() {
        let template = UrlTemplate::new(
            "http://geo.example.com/lookup?street={{a}}&city={{ city }}&state={{state}}",
        )
        .unwrap();
        let row: Row = [("city", "New York"), ("state", "NY")].into_iter().collect();
        let url = template
            .render(&row, "160 Varick St & Co", encode_query)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://geo.example.com/lookup?street=160+Varick+St+%26+Co&city=New+York&state=NY"
        );
    }

    #[test]
    fn encodes_non_ascii() {
        assert_eq!(encode_query("Tromsø"), "Troms%C3%B8");
        assert_eq!(encode_path("1 Main St"), "1%20Main%20St");
        assert_eq!(encode_path("a+b"), "a%2Bb");
    }

    #[test]
    fn unknown_field_is_config_error() {
        let template = UrlTemplate::new("http://geo.example.com/?q={{Bosatt}}").unwrap();
        let row: Row = [("address", "x")].into_iter().collect();
        let err = template.render(&row, "x", encode_query).unwrap_err();
        assert!(matches!(err, AppError::Config(message) if message.contains("Bosatt")));
    }

    #[test]
    fn rejects_unparseable_template() {
        assert!(matches!(
            UrlTemplate::new("not a url {{a}}"),
            Err(AppError::Config(_))
        ));
    }
}
