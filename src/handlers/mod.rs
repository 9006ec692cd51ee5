//! Provider response handlers.
//!
//! A handler knows how to turn an address into a lookup URL for one backend
//! and how to read that backend's response body. The row pipeline only sees
//! the [`ResponseHandler`] trait, so providers can be swapped freely.

mod custom;
mod generic;
mod google;
mod mapbox;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{GeocodeOptions, HandlerChoice};
use crate::errors::{AppError, AppResult};
use crate::rows::Row;
use crate::template::{encode_query, UrlTemplate};

pub use custom::FnHandler;
pub use generic::GenericHandler;
pub use google::GoogleHandler;
pub use mapbox::MapboxHandler;

pub const BUILTIN_HANDLERS: &[&str] = &["google", "mapbox", "generic"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Every response a handler understands maps to exactly one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupResult {
    Found(Coordinates),
    NoMatch,
    /// The backend reported a failure; the text is surfaced verbatim.
    Failed(String),
}

pub trait ResponseHandler: Send + Sync {
    fn name(&self) -> &str;

    /// URL template used when the caller does not supply one.
    fn default_url(&self, _options: &GeocodeOptions) -> Option<String> {
        None
    }

    fn build_request(&self, template: &UrlTemplate, row: &Row, address: &str) -> AppResult<Url> {
        template.render(row, address, encode_query)
    }

    /// An `Err` means the body could not be understood at all.
    fn parse(&self, body: &str, address: &str) -> AppResult<LookupResult>;
}

/// Maps a handler name (case-insensitive) to a built-in provider.
pub fn builtin(name: &str) -> AppResult<Arc<dyn ResponseHandler>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "google" => Ok(Arc::new(GoogleHandler)),
        "mapbox" => Ok(Arc::new(MapboxHandler)),
        "generic" => Ok(Arc::new(GenericHandler)),
        _ => Err(AppError::Config(format!(
            "Invalid value for 'handler' option: '{name}'. Must be one of {} or a custom handler.",
            BUILTIN_HANDLERS.join(", ")
        ))),
    }
}

pub fn select(choice: &HandlerChoice) -> AppResult<Arc<dyn ResponseHandler>> {
    match choice {
        HandlerChoice::Named(name) => builtin(name),
        HandlerChoice::Custom(handler) => Ok(Arc::clone(handler)),
    }
}
