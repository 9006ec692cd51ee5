use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, trace, warn};

use crate::cache::ResultCache;
use crate::columns::ResolvedColumns;
use crate::errors::{AppError, AppResult};
use crate::handlers::{Coordinates, LookupResult, ResponseHandler};
use crate::rows::Row;
use crate::template::UrlTemplate;
use crate::transport::Transport;

const COORDINATE_BOUND: f64 = 180.0;

/// How a single row was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    AlreadyGeocoded,
    CacheHit,
    Success,
    NoMatch(String),
    ProviderError(String),
    TransportError(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Outcome::AlreadyGeocoded | Outcome::CacheHit | Outcome::Success
        )
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Outcome::NoMatch(reason)
            | Outcome::ProviderError(reason)
            | Outcome::TransportError(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::AlreadyGeocoded => "already_geocoded",
            Outcome::CacheHit => "cache_hit",
            Outcome::Success => "success",
            Outcome::NoMatch(_) => "no_match",
            Outcome::ProviderError(_) => "provider_error",
            Outcome::TransportError(_) => "transport_error",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.failure_reason() {
            Some(reason) => f.write_str(reason),
            None => f.write_str(self.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CodedRow {
    pub row: Row,
    pub outcome: Outcome,
}

/// Decides, per row, whether a lookup is needed and applies the result.
pub struct RowCoder {
    columns: ResolvedColumns,
    template: UrlTemplate,
    handler: Arc<dyn ResponseHandler>,
    transport: Arc<dyn Transport>,
    cache: ResultCache,
    force: bool,
    delay: Duration,
}

impl RowCoder {
    pub fn new(
        columns: ResolvedColumns,
        template: UrlTemplate,
        handler: Arc<dyn ResponseHandler>,
        transport: Arc<dyn Transport>,
        cache: ResultCache,
    ) -> Self {
        Self {
            columns,
            template,
            handler,
            transport,
            cache,
            force: false,
            delay: Duration::ZERO,
        }
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn columns(&self) -> &ResolvedColumns {
        &self.columns
    }

    /// Only configuration problems are returned as `Err`; they abort the run.
    /// Every per-row failure is reported through the outcome instead.
    pub async fn code(&self, mut row: Row) -> AppResult<CodedRow> {
        let Some(address) = row.get(&self.columns.address).map(str::to_string) else {
            return Err(AppError::MissingAddressColumn(self.columns.address.clone()));
        };

        if !self.force
            && is_coordinate(row.get(&self.columns.lat))
            && is_coordinate(row.get(&self.columns.lng))
        {
            trace!(%address, "row already geocoded");
            return Ok(CodedRow {
                row,
                outcome: Outcome::AlreadyGeocoded,
            });
        }

        if let Some(coordinates) = self.cache.get(&address) {
            trace!(%address, "address served from cache");
            self.fill(&mut row, coordinates);
            return Ok(CodedRow {
                row,
                outcome: Outcome::CacheHit,
            });
        }

        let outcome = self.lookup(&mut row, &address).await?;
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        Ok(CodedRow { row, outcome })
    }

    async fn lookup(&self, row: &mut Row, address: &str) -> AppResult<Outcome> {
        let url = match self.handler.build_request(&self.template, row, address) {
            Ok(url) => url,
            Err(AppError::Url(err)) => {
                warn!(?err, %address, "row produced an invalid lookup url");
                self.blank(row);
                return Ok(Outcome::ProviderError(format!("[ERROR] Invalid lookup url: {err}")));
            }
            Err(err) => return Err(err),
        };

        let response = match self.transport.get(&url).await {
            Ok(response) => response,
            Err(err) => {
                warn!(?err, %address, "lookup request failed");
                return Ok(Outcome::TransportError(format!("[ERROR] {err}")));
            }
        };
        if !response.is_success() {
            warn!(status = response.status, %address, "lookup returned error status");
            return Ok(Outcome::TransportError(format!(
                "[ERROR] HTTP Status {}",
                response.status
            )));
        }

        let handler = &self.handler;
        let parsed = panic::catch_unwind(AssertUnwindSafe(|| {
            handler.parse(&response.body, address)
        }))
        .unwrap_or_else(|payload| Err(AppError::Parse(panic_message(payload))));

        let outcome = match parsed {
            Ok(LookupResult::Found(coordinates)) => {
                self.fill(row, coordinates);
                self.cache.put(address, coordinates);
                Outcome::Success
            }
            Ok(LookupResult::NoMatch) => {
                self.blank(row);
                Outcome::NoMatch(format!("[NO MATCH] {address}"))
            }
            Ok(LookupResult::Failed(reason)) => {
                self.blank(row);
                Outcome::ProviderError(reason)
            }
            Err(err) => {
                warn!(?err, handler = self.handler.name(), %address, "failed to parse lookup response");
                self.blank(row);
                Outcome::ProviderError(format!("[ERROR] Parsing error: {err}"))
            }
        };
        debug!(%address, outcome = outcome.as_str(), "lookup finished");
        Ok(outcome)
    }

    fn fill(&self, row: &mut Row, coordinates: Coordinates) {
        row.set(&self.columns.lat, coordinates.lat.to_string());
        row.set(&self.columns.lng, coordinates.lng.to_string());
    }

    fn blank(&self, row: &mut Row) {
        row.set(&self.columns.lat, "");
        row.set(&self.columns.lng, "");
    }
}

/// A finite number within [-180, 180].
pub fn is_coordinate(value: Option<&str>) -> bool {
    value
        .and_then(|text| text.trim().parse::<f64>().ok())
        .map(|number| number.is_finite() && number.abs() <= COORDINATE_BOUND)
        .unwrap_or(false)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "handler panicked".to_string()
}
