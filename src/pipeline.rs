use std::fmt;
use std::fs::File;
use std::future::Future;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::ResultCache;
use crate::coder::{CodedRow, Outcome, RowCoder};
use crate::columns::resolve_columns;
use crate::config::GeocodeOptions;
use crate::errors::{AppError, AppResult};
use crate::handlers::{self, ResponseHandler};
use crate::rows::{read_table, write_rows, Row};
use crate::template::UrlTemplate;
use crate::transport::{HttpTransport, Transport};

type CodeFuture<'a> = Pin<Box<dyn Future<Output = (usize, AppResult<CodedRow>)> + Send + 'a>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub successes: usize,
    pub failures: usize,
    pub elapsed_ms: u64,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.successes + self.failures
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seconds = (self.elapsed_ms as f64 / 100.0).round() / 10.0;
        write!(
            f,
            "{} successes, {} failures in {}s",
            self.successes, self.failures, seconds
        )
    }
}

/// Receives per-row results as they complete and the summary once at the end.
/// With concurrency above one, rows arrive in completion order.
pub trait RunObserver: Send + Sync {
    fn on_row(&self, _failure: Option<&str>, _row: &Row) {}

    fn on_complete(&self, _summary: &RunSummary) {}
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// Observer that reports through `tracing`.
pub struct LogObserver;

impl RunObserver for LogObserver {
    fn on_row(&self, failure: Option<&str>, _row: &Row) {
        if let Some(reason) = failure {
            warn!(%reason, "row not geocoded");
        }
    }

    fn on_complete(&self, summary: &RunSummary) {
        info!(
            successes = summary.successes,
            failures = summary.failures,
            elapsed_ms = summary.elapsed_ms,
            "geocoding complete: {summary}"
        );
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    /// Output rows in input order.
    pub rows: Vec<Row>,
    pub outcomes: Vec<Outcome>,
    pub summary: RunSummary,
}

/// Geocodes whole datasets. Construction validates the handler and URL
/// template so a bad configuration fails before any input is read.
pub struct Geocoder {
    options: GeocodeOptions,
    handler: Arc<dyn ResponseHandler>,
    template: UrlTemplate,
    transport: Arc<dyn Transport>,
}

impl Geocoder {
    pub fn new(options: GeocodeOptions) -> AppResult<Self> {
        let transport = Arc::new(HttpTransport::new(options.request_timeout)?);
        Self::with_transport(options, transport)
    }

    pub fn with_transport(
        options: GeocodeOptions,
        transport: Arc<dyn Transport>,
    ) -> AppResult<Self> {
        let handler = handlers::select(&options.handler)?;
        let raw = match options.url.clone() {
            Some(url) => url,
            None => handler.default_url(&options).ok_or_else(|| {
                AppError::Config(format!(
                    "a url template is required for the '{}' handler",
                    handler.name()
                ))
            })?,
        };
        let template = UrlTemplate::new(raw)?;
        debug!(
            handler = handler.name(),
            concurrency = options.concurrency,
            force = options.force,
            "geocoder configured"
        );
        Ok(Self {
            options,
            handler,
            template,
            transport,
        })
    }

    /// Runs every row through the coder with at most `concurrency` in flight.
    /// The first row settles the column names before anything is dispatched.
    pub async fn geocode_rows(
        &self,
        rows: Vec<Row>,
        observer: &dyn RunObserver,
    ) -> AppResult<RunReport> {
        self.geocode_rows_since(rows, observer, Instant::now()).await
    }

    async fn geocode_rows_since(
        &self,
        rows: Vec<Row>,
        observer: &dyn RunObserver,
        started: Instant,
    ) -> AppResult<RunReport> {
        if rows.is_empty() {
            let summary = RunSummary {
                elapsed_ms: started.elapsed().as_millis() as u64,
                ..RunSummary::default()
            };
            observer.on_complete(&summary);
            return Ok(RunReport {
                rows,
                outcomes: Vec::new(),
                summary,
            });
        }

        let columns = resolve_columns(
            self.options.address_field.as_deref(),
            self.options.lat_field.as_deref(),
            self.options.lng_field.as_deref(),
            &rows[0],
        )?;
        let coder = RowCoder::new(
            columns,
            self.template.clone(),
            Arc::clone(&self.handler),
            Arc::clone(&self.transport),
            ResultCache::new(),
        )
        .with_force(self.options.force)
        .with_delay(self.options.delay);

        let total = rows.len();
        let max_in_flight = self.options.concurrency.max(1);
        let mut slots: Vec<Option<CodedRow>> = vec![None; total];
        let mut pending = rows.into_iter().enumerate();
        let mut in_flight: FuturesUnordered<CodeFuture<'_>> = FuturesUnordered::new();

        for (idx, row) in pending.by_ref().take(max_in_flight) {
            in_flight.push(dispatch(&coder, idx, row));
        }

        let columns = coder.columns().clone();
        let mut summary = RunSummary::default();
        while let Some((idx, result)) = in_flight.next().await {
            let mut coded = result?;
            for field in [&columns.lat, &columns.lng] {
                if !coded.row.contains(field) {
                    coded.row.set(field, "");
                }
            }
            if coded.outcome.is_success() {
                summary.successes += 1;
            } else {
                summary.failures += 1;
            }
            observer.on_row(coded.outcome.failure_reason(), &coded.row);
            slots[idx] = Some(coded);

            if let Some((idx, row)) = pending.next() {
                in_flight.push(dispatch(&coder, idx, row));
            }
        }

        summary.elapsed_ms = started.elapsed().as_millis() as u64;
        debug!(total, %summary, "all rows accounted for");
        observer.on_complete(&summary);

        let (rows, outcomes) = slots
            .into_iter()
            .flatten()
            .map(|coded| (coded.row, coded.outcome))
            .unzip();
        Ok(RunReport {
            rows,
            outcomes,
            summary,
        })
    }

    /// Reads CSV from `input`, geocodes it, and writes the augmented CSV to
    /// `output` in input order. Elapsed time includes parsing the input.
    pub async fn run<R: Read, W: Write>(
        &self,
        input: R,
        output: W,
        observer: &dyn RunObserver,
    ) -> AppResult<RunSummary> {
        let started = Instant::now();
        let (headers, report) = self.read_and_geocode(input, observer, started).await?;
        write_rows(output, &headers, &report.rows)?;
        Ok(report.summary)
    }

    /// File-path convenience around [`Geocoder::run`]; `None` writes to stdout.
    /// The output file is only created once geocoding has finished.
    pub async fn run_files(
        &self,
        input: &Path,
        output: Option<&Path>,
        observer: &dyn RunObserver,
    ) -> AppResult<RunSummary> {
        let started = Instant::now();
        let reader = BufReader::new(File::open(input)?);
        let (headers, report) = self.read_and_geocode(reader, observer, started).await?;
        match output {
            Some(path) => write_rows(BufWriter::new(File::create(path)?), &headers, &report.rows)?,
            None => write_rows(io::stdout(), &headers, &report.rows)?,
        }
        Ok(report.summary)
    }

    async fn read_and_geocode<R: Read>(
        &self,
        input: R,
        observer: &dyn RunObserver,
        started: Instant,
    ) -> AppResult<(Vec<String>, RunReport)> {
        let table = read_table(input)?;
        debug!(rows = table.rows.len(), "input loaded");
        let report = self.geocode_rows_since(table.rows, observer, started).await?;
        Ok((table.headers, report))
    }
}

fn dispatch<'a>(coder: &'a RowCoder, idx: usize, row: Row) -> CodeFuture<'a> {
    Box::pin(async move { (idx, coder.code(row).await) })
}
