mod cache;
mod coder;
mod columns;
mod config;
mod errors;
mod handlers;
mod pipeline;
mod rows;
mod template;
mod transport;

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use cache::ResultCache;
pub use coder::{is_coordinate, CodedRow, Outcome, RowCoder};
pub use columns::{resolve_columns, ResolvedColumns, DEFAULT_LAT_FIELD, DEFAULT_LNG_FIELD};
pub use config::{
    GeocodeOptions, HandlerChoice, PublicGeocodeOptions, DEFAULT_CONCURRENCY, DEFAULT_DELAY_MS,
    DEFAULT_HANDLER, DEFAULT_TIMEOUT_SECS,
};
pub use errors::{AppError, AppResult};
pub use handlers::{
    builtin as builtin_handler, Coordinates, FnHandler, GenericHandler, GoogleHandler,
    LookupResult, MapboxHandler, ResponseHandler, BUILTIN_HANDLERS,
};
pub use pipeline::{Geocoder, LogObserver, NoopObserver, RunObserver, RunReport, RunSummary};
pub use rows::{read_rows, read_table, write_rows, Row, Table};
pub use template::{encode_path, encode_query, UrlTemplate};
pub use transport::{HttpResponse, HttpTransport, Transport};

/// Installs the global `tracing` subscriber. Safe to call more than once.
pub fn init_tracing(default_directive: &str) {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    });
}
