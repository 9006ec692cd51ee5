use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

use csvgeocode::{init_tracing, GeocodeOptions, Geocoder, HandlerChoice, LogObserver};

/// Bulk geocode the addresses in a CSV file.
#[derive(Parser)]
#[command(name = "csvgeocode", version, about, long_about = None)]
struct Cli {
    /// CSV file to read.
    input: PathBuf,

    /// Where to write the geocoded CSV (defaults to stdout).
    output: Option<PathBuf>,

    /// Lookup URL template; `{{a}}` is the address, `{{column}}` any other field.
    #[arg(long)]
    url: Option<String>,

    /// Response handler: google, mapbox or generic.
    #[arg(long)]
    handler: Option<String>,

    /// Address column (auto-detected when omitted).
    #[arg(long)]
    address: Option<String>,

    /// Latitude column (auto-detected, else `lat`).
    #[arg(long)]
    lat: Option<String>,

    /// Longitude column (auto-detected, else `lng`).
    #[arg(long)]
    lng: Option<String>,

    /// Look up rows that already have coordinates.
    #[arg(long)]
    force: bool,

    /// Pause after each lookup, in milliseconds.
    #[arg(long)]
    delay: Option<u64>,

    /// Maximum number of rows in flight.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn options(&self) -> GeocodeOptions {
        let mut options = GeocodeOptions::from_env();
        if let Some(url) = &self.url {
            options.url = Some(url.clone());
        }
        if let Some(handler) = &self.handler {
            options.handler = HandlerChoice::Named(handler.clone());
        }
        if let Some(address) = &self.address {
            options.address_field = Some(address.clone());
        }
        if let Some(lat) = &self.lat {
            options.lat_field = Some(lat.clone());
        }
        if let Some(lng) = &self.lng {
            options.lng_field = Some(lng.clone());
        }
        if self.force {
            options.force = true;
        }
        if let Some(delay) = self.delay {
            options.delay = Duration::from_millis(delay);
        }
        if let Some(concurrency) = self.concurrency {
            options.concurrency = concurrency.max(1);
        }
        options
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let directive = match cli.verbose {
        0 => "info",
        1 => "info,csvgeocode=debug",
        _ => "debug,csvgeocode=trace",
    };
    init_tracing(directive);

    let options = cli.options();
    debug!(options = ?options.public_profile(), "starting run");
    let geocoder = Geocoder::new(options).context("invalid geocoding configuration")?;
    geocoder
        .run_files(&cli.input, cli.output.as_deref(), &LogObserver)
        .await
        .with_context(|| format!("failed to geocode {}", cli.input.display()))?;
    Ok(())
}
