// openmeteo_exporter - Prometheus metrics exporter for Open-Meteo
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use clap::Parser;
use openmeteo_exporter::catalog::Category;
use openmeteo_exporter::client::OpenMeteoClient;
use openmeteo_exporter::collector::OpenMeteoCollector;
use openmeteo_exporter::config::{Config, ConfigReloader};
use openmeteo_exporter::http::RequestContext;
use openmeteo_exporter::mapper::Mapper;
use reqwest::{Client, Url};
use std::error::Error;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{self, SignalKind};
use tracing::Level;

const DEFAULT_LOG_LEVEL: Level = Level::INFO;
const DEFAULT_BIND_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 9812);
const DEFAULT_TIMEOUT_MILLIS: u64 = 5000;
const DEFAULT_MAX_CONCURRENCY: usize = 4;
const DEFAULT_CONFIG_FILE: &str = "config.yaml";
const DEFAULT_TELEMETRY_PATH: &str = "/metrics";
const DEFAULT_WEATHER_API_URL: &str = "https://api.open-meteo.com/v1/forecast";
const DEFAULT_AIR_QUALITY_API_URL: &str = "https://air-quality-api.open-meteo.com/v1/air-quality";

#[derive(Debug, Parser)]
#[clap(name = "openmeteo_exporter", version = clap::crate_version!())]
struct OpenMeteoExporterApplication {
    /// Path to the YAML file with locations and variables to fetch
    #[clap(long, default_value = DEFAULT_CONFIG_FILE)]
    config_file: PathBuf,

    /// Path under which to expose metrics
    #[clap(long, default_value_t = DEFAULT_TELEMETRY_PATH.into())]
    telemetry_path: String,

    /// URL of the Open-Meteo forecast API
    #[clap(long, default_value = DEFAULT_WEATHER_API_URL)]
    weather_api_url: Url,

    /// URL of the Open-Meteo air quality API
    #[clap(long, default_value = DEFAULT_AIR_QUALITY_API_URL)]
    air_quality_api_url: Url,

    /// Logging verbosity. Allowed values are 'trace', 'debug', 'info', 'warn', and 'error'
    /// (case insensitive)
    #[clap(long, default_value_t = DEFAULT_LOG_LEVEL)]
    log_level: Level,

    /// Timeout for each request to the Open-Meteo APIs, in milliseconds.
    #[clap(long, default_value_t = DEFAULT_TIMEOUT_MILLIS)]
    timeout_millis: u64,

    /// Maximum number of locations to fetch at the same time during a scrape.
    #[clap(long, default_value_t = DEFAULT_MAX_CONCURRENCY)]
    max_concurrency: usize,

    /// List the variables available for a category ('weather' or 'air_quality') and exit.
    #[clap(long)]
    list_variables: Option<Category>,

    /// Address to bind to. By default, openmeteo_exporter will bind to public address since
    /// the purpose is to expose metrics to an external system (Prometheus or another
    /// agent for ingestion)
    #[clap(long, default_value_t = DEFAULT_BIND_ADDR.into())]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let opts = OpenMeteoExporterApplication::parse();
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(opts.log_level)
            .finish(),
    )
    .expect("failed to set tracing subscriber");

    if let Some(category) = opts.list_variables {
        print_variables(category);
        return Ok(());
    }

    let config = Config::load(&opts.config_file).unwrap_or_else(|e| {
        tracing::error!(message = "failed to load configuration", path = %opts.config_file.display(), error = %e);
        process::exit(1)
    });
    tracing::info!(
        message = "loaded configuration",
        path = %opts.config_file.display(),
        locations = config.locations.len(),
    );

    let timeout = Duration::from_millis(opts.timeout_millis);
    let http_client = Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
        tracing::error!(message = "unable to initialize HTTP client", error = %e);
        process::exit(1)
    });

    let client = OpenMeteoClient::new(http_client, opts.weather_api_url.clone(), opts.air_quality_api_url.clone());
    let (reloader, config_rx) = ConfigReloader::new(opts.config_file.clone(), config);
    let collector = OpenMeteoCollector::new(client, Mapper::default(), config_rx, opts.max_concurrency);

    tokio::spawn(async move {
        let mut hangup = match unix::signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(message = "unable to listen for SIGHUP, reloading disabled", error = %e);
                return;
            }
        };

        while hangup.recv().await.is_some() {
            match reloader.reload() {
                Ok(locations) => {
                    tracing::info!(message = "reloaded configuration", path = %reloader.path().display(), locations = locations);
                }
                Err(e) => {
                    tracing::error!(
                        message = "failed to reload configuration, keeping previous",
                        path = %reloader.path().display(),
                        error = %e,
                    );
                }
            }
        }
    });

    let context = Arc::new(RequestContext::new(collector, opts.telemetry_path.clone()));
    let app = openmeteo_exporter::http::router(context);
    let server = axum::Server::try_bind(&opts.bind)
        .unwrap_or_else(|e| {
            tracing::error!(message = "error binding to address", address = %opts.bind, error = %e);
            process::exit(1)
        })
        .serve(app.into_make_service());

    tracing::info!(
        message = "server started",
        version = clap::crate_version!(),
        address = %server.local_addr(),
        telemetry_path = %opts.telemetry_path,
        weather_api_url = %opts.weather_api_url,
        air_quality_api_url = %opts.air_quality_api_url,
    );

    server
        .with_graceful_shutdown(async {
            // Wait for either SIGTERM or SIGINT to shutdown
            tokio::select! {
                _ = sigterm() => {}
                _ = sigint() => {}
            }
        })
        .await?;

    tracing::info!("server shutdown");
    Ok(())
}

fn print_variables(category: Category) {
    let width = category.variables().iter().map(|(n, _)| n.len()).max().unwrap_or(0);
    println!("{} variables\n", category);
    println!("{:<width$}  DESCRIPTION", "NAME", width = width);
    for (name, desc) in category.variables() {
        println!("{:<width$}  {}", name, desc, width = width);
    }
}

/// Return after the first SIGTERM signal received by this process
async fn sigterm() -> io::Result<()> {
    unix::signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

/// Return after the first SIGINT signal received by this process
async fn sigint() -> io::Result<()> {
    unix::signal(SignalKind::interrupt())?.recv().await;
    Ok(())
}
