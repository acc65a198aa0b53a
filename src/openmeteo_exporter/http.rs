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

use crate::collector::OpenMeteoCollector;
use crate::metrics;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

const OPENMETRICS_TEXT: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// State shared by all HTTP handlers.
#[derive(Debug)]
pub struct RequestContext {
    collector: OpenMeteoCollector,
    telemetry_path: String,
}

impl RequestContext {
    pub fn new<S: Into<String>>(collector: OpenMeteoCollector, telemetry_path: S) -> Self {
        RequestContext {
            collector,
            telemetry_path: telemetry_path.into(),
        }
    }
}

/// Build a router with the landing page at `/` and metrics at the configured telemetry path.
pub fn router(context: Arc<RequestContext>) -> Router {
    let path = context.telemetry_path.clone();
    Router::new()
        .route("/", get(landing_page))
        .route(&path, get(text_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(context)
}

async fn text_metrics(State(context): State<Arc<RequestContext>>) -> Response {
    let descriptors = context.collector.describe();
    let observations = context.collector.collect().await;

    match metrics::encode_text(&descriptors, &observations) {
        Ok(buf) => {
            tracing::debug!(
                message = "encoded prometheus metrics to text format",
                num_observations = observations.len(),
                num_bytes = buf.len(),
            );
            ([(CONTENT_TYPE, OPENMETRICS_TEXT)], buf).into_response()
        }
        Err(e) => {
            tracing::error!(message = "error encoding metrics", error = %e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn landing_page(State(context): State<Arc<RequestContext>>) -> Html<String> {
    Html(format!(
        "<html>\n<head><title>Open-Meteo Exporter</title></head>\n<body>\n<h1>Open-Meteo Exporter</h1>\n\
         <p>Prometheus Open-Meteo Exporter version {}</p>\n<p><a href=\"{}\">Metrics</a></p>\n</body>\n</html>\n",
        env!("CARGO_PKG_VERSION"),
        context.telemetry_path,
    ))
}
