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

use crate::catalog::Category;
use crate::client::OpenMeteoClient;
use crate::config::{Config, LocationConfig};
use crate::mapper::{Mapper, GENERATION_TIME_HELP};
use crate::metrics::{self, Descriptor, Observation, LABEL_LATITUDE, LABEL_LOCATION, LABEL_LONGITUDE, LABEL_TIMEZONE};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::Instrument;

const LOCATION_INFO_HELP: &str = "Information about the location.";

/// Fetches current conditions for every configured location on each scrape.
///
/// Only metrics with fixed names are returned by [`OpenMeteoCollector::describe`]. Names
/// of per-variable metrics include the unit returned by the API so they are only known
/// once [`OpenMeteoCollector::collect`] has run.
#[derive(Debug)]
pub struct OpenMeteoCollector {
    client: OpenMeteoClient,
    mapper: Mapper,
    config: watch::Receiver<Arc<Config>>,
    max_concurrency: usize,
}

impl OpenMeteoCollector {
    /// Create a new collector that fetches up to `max_concurrency` locations at once. A
    /// value of `1` (or `0`) fetches locations one at a time.
    pub fn new(
        client: OpenMeteoClient,
        mapper: Mapper,
        config: watch::Receiver<Arc<Config>>,
        max_concurrency: usize,
    ) -> Self {
        OpenMeteoCollector {
            client,
            mapper,
            config,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn describe(&self) -> Vec<Descriptor> {
        let namespace = self.mapper.namespace();
        vec![
            Descriptor {
                name: metrics::fq_name(namespace, "location", "info"),
                help: LOCATION_INFO_HELP.to_owned(),
                labels: vec![LABEL_LOCATION, LABEL_LATITUDE, LABEL_LONGITUDE, LABEL_TIMEZONE],
            },
            Descriptor {
                name: self.mapper.generation_time_name(Category::Weather),
                help: GENERATION_TIME_HELP.to_owned(),
                labels: vec![LABEL_LOCATION],
            },
            Descriptor {
                name: self.mapper.generation_time_name(Category::AirQuality),
                help: GENERATION_TIME_HELP.to_owned(),
                labels: vec![LABEL_LOCATION],
            },
        ]
    }

    /// Fetch and map current conditions for all locations.
    ///
    /// Observations are grouped by location in the order locations are configured.
    /// Failure to fetch a category for a location is logged and only omits the
    /// metrics for that category and location.
    pub async fn collect(&self) -> Vec<Observation> {
        // Hold on to the config for the whole scrape even if it's reloaded in the meantime
        let config = self.config.borrow().clone();

        let per_location: Vec<Vec<Observation>> = stream::iter(config.locations.iter().cloned())
            .map(|loc| async move {
                let span = tracing::debug_span!("collect_location", location = %loc.name);
                self.collect_location(&loc).instrument(span).await
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        per_location.into_iter().flatten().collect()
    }

    async fn collect_location(&self, loc: &LocationConfig) -> Vec<Observation> {
        let mut out = vec![self.location_info(loc)];

        for category in [Category::Weather, Category::AirQuality] {
            let variables = match loc.variables(category) {
                Some(v) => v,
                None => continue,
            };

            match self.client.fetch(category, loc).await {
                Some(Ok(conditions)) => {
                    let mapped = self.mapper.map(category, &loc.name, &conditions, variables);
                    tracing::debug!(
                        message = "mapped current conditions",
                        category = %category,
                        observations = mapped.observations.len(),
                        missing = mapped.missing.len(),
                    );
                    out.extend(mapped.observations);
                }
                Some(Err(e)) => {
                    tracing::warn!(
                        message = "failed to fetch current conditions",
                        location = %loc.name,
                        category = %category,
                        error = %e,
                    );
                }
                None => {}
            }
        }

        out
    }

    fn location_info(&self, loc: &LocationConfig) -> Observation {
        Observation {
            name: metrics::fq_name(self.mapper.namespace(), "location", "info"),
            help: LOCATION_INFO_HELP.to_owned(),
            labels: vec![
                (LABEL_LOCATION.to_owned(), loc.name.clone()),
                (LABEL_LATITUDE.to_owned(), format!("{:.6}", loc.latitude)),
                (LABEL_LONGITUDE.to_owned(), format!("{:.6}", loc.longitude)),
                (LABEL_TIMEZONE.to_owned(), loc.timezone.clone()),
            ],
            value: 1.0,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::OpenMeteoCollector;
    use crate::client::OpenMeteoClient;
    use crate::config::Config;
    use crate::mapper::Mapper;
    use httpmock::prelude::*;
    use reqwest::{Client, Url};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::watch;

    pub(crate) const TWO_LOCATIONS: &str = r#"
locations:
  - name: Alpha
    latitude: 10.5
    longitude: 20.5
    weather:
      variables: [temperature_2m, relative_humidity_2m, visibility]
  - name: Beta
    latitude: 30.5
    longitude: 40.5
    weather:
      variables: [temperature_2m]
    air_quality:
      variables: [pm2_5]
"#;

    pub(crate) fn collector(server: &MockServer, config: &str, max_concurrency: usize) -> OpenMeteoCollector {
        let client = OpenMeteoClient::new(
            Client::new(),
            Url::parse(&server.url("/v1/forecast")).unwrap(),
            Url::parse(&server.url("/v1/air-quality")).unwrap(),
        );
        let (_tx, rx) = watch::channel(Arc::new(Config::from_yaml(config).unwrap()));
        OpenMeteoCollector::new(client, Mapper::default(), rx, max_concurrency)
    }

    pub(crate) async fn mock_alpha_weather(server: &MockServer) -> httpmock::Mock<'_> {
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/forecast").query_param("latitude", "10.500000");
                then.status(200).json_body(json!({
                    "latitude": 10.5,
                    "longitude": 20.5,
                    "generationtime_ms": 0.1,
                    "utc_offset_seconds": 0,
                    "timezone": "GMT",
                    "timezone_abbreviation": "GMT",
                    "elevation": 12.0,
                    "current_units": {
                        "time": "iso8601",
                        "interval": "seconds",
                        "temperature_2m": "°F",
                        "relative_humidity_2m": "%",
                        "visibility": "ft"
                    },
                    "current": {
                        "time": "2024-05-01T12:00",
                        "interval": 900,
                        "temperature_2m": 70.2,
                        "relative_humidity_2m": 55,
                        "visibility": null
                    }
                }));
            })
            .await
    }

    fn names(observations: &[crate::metrics::Observation]) -> Vec<&str> {
        observations.iter().map(|o| o.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_describe_static_metrics() {
        let server = MockServer::start_async().await;
        let collector = collector(&server, TWO_LOCATIONS, 1);
        let names: Vec<String> = collector.describe().into_iter().map(|d| d.name).collect();

        assert_eq!(
            vec![
                "openmeteo_location_info",
                "openmeteo_weather_generation_time_ms",
                "openmeteo_airquality_generation_time_ms",
            ],
            names
        );
    }

    #[tokio::test]
    async fn test_collect_isolates_failures() {
        let server = MockServer::start_async().await;
        let alpha = mock_alpha_weather(&server).await;
        let beta_weather = server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/forecast").query_param("latitude", "30.500000");
                then.status(500).body("internal error");
            })
            .await;
        let beta_air = server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/air-quality").query_param("latitude", "30.500000");
                then.status(200).json_body(json!({
                    "latitude": 30.5,
                    "longitude": 40.5,
                    "generationtime_ms": 0.4,
                    "current_units": {"time": "iso8601", "interval": "seconds", "pm2_5": "μg/m³"},
                    "current": {"time": "2024-05-01T12:00", "interval": 3600, "pm2_5": 8.5}
                }));
            })
            .await;

        let collector = collector(&server, TWO_LOCATIONS, 1);
        let observations = collector.collect().await;

        alpha.assert_async().await;
        beta_weather.assert_async().await;
        beta_air.assert_async().await;

        assert_eq!(
            vec![
                "openmeteo_location_info",
                "openmeteo_weather_generation_time_ms",
                "openmeteo_weather_temperature_2m_fahrenheit",
                "openmeteo_weather_relative_humidity_2m_percent",
                "openmeteo_location_info",
                "openmeteo_airquality_generation_time_ms",
                "openmeteo_airquality_pm2_5_ug_per_m3",
            ],
            names(&observations)
        );

        let info = &observations[4];
        assert_eq!(
            vec![
                ("location".to_owned(), "Beta".to_owned()),
                ("latitude".to_owned(), "30.500000".to_owned()),
                ("longitude".to_owned(), "40.500000".to_owned()),
                ("timezone".to_owned(), "auto".to_owned()),
            ],
            info.labels
        );
        assert_eq!(1.0, info.value);
        assert_eq!(70.2, observations[2].value);
        assert_eq!(55.0, observations[3].value);
        assert_eq!(8.5, observations[6].value);
    }

    #[tokio::test]
    async fn test_collect_all_upstream_down() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|_when, then| {
                then.status(503);
            })
            .await;

        let collector = collector(&server, TWO_LOCATIONS, 4);
        let observations = collector.collect().await;

        assert_eq!(vec!["openmeteo_location_info", "openmeteo_location_info"], names(&observations));
        assert_eq!("Alpha", observations[0].labels[0].1);
        assert_eq!("Beta", observations[1].labels[0].1);
    }

    #[tokio::test]
    async fn test_collect_concurrent_keeps_location_order() {
        let server = MockServer::start_async().await;
        mock_alpha_weather(&server).await;
        server
            .mock_async(|when, then| {
                when.method(GET).query_param("latitude", "30.500000");
                then.status(500);
            })
            .await;

        let sequential = collector(&server, TWO_LOCATIONS, 1).collect().await;
        let concurrent = collector(&server, TWO_LOCATIONS, 8).collect().await;
        assert_eq!(sequential, concurrent);
    }

    #[tokio::test]
    async fn test_collect_uses_reloaded_config() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|_when, then| {
                then.status(500);
            })
            .await;

        let client = OpenMeteoClient::new(
            Client::new(),
            Url::parse(&server.url("/v1/forecast")).unwrap(),
            Url::parse(&server.url("/v1/air-quality")).unwrap(),
        );
        let (tx, rx) = watch::channel(Arc::new(Config::from_yaml(TWO_LOCATIONS).unwrap()));
        let collector = OpenMeteoCollector::new(client, Mapper::default(), rx, 1);
        assert_eq!(2, collector.collect().await.len());

        tx.send_replace(Arc::new(
            Config::from_yaml("locations:\n  - name: Gamma\n    latitude: 1.5\n    longitude: 2.5\n    air_quality:\n      variables: [pm10]\n")
                .unwrap(),
        ));
        let observations = collector.collect().await;
        assert_eq!(1, observations.len());
        assert_eq!("Gamma", observations[0].labels[0].1);
    }

    #[tokio::test]
    async fn test_scrape_in_progress_keeps_config_snapshot() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|_when, then| {
                then.status(500).delay(Duration::from_millis(300));
            })
            .await;

        let client = OpenMeteoClient::new(
            Client::new(),
            Url::parse(&server.url("/v1/forecast")).unwrap(),
            Url::parse(&server.url("/v1/air-quality")).unwrap(),
        );
        let (tx, rx) = watch::channel(Arc::new(Config::from_yaml(TWO_LOCATIONS).unwrap()));
        let collector = OpenMeteoCollector::new(client, Mapper::default(), rx, 1);
        let replacement = Config::from_yaml(
            "locations:\n  - name: Gamma\n    latitude: 1.5\n    longitude: 2.5\n    air_quality:\n      variables: [pm10]\n",
        )
        .unwrap();

        // The reload lands while the first upstream request is still outstanding
        let (during, _) = tokio::join!(collector.collect(), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            tx.send_replace(Arc::new(replacement));
        });

        let locations: Vec<&str> = during.iter().map(|o| o.labels[0].1.as_str()).collect();
        assert_eq!(vec!["Alpha", "Beta"], locations);

        let after = collector.collect().await;
        assert_eq!(1, after.len());
        assert_eq!("Gamma", after[0].labels[0].1);
    }
}
