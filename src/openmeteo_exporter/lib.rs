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

//! Prometheus metrics exporter for Open-Meteo
//!
//! ## Features
//!
//! `openmeteo_exporter` fetches current weather and air quality conditions for a set of locations
//! using the [Open-Meteo] forecast and air quality APIs and emits them as Prometheus metrics. The
//! upstream APIs are queried on every scrape. The following metrics are emitted.
//!
//! * `openmeteo_location_info{location, latitude, longitude, timezone}` - Location metadata, always `1`.
//! * `openmeteo_weather_generation_time_ms{location}` - Time the weather API spent generating the response.
//! * `openmeteo_airquality_generation_time_ms{location}` - Time the air quality API spent generating the response.
//! * `openmeteo_weather_$VARIABLE_$UNIT{location}` - Each requested weather variable, e.g.
//!   `openmeteo_weather_temperature_2m_fahrenheit`.
//! * `openmeteo_airquality_$VARIABLE_$UNIT{location}` - Each requested air quality variable, e.g.
//!   `openmeteo_airquality_pm2_5_ug_per_m3`.
//!
//! If the API doesn't return a value for a variable (solar radiation at night, for example) the
//! metric is omitted. If a request fails, only the metrics for that location and category are
//! omitted and a warning is logged.
//!
//! [Open-Meteo]: https://open-meteo.com/en/docs
//!
//! ## Build
//!
//! ```text
//! cargo build --release
//! ```
//!
//! ## Usage
//!
//! ### Configuration
//!
//! Locations and the variables to fetch for them are set in a YAML file. Each location
//! needs a name, non-zero latitude and longitude, and at least one of a `weather` or
//! `air_quality` section.
//!
//! ```yaml
//! locations:
//!   - name: Boston
//!     latitude: 42.36
//!     longitude: -71.06
//!     timezone: America/New_York  # optional, defaults to "auto"
//!     weather:
//!       variables: [temperature_2m, relative_humidity_2m, wind_speed_10m]
//!       temperature_unit: celsius  # fahrenheit (default) or celsius
//!       wind_speed_unit: kmh       # mph (default), kmh, ms, or kn
//!       precipitation_unit: mm     # inch (default) or mm
//!     air_quality:
//!       variables: [pm2_5, pm10, us_aqi]
//! ```
//!
//! The available variables can be listed with `--list-variables weather` or
//! `--list-variables air_quality`. Sending `SIGHUP` reloads the configuration file.
//!
//! ### Run
//!
//! ```text
//! ./openmeteo_exporter --config-file config.yaml
//! ```
//!
//! ### Prometheus
//!
//! Prometheus metrics are exposed on port `9812` at `/metrics`. Add the host running
//! `openmeteo_exporter` as a target under the Prometheus `scrape_configs` section.
//!
//! ```yaml
//! scrape_configs:
//! - job_name: openmeteo_exporter
//!   scrape_interval: 60s
//!   static_configs:
//!   - targets: ['example:9812']
//! ```
//!

pub mod catalog;
pub mod client;
pub mod collector;
pub mod config;
pub mod http;
pub mod mapper;
pub mod metrics;
