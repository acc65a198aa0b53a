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
use crate::config::{AirQualityConfig, LocationConfig, WeatherConfig};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::error;
use std::fmt;

/// Keys of the `current` object that describe the measurement rather than being one.
const OMITTED_FIELDS: &[&str] = &["time", "interval"];

#[derive(Debug)]
pub enum ClientError {
    Internal(reqwest::Error),
    Unexpected { status: StatusCode, url: Url, body: String },
    Decode { url: Url, source: serde_json::Error },
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal(e) => write!(f, "{}", e),
            Self::Unexpected { status, url, body } => {
                write!(f, "received non-2XX status {} for {}: {}", status, url, body)
            }
            Self::Decode { url, source } => write!(f, "malformed response from {}: {}", url, source),
        }
    }
}

impl error::Error for ClientError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Internal(e) => Some(e),
            Self::Decode { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Value of a single variable in the `current` object of a response.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Number(f64),
    Text(String),
    Null,
}

impl From<&Value> for Scalar {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => Self::Null,
            Value::Number(n) => n.as_f64().map(Self::Number).unwrap_or_else(|| Self::Text(n.to_string())),
            Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }
}

/// Current conditions for a single location and category.
///
/// `values` and `units` contain only the requested variables the API returned,
/// keyed by variable name. They never contain the `time` or `interval` fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    pub latitude: f64,
    pub longitude: f64,
    pub generation_time_ms: f64,
    pub utc_offset_seconds: i64,
    pub timezone: String,
    pub timezone_abbreviation: String,
    pub elevation: Option<f64>,
    pub values: HashMap<String, Scalar>,
    pub units: HashMap<String, String>,
}

#[derive(Deserialize, Debug)]
struct Envelope {
    #[serde(alias = "latitude")]
    latitude: f64,
    #[serde(alias = "longitude")]
    longitude: f64,
    #[serde(alias = "generationtime_ms")]
    generation_time_ms: f64,
    #[serde(alias = "utc_offset_seconds", default)]
    utc_offset_seconds: i64,
    #[serde(alias = "timezone", default)]
    timezone: String,
    #[serde(alias = "timezone_abbreviation", default)]
    timezone_abbreviation: String,
    #[serde(alias = "elevation", default)]
    elevation: Option<f64>,
}

/// Decode a response body whose set of variables depends on what was requested.
///
/// The body is decoded once as untyped JSON to enumerate the variables present and
/// again into a typed envelope for the fields every response has.
pub(crate) fn parse_conditions(body: &[u8]) -> Result<Conditions, serde_json::Error> {
    let raw: Value = serde_json::from_slice(body)?;
    let envelope: Envelope = serde_json::from_slice(body)?;

    let mut values = HashMap::new();
    let mut units = HashMap::new();

    if let Some(current) = raw.get("current").and_then(Value::as_object) {
        let current_units = raw.get("current_units").and_then(Value::as_object);

        for (name, value) in current {
            if OMITTED_FIELDS.contains(&name.as_str()) {
                continue;
            }

            values.insert(name.clone(), Scalar::from(value));
            if let Some(unit) = current_units.and_then(|u| u.get(name)).and_then(Value::as_str) {
                units.insert(name.clone(), unit.to_owned());
            }
        }
    }

    Ok(Conditions {
        latitude: envelope.latitude,
        longitude: envelope.longitude,
        generation_time_ms: envelope.generation_time_ms,
        utc_offset_seconds: envelope.utc_offset_seconds,
        timezone: envelope.timezone,
        timezone_abbreviation: envelope.timezone_abbreviation,
        elevation: envelope.elevation,
        values,
        units,
    })
}

/// Client for the Open-Meteo forecast and air quality APIs.
///
/// Each call makes exactly one request. Timeouts are whatever the provided `reqwest::Client`
/// was built with.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: Client,
    weather_url: Url,
    air_quality_url: Url,
}

impl OpenMeteoClient {
    const USER_AGENT: &'static str = "Open-Meteo Prometheus Exporter (openmeteo_exporter)";
    const JSON_RESPONSE: &'static str = "application/json";

    pub fn new(client: Client, weather_url: Url, air_quality_url: Url) -> Self {
        OpenMeteoClient {
            client,
            weather_url,
            air_quality_url,
        }
    }

    pub async fn weather(&self, location: &LocationConfig, weather: &WeatherConfig) -> Result<Conditions, ClientError> {
        let url = self.weather_url(location, weather);
        tracing::debug!(message = "making current weather request", location = %location.name, url = %url);
        self.make_request(url).await
    }

    pub async fn air_quality(
        &self,
        location: &LocationConfig,
        air_quality: &AirQualityConfig,
    ) -> Result<Conditions, ClientError> {
        let url = self.air_quality_url(location, air_quality);
        tracing::debug!(message = "making current air quality request", location = %location.name, url = %url);
        self.make_request(url).await
    }

    /// Fetch current conditions for whichever category is requested, if the location
    /// has that category configured.
    pub async fn fetch(&self, category: Category, location: &LocationConfig) -> Option<Result<Conditions, ClientError>> {
        match category {
            Category::Weather => match &location.weather {
                Some(w) => Some(self.weather(location, w).await),
                None => None,
            },
            Category::AirQuality => match &location.air_quality {
                Some(a) => Some(self.air_quality(location, a).await),
                None => None,
            },
        }
    }

    async fn make_request(&self, url: Url) -> Result<Conditions, ClientError> {
        let res = self
            .client
            .get(url.clone())
            .header(USER_AGENT, Self::USER_AGENT)
            .header(ACCEPT, Self::JSON_RESPONSE)
            .send()
            .await
            .map_err(ClientError::Internal)?;

        let status = res.status();
        if !status.is_success() {
            let body = match res.text().await {
                Ok(b) => b,
                Err(e) => {
                    tracing::debug!(message = "unable to read error response body", url = %url, error = %e);
                    String::new()
                }
            };
            return Err(ClientError::Unexpected { status, url, body });
        }

        let body = res.bytes().await.map_err(ClientError::Internal)?;
        tracing::trace!(message = "received response", url = %url, num_bytes = body.len());
        parse_conditions(&body).map_err(|e| ClientError::Decode { url, source: e })
    }

    fn weather_url(&self, location: &LocationConfig, weather: &WeatherConfig) -> Url {
        let mut url = base_url(&self.weather_url, location, &weather.variables);
        url.query_pairs_mut()
            .append_pair("timezone", &location.timezone)
            .append_pair("temperature_unit", &weather.temperature_unit)
            .append_pair("wind_speed_unit", &weather.wind_speed_unit)
            .append_pair("precipitation_unit", &weather.precipitation_unit);
        url
    }

    fn air_quality_url(&self, location: &LocationConfig, air_quality: &AirQualityConfig) -> Url {
        base_url(&self.air_quality_url, location, &air_quality.variables)
    }
}

fn base_url(endpoint: &Url, location: &LocationConfig, variables: &[String]) -> Url {
    let mut url = endpoint.clone();
    url.query_pairs_mut()
        .append_pair("latitude", &format!("{:.6}", location.latitude))
        .append_pair("longitude", &format!("{:.6}", location.longitude))
        .append_pair("current", &variables.join(","));
    url
}
