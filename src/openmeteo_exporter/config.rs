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

use crate::catalog::{self, Category};
use serde::{Deserialize, Serialize};
use std::error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

pub const DEFAULT_TEMPERATURE_UNIT: &str = "fahrenheit";
pub const DEFAULT_WIND_SPEED_UNIT: &str = "mph";
pub const DEFAULT_PRECIPITATION_UNIT: &str = "inch";
pub const DEFAULT_TIMEZONE: &str = "auto";

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: io::Error },
    Parse(serde_yaml::Error),
    NoLocations,
    Location {
        location: String,
        field: &'static str,
        reason: String,
    },
}

impl ConfigError {
    fn location(loc: &LocationConfig, index: usize, field: &'static str, reason: impl Into<String>) -> Self {
        let location = if loc.name.is_empty() {
            format!("#{}", index)
        } else {
            loc.name.clone()
        };

        Self::Location {
            location,
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "unable to read {}: {}", path.display(), source),
            Self::Parse(e) => write!(f, "unable to parse configuration: {}", e),
            Self::NoLocations => write!(f, "invalid config, no locations provided"),
            Self::Location {
                location,
                field,
                reason,
            } => write!(f, "invalid location {}, {}: {}", location, field, reason),
        }
    }
}

impl error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct WeatherConfig {
    pub variables: Vec<String>,
    pub temperature_unit: String,
    pub wind_speed_unit: String,
    pub precipitation_unit: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AirQualityConfig {
    pub variables: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct LocationConfig {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub weather: Option<WeatherConfig>,
    pub air_quality: Option<AirQualityConfig>,
}

/// Locations to fetch weather and air quality information for.
///
/// A `Config` is only usable after [`Config::validate`] succeeds, which also fills
/// in defaults for any blank units or timezone. [`Config::load`] and [`Config::from_yaml`]
/// both validate before returning.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub locations: Vec<LocationConfig>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let mut config: Config = serde_yaml::from_str(contents).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every location, failing on the first invalid one.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.locations.is_empty() {
            return Err(ConfigError::NoLocations);
        }

        for (i, loc) in self.locations.iter_mut().enumerate() {
            loc.validate(i)?;
        }

        Ok(())
    }
}

impl LocationConfig {
    /// Variables requested for a category, `None` if the category isn't configured.
    pub fn variables(&self, category: Category) -> Option<&[String]> {
        match category {
            Category::Weather => self.weather.as_ref().map(|w| w.variables.as_slice()),
            Category::AirQuality => self.air_quality.as_ref().map(|a| a.variables.as_slice()),
        }
    }

    fn validate(&mut self, index: usize) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::location(self, index, "name", "no name provided"));
        }

        // Zero is indistinguishable from a missing value here, so locations exactly on the
        // equator or prime meridian can't be configured.
        if self.latitude == 0.0 {
            return Err(ConfigError::location(self, index, "latitude", "no latitude provided"));
        }

        if self.longitude == 0.0 {
            return Err(ConfigError::location(self, index, "longitude", "no longitude provided"));
        }

        // Open-Meteo picks the timezone based on coordinates when "auto"
        if self.timezone.is_empty() {
            self.timezone = DEFAULT_TIMEZONE.to_owned();
        }

        if self.weather.is_none() && self.air_quality.is_none() {
            return Err(ConfigError::location(
                self,
                index,
                "weather",
                "no weather or air_quality sections defined",
            ));
        }

        if let Some(res) = self.weather.as_ref().map(WeatherConfig::validated) {
            match res {
                Ok(w) => self.weather = Some(w),
                Err((field, reason)) => return Err(ConfigError::location(self, index, field, reason)),
            }
        }

        if let Some(a) = &self.air_quality {
            if let Err((field, reason)) = a.validate() {
                return Err(ConfigError::location(self, index, field, reason));
            }
        }

        Ok(())
    }
}

type FieldError = (&'static str, String);

fn validate_variables(category: Category, field: &'static str, variables: &[String]) -> Result<(), FieldError> {
    if variables.is_empty() {
        return Err((field, "no entries for variables".to_owned()));
    }

    for name in variables {
        if let Err(e) = catalog::describe(category, name) {
            return Err((field, e.to_string()));
        }
    }

    Ok(())
}

fn validate_unit(field: &'static str, unit: &str, default: &str, valid: &[&str]) -> Result<String, FieldError> {
    let unit = if unit.is_empty() { default } else { unit };
    if !valid.contains(&unit) {
        return Err((field, format!("invalid unit {}, expected one of {}", unit, valid.join(", "))));
    }

    Ok(unit.to_owned())
}

impl WeatherConfig {
    fn validated(&self) -> Result<Self, FieldError> {
        validate_variables(Category::Weather, "weather.variables", &self.variables)?;

        let temperature_unit = validate_unit(
            "weather.temperature_unit",
            &self.temperature_unit,
            DEFAULT_TEMPERATURE_UNIT,
            catalog::TEMPERATURE_UNITS,
        )?;
        let mut wind_speed_unit = validate_unit(
            "weather.wind_speed_unit",
            &self.wind_speed_unit,
            DEFAULT_WIND_SPEED_UNIT,
            catalog::WIND_SPEED_UNITS,
        )?;
        let precipitation_unit = validate_unit(
            "weather.precipitation_unit",
            &self.precipitation_unit,
            DEFAULT_PRECIPITATION_UNIT,
            catalog::PRECIPITATION_UNITS,
        )?;

        // Open-Meteo only understands "kmh"
        if wind_speed_unit == "kph" {
            wind_speed_unit = "kmh".to_owned();
        }

        Ok(Self {
            variables: self.variables.clone(),
            temperature_unit,
            wind_speed_unit,
            precipitation_unit,
        })
    }
}

impl AirQualityConfig {
    fn validate(&self) -> Result<(), FieldError> {
        validate_variables(Category::AirQuality, "air_quality.variables", &self.variables)
    }
}

/// Re-reads a configuration file and publishes it to all watchers if it is valid.
///
/// The whole `Config` is replaced at once. Readers that already hold the previous
/// `Arc<Config>` keep using it until they ask for the current value again.
#[derive(Debug)]
pub struct ConfigReloader {
    path: PathBuf,
    sender: watch::Sender<Arc<Config>>,
}

impl ConfigReloader {
    pub fn new<P: Into<PathBuf>>(path: P, initial: Config) -> (Self, watch::Receiver<Arc<Config>>) {
        let (sender, receiver) = watch::channel(Arc::new(initial));
        (
            Self {
                path: path.into(),
                sender,
            },
            receiver,
        )
    }

    /// Load and validate the configuration file, replacing the current configuration
    /// only on success. Returns the number of locations in the new configuration.
    pub fn reload(&self) -> Result<usize, ConfigError> {
        let config = Config::load(&self.path)?;
        let locations = config.locations.len();
        self.sender.send_replace(Arc::new(config));
        Ok(locations)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigError, ConfigReloader};
    use std::fs;

    const VALID: &str = r#"
locations:
  - name: Boston
    latitude: 42.36
    longitude: -71.06
    weather:
      variables: [temperature_2m, relative_humidity_2m]
    air_quality:
      variables: [pm2_5]
  - name: Denver
    latitude: 39.74
    longitude: -104.99
    timezone: America/Denver
    weather:
      variables: [wind_speed_10m]
      temperature_unit: celsius
      wind_speed_unit: kph
      precipitation_unit: mm
"#;

    fn assert_location_error(res: Result<Config, ConfigError>, location: &str, field: &str) {
        match res {
            Err(ConfigError::Location {
                location: l, field: f, ..
            }) => {
                assert_eq!(location, l);
                assert_eq!(field, f);
            }
            other => panic!("expected location error, got {:?}", other),
        }
    }

    #[test]
    fn test_from_yaml_fills_defaults() {
        let config = Config::from_yaml(VALID).unwrap();
        assert_eq!(2, config.locations.len());

        let boston = &config.locations[0];
        assert_eq!("auto", boston.timezone);
        let weather = boston.weather.as_ref().unwrap();
        assert_eq!(vec!["temperature_2m", "relative_humidity_2m"], weather.variables);
        assert_eq!("fahrenheit", weather.temperature_unit);
        assert_eq!("mph", weather.wind_speed_unit);
        assert_eq!("inch", weather.precipitation_unit);
        assert_eq!(vec!["pm2_5"], boston.air_quality.as_ref().unwrap().variables);

        let denver = &config.locations[1];
        assert_eq!("America/Denver", denver.timezone);
        let weather = denver.weather.as_ref().unwrap();
        assert_eq!("celsius", weather.temperature_unit);
        assert_eq!("kmh", weather.wind_speed_unit);
        assert_eq!("mm", weather.precipitation_unit);
        assert!(denver.air_quality.is_none());
    }

    #[test]
    fn test_validate_is_idempotent() {
        let config = Config::from_yaml(VALID).unwrap();
        let mut again = config.clone();
        again.validate().unwrap();
        assert_eq!(config, again);
    }

    #[test]
    fn test_no_locations() {
        assert!(matches!(Config::from_yaml("locations: []"), Err(ConfigError::NoLocations)));
        assert!(matches!(Config::from_yaml("{}"), Err(ConfigError::NoLocations)));
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(matches!(Config::from_yaml("locations: [name: "), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_name() {
        let res = Config::from_yaml(
            "locations:\n  - latitude: 1.5\n    longitude: 2.5\n    air_quality:\n      variables: [pm10]\n",
        );
        assert_location_error(res, "#0", "name");
    }

    #[test]
    fn test_missing_latitude() {
        let res =
            Config::from_yaml("locations:\n  - name: Here\n    longitude: 2.5\n    air_quality:\n      variables: [pm10]\n");
        assert_location_error(res, "Here", "latitude");
    }

    #[test]
    fn test_missing_longitude() {
        let res =
            Config::from_yaml("locations:\n  - name: Here\n    latitude: 1.5\n    air_quality:\n      variables: [pm10]\n");
        assert_location_error(res, "Here", "longitude");
    }

    #[test]
    fn test_null_island_is_rejected() {
        // Known limitation: zero coordinates are treated as unset
        let res = Config::from_yaml(
            "locations:\n  - name: Null Island\n    latitude: 0.0\n    longitude: 0.0\n    weather:\n      variables: [rain]\n",
        );
        assert_location_error(res, "Null Island", "latitude");
    }

    #[test]
    fn test_missing_sections() {
        let res = Config::from_yaml("locations:\n  - name: Here\n    latitude: 1.5\n    longitude: 2.5\n");
        assert_location_error(res, "Here", "weather");
    }

    #[test]
    fn test_empty_variables() {
        let res = Config::from_yaml(
            "locations:\n  - name: Here\n    latitude: 1.5\n    longitude: 2.5\n    weather:\n      variables: []\n",
        );
        assert_location_error(res, "Here", "weather.variables");
    }

    #[test]
    fn test_unknown_variable_in_wrong_category() {
        let res = Config::from_yaml(
            "locations:\n  - name: Here\n    latitude: 1.5\n    longitude: 2.5\n    air_quality:\n      variables: [pm10, temperature_2m]\n",
        );
        assert_location_error(res, "Here", "air_quality.variables");
    }

    #[test]
    fn test_invalid_units() {
        let base = "locations:\n  - name: Here\n    latitude: 1.5\n    longitude: 2.5\n    weather:\n      variables: [rain]\n";
        assert_location_error(
            Config::from_yaml(&format!("{}      temperature_unit: kelvin\n", base)),
            "Here",
            "weather.temperature_unit",
        );
        assert_location_error(
            Config::from_yaml(&format!("{}      wind_speed_unit: furlongs\n", base)),
            "Here",
            "weather.wind_speed_unit",
        );
        assert_location_error(
            Config::from_yaml(&format!("{}      precipitation_unit: cm\n", base)),
            "Here",
            "weather.precipitation_unit",
        );
    }

    #[test]
    fn test_one_bad_location_rejects_all() {
        let res = Config::from_yaml(&format!(
            "{}  - name: Broken\n    latitude: 1.5\n    longitude: 2.5\n",
            VALID
        ));
        assert_location_error(res, "Broken", "weather");
    }

    #[test]
    fn test_load_missing_file() {
        let res = Config::load("/nonexistent/openmeteo_exporter/config.yaml");
        assert!(matches!(res, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_reload_replaces_whole_config() {
        let path = std::env::temp_dir().join(format!("openmeteo_exporter_reload_{}.yaml", std::process::id()));
        fs::write(&path, VALID).unwrap();

        let initial = Config::load(&path).unwrap();
        let (reloader, receiver) = ConfigReloader::new(&path, initial);
        assert_eq!(2, receiver.borrow().locations.len());

        fs::write(
            &path,
            "locations:\n  - name: Here\n    latitude: 1.5\n    longitude: 2.5\n    air_quality:\n      variables: [pm10]\n",
        )
        .unwrap();
        assert_eq!(1, reloader.reload().unwrap());
        assert_eq!("Here", receiver.borrow().locations[0].name);

        // An invalid file leaves the previous configuration in place
        fs::write(&path, "locations: []").unwrap();
        assert!(reloader.reload().is_err());
        assert_eq!("Here", receiver.borrow().locations[0].name);

        fs::remove_file(&path).unwrap();
    }
}
