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

//! Conversion of Open-Meteo responses into gauge observations.
//!
//! Metric names are built as `{namespace}_{category}_{variable}_{unit}` where the
//! unit is derived from the unit symbol the API returned for the variable. Since
//! the unit depends on what was requested (e.g. `fahrenheit` vs `celsius`) these
//! names can't be known until a response has been received.

use crate::catalog::{self, Category};
use crate::client::{Conditions, Scalar};
use crate::metrics::{self, Observation};
use std::error;
use std::fmt;

pub const GENERATION_TIME_HELP: &str = "The time it took to generate the response, in milliseconds.";

/// Unit symbols that can't be used in a metric name as-is.
const UNIT_NAMES: &[(&str, &str)] = &[
    ("°F", "fahrenheit"),
    ("°C", "celsius"),
    ("%", "percent"),
    ("μg/m³", "ug_per_m3"),
    ("Grains/m³", "grains_per_m3"),
];

/// Convert a unit symbol from the API into a token suitable for a metric name.
///
/// Known symbols are replaced, anything else is lowercased.
pub fn canonical_unit(symbol: &str) -> String {
    UNIT_NAMES
        .iter()
        .find(|(s, _)| *s == symbol)
        .map(|(_, name)| (*name).to_owned())
        .unwrap_or_else(|| symbol.to_lowercase())
}

#[derive(Debug, Clone, PartialEq)]
pub enum MappingError {
    NotNumeric { variable: String, found: String },
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotNumeric { variable, found } => {
                write!(f, "non-numeric value for {}: {}", variable, found)
            }
        }
    }
}

impl error::Error for MappingError {}

/// Result of mapping a single response.
///
/// `missing` lists variables that were requested but had no value and `errors` lists
/// variables whose value couldn't be used. Neither prevents the other variables from
/// being mapped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapped {
    pub observations: Vec<Observation>,
    pub missing: Vec<String>,
    pub errors: Vec<MappingError>,
}

#[derive(Debug, Clone)]
pub struct Mapper {
    namespace: String,
}

impl Mapper {
    pub fn new<S: Into<String>>(namespace: S) -> Self {
        Mapper {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn generation_time_name(&self, category: Category) -> String {
        metrics::fq_name(&self.namespace, category.subsystem(), "generation_time_ms")
    }

    pub fn variable_name(&self, category: Category, variable: &str, unit: &str) -> String {
        let unit = canonical_unit(unit);
        let name = if unit.is_empty() {
            variable.to_owned()
        } else {
            format!("{}_{}", variable, unit)
        };

        metrics::fq_name(&self.namespace, category.subsystem(), &name)
    }

    pub fn map_weather(&self, location: &str, conditions: &Conditions, variables: &[String]) -> Mapped {
        self.map(Category::Weather, location, conditions, variables)
    }

    pub fn map_air_quality(&self, location: &str, conditions: &Conditions, variables: &[String]) -> Mapped {
        self.map(Category::AirQuality, location, conditions, variables)
    }

    /// Map a response to observations in the order `variables` are given, preceded by
    /// the time the API spent generating the response.
    pub fn map(&self, category: Category, location: &str, conditions: &Conditions, variables: &[String]) -> Mapped {
        let mut out = Mapped::default();
        out.observations.push(Observation::for_location(
            self.generation_time_name(category),
            GENERATION_TIME_HELP,
            location,
            conditions.generation_time_ms,
        ));

        for variable in variables {
            let unit = conditions.units.get(variable).map(String::as_str).unwrap_or("");
            let name = self.variable_name(category, variable, unit);
            // Variables are validated against the catalog when loaded, empty help is fine
            let help = catalog::describe(category, variable).unwrap_or("");

            match conditions.values.get(variable) {
                Some(Scalar::Number(v)) => {
                    out.observations.push(Observation::for_location(name, help, location, *v));
                }
                Some(Scalar::Null) | None => {
                    tracing::warn!(
                        message = "no value for metric returned",
                        location = %location,
                        category = %category,
                        variable = %variable,
                    );
                    out.missing.push(variable.clone());
                }
                Some(Scalar::Text(s)) => {
                    let err = MappingError::NotNumeric {
                        variable: variable.clone(),
                        found: s.clone(),
                    };
                    tracing::error!(
                        message = "unexpected value for metric returned",
                        location = %location,
                        category = %category,
                        error = %err,
                    );
                    out.errors.push(err);
                }
            }
        }

        out
    }
}

impl Default for Mapper {
    fn default() -> Self {
        Self::new(metrics::NAMESPACE)
    }
}
