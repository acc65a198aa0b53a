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

use prometheus_client::encoding::text;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::AtomicU64;

pub const NAMESPACE: &str = "openmeteo";
pub const LABEL_LOCATION: &str = "location";
pub const LABEL_LATITUDE: &str = "latitude";
pub const LABEL_LONGITUDE: &str = "longitude";
pub const LABEL_TIMEZONE: &str = "timezone";

pub type Labels = Vec<(String, String)>;
type GaugeFamily = Family<Labels, Gauge<f64, AtomicU64>>;

/// Name, help text, and label names of a metric known before any collection happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub name: String,
    pub help: String,
    pub labels: Vec<&'static str>,
}

/// A single gauge value produced during a scrape.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub name: String,
    pub help: String,
    pub labels: Labels,
    pub value: f64,
}

impl Observation {
    /// Observation with only a `location` label.
    pub fn for_location<N, H>(name: N, help: H, location: &str, value: f64) -> Self
    where
        N: Into<String>,
        H: Into<String>,
    {
        Self {
            name: name.into(),
            help: help.into(),
            labels: vec![(LABEL_LOCATION.to_owned(), location.to_owned())],
            value,
        }
    }
}

/// Join non-empty name components with underscores.
pub fn fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<&str>>()
        .join("_")
}

/// Render descriptors and observations in the OpenMetrics text format.
///
/// Every descriptor is included even if there are no observations for it. Observations
/// for metrics not described up front are added in the order they are first seen.
pub fn encode_text(descriptors: &[Descriptor], observations: &[Observation]) -> Result<String, fmt::Error> {
    let mut registry = Registry::default();
    let mut families: HashMap<&str, GaugeFamily> = HashMap::new();

    for d in descriptors {
        register(&mut registry, &mut families, &d.name, &d.help);
    }

    for o in observations {
        let family = register(&mut registry, &mut families, &o.name, &o.help);
        let labels: Labels = o.labels.iter().map(|(k, v)| (k.clone(), escape_label_value(v))).collect();
        family.get_or_create(&labels).set(o.value);
    }

    let mut buf = String::new();
    text::encode(&mut buf, &registry)?;
    Ok(buf)
}

/// Escape backslashes, double quotes, and line feeds which the text encoder writes verbatim.
fn escape_label_value(v: &str) -> String {
    let mut out = String::with_capacity(v.len());
    for c in v.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

fn register<'a>(
    registry: &mut Registry,
    families: &mut HashMap<&'a str, GaugeFamily>,
    name: &'a str,
    help: &str,
) -> GaugeFamily {
    families
        .entry(name)
        .or_insert_with(|| {
            let family = GaugeFamily::default();
            // The registry adds its own trailing period to help text
            registry.register(name, help.trim_end_matches('.'), family.clone());
            family
        })
        .clone()
}
