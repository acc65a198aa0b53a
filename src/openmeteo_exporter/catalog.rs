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

//! Static catalog of the variables that can be requested from Open-Meteo.
//!
//! The catalog is used both to validate configuration and to provide help
//! text for the metrics emitted for each variable.

use std::error;
use std::fmt;
use std::str::FromStr;

pub const TEMPERATURE_UNITS: &[&str] = &["fahrenheit", "celsius"];
pub const WIND_SPEED_UNITS: &[&str] = &["kmh", "kph", "mph", "ms", "kn"];
pub const PRECIPITATION_UNITS: &[&str] = &["mm", "inch"];

const AQI_EUROPE: &str = "European Air Quality Index (AQI) calculated for different particulate matter and gases \
    individually. The consolidated european_aqi returns the maximum of all individual indices. Ranges from 0-20 (good), \
    20-40 (fair), 40-60 (moderate), 60-80 (poor), 80-100 (very poor) and exceeds 100 for extremely poor conditions.";
const AQI_US: &str = "United States Air Quality Index (AQI) calculated for different particulate matter and gases \
    individually. The consolidated us_aqi returns the maximum of all individual indices. Ranges from 0-50 (good), \
    51-100 (moderate), 101-150 (unhealthy for sensitive groups), 151-200 (unhealthy), 201-300 (very unhealthy) and \
    301-500 (hazardous).";
const POLLEN: &str = "Pollen for various plants. Only available in Europe as provided by CAMS European Air Quality forecast.";

const WEATHER_VARIABLES: &[(&str, &str)] = &[
    ("apparent_temperature", "Apparent temperature is the perceived feels-like temperature combining wind chill factor, relative humidity and solar radiation"),
    ("cape", "Convective available potential energy"),
    ("cloud_cover", "Total cloud cover as an area fraction"),
    ("cloud_cover_high", "High level clouds from 8 km altitude"),
    ("cloud_cover_low", "Low level clouds and fog up to 3 km altitude"),
    ("cloud_cover_mid", "Mid level clouds from 3 to 8 km altitude"),
    ("dew_point_2m", "Dew point temperature at 2 meters above ground"),
    ("diffuse_radiation", "Diffuse solar radiation as average of the preceding hour"),
    ("direct_normal_irradiance", "Direct solar radiation as average of the preceding hour on the normal plane (perpendicular to the sun)"),
    ("direct_radiation", "Direct solar radiation as average of the preceding hour on the horizontal plane"),
    ("et0_fao_evapotranspiration", "ET₀ Reference Evapotranspiration of a well watered grass field. Based on FAO-56 Penman-Monteith equations ET₀ is calculated from temperature, wind speed, humidity and solar radiation. Unlimited soil water is assumed. ET₀ is commonly used to estimate the required irrigation for plants."),
    ("evapotranspiration", "Evapotranspration from land surface and plants that weather models assumes for this location. Available soil water is considered. 1 mm evapotranspiration per hour equals 1 liter of water per spare meter."),
    ("freezing_level_height", "Altitude above sea level of the 0°C level"),
    ("is_day", "1 if the current time step has daylight, 0 at night."),
    ("precipitation", "Total precipitation (rain, showers, snow) sum of the preceding hour"),
    ("precipitation_probability", "Probability of precipitation with more than 0.1 mm of the preceding hour. Probability is based on ensemble weather models with 0.25° (~27 km) resolution. 30 different simulations are computed to better represent future weather conditions."),
    ("pressure_msl", "Atmospheric air pressure reduced to mean sea level (msl)"),
    ("rain", "Rain from large scale weather systems of the preceding hour in millimeter (or inch)"),
    ("relative_humidity_2m", "Relative humidity at 2 meters above ground"),
    ("shortwave_radiation", "Shortwave solar radiation as average of the preceding hour. This is equal to the total global horizontal irradiation"),
    ("showers", "Showers from convective precipitation in millimeters from the preceding hour"),
    ("snow_depth", "Snow depth on the ground in meters"),
    ("snowfall", "Snowfall amount of the preceding hour in centimeters. For the water equivalent in millimeter, divide by 7. E.g. 7 cm snow = 10 mm precipitation water equivalent"),
    ("soil_moisture_0_to_1cm", "Average soil water content as volumetric mixing ratio at 0-1 cm depths."),
    ("soil_moisture_1_to_3cm", "Average soil water content as volumetric mixing ratio at 1-3 cm depths."),
    ("soil_moisture_27_to_81cm", "Average soil water content as volumetric mixing ratio at 27-81 cm depths."),
    ("soil_moisture_3_to_9cm", "Average soil water content as volumetric mixing ratio at 3-9 cm depths."),
    ("soil_moisture_9_to_27cm", "Average soil water content as volumetric mixing ratio at 9-27 cm depths."),
    ("soil_temperature_0cm", "Temperature in the soil at 0 cm depth. 0 cm is the surface temperature on land or water surface temperature on water."),
    ("soil_temperature_18cm", "Temperature in the soil at 18 cm depth. 0 cm is the surface temperature on land or water surface temperature on water."),
    ("soil_temperature_54cm", "Temperature in the soil at 54 cm depth. 0 cm is the surface temperature on land or water surface temperature on water."),
    ("soil_temperature_6cm", "Temperature in the soil at 6 cm depth. 0 cm is the surface temperature on land or water surface temperature on water."),
    ("surface_pressure", "Atmospheric air pressure at surface"),
    ("temperature_2m", "Air temperature at 2 meters above ground"),
    ("vapour_pressure_deficit", "Vapour Pressure Deficit (VPD) in kilopascal (kPa). For high VPD (>1.6), water transpiration of plants increases. For low VPD (<0.4), transpiration decreases"),
    ("visibility", "Viewing distance in meters. Influenced by low clouds, humidity and aerosols. Maximum visibility is approximately 24 km."),
    ("weather_code", "Weather condition as a numeric code. Follow WMO weather interpretation codes."),
    ("wind_direction_10m", "Wind direction at 10 meters above ground."),
    ("wind_direction_120m", "Wind direction at 120 meters above ground."),
    ("wind_direction_180m", "Wind direction at 180 meters above ground."),
    ("wind_direction_80m", "Wind direction at 80 meters above ground."),
    ("wind_gusts_10m", "Gusts at 10 meters above ground as a maximum of the preceding hour"),
    ("wind_speed_10m", "Wind speed at 10 meters above ground."),
    ("wind_speed_120m", "Wind speed at 120 meters above ground."),
    ("wind_speed_180m", "Wind speed at 180 meters above ground."),
    ("wind_speed_80m", "Wind speed at 80 meters above ground."),
];

const AIR_QUALITY_VARIABLES: &[(&str, &str)] = &[
    ("aerosol_optical_depth", "Aerosol optical depth at 550 nm of the entire atmosphere to indicate haze."),
    ("alder_pollen", POLLEN),
    ("ammonia", "Ammonia concentration. Only available for Europe."),
    ("birch_pollen", POLLEN),
    ("carbon_monoxide", "Carbon monoxide close to surface (10 meter above ground)"),
    ("dust", "Saharan dust particles close to surface level (10 meter above ground)."),
    ("european_aqi", AQI_EUROPE),
    ("european_aqi_nitrogen_dioxide", AQI_EUROPE),
    ("european_aqi_ozone", AQI_EUROPE),
    ("european_aqi_pm10", AQI_EUROPE),
    ("european_aqi_pm2_5", AQI_EUROPE),
    ("european_aqi_sulphur_dioxide", AQI_EUROPE),
    ("grass_pollen", POLLEN),
    ("mugwort_pollen", POLLEN),
    ("nitrogen_dioxide", "Nitrogen dioxide close to surface (10 meter above ground)"),
    ("olive_pollen", POLLEN),
    ("ozone", "Ozone close to surface (10 meter above ground)"),
    ("pm10", "Particulate matter with diameter smaller than 10 µm (PM10) close to surface (10 meter above ground)"),
    ("pm2_5", "Particulate matter with diameter smaller than 2.5 µm (PM2.5) close to surface (10 meter above ground)"),
    ("ragweed_pollen", POLLEN),
    ("sulphur_dioxide", "Sulphur dioxide close to surface (10 meter above ground)"),
    ("us_aqi", AQI_US),
    ("us_aqi_carbon_monoxide", AQI_US),
    ("us_aqi_nitrogen_dioxide", AQI_US),
    ("us_aqi_ozone", AQI_US),
    ("us_aqi_pm10", AQI_US),
    ("us_aqi_pm2_5", AQI_US),
    ("us_aqi_sulphur_dioxide", AQI_US),
    ("uv_index", "UV index considering clouds. See ECMWF UV Index recommendation for more information"),
    ("uv_index_clear_sky", "UV index considering clear sky. See ECMWF UV Index recommendation for more information"),
];

/// One of the upstream data domains, each with its own variables and endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Weather,
    AirQuality,
}

impl Category {
    /// Name of the category as used in configuration and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::AirQuality => "air_quality",
        }
    }

    /// Name of the category as it appears in metric names.
    pub fn subsystem(&self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::AirQuality => "airquality",
        }
    }

    /// All variables that can be requested for this category, sorted by name.
    pub fn variables(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Weather => WEATHER_VARIABLES,
            Self::AirQuality => AIR_QUALITY_VARIABLES,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weather" => Ok(Self::Weather),
            "air_quality" | "airquality" => Ok(Self::AirQuality),
            _ => Err(format!("unknown category {}, expected 'weather' or 'air_quality'", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariable {
    pub category: Category,
    pub name: String,
}

impl fmt::Display for UnknownVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} variable name: {}", self.category, self.name)
    }
}

impl error::Error for UnknownVariable {}

/// Get the description of a variable, failing if the variable does not exist in the category.
pub fn describe(category: Category, name: &str) -> Result<&'static str, UnknownVariable> {
    category
        .variables()
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, desc)| *desc)
        .ok_or_else(|| UnknownVariable {
            category,
            name: name.to_owned(),
        })
}

pub fn is_valid(category: Category, name: &str) -> bool {
    describe(category, name).is_ok()
}
