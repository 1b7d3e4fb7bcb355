use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Today's forecast as read from the phone's weather store.
///
/// Temperatures are in degrees Celsius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherSnapshot {
    pub temp_max: f64,
    pub temp_min: f64,
    pub condition_code: i32,
}

/// Unit the producer formats temperatures in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Metric,
    Imperial,
}

impl TemperatureUnit {
    /// Formats a Celsius temperature as a whole-degree display string, e.g. `25°`.
    pub fn format(&self, celsius: f64) -> String {
        let value = match self {
            TemperatureUnit::Metric => celsius,
            TemperatureUnit::Imperial => celsius * 9.0 / 5.0 + 32.0,
        };
        // `+ 0.0` folds -0 into 0 so "-0°" is never shown.
        format!("{}\u{00B0}", value.round() + 0.0)
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemperatureUnit::Metric => write!(f, "metric"),
            TemperatureUnit::Imperial => write!(f, "imperial"),
        }
    }
}

impl FromStr for TemperatureUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "metric" => Ok(TemperatureUnit::Metric),
            "imperial" => Ok(TemperatureUnit::Imperial),
            _ => Err(format!(
                "Invalid temperature unit '{}'. Valid options: metric, imperial",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_metric() {
        assert_eq!(TemperatureUnit::Metric.format(25.0), "25°");
        assert_eq!(TemperatureUnit::Metric.format(24.6), "25°");
        assert_eq!(TemperatureUnit::Metric.format(-3.2), "-3°");
    }

    #[test]
    fn test_format_imperial() {
        assert_eq!(TemperatureUnit::Imperial.format(25.0), "77°");
        assert_eq!(TemperatureUnit::Imperial.format(-40.0), "-40°");
    }

    #[test]
    fn test_format_never_negative_zero() {
        assert_eq!(TemperatureUnit::Metric.format(-0.2), "0°");
    }

    #[test]
    fn test_unit_from_str() {
        assert_eq!(
            TemperatureUnit::from_str("Imperial").unwrap(),
            TemperatureUnit::Imperial
        );
        assert_eq!(
            TemperatureUnit::from_str("metric").unwrap(),
            TemperatureUnit::Metric
        );
        assert!(TemperatureUnit::from_str("kelvin").is_err());
    }
}
