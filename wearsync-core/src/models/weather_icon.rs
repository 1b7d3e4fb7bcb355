use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Icon drawn next to the temperatures on the watch face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherIcon {
    Storm,
    LightRain,
    Rain,
    Snow,
    Fog,
    #[default]
    Clear,
    LightClouds,
    Clouds,
}

impl WeatherIcon {
    /// Maps an OpenWeatherMap condition code to its icon.
    ///
    /// Total over `i32`: codes outside the known ranges fall back to
    /// [`WeatherIcon::Clear`].
    pub fn from_condition(code: i32) -> Self {
        match code {
            200..=232 => WeatherIcon::Storm,
            300..=321 => WeatherIcon::LightRain,
            500..=504 => WeatherIcon::Rain,
            511 => WeatherIcon::Snow,
            520..=531 => WeatherIcon::Rain,
            600..=622 => WeatherIcon::Snow,
            701..=761 => WeatherIcon::Fog,
            781 => WeatherIcon::Storm,
            800 => WeatherIcon::Clear,
            801 => WeatherIcon::LightClouds,
            802..=804 => WeatherIcon::Clouds,
            _ => WeatherIcon::default(),
        }
    }

    /// Name of the drawable resource on the watch.
    pub fn resource_name(&self) -> &'static str {
        match self {
            WeatherIcon::Storm => "ic_storm",
            WeatherIcon::LightRain => "ic_light_rain",
            WeatherIcon::Rain => "ic_rain",
            WeatherIcon::Snow => "ic_snow",
            WeatherIcon::Fog => "ic_fog",
            WeatherIcon::Clear => "ic_clear",
            WeatherIcon::LightClouds => "ic_light_clouds",
            WeatherIcon::Clouds => "ic_cloudy",
        }
    }
}

impl fmt::Display for WeatherIcon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeatherIcon::Storm => write!(f, "storm"),
            WeatherIcon::LightRain => write!(f, "light_rain"),
            WeatherIcon::Rain => write!(f, "rain"),
            WeatherIcon::Snow => write!(f, "snow"),
            WeatherIcon::Fog => write!(f, "fog"),
            WeatherIcon::Clear => write!(f, "clear"),
            WeatherIcon::LightClouds => write!(f, "light_clouds"),
            WeatherIcon::Clouds => write!(f, "clouds"),
        }
    }
}

impl FromStr for WeatherIcon {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "storm" => Ok(WeatherIcon::Storm),
            "light_rain" => Ok(WeatherIcon::LightRain),
            "rain" => Ok(WeatherIcon::Rain),
            "snow" => Ok(WeatherIcon::Snow),
            "fog" => Ok(WeatherIcon::Fog),
            "clear" => Ok(WeatherIcon::Clear),
            "light_clouds" => Ok(WeatherIcon::LightClouds),
            "clouds" => Ok(WeatherIcon::Clouds),
            _ => Err(format!("Invalid weather icon '{}'", s)),
        }
    }
}
