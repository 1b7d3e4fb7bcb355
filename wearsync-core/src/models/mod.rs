mod record;
mod snapshot;
mod weather_icon;

pub use record::SyncRecord;
pub use snapshot::{TemperatureUnit, WeatherSnapshot};
pub use weather_icon::WeatherIcon;
