use crate::error::DynResult;
use crate::profiles::ProfileSchedule;
use serde_derive::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// GPIO pin numbers for the three color channels.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PinAssignment {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: Option<IpAddr>,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            bind: None,
            port: 5000,
        }
    }
}

/// Startup configuration. Loaded once; immutable afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub pins: PinAssignment,
    #[serde(default = "default_driver")]
    pub driver: String,
    /// Driver-specific settings, e.g. pigpiod host and port.
    #[serde(default)]
    pub driver_params: HashMap<String, String>,
    #[serde(default)]
    pub profiles: ProfileSchedule,
    #[serde(default)]
    pub http: HttpConfig,
}

fn default_driver() -> String {
    "dummy".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    PinOutOfRange(&'static str, u8),
    DuplicatePins,
}

impl std::error::Error for ConfigError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::PinOutOfRange(channel, pin) => {
                write!(f, "Pin {} for channel '{}' out of range (1-40)", pin, channel)
            }
            ConfigError::DuplicatePins => {
                write!(f, "Each color channel needs its own GPIO pin")
            }
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> DynResult<Config> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let pins = [
            ("red", self.pins.red),
            ("green", self.pins.green),
            ("blue", self.pins.blue),
        ];
        for (channel, pin) in pins {
            if !(1..=40).contains(&pin) {
                return Err(ConfigError::PinOutOfRange(channel, pin));
            }
        }
        if self.pins.red == self.pins.green
            || self.pins.green == self.pins.blue
            || self.pins.red == self.pins.blue
        {
            return Err(ConfigError::DuplicatePins);
        }
        Ok(())
    }

    /// The parameter map handed to `drivers::open`, pin assignment included.
    pub fn driver_params(&self) -> HashMap<String, String> {
        let mut params = self.driver_params.clone();
        params.insert("red_pin".to_string(), self.pins.red.to_string());
        params.insert("green_pin".to_string(), self.pins.green.to_string());
        params.insert("blue_pin".to_string(), self.pins.blue.to_string());
        params
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::color;

    fn parse(json: &str) -> Config {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config = parse(r#"{"pins": {"red": 17, "green": 22, "blue": 24}}"#);
        config.validate().unwrap();
        assert_eq!(config.driver, "dummy");
        assert_eq!(config.http.port, 5000);
        assert_eq!(config.profiles.morning, color::COOL_WHITE);
        assert_eq!(config.profiles.evening, color::WARM_WHITE);
    }

    #[test]
    fn full_config_parses() {
        let config = parse(
            r##"{
                "pins": {"red": 17, "green": 22, "blue": 24},
                "driver": "pigpio",
                "driver_params": {"host": "ledpi", "port": "8888"},
                "profiles": {"morning": "#C8DCFF", "evening": "warm_white"},
                "http": {"port": 8080}
            }"##,
        );
        config.validate().unwrap();
        assert_eq!(config.driver, "pigpio");
        assert_eq!(config.profiles.evening, color::WARM_WHITE);
        assert_eq!(config.http.port, 8080);
        let params = config.driver_params();
        assert_eq!(params.get("host").map(String::as_str), Some("ledpi"));
        assert_eq!(params.get("red_pin").map(String::as_str), Some("17"));
    }

    #[test]
    fn out_of_range_pin_is_rejected() {
        let config = parse(r#"{"pins": {"red": 0, "green": 22, "blue": 24}}"#);
        assert_eq!(
            config.validate(),
            Err(ConfigError::PinOutOfRange("red", 0))
        );
        let config = parse(r#"{"pins": {"red": 17, "green": 41, "blue": 24}}"#);
        assert_eq!(
            config.validate(),
            Err(ConfigError::PinOutOfRange("green", 41))
        );
    }

    #[test]
    fn duplicate_pins_are_rejected() {
        let config = parse(r#"{"pins": {"red": 17, "green": 17, "blue": 24}}"#);
        assert_eq!(config.validate(), Err(ConfigError::DuplicatePins));
    }
}
