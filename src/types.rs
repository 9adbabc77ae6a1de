use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::Error;

/// Account login plus the names that pick one thermostat out of it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
    device_name: String,
    location_name: String,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        device_name: impl Into<String>,
        location_name: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            device_name: device_name.into(),
            location_name: location_name.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn location_name(&self) -> &str {
        &self.location_name
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("device_name", &self.device_name)
            .field("location_name", &self.location_name)
            .finish()
    }
}

/// Display scale configured on the thermostat. The backend always stores
/// Celsius; the scale only decides what callers see and send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TemperatureScale {
    Fahrenheit,
    Celsius,
}

impl TemperatureScale {
    pub fn as_nest_str(&self) -> &'static str {
        match self {
            TemperatureScale::Fahrenheit => "F",
            TemperatureScale::Celsius => "C",
        }
    }

    pub fn from_nest_str(s: &str) -> Option<Self> {
        match s {
            "F" => Some(TemperatureScale::Fahrenheit),
            "C" => Some(TemperatureScale::Celsius),
            _ => None,
        }
    }

    /// Backend Celsius to a whole-degree caller value.
    pub fn to_caller(&self, celsius: f64) -> f64 {
        match self {
            TemperatureScale::Fahrenheit => (celsius * 1.8 + 32.0).round(),
            TemperatureScale::Celsius => celsius.round(),
        }
    }

    /// Caller value to backend Celsius, full precision.
    pub fn to_backend(&self, value: f64) -> f64 {
        match self {
            TemperatureScale::Fahrenheit => (value - 32.0) / 1.8,
            TemperatureScale::Celsius => value,
        }
    }

    /// Clamp bounds applied to host setpoint requests.
    pub fn setpoint_limits(&self) -> (f64, f64) {
        match self {
            TemperatureScale::Fahrenheit => (40.0, 95.0),
            TemperatureScale::Celsius => (4.0, 35.0),
        }
    }
}

impl fmt::Display for TemperatureScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_nest_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FanMode {
    Auto,
    On,
}

impl FanMode {
    pub fn as_nest_str(&self) -> &'static str {
        match self {
            FanMode::Auto => "auto",
            FanMode::On => "on",
        }
    }

    pub fn from_nest_str(s: &str) -> Option<Self> {
        match s {
            "auto" | "auto on" | "0" => Some(FanMode::Auto),
            "on" | "always on" | "1" => Some(FanMode::On),
            _ => None,
        }
    }
}

impl FromStr for FanMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FanMode::from_nest_str(&s.to_ascii_lowercase()).ok_or_else(|| Error::InvalidMode(s.to_string()))
    }
}

impl fmt::Display for FanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_nest_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HvacMode {
    Cool,
    Heat,
    Range,
    Off,
}

impl HvacMode {
    pub fn as_nest_str(&self) -> &'static str {
        match self {
            HvacMode::Cool => "cool",
            HvacMode::Heat => "heat",
            HvacMode::Range => "range",
            HvacMode::Off => "off",
        }
    }

    pub fn from_nest_str(s: &str) -> Option<Self> {
        match s {
            "cool" | "cooling" => Some(HvacMode::Cool),
            "heat" | "heating" => Some(HvacMode::Heat),
            "range" | "both" | "auto" => Some(HvacMode::Range),
            "off" => Some(HvacMode::Off),
            _ => None,
        }
    }
}

impl FromStr for HvacMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HvacMode::from_nest_str(&s.to_ascii_lowercase()).ok_or_else(|| Error::InvalidMode(s.to_string()))
    }
}

impl fmt::Display for HvacMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_nest_str())
    }
}

/// Accepts the host's away vocabulary: `on`/`away` and `off`/`home`.
pub fn parse_away(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "on" | "away" | "true" => Some(true),
        "off" | "home" | "false" => Some(false),
        _ => None,
    }
}

/// Heat/cool bounds used in range mode, in caller units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RangeTemperatures {
    pub low: f64,
    pub high: f64,
}
