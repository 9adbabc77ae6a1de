use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::{Error, Result};

pub const DEFAULT_LOGIN_URL: &str = "https://home.nest.com/user/login";

const STATUS_PATH: &str = "/v2/mobile/user.";
const SHARED_PATH: &str = "/v2/put/shared.";
const DEVICE_PATH: &str = "/v2/put/device.";
const STRUCTURE_PATH: &str = "/v2/put/structure.";

const NAME: &str = "name";

pub const CURRENT_TEMPERATURE: &str = "current_temperature";
pub const CURRENT_HUMIDITY: &str = "current_humidity";
pub const FAN_MODE: &str = "fan_mode";
pub const TARGET_TEMPERATURE: &str = "target_temperature";
pub const TARGET_CHANGE_PENDING: &str = "target_change_pending";
pub const HVAC_MODE: &str = "target_temperature_type";
pub const RANGE_HIGH: &str = "target_temperature_high";
pub const RANGE_LOW: &str = "target_temperature_low";
pub const HEATER_ON: &str = "hvac_heater_state";
pub const COOLER_ON: &str = "hvac_ac_state";
pub const FAN_ON: &str = "hvac_fan_state";
pub const TEMPERATURE_SCALE: &str = "temperature_scale";
pub const AWAY: &str = "away";

/// Owning endpoint for a command payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Shared,
    Device,
    Structure,
}

#[derive(Debug, Deserialize)]
struct LoginUrls {
    transport_url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    urls: LoginUrls,
    pub access_token: String,
    pub userid: String,
}

impl LoginResponse {
    pub fn transport_url(&self) -> &str {
        self.urls.transport_url.trim_end_matches('/')
    }
}

pub(crate) fn parse_login_response(body: Value) -> Result<LoginResponse> {
    serde_json::from_value(body)
        .map_err(|e| Error::Authentication(format!("malformed login response: {e}")))
}

pub fn status_url(transport_url: &str, user_id: &str) -> String {
    format!("{transport_url}{STATUS_PATH}{user_id}")
}

pub fn command_url(transport_url: &str, endpoint: Endpoint, id: &str) -> String {
    let path = match endpoint {
        Endpoint::Shared => SHARED_PATH,
        Endpoint::Device => DEVICE_PATH,
        Endpoint::Structure => STRUCTURE_PATH,
    };
    format!("{transport_url}{path}{id}")
}

type Section = Map<String, Value>;

/// The three backend-owned sections of a status fetch, each keyed by a
/// backend id. Unknown top-level sections are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusDocument {
    #[serde(default)]
    pub device: Map<String, Value>,
    #[serde(default)]
    pub shared: Map<String, Value>,
    #[serde(default)]
    pub structure: Map<String, Value>,
}

/// Device serial and structure id the client addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifiers {
    pub serial: String,
    pub structure_id: String,
}

impl StatusDocument {
    pub fn parse(body: Value) -> Result<Self> {
        serde_json::from_value(body).map_err(|e| Error::Protocol(format!("malformed status: {e}")))
    }

    /// Reverse lookup of the configured names. Device names live in the
    /// shared section, location names in the structure section.
    pub fn resolve(&self, device_name: &str, location_name: &str) -> Result<Identifiers> {
        let serial = find_by_name(&self.shared, device_name).ok_or_else(|| Error::Resolution {
            kind: "device",
            name: device_name.to_string(),
        })?;
        let structure_id =
            find_by_name(&self.structure, location_name).ok_or_else(|| Error::Resolution {
                kind: "location",
                name: location_name.to_string(),
            })?;
        Ok(Identifiers {
            serial: serial.to_string(),
            structure_id: structure_id.to_string(),
        })
    }

    /// Device attributes first, then shared, then structure.
    pub fn lookup(&self, ids: &Identifiers, attribute: &str) -> Option<&Value> {
        [
            (&self.device, ids.serial.as_str()),
            (&self.shared, ids.serial.as_str()),
            (&self.structure, ids.structure_id.as_str()),
        ]
        .into_iter()
        .find_map(|(section, id)| section.get(id)?.get(attribute))
    }
}

fn find_by_name<'a>(section: &'a Section, name: &str) -> Option<&'a str> {
    section
        .iter()
        .find(|(_, entry)| entry.get(NAME).and_then(|v| v.as_str()) == Some(name))
        .map(|(id, _)| id.as_str())
}

pub fn set_fan_mode_data(mode: &str) -> Value {
    json!({ FAN_MODE: mode })
}

pub fn set_hvac_mode_data(mode: &str) -> Value {
    json!({ HVAC_MODE: mode })
}

pub fn set_away_data(away: bool) -> Value {
    json!({ AWAY: away })
}

pub fn set_target_data(celsius: f64) -> Value {
    json!({
        TARGET_TEMPERATURE: celsius,
        TARGET_CHANGE_PENDING: true
    })
}

pub fn set_range_data(low_c: f64, high_c: f64) -> Value {
    json!({
        RANGE_LOW: low_c,
        RANGE_HIGH: high_c
    })
}
