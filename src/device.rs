use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::client::NestClient;
use crate::transport::{HttpTransport, Transport};
use crate::types::*;
use crate::Result;

type StateCallback = Box<dyn Fn(&DeviceState) + Send + Sync>;

/// Thermostat state as the automation host displays it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceState {
    pub temperature: f64,
    pub humidity: u8,
    pub scale: TemperatureScale,
    pub hvac_mode: HvacMode,
    pub fan_mode: FanMode,
    pub cooler_on: bool,
    pub heater_on: bool,
    pub fan_on: bool,
    pub away: bool,
    pub setpoint_cool: f64,
    pub setpoint_heat: f64,
    pub updated_at: DateTime<Utc>,
}

/// Requests the host dispatches to a device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThermostatAction {
    SetHvacMode(HvacMode),
    SetFanMode(FanMode),
    SetCoolSetpoint(f64),
    SetHeatSetpoint(f64),
    AdjustCoolSetpoint(f64),
    AdjustHeatSetpoint(f64),
    SetAway(bool),
    RequestStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Setpoint {
    Cool,
    Heat,
}

/// Binds one client to the host's view of the device. Host state changes
/// only after the backend confirmed a write.
pub struct NestDevice<T: Transport = HttpTransport> {
    name: String,
    client: NestClient<T>,
    state: DeviceState,
    state_callbacks: Vec<StateCallback>,
}

impl<T: Transport> NestDevice<T> {
    pub async fn new(name: impl Into<String>, mut client: NestClient<T>) -> Result<Self> {
        let state = read_state(&mut client, None).await?;
        Ok(Self {
            name: name.into(),
            client,
            state,
            state_callbacks: Vec::new(),
        })
    }

    pub fn on_state(mut self, f: impl Fn(&DeviceState) + Send + Sync + 'static) -> Self {
        self.state_callbacks.push(Box::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn client(&self) -> &NestClient<T> {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut NestClient<T> {
        &mut self.client
    }

    /// Re-reads every state from the thermostat and pushes it to the host.
    pub async fn refresh(&mut self) -> Result<&DeviceState> {
        self.state = read_state(&mut self.client, Some(&self.state)).await?;
        self.notify();
        Ok(&self.state)
    }

    /// Runs a host action. Returns whether the backend confirmed it.
    pub async fn apply(&mut self, action: ThermostatAction) -> Result<bool> {
        let confirmed = match action {
            ThermostatAction::SetHvacMode(mode) => {
                let ok = self.client.set_mode(mode).await?;
                if ok {
                    self.state.hvac_mode = mode;
                }
                ok
            }
            ThermostatAction::SetFanMode(mode) => {
                let ok = self.client.set_fan_mode(mode).await?;
                if ok {
                    self.state.fan_mode = mode;
                }
                ok
            }
            ThermostatAction::SetAway(away) => {
                let ok = self.client.set_away(away).await?;
                if ok {
                    self.state.away = away;
                }
                ok
            }
            ThermostatAction::SetCoolSetpoint(value) => {
                self.change_setpoint(Setpoint::Cool, value).await?
            }
            ThermostatAction::SetHeatSetpoint(value) => {
                self.change_setpoint(Setpoint::Heat, value).await?
            }
            ThermostatAction::AdjustCoolSetpoint(delta) => {
                let value = self.state.setpoint_cool + delta;
                self.change_setpoint(Setpoint::Cool, value).await?
            }
            ThermostatAction::AdjustHeatSetpoint(delta) => {
                let value = self.state.setpoint_heat + delta;
                self.change_setpoint(Setpoint::Heat, value).await?
            }
            ThermostatAction::RequestStatus => {
                self.refresh().await?;
                return Ok(true);
            }
        };

        if confirmed {
            info!(device = %self.name, ?action, "sent");
            self.state.updated_at = Utc::now();
            self.notify();
        } else {
            error!(device = %self.name, ?action, "send failed");
        }
        Ok(confirmed)
    }

    async fn change_setpoint(&mut self, which: Setpoint, requested: f64) -> Result<bool> {
        let (min, max) = self.client.temperature_scale().await?.setpoint_limits();
        let value = requested.clamp(min, max);
        let mode = self.client.mode().await?;

        let confirmed = match (which, mode) {
            (Setpoint::Cool, HvacMode::Cool) | (Setpoint::Heat, HvacMode::Heat) => {
                self.client.set_target_temperature(value).await?
            }
            (Setpoint::Cool, HvacMode::Range) => {
                let range = self.client.range_temperatures().await?;
                self.client.set_range_temperatures(range.low, value).await?
            }
            (Setpoint::Heat, HvacMode::Range) => {
                let range = self.client.range_temperatures().await?;
                self.client.set_range_temperatures(value, range.high).await?
            }
            _ => {
                debug!(device = %self.name, ?which, %mode, "setpoint not used in this mode");
                false
            }
        };

        if confirmed {
            match which {
                Setpoint::Cool => self.state.setpoint_cool = value,
                Setpoint::Heat => self.state.setpoint_heat = value,
            }
        }
        Ok(confirmed)
    }

    fn notify(&self) {
        for cb in &self.state_callbacks {
            cb(&self.state);
        }
    }
}

async fn read_state<T: Transport>(
    client: &mut NestClient<T>,
    previous: Option<&DeviceState>,
) -> Result<DeviceState> {
    let hvac_mode = client.mode().await?;
    let (setpoint_cool, setpoint_heat) = match hvac_mode {
        HvacMode::Cool => (client.target_temperature().await?, 0.0),
        HvacMode::Heat => (0.0, client.target_temperature().await?),
        HvacMode::Range => {
            let range = client.range_temperatures().await?;
            (range.high, range.low)
        }
        HvacMode::Off => previous
            .map(|p| (p.setpoint_cool, p.setpoint_heat))
            .unwrap_or((0.0, 0.0)),
    };

    Ok(DeviceState {
        temperature: client.temperature().await?,
        humidity: client.humidity().await?,
        scale: client.temperature_scale().await?,
        hvac_mode,
        fan_mode: client.fan_mode().await?,
        cooler_on: client.is_cooling().await?,
        heater_on: client.is_heating().await?,
        fan_on: client.is_fan_running().await?,
        away: client.is_away().await?,
        setpoint_cool,
        setpoint_heat,
        updated_at: Utc::now(),
    })
}
