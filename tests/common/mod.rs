#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use nest_thermostat::{Credentials, Error, NestClient, Result, Transport};
use serde_json::{json, Value};

pub const SERIAL: &str = "02AA01AC";
pub const STRUCTURE: &str = "structure-1";
pub const TRANSPORT_URL: &str = "https://transport.test";

pub fn credentials() -> Credentials {
    Credentials::new("me@example.com", "hunter2", "Hallway", "Home")
}

/// Heat mode, 21.0 C indoors, target `target_c`.
pub fn status_document(scale: &str, target_c: f64) -> Value {
    json!({
        "device": {
            SERIAL: {
                "current_humidity": 41.4,
                "temperature_scale": scale,
                "fan_mode": "auto"
            }
        },
        "shared": {
            SERIAL: {
                "name": "Hallway",
                "current_temperature": 21.0,
                "target_temperature": target_c,
                "target_temperature_type": "heat",
                "target_temperature_low": 19.0,
                "target_temperature_high": 24.0,
                "target_change_pending": false,
                "hvac_heater_state": true,
                "hvac_ac_state": false,
                "hvac_fan_state": true
            },
            "09BB0000": { "name": "Basement" }
        },
        "structure": {
            STRUCTURE: { "name": "Home", "away": false },
            "structure-2": { "name": "Cabin", "away": true }
        }
    })
}

struct State {
    status: Value,
    logins: usize,
    fetches: usize,
    commands: Vec<(String, Value)>,
    unapplied: Vec<(String, Value)>,
    polls_since_command: usize,
    reflect_on_poll: Option<usize>,
    reject_login: bool,
    failing_sends: usize,
}

/// In-memory backend. Commands are applied to the status document on the
/// k-th status fetch after the first unapplied command.
#[derive(Clone)]
pub struct ScriptedBackend {
    state: Arc<Mutex<State>>,
}

impl ScriptedBackend {
    pub fn new(status: Value) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                status,
                logins: 0,
                fetches: 0,
                commands: Vec::new(),
                unapplied: Vec::new(),
                polls_since_command: 0,
                reflect_on_poll: Some(1),
                reject_login: false,
                failing_sends: 0,
            })),
        }
    }

    pub fn reflect_on_poll(self, k: usize) -> Self {
        self.state.lock().unwrap().reflect_on_poll = Some(k);
        self
    }

    pub fn never_reflect(self) -> Self {
        self.state.lock().unwrap().reflect_on_poll = None;
        self
    }

    pub fn reject_login(self) -> Self {
        self.state.lock().unwrap().reject_login = true;
        self
    }

    /// The next `n` command sends fail without reaching the backend.
    pub fn fail_sends(self, n: usize) -> Self {
        self.state.lock().unwrap().failing_sends = n;
        self
    }

    pub fn logins(&self) -> usize {
        self.state.lock().unwrap().logins
    }

    pub fn fetches(&self) -> usize {
        self.state.lock().unwrap().fetches
    }

    pub fn commands(&self) -> Vec<(String, Value)> {
        self.state.lock().unwrap().commands.clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut Value)) {
        f(&mut self.state.lock().unwrap().status);
    }

    pub async fn connect(&self) -> NestClient<ScriptedBackend> {
        NestClient::builder(credentials())
            .connect_with(self.clone())
            .await
            .expect("connect should succeed")
    }
}

fn apply_command(status: &mut Value, url: &str, body: &Value) {
    let (section, id) = if let Some(id) = url.split("/v2/put/shared.").nth(1) {
        ("shared", id)
    } else if let Some(id) = url.split("/v2/put/device.").nth(1) {
        ("device", id)
    } else if let Some(id) = url.split("/v2/put/structure.").nth(1) {
        ("structure", id)
    } else {
        panic!("unexpected command url {url}");
    };
    for (key, value) in body.as_object().expect("object body") {
        if key == "target_change_pending" {
            continue;
        }
        let entry = status[section][id].as_object_mut().expect("entry exists");
        entry.insert(key.clone(), value.clone());

        // Shared writes also land on device attributes of the same name,
        // as the live backend propagates them.
        if section == "shared"
            && let Some(device) = status["device"][id].as_object_mut()
            && device.contains_key(key)
        {
            device.insert(key.clone(), value.clone());
        }
    }
}

impl Transport for ScriptedBackend {
    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<Value> {
        let mut state = self.state.lock().unwrap();
        state.logins += 1;
        assert!(form.contains(&("username", "me@example.com")));
        if state.reject_login {
            return Err(Error::Status { url: url.to_string(), status: 401 });
        }
        Ok(json!({
            "urls": { "transport_url": TRANSPORT_URL },
            "access_token": format!("token-{}", state.logins),
            "userid": "42"
        }))
    }

    async fn get_json(&self, url: &str, authorization: &str) -> Result<Value> {
        let mut state = self.state.lock().unwrap();
        assert_eq!(url, format!("{TRANSPORT_URL}/v2/mobile/user.42"));
        assert!(authorization.starts_with("Basic token-"));
        state.fetches += 1;

        if !state.unapplied.is_empty() {
            state.polls_since_command += 1;
            if state
                .reflect_on_poll
                .is_some_and(|k| state.polls_since_command >= k)
            {
                let pending = std::mem::take(&mut state.unapplied);
                for (url, body) in &pending {
                    apply_command(&mut state.status, url, body);
                }
                state.polls_since_command = 0;
            }
        }
        Ok(state.status.clone())
    }

    async fn post_json(&self, url: &str, _authorization: &str, body: &Value) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.commands.push((url.to_string(), body.clone()));
        if state.failing_sends > 0 {
            state.failing_sends -= 1;
            return Err(Error::Timeout);
        }
        state.unapplied.push((url.to_string(), body.clone()));
        Ok(())
    }
}
