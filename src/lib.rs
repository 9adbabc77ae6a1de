mod client;
mod device;
mod diff;
mod error;
mod logger;
mod poller;
pub mod protocol;
mod session;
mod transport;
mod types;

pub use client::{
    NestClient, NestClientBuilder, DEFAULT_CACHE_TTL, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_WAIT,
};
pub use device::{DeviceState, NestDevice, ThermostatAction};
pub use error::{Error, Result};
pub use logger::MessageLogMode;
pub use poller::{spawn_poller, Poller, DEFAULT_POLL_INTERVAL};
pub use session::DEFAULT_AUTH_TTL;
pub use transport::{HttpTransport, Transport};
pub use types::*;
