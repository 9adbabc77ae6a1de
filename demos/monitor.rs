use std::env;
use std::sync::Arc;

use nest_thermostat::{spawn_poller, Credentials, NestClient, NestDevice, DEFAULT_POLL_INTERVAL};
use tokio::sync::Mutex;

#[tokio::main]
async fn main() -> nest_thermostat::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 5 {
        eprintln!("usage: monitor <username> <password> <device name> <location name>");
        std::process::exit(2);
    }
    let credentials = Credentials::new(&args[1], &args[2], &args[3], &args[4]);

    println!("Logging in as {}...", credentials.username());
    let client = NestClient::builder(credentials).connect().await?;
    let device = NestDevice::new(args[3].clone(), client)
        .await?
        .on_state(|state| {
            println!(
                "{:.0}\u{00b0}{} | {}% | mode: {} | fan: {} | cool {:.0} / heat {:.0}{}",
                state.temperature,
                state.scale,
                state.humidity,
                state.hvac_mode,
                state.fan_mode,
                state.setpoint_cool,
                state.setpoint_heat,
                if state.away { " | AWAY" } else { "" },
            );
        });

    let device = Arc::new(Mutex::new(device));
    let poller = spawn_poller(device.clone(), DEFAULT_POLL_INTERVAL);
    println!("Polling. Ctrl-C to stop.");

    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("failed to wait for Ctrl-C: {e}");
    }
    poller.shutdown().await;
    Ok(())
}
