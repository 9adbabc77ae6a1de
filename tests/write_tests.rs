mod common;

use std::time::Duration;

use common::{status_document, ScriptedBackend, SERIAL, STRUCTURE, TRANSPORT_URL};
use nest_thermostat::{FanMode, HvacMode};
use serde_json::json;
use tokio::time::Instant;

fn shared_url() -> String {
    format!("{TRANSPORT_URL}/v2/put/shared.{SERIAL}")
}

fn assert_elapsed(start: Instant, expected_ms: u64) {
    let elapsed = start.elapsed();
    assert!(
        elapsed >= Duration::from_millis(expected_ms)
            && elapsed < Duration::from_millis(expected_ms + 10),
        "expected ~{expected_ms}ms, got {elapsed:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn fan_mode_confirms_on_kth_poll() {
    for k in 1..=5u64 {
        let backend = ScriptedBackend::new(status_document("F", 20.0)).reflect_on_poll(k as usize);
        let mut client = backend.connect().await;
        let start = Instant::now();

        assert!(client.set_fan_mode(FanMode::On).await.unwrap(), "k = {k}");

        let commands = backend.commands();
        assert_eq!(commands.len() as u64, k);
        assert!(commands
            .iter()
            .all(|(url, body)| *url == shared_url() && *body == json!({ "fan_mode": "on" })));
        assert_eq!(backend.fetches() as u64, 1 + k);
        assert_elapsed(start, (k - 1) * 100);
    }
}

#[tokio::test(start_paused = true)]
async fn mode_gives_up_after_five_cycles() {
    let backend = ScriptedBackend::new(status_document("F", 20.0)).never_reflect();
    let mut client = backend.connect().await;
    let start = Instant::now();

    assert!(!client.set_mode(HvacMode::Cool).await.unwrap());

    assert_eq!(backend.commands().len(), 5);
    assert_eq!(backend.fetches(), 6);
    assert_elapsed(start, 400);
    assert_eq!(client.mode().await.unwrap(), HvacMode::Heat);
}

#[tokio::test(start_paused = true)]
async fn mode_uses_backend_vocabulary() {
    let backend = ScriptedBackend::new(status_document("F", 20.0));
    let mut client = backend.connect().await;

    assert!(client.set_mode(HvacMode::Range).await.unwrap());
    assert_eq!(
        backend.commands()[0].1,
        json!({ "target_temperature_type": "range" })
    );
    assert_eq!(client.mode().await.unwrap(), HvacMode::Range);
}

#[tokio::test(start_paused = true)]
async fn away_goes_to_structure_endpoint() {
    let backend = ScriptedBackend::new(status_document("F", 20.0)).reflect_on_poll(2);
    let mut client = backend.connect().await;

    assert!(client.set_away(true).await.unwrap());

    let commands = backend.commands();
    assert_eq!(commands.len(), 2);
    assert_eq!(
        commands[0].0,
        format!("{TRANSPORT_URL}/v2/put/structure.{STRUCTURE}")
    );
    assert_eq!(commands[0].1, json!({ "away": true }));
    assert!(client.is_away().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn target_68_to_72_confirms_on_third_poll() {
    let backend = ScriptedBackend::new(status_document("F", 20.0)).reflect_on_poll(3);
    let mut client = backend.connect().await;
    assert_eq!(client.target_temperature().await.unwrap(), 68.0);
    let start = Instant::now();

    assert!(client.set_target_temperature(72.0).await.unwrap());

    let commands = backend.commands();
    assert_eq!(commands.len(), 3);
    assert_elapsed(start, 200);
    let (url, body) = &commands[0];
    assert_eq!(*url, shared_url());
    let sent = body["target_temperature"].as_f64().unwrap();
    assert!((sent - 22.222).abs() < 0.001, "sent {sent}");
    assert_eq!(body["target_change_pending"], json!(true));

    assert_eq!(client.target_temperature().await.unwrap(), 72.0);
}

#[tokio::test(start_paused = true)]
async fn target_write_is_bounded_while_change_pending() {
    let backend = ScriptedBackend::new(status_document("F", 20.0)).never_reflect();
    backend.update(|s| s["shared"][SERIAL]["target_change_pending"] = json!(true));
    let mut client = backend.connect().await;

    assert!(!client.set_target_temperature(75.0).await.unwrap());

    assert_eq!(backend.commands().len(), 5);
    // Five verification reads plus the pending-flag check.
    assert_eq!(backend.fetches(), 7);
}

#[tokio::test(start_paused = true)]
async fn failed_sends_are_swallowed() {
    let backend = ScriptedBackend::new(status_document("F", 20.0)).fail_sends(2);
    let mut client = backend.connect().await;

    assert!(client.set_fan_mode(FanMode::On).await.unwrap());
    assert_eq!(backend.commands().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn every_send_failing_returns_false() {
    let backend = ScriptedBackend::new(status_document("F", 20.0)).fail_sends(10);
    let mut client = backend.connect().await;

    assert!(!client.set_away(true).await.unwrap());
    assert_eq!(backend.commands().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn celsius_range_matches_after_rounding() {
    let backend = ScriptedBackend::new(status_document("C", 20.0));
    let mut client = backend.connect().await;

    assert!(client.set_range_temperatures(19.6, 24.4).await.unwrap());

    let commands = backend.commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(
        commands[0].1,
        json!({ "target_temperature_low": 19.6, "target_temperature_high": 24.4 })
    );
    let range = client.range_temperatures().await.unwrap();
    assert_eq!((range.low, range.high), (20.0, 24.0));
}

#[tokio::test(start_paused = true)]
async fn fahrenheit_range_is_converted_before_sending() {
    let backend = ScriptedBackend::new(status_document("F", 20.0));
    let mut client = backend.connect().await;

    assert!(client.set_range_temperatures(65.0, 76.0).await.unwrap());

    let body = &backend.commands()[0].1;
    let low = body["target_temperature_low"].as_f64().unwrap();
    let high = body["target_temperature_high"].as_f64().unwrap();
    assert!((low - 18.333).abs() < 0.001);
    assert!((high - 24.444).abs() < 0.001);
}

#[tokio::test(start_paused = true)]
async fn custom_retry_budget_is_honored() {
    let backend = ScriptedBackend::new(status_document("F", 20.0)).never_reflect();
    let mut client = nest_thermostat::NestClient::builder(common::credentials())
        .max_retries(2)
        .retry_wait(Duration::from_millis(250))
        .connect_with(backend.clone())
        .await
        .unwrap();
    let start = Instant::now();

    assert!(!client.set_fan_mode(FanMode::On).await.unwrap());
    assert_eq!(backend.commands().len(), 2);
    assert_elapsed(start, 250);
}

#[tokio::test(start_paused = true)]
async fn write_after_auth_expiry_logs_in_again() {
    let backend = ScriptedBackend::new(status_document("F", 20.0));
    let mut client = backend.connect().await;

    tokio::time::advance(Duration::from_secs(3600)).await;
    assert!(client.set_fan_mode(FanMode::On).await.unwrap());
    assert_eq!(backend.logins(), 2);
}
