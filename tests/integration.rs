//! Runs against a real unit. Configure with PROAIR_HOST / PROAIR_PIN and run
//! `cargo test --test integration -- --ignored`.

use proair::{Config, ProAirClient, RefreshCoordinator};

#[tokio::test]
#[ignore]
async fn live_refresh_cycle() {
    let config = Config::from_env().expect("invalid PROAIR_* environment");
    let client = ProAirClient::builder(&config.host)
        .port(config.port)
        .pin(&config.pin)
        .build()
        .unwrap();
    let coord = RefreshCoordinator::builder(client)
        .interval(config.poll_interval)
        .build();

    coord.validate().await.expect("PIN check failed");
    let snapshot = coord.refresh().await.expect("refresh failed");

    println!("{snapshot}");
    assert!(!snapshot.zones.is_empty());
}
