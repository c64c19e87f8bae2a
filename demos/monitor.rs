use proair::{Config, ProAirClient, RefreshCoordinator};
use std::env;

#[tokio::main]
async fn main() -> proair::Result<()> {
    tracing_subscriber::fmt::init();

    let mut config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("config error: {e}");
        std::process::exit(2);
    });
    if let Some(host) = env::args().nth(1) {
        config.host = host;
    }

    let client = ProAirClient::builder(&config.host)
        .port(config.port)
        .pin(&config.pin)
        .build()?;

    let coord = RefreshCoordinator::builder(client)
        .interval(config.poll_interval)
        .on_event(|event| {
            println!("{event:?}");
        })
        .on_snapshot(|unit| {
            println!(
                "[{}] canal {} | {} zone(s)",
                unit.mode_description(),
                unit.canal_temperature,
                unit.zones.len()
            );
            for zone in &unit.zones {
                println!("  {}", zone.summary());
            }
        })
        .build();

    println!("Checking PIN on {}:{}...", config.host, config.port);
    coord.validate().await?;
    println!(
        "Authenticated. Refreshing every {}s...",
        config.poll_interval.as_secs()
    );

    coord.run().await
}
