use proair::{CoolingMode, MessageLogMode, ProAirClient, Temperature};
use std::env;
use std::future::Future;
use std::io::{self, BufRead, Write as _};
use std::pin::Pin;

#[tokio::main]
async fn main() -> proair::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let host = args
        .get(1)
        .expect("usage: validate_commands <host> [--pin <pin>] [--zone <id>] [--no-log]");
    let no_log = args.iter().any(|a| a == "--no-log");
    let flag = |name: &str| {
        args.iter()
            .position(|a| a == name)
            .and_then(|i| args.get(i + 1))
            .cloned()
    };
    let pin = flag("--pin").unwrap_or_else(|| "2909".to_string());
    let zone_id: u8 = flag("--zone").and_then(|v| v.parse().ok()).unwrap_or(1);

    let mut builder = ProAirClient::builder(host).pin(pin);

    let log_path = if !no_log {
        let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = format!("logs/validate_{ts}.ndjson");
        std::fs::create_dir_all("logs").ok();
        println!("Logging all requests/responses to {path}");
        builder = builder.message_log(MessageLogMode::Full, &path);
        Some(path)
    } else {
        None
    };

    let mut client = builder.build()?;

    println!("Checking PIN on {host}...");
    client.verify_credential().await?;

    let unit = client.fetch_status().await?;
    println!("\n=== Current State ===\n{unit}\n");
    let zone = unit
        .zone(zone_id)
        .unwrap_or_else(|| panic!("zone {zone_id} not found"))
        .clone();
    println!("{zone}\n");

    type TestCase = (&'static str, String, Box<dyn AsyncTestFn>, Box<dyn AsyncTestFn>);
    let mut all_cases: Vec<TestCase> = vec![
        (
            "Zone Power",
            format!("set_zone_{}({zone_id})", if zone.is_off { "on" } else { "off" }),
            Box::new(SetZonePower(zone_id, zone.is_off)),
            Box::new(SetZonePower(zone_id, !zone.is_off)),
        ),
        (
            "Zone Setpoint",
            format!(
                "set_zone_temperature({zone_id}, {}) [currently {}]",
                Temperature::from_tenths(zone.target_temperature.tenths() + 10),
                zone.target_temperature
            ),
            Box::new(SetZoneTemperature(
                zone_id,
                Temperature::from_tenths(zone.target_temperature.tenths() + 10),
            )),
            Box::new(SetZoneTemperature(zone_id, zone.target_temperature)),
        ),
    ];

    if unit.is_cooling {
        if let Some(mode) = CoolingMode::from_wire(unit.cool_mode) {
            let other = match mode {
                CoolingMode::Ventilation => CoolingMode::Cooling,
                _ => CoolingMode::Ventilation,
            };
            all_cases.push((
                "Cooling Sub-mode",
                format!("set_cooling_mode({other:?}) [currently {mode:?}]"),
                Box::new(SetCoolingMode(other)),
                Box::new(SetCoolingMode(mode)),
            ));
        }
    } else {
        println!("⚠ Skipping cooling sub-mode test (unit is heating)");
    }

    let total = all_cases.len();
    for (i, (name, desc, apply, revert)) in all_cases.into_iter().enumerate() {
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("Test {}/{total}: {name}", i + 1);
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        println!("\n  → Will execute: {desc}");
        wait_for_enter("Press Enter to apply (Ctrl-C to abort)...");

        apply.call(&mut client).await?;
        println!("  ✓ Command accepted");
        print_state(&mut client, zone_id).await?;
        wait_for_enter("Verify at the unit, then press Enter to revert...");

        revert.call(&mut client).await?;
        println!("  ✓ Revert accepted");
        print_state(&mut client, zone_id).await?;
        println!("  ✓ Reverted\n");
    }

    println!("All tests complete.");
    if let Some(path) = log_path {
        println!("Full request/response log: {path}");
    }
    Ok(())
}

async fn print_state(client: &mut ProAirClient, zone_id: u8) -> proair::Result<()> {
    let unit = client.fetch_status().await?;
    println!("  Unit: {}", unit.mode_description());
    match client.fetch_zone_status(zone_id).await {
        Ok(zone) => println!("  {}", zone.to_string().replace('\n', "\n  ")),
        Err(e) => println!("  ⚠ zone detail unavailable: {e}"),
    }
    Ok(())
}

fn wait_for_enter(prompt: &str) {
    print!("  {prompt} ");
    io::stdout().flush().unwrap();
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).unwrap();
}

trait AsyncTestFn: Send {
    fn call(
        self: Box<Self>,
        client: &mut ProAirClient,
    ) -> Pin<Box<dyn Future<Output = proair::Result<()>> + '_>>;
}

struct SetZonePower(u8, bool);
impl AsyncTestFn for SetZonePower {
    fn call(
        self: Box<Self>,
        client: &mut ProAirClient,
    ) -> Pin<Box<dyn Future<Output = proair::Result<()>> + '_>> {
        if self.1 {
            return Box::pin(client.set_zone_on(self.0));
        }
        Box::pin(client.set_zone_off(self.0))
    }
}

struct SetZoneTemperature(u8, Temperature);
impl AsyncTestFn for SetZoneTemperature {
    fn call(
        self: Box<Self>,
        client: &mut ProAirClient,
    ) -> Pin<Box<dyn Future<Output = proair::Result<()>> + '_>> {
        Box::pin(client.set_zone_temperature(self.0, self.1))
    }
}

struct SetCoolingMode(CoolingMode);
impl AsyncTestFn for SetCoolingMode {
    fn call(
        self: Box<Self>,
        client: &mut ProAirClient,
    ) -> Pin<Box<dyn Future<Output = proair::Result<()>> + '_>> {
        Box::pin(client.set_cooling_mode(self.0))
    }
}
