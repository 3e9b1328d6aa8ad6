//! Device monitor - example of querying a device and watching meters.
//!
//! This example demonstrates:
//! - Connecting with `LwrpClient::connect`
//! - One-shot queries (`device_data`, `source_data`)
//! - An ongoing meter subscription with `subscribe` + `send_command`
//!
//! # Running
//!
//! ```text
//! cargo run --example monitor -- 192.168.1.50
//! ```

use lwrp_client::{LwrpClient, RecordType};

/// Default LWRP control port.
const LWRP_PORT: u16 = 93;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lwrp_client=debug".into()),
        )
        .init();

    let host = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1".to_string());

    let client = LwrpClient::connect(&host, LWRP_PORT).await?;
    client.login(None)?;

    // Who are we talking to?
    match client.device_data().await? {
        Some(records) => {
            let device = &records[0];
            println!(
                "device: {} (LWRP {}, {} sources, {} destinations)",
                device.attr_text("device_name").unwrap_or("?"),
                device.attr_text("protocol_version").unwrap_or("?"),
                device.attr_text("source_count").unwrap_or("?"),
                device.attr_text("destination_count").unwrap_or("?"),
            );
        }
        None => println!("device did not answer the VER query"),
    }

    if let Some(sources) = client.source_data().await? {
        for source in &sources {
            println!(
                "source {:>3}: {:?} -> {:?}",
                source.num.as_deref().unwrap_or("?"),
                source.attr_text("name"),
                source.attr_text("rtp_destination"),
            );
        }
    }

    // Stream meter updates until interrupted.
    client.subscribe(
        RecordType::Meter,
        |records| {
            for meter in records {
                println!(
                    "meter {:?} ch {}: peak {}/{}",
                    meter.io,
                    meter.num.as_deref().unwrap_or("?"),
                    meter.attr_text("PEAK_L").unwrap_or("?"),
                    meter.attr_text("PEAK_R").unwrap_or("?"),
                );
            }
        },
        None,
    );
    client.send_command("MTR")?;

    client.wait_for_shutdown().await?;
    Ok(())
}
