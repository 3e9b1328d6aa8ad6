//! GPIO example - watch pins and drive a GPO.
//!
//! This example demonstrates:
//! - GPIO subscriptions (`gpi_data_sub`)
//! - Driving a pin with `set_gpo`
//! - Sending a GPIO text command with `set_gpo_text`
//!
//! # Running
//!
//! ```text
//! cargo run --example gpio -- 192.168.1.50
//! ```

use std::time::Duration;

use lwrp_client::{LwrpClient, PinLevel};

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

    // Print every GPI change as it arrives.
    client.gpi_data_sub(|records| {
        for gpi in records {
            if let Some(pins) = &gpi.pin_states {
                let rendered: Vec<String> = pins
                    .iter()
                    .map(|p| format!("{:?}{}", p.level, if p.transitioning { "*" } else { "" }))
                    .collect();
                println!(
                    "GPI {}: {}",
                    gpi.num.as_deref().unwrap_or("?"),
                    rendered.join(" ")
                );
            }
        }
    })?;

    // Pulse GPO channel 1 pin 3.
    client.set_gpo(1, 3, PinLevel::Low)?;
    tokio::time::sleep(Duration::from_millis(500)).await;
    client.set_gpo(1, 3, PinLevel::High)?;

    // And fire a text command at the same channel.
    client.set_gpo_text(1, "jingle start")?;

    client.wait_for_shutdown().await?;
    Ok(())
}
