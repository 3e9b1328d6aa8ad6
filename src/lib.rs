//! # lwrp-client
//!
//! Rust client for the Livewire Routing Protocol (LWRP), the line-oriented
//! TCP control protocol spoken by Axia audio-over-IP routing devices.
//!
//! ## Architecture
//!
//! - **Protocol layer** (`protocol`): frames socket bytes into complete
//!   messages (single lines or atomic BEGIN…END blocks), tokenizes them
//!   quote-aware, and decodes them into typed [`Record`]s.
//! - **Dispatch layer** (`dispatch`): routes each cycle's records to
//!   subscribers registered per record type, with optional fire limits.
//! - **Connection layer** (`client` / `writer`): a spawned receive loop
//!   owns the socket and alternates non-blocking reads with FIFO command
//!   transmission, while callers enqueue commands and subscribe from any
//!   task.
//!
//! ## Example
//!
//! ```ignore
//! use lwrp_client::{LwrpClient, RecordType};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = LwrpClient::connect("192.168.1.50", 93).await?;
//!
//!     client.login(None)?;
//!     client.subscribe(
//!         RecordType::Meter,
//!         |records| {
//!             for r in records {
//!                 println!("ch {:?}: peak {:?}", r.num, r.attr_text("PEAK_L"));
//!             }
//!         },
//!         None,
//!     );
//!     client.send_command("MTR")?;
//!
//!     client.wait_for_shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod commands;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod writer;

mod client;

pub use client::{ClientBuilder, ClientConfig, LwrpClient};
pub use dispatch::{SubscriptionId, SubscriptionRegistry};
pub use error::{LwrpError, Result};
pub use protocol::{AttributeValue, IoDirection, PinLevel, PinState, Record, RecordType};
