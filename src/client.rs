//! Client builder and connection loop.
//!
//! [`LwrpClient::connect`] opens the TCP stream and spawns the receive
//! loop; the client handle is then shared freely between tasks. The loop
//! owns the socket and runs one cycle per tick:
//! 1. Drain the socket with non-blocking reads, feeding the frame reader
//! 2. Parse every message completed this cycle and dispatch the records
//!    as one batch
//! 3. Transmit queued commands, each written fully, in FIFO order
//! 4. Pause for the configured cycle interval
//!
//! # Example
//!
//! ```ignore
//! use lwrp_client::LwrpClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = LwrpClient::connect("192.168.1.50", 93).await?;
//!     client.login(None)?;
//!
//!     if let Some(device) = client.device_data().await? {
//!         println!("connected to {:?}", device[0].attr_text("device_name"));
//!     }
//!
//!     client.stop();
//!     Ok(())
//! }
//! ```

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::commands::{self, AlertKind, GpioKind};
use crate::dispatch::{SubscriptionId, SubscriptionRegistry};
use crate::error::{LwrpError, Result};
use crate::protocol::record::{IoDirection, PinLevel, Record, RecordType};
use crate::protocol::{parser, FrameReader};
use crate::writer::{write_command, CommandQueue, CommandSender};

/// Default pause between receive cycles.
pub const DEFAULT_CYCLE_INTERVAL: Duration = Duration::from_millis(20);

/// Default socket read buffer size.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// Default deadline for one-reply queries.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunables for a client connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Pause between receive cycles. Shorter means lower receive and stop
    /// latency at the cost of more wakeups.
    pub cycle_interval: Duration,
    /// Socket read buffer size per `try_read`.
    pub read_buffer_size: usize,
    /// Deadline for one-reply queries (`device_data` and friends).
    pub reply_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cycle_interval: DEFAULT_CYCLE_INTERVAL,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }
}

/// Builder for configuring and connecting a client.
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    /// Set the pause between receive cycles.
    pub fn cycle_interval(mut self, interval: Duration) -> Self {
        self.config.cycle_interval = interval;
        self
    }

    /// Set the socket read buffer size.
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Set the deadline for one-reply queries.
    pub fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.config.reply_timeout = timeout;
        self
    }

    /// Connect to a device and start the receive loop.
    pub async fn connect(self, host: &str, port: u16) -> Result<LwrpClient> {
        LwrpClient::start(self.config, host, port).await
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A connected LWRP client.
///
/// Cheap to share behind an `Arc`; all methods take `&self`. Dropping the
/// client requests a cooperative stop of the receive loop.
pub struct LwrpClient {
    /// Subscriptions, shared with the receive loop.
    registry: Arc<SubscriptionRegistry>,
    /// Enqueue handle for outbound commands.
    sender: CommandSender,
    /// Cooperative stop flag, observed at the top of each cycle.
    stop: Arc<AtomicBool>,
    /// Resolved when the receive loop exits.
    shutdown_rx: Option<oneshot::Receiver<Result<()>>>,
    config: ClientConfig,
    _loop_task: JoinHandle<()>,
}

impl LwrpClient {
    /// Create a client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Connect with default configuration.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        Self::builder().connect(host, port).await
    }

    /// Open the stream and spawn the receive loop.
    async fn start(config: ClientConfig, host: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(LwrpError::Connect)?;

        let registry = Arc::new(SubscriptionRegistry::new());
        let (sender, queue) = CommandQueue::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let loop_registry = Arc::clone(&registry);
        let loop_stop = Arc::clone(&stop);
        let loop_config = config.clone();
        let loop_task = tokio::spawn(async move {
            let result = run_loop(stream, loop_registry, queue, loop_stop, loop_config).await;
            if let Err(e) = &result {
                tracing::error!("receive loop terminated: {}", e);
            }
            let _ = shutdown_tx.send(result);
        });

        Ok(Self {
            registry,
            sender,
            stop,
            shutdown_rx: Some(shutdown_rx),
            config,
            _loop_task: loop_task,
        })
    }

    /// Register a callback for a record type.
    ///
    /// `limit` bounds how many dispatch cycles may fire the callback;
    /// `None` means unlimited.
    pub fn subscribe<F>(
        &self,
        record_type: RecordType,
        callback: F,
        limit: Option<NonZeroU32>,
    ) -> SubscriptionId
    where
        F: Fn(&[Record]) + Send + Sync + 'static,
    {
        self.registry.subscribe(record_type, callback, limit)
    }

    /// Remove a subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.registry.unsubscribe(id)
    }

    /// Queue raw command text for transmission.
    pub fn send_command(&self, command: &str) -> Result<()> {
        self.sender.enqueue(command)
    }

    /// Request a cooperative stop.
    ///
    /// The loop observes the flag at the top of its next cycle, finishes
    /// in-flight writes, closes the socket, and exits. Commands still
    /// queued are dropped.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Wait until the receive loop exits.
    ///
    /// Returns the loop's outcome: `Ok(())` after a requested stop, or the
    /// fatal error that terminated it.
    pub async fn wait_for_shutdown(mut self) -> Result<()> {
        match self.shutdown_rx.take() {
            Some(rx) => rx.await.unwrap_or(Ok(())),
            None => Ok(()),
        }
    }

    /// Wait for the next batch of records of one type.
    ///
    /// Resolves to `None` at the deadline: a missing reply is an absent
    /// result, not an error.
    pub async fn wait_for(
        &self,
        record_type: RecordType,
        timeout: Duration,
    ) -> Option<Vec<Record>> {
        let (id, rx) = self.arm_reply(record_type);
        self.await_reply(id, rx, timeout).await
    }

    /// Register a one-shot subscription resolved by the dispatch path.
    ///
    /// Subscribing happens immediately, before any command is sent, so a
    /// fast reply cannot slip past the caller.
    fn arm_reply(
        &self,
        record_type: RecordType,
    ) -> (SubscriptionId, oneshot::Receiver<Vec<Record>>) {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let id = self.registry.subscribe(
            record_type,
            move |records| {
                if let Ok(mut slot) = tx.lock() {
                    if let Some(tx) = slot.take() {
                        let _ = tx.send(records.to_vec());
                    }
                }
            },
            NonZeroU32::new(1),
        );
        (id, rx)
    }

    async fn await_reply(
        &self,
        id: SubscriptionId,
        rx: oneshot::Receiver<Vec<Record>>,
        timeout: Duration,
    ) -> Option<Vec<Record>> {
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(records)) => Some(records),
            _ => {
                self.registry.unsubscribe(id);
                None
            }
        }
    }

    /// Subscribe first, then send, then wait for one reply batch.
    async fn request(
        &self,
        record_type: RecordType,
        command: &str,
    ) -> Result<Option<Vec<Record>>> {
        let (id, rx) = self.arm_reply(record_type);
        if let Err(e) = self.send_command(command) {
            self.registry.unsubscribe(id);
            return Err(e);
        }
        Ok(self.await_reply(id, rx, self.config.reply_timeout).await)
    }

    // ------------------------------------------------------------------
    // Convenience API: queries
    // ------------------------------------------------------------------

    /// Log in to the device. Required before control commands.
    pub fn login(&self, password: Option<&str>) -> Result<()> {
        self.send_command(&commands::login(password))
    }

    /// Query device information (`VER`).
    pub async fn device_data(&self) -> Result<Option<Vec<Record>>> {
        self.request(RecordType::Device, commands::device_query())
            .await
    }

    /// Query network configuration (`IP`), merged with the extra fields
    /// the `SET` command reports.
    pub async fn network_data(&self) -> Result<Option<Vec<Record>>> {
        let Some(mut network) = self
            .request(RecordType::Network, commands::network_query())
            .await?
        else {
            return Ok(None);
        };

        if let Some(settings) = self
            .request(RecordType::Set, commands::settings_query())
            .await?
        {
            if let (Some(first), Some(extra)) = (network.first_mut(), settings.into_iter().next())
            {
                first.attributes.extend(extra.attributes);
            }
        }

        Ok(Some(network))
    }

    /// Query all source channels (`SRC`).
    pub async fn source_data(&self) -> Result<Option<Vec<Record>>> {
        self.request(RecordType::Source, commands::source_query())
            .await
    }

    /// Query all destination channels (`DST`).
    pub async fn destination_data(&self) -> Result<Option<Vec<Record>>> {
        self.request(RecordType::Destination, commands::destination_query())
            .await
    }

    /// Query current audio level meters (`MTR`).
    pub async fn meter_data(&self) -> Result<Option<Vec<Record>>> {
        self.request(RecordType::Meter, commands::meter_query())
            .await
    }

    /// Query current GPI pin states (`ADD GPI`).
    pub async fn gpi_data(&self) -> Result<Option<Vec<Record>>> {
        self.request(RecordType::Gpi, &commands::gpio_subscribe(GpioKind::Input))
            .await
    }

    /// Query current GPO pin states (`ADD GPO`).
    pub async fn gpo_data(&self) -> Result<Option<Vec<Record>>> {
        self.request(RecordType::Gpo, &commands::gpio_subscribe(GpioKind::Output))
            .await
    }

    // ------------------------------------------------------------------
    // Convenience API: ongoing subscriptions
    // ------------------------------------------------------------------

    /// Subscribe to source channel updates.
    pub fn source_data_sub<F>(&self, callback: F) -> Result<SubscriptionId>
    where
        F: Fn(&[Record]) + Send + Sync + 'static,
    {
        let id = self.subscribe(RecordType::Source, callback, None);
        self.send_command(commands::source_query())?;
        Ok(id)
    }

    /// Subscribe to destination channel updates.
    pub fn destination_data_sub<F>(&self, callback: F) -> Result<SubscriptionId>
    where
        F: Fn(&[Record]) + Send + Sync + 'static,
    {
        let id = self.subscribe(RecordType::Destination, callback, None);
        self.send_command(commands::destination_query())?;
        Ok(id)
    }

    /// Subscribe to GPI pin state updates.
    pub fn gpi_data_sub<F>(&self, callback: F) -> Result<SubscriptionId>
    where
        F: Fn(&[Record]) + Send + Sync + 'static,
    {
        let id = self.subscribe(RecordType::Gpi, callback, None);
        self.send_command(&commands::gpio_subscribe(GpioKind::Input))?;
        Ok(id)
    }

    /// Subscribe to GPO pin state updates.
    pub fn gpo_data_sub<F>(&self, callback: F) -> Result<SubscriptionId>
    where
        F: Fn(&[Record]) + Send + Sync + 'static,
    {
        let id = self.subscribe(RecordType::Gpo, callback, None);
        self.send_command(&commands::gpio_subscribe(GpioKind::Output))?;
        Ok(id)
    }

    /// Subscribe to silence and clipping alerts.
    pub fn level_alert_sub<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&[Record]) + Send + Sync + 'static,
    {
        self.subscribe(RecordType::LevelAlert, callback, None)
    }

    /// Subscribe to device error messages.
    pub fn error_sub<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&[Record]) + Send + Sync + 'static,
    {
        self.subscribe(RecordType::Error, callback, None)
    }

    // ------------------------------------------------------------------
    // Convenience API: control
    // ------------------------------------------------------------------

    /// Route a source channel to a multicast address.
    pub fn set_source(&self, channel: u32, address: &str) -> Result<()> {
        self.send_command(&commands::set_source(channel, address))
    }

    /// Point a destination channel at an address.
    pub fn set_destination(&self, channel: u32, address: &str) -> Result<()> {
        self.send_command(&commands::set_destination(channel, address))
    }

    /// Configure a silence threshold; waits for the device's level alert
    /// acknowledgment.
    pub async fn set_silence_threshold(
        &self,
        io: IoDirection,
        channel: u32,
        level: i32,
        time_ms: u32,
    ) -> Result<Option<Vec<Record>>> {
        let command = commands::level_threshold(io, channel, AlertKind::Silence, level, time_ms)?;
        self.request(RecordType::LevelAlert, &command).await
    }

    /// Configure a clipping threshold; waits for the device's level alert
    /// acknowledgment.
    pub async fn set_clipping_threshold(
        &self,
        io: IoDirection,
        channel: u32,
        level: i32,
        time_ms: u32,
    ) -> Result<Option<Vec<Record>>> {
        let command = commands::level_threshold(io, channel, AlertKind::Clipping, level, time_ms)?;
        self.request(RecordType::LevelAlert, &command).await
    }

    /// Drive one GPO pin high or low.
    pub fn set_gpo(&self, channel: u32, pin: u32, level: PinLevel) -> Result<()> {
        self.send_command(&commands::set_pin(GpioKind::Output, channel, pin, level)?)
    }

    /// Drive one GPI pin high or low.
    pub fn set_gpi(&self, channel: u32, pin: u32, level: PinLevel) -> Result<()> {
        self.send_command(&commands::set_pin(GpioKind::Input, channel, pin, level)?)
    }

    /// Send a text command to a GPI channel.
    pub fn set_gpi_text(&self, channel: u32, text: &str) -> Result<()> {
        self.send_command(&commands::pin_text(GpioKind::Input, channel, text))
    }

    /// Send a text command to a GPO channel.
    pub fn set_gpo_text(&self, channel: u32, text: &str) -> Result<()> {
        self.send_command(&commands::pin_text(GpioKind::Output, channel, text))
    }
}

impl Drop for LwrpClient {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// One receive loop owns the socket for the client's lifetime.
async fn run_loop(
    stream: TcpStream,
    registry: Arc<SubscriptionRegistry>,
    mut queue: CommandQueue,
    stop: Arc<AtomicBool>,
    config: ClientConfig,
) -> Result<()> {
    let mut reader = FrameReader::new();
    let mut buf = vec![0u8; config.read_buffer_size];

    loop {
        if stop.load(Ordering::Relaxed) {
            tracing::debug!("stop requested, closing connection");
            return Ok(());
        }

        // Drain the socket without blocking; would-block means no data
        // this cycle, anything else is fatal. Records from every message
        // completed this cycle form one dispatch batch.
        let mut records = Vec::new();
        loop {
            match stream.try_read(&mut buf) {
                Ok(0) => {
                    return Err(LwrpError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "peer closed the connection",
                    )));
                }
                Ok(n) => {
                    for message in reader.feed(&buf[..n]) {
                        records.extend(parser::parse(&message));
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(LwrpError::Io(e)),
            }
        }
        registry.dispatch(&records);

        // Transmit queued commands, each written fully, FIFO.
        for command in queue.drain() {
            write_command(&stream, &command).await?;
        }

        // Fixed pause bounds CPU usage, receive latency, and how long a
        // stop request can go unobserved.
        tokio::time::sleep(config.cycle_interval).await;
    }
}
