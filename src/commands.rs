//! Outbound command construction.
//!
//! Every command the client can send is built here as plain text, with
//! caller input validated synchronously: a bad direction, pin level, or
//! pin index is rejected with [`LwrpError::InvalidArgument`] before
//! anything is queued for the wire.

use crate::error::{LwrpError, Result};
use crate::protocol::record::{IoDirection, PinLevel};
use crate::protocol::tokenizer::quote;

/// Number of physical pins per GPIO channel.
pub const GPIO_PIN_COUNT: u32 = 5;

/// Longest accepted GPIO text command, in characters; longer input is
/// truncated before quoting.
pub const MAX_COMMAND_TEXT: usize = 128;

/// Which GPIO bank a command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioKind {
    /// General-purpose inputs (`GPI`).
    Input,
    /// General-purpose outputs (`GPO`).
    Output,
}

impl GpioKind {
    fn verb(self) -> &'static str {
        match self {
            GpioKind::Input => "GPI",
            GpioKind::Output => "GPO",
        }
    }
}

/// Which threshold a level-alert command configures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    /// Silence detection (`LOW.*` fields).
    Silence,
    /// Clipping detection (`CLIP.*` fields).
    Clipping,
}

impl AlertKind {
    fn field_prefix(self) -> &'static str {
        match self {
            AlertKind::Silence => "LOW",
            AlertKind::Clipping => "CLIP",
        }
    }
}

/// `LOGIN [password]`: required by devices before control commands.
///
/// The password is transmitted verbatim.
pub fn login(password: Option<&str>) -> String {
    match password {
        Some(password) => format!("LOGIN {}", password),
        None => "LOGIN".to_string(),
    }
}

/// `VER`: query device information.
pub fn device_query() -> &'static str {
    "VER"
}

/// `IP`: query network configuration.
pub fn network_query() -> &'static str {
    "IP"
}

/// `SET`: query extra settings.
pub fn settings_query() -> &'static str {
    "SET"
}

/// `SRC`: query all source channels.
pub fn source_query() -> &'static str {
    "SRC"
}

/// `DST`: query all destination channels.
pub fn destination_query() -> &'static str {
    "DST"
}

/// `MTR`: query audio level meters.
pub fn meter_query() -> &'static str {
    "MTR"
}

/// `ADD GPI` / `ADD GPO`: subscribe to pin state updates.
pub fn gpio_subscribe(kind: GpioKind) -> String {
    format!("ADD {}", kind.verb())
}

/// `SRC <n> RTPA:<addr>`: route a source channel to a multicast address.
pub fn set_source(channel: u32, address: &str) -> String {
    format!("SRC {} RTPA:{}", channel, address)
}

/// `DST <n> ADDR:<addr>`: point a destination channel at an address.
pub fn set_destination(channel: u32, address: &str) -> String {
    format!("DST {} ADDR:{}", channel, address)
}

/// `LVL ICH|OCH <n> <KIND>.LEVEL:<level> <KIND>.TIME:<ms>`: configure a
/// silence or clipping threshold for one channel.
///
/// Rejects [`IoDirection::Unknown`]: it has no wire form.
pub fn level_threshold(
    io: IoDirection,
    channel: u32,
    kind: AlertKind,
    level: i32,
    time_ms: u32,
) -> Result<String> {
    let direction = io.wire_token().ok_or_else(|| {
        LwrpError::InvalidArgument("I/O direction must be in or out".to_string())
    })?;
    let prefix = kind.field_prefix();

    Ok(format!(
        "LVL {} {} {}.LEVEL:{} {}.TIME:{}",
        direction, channel, prefix, level, prefix, time_ms
    ))
}

/// `GPI|GPO <n> <pattern>`: drive one pin, leaving the others untouched.
///
/// The pattern is fixed-width, one character per pin: the targeted pin
/// gets `h` or `l`, every other position is `x` (e.g. `xxlxx` pulls pin 3
/// low). Pins are numbered from 1.
pub fn set_pin(kind: GpioKind, channel: u32, pin: u32, level: PinLevel) -> Result<String> {
    let state = match level {
        PinLevel::High => 'h',
        PinLevel::Low => 'l',
        PinLevel::Absent => {
            return Err(LwrpError::InvalidArgument(
                "pin level must be high or low".to_string(),
            ));
        }
    };
    if pin < 1 || pin > GPIO_PIN_COUNT {
        return Err(LwrpError::InvalidArgument(format!(
            "pin index {} out of range 1..={}",
            pin, GPIO_PIN_COUNT
        )));
    }

    let pattern: String = (1..=GPIO_PIN_COUNT)
        .map(|i| if i == pin { state } else { 'x' })
        .collect();

    Ok(format!("{} {} {}", kind.verb(), channel, pattern))
}

/// `GPI|GPO <n> CMD:"<text>"`: send a text command to a GPIO channel.
///
/// The text is truncated to [`MAX_COMMAND_TEXT`] characters, then embedded
/// quotes are escaped.
pub fn pin_text(kind: GpioKind, channel: u32, text: &str) -> String {
    let truncated: String = text.chars().take(MAX_COMMAND_TEXT).collect();
    format!("{} {} CMD:{}", kind.verb(), channel, quote(&truncated))
}
