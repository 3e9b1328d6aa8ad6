//! Decoded protocol records.
//!
//! Every inbound message line decodes into at most one [`Record`]. A record
//! carries the fields common to all line shapes; fields that do not apply
//! to a given record type stay `None`.

use std::collections::HashMap;

use serde::Serialize;

/// Record type produced by the message parser.
///
/// Closed set: one variant per inbound line shape. Subscriptions are keyed
/// by this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RecordType {
    /// Device information (`VER` reply).
    Device,
    /// Network configuration (`IP` reply).
    Network,
    /// Extra settings (`SET` reply).
    Set,
    /// Audio source channel (`SRC` reply).
    Source,
    /// Audio destination channel (`DST` reply).
    Destination,
    /// Audio level meter sample (`MTR`).
    Meter,
    /// Silence/clipping level alert (`LVL`).
    LevelAlert,
    /// General-purpose input pin states or text command (`GPI`).
    Gpi,
    /// General-purpose output pin states or text command (`GPO`).
    Gpo,
    /// Error message from the device (`ERROR`).
    Error,
}

/// I/O direction of a meter or level alert channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IoDirection {
    /// Input channel (`ICH`).
    In,
    /// Output channel (`OCH`).
    Out,
    /// Direction token not recognized.
    Unknown,
}

impl IoDirection {
    /// Wire token for this direction (`ICH` / `OCH`).
    ///
    /// Returns `None` for [`IoDirection::Unknown`], which has no outbound
    /// representation.
    pub fn wire_token(self) -> Option<&'static str> {
        match self {
            IoDirection::In => Some("ICH"),
            IoDirection::Out => Some("OCH"),
            IoDirection::Unknown => None,
        }
    }

    /// Decode an inbound direction token.
    pub fn from_wire(token: &str) -> Self {
        match token {
            "ICH" => IoDirection::In,
            "OCH" => IoDirection::Out,
            _ => IoDirection::Unknown,
        }
    }
}

/// Level of a single GPIO pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PinLevel {
    /// Pin is high.
    High,
    /// Pin is low.
    Low,
    /// No state reported for this pin.
    Absent,
}

/// Decoded state of one GPIO pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PinState {
    /// Reported level.
    pub level: PinLevel,
    /// Whether the pin is mid-transition (uppercase wire character).
    pub transitioning: bool,
}

/// Decoded value of one attribute.
///
/// `Absent` is an explicit unset marker (an `ADDR` of `0.0.0.0` or empty),
/// distinct from the literal string `"0.0.0.0"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AttributeValue {
    /// Plain text value.
    Text(String),
    /// Boolean flag (livestream/rtp enables, clip/silence alerts).
    Flag(bool),
    /// Explicit unset marker.
    Absent,
}

impl AttributeValue {
    /// The text content, if this is a [`AttributeValue::Text`].
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// The flag content, if this is a [`AttributeValue::Flag`].
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            AttributeValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    /// True if this is the explicit unset marker.
    pub fn is_absent(&self) -> bool {
        matches!(self, AttributeValue::Absent)
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Text(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::Text(s)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Flag(b)
    }
}

/// One decoded protocol message line.
///
/// Produced by the message parser, grouped by [`RecordType`] and handed to
/// subscription callbacks, then discarded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// What kind of line this was.
    pub record_type: RecordType,
    /// Channel index, as transmitted (sources, destinations, meters, GPIO).
    pub num: Option<String>,
    /// I/O direction (meters and level alerts).
    pub io: Option<IoDirection>,
    /// Channel side for level alerts (the part after '.' in `LVL ICH 2.L`).
    pub side: Option<String>,
    /// Decoded attributes, last write wins for repeated keys.
    pub attributes: HashMap<String, AttributeValue>,
    /// Per-pin states for GPIO lines without a `CMD:` field.
    pub pin_states: Option<Vec<PinState>>,
    /// Literal message text (`ERROR` lines).
    pub message: Option<String>,
}

impl Record {
    /// Create an empty record of the given type.
    pub fn new(record_type: RecordType) -> Self {
        Self {
            record_type,
            num: None,
            io: None,
            side: None,
            attributes: HashMap::new(),
            pin_states: None,
            message: None,
        }
    }

    /// Look up an attribute's text value.
    pub fn attr_text(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(AttributeValue::as_text)
    }

    /// Look up an attribute's flag value.
    pub fn attr_flag(&self, key: &str) -> Option<bool> {
        self.attributes.get(key).and_then(AttributeValue::as_flag)
    }
}
