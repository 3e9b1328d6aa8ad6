//! Attribute and pin-state decoding.
//!
//! Most tokens are `KEY:value`; a few are bare keywords whose value is the
//! following token (`address 192.168.1.1`) or that carry their meaning in
//! the keyword itself (`CLIP`, `NO-LOW`). A closed rule table maps each
//! known key to its semantic field name and transform; everything else is
//! ignored so newer firmware can add fields without breaking the client.

use std::collections::HashMap;

use crate::protocol::record::{AttributeValue, PinLevel, PinState};

/// Decode strategy for one known attribute key.
enum KeyRule {
    /// `KEY:value` → named text field.
    Text(&'static str),
    /// `KEY:L:R` → `<name>_L` / `<name>_R` text fields.
    Pair(&'static str),
    /// `KEY:1|0` → named boolean flag, `"1"` is true.
    Enabled(&'static str),
    /// Bare keyword; the value is the *next* token.
    FromNextToken(&'static str),
    /// Bare keyword that is itself the value: named flag, fixed polarity.
    Marker(&'static str, bool),
    /// `NSRC:count[/type]` → `source_count`, plus `source_type` when the
    /// separator is present.
    SourceCount,
    /// `KEY:addr` where `0.0.0.0` or an empty value means "unset".
    OptionalAddress(&'static str),
}

/// Closed table of known attribute keys.
const KEY_RULES: &[(&str, KeyRule)] = &[
    ("PEAK", KeyRule::Pair("PEAK")),
    ("RMS", KeyRule::Pair("RMS")),
    ("LWRP", KeyRule::Text("protocol_version")),
    ("DEVN", KeyRule::Text("device_name")),
    ("SYSV", KeyRule::Text("system_version")),
    ("NSRC", KeyRule::SourceCount),
    ("NDST", KeyRule::Text("destination_count")),
    ("NGPI", KeyRule::Text("GPI_count")),
    ("NGPO", KeyRule::Text("GPO_count")),
    ("address", KeyRule::FromNextToken("ip_address")),
    ("netmask", KeyRule::FromNextToken("ip_netmask")),
    ("gateway", KeyRule::FromNextToken("ip_gateway")),
    ("hostname", KeyRule::FromNextToken("ip_hostname")),
    ("ADIP", KeyRule::Text("advertisement_ipaddress")),
    ("IPCLK_ADDR", KeyRule::Text("clock_ipaddress")),
    ("NIC_IPADDR", KeyRule::Text("nic_ipaddress")),
    ("NIC_NAME", KeyRule::Text("nic_name")),
    ("PSNM", KeyRule::Text("name")),
    ("NAME", KeyRule::Text("name")),
    ("LWSE", KeyRule::Enabled("livestream")),
    ("LWSA", KeyRule::Text("livestream_destination")),
    ("RTPE", KeyRule::Enabled("rtp")),
    ("RTPA", KeyRule::Text("rtp_destination")),
    ("ADDR", KeyRule::OptionalAddress("address")),
    ("CLIP", KeyRule::Marker("clip", true)),
    ("NO-CLIP", KeyRule::Marker("clip", false)),
    ("LOW", KeyRule::Marker("silence", true)),
    ("NO-LOW", KeyRule::Marker("silence", false)),
    ("CMD", KeyRule::Text("command_text")),
];

fn lookup(key: &str) -> Option<&'static KeyRule> {
    KEY_RULES
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, rule)| rule)
}

/// Decode a token list into a semantic attribute map.
///
/// Unknown keys are skipped. Repeated keys: last occurrence wins.
pub fn decode_attributes(tokens: &[String]) -> HashMap<String, AttributeValue> {
    let mut attrs = HashMap::new();
    let mut i = 0;

    while i < tokens.len() {
        let token = &tokens[i];
        let (key, value) = match token.split_once(':') {
            Some((key, value)) => (key, value),
            None => (token.as_str(), ""),
        };

        match lookup(key) {
            Some(KeyRule::Text(name)) => {
                attrs.insert(name.to_string(), AttributeValue::from(value));
            }
            Some(KeyRule::Pair(name)) => {
                if let Some((left, right)) = value.split_once(':') {
                    attrs.insert(format!("{}_L", name), AttributeValue::from(left));
                    attrs.insert(format!("{}_R", name), AttributeValue::from(right));
                }
            }
            Some(KeyRule::Enabled(name)) => {
                attrs.insert(name.to_string(), AttributeValue::from(value == "1"));
            }
            Some(KeyRule::FromNextToken(name)) => {
                if let Some(next) = tokens.get(i + 1) {
                    attrs.insert(name.to_string(), AttributeValue::from(next.as_str()));
                    i += 1;
                }
            }
            Some(KeyRule::Marker(name, polarity)) => {
                attrs.insert(name.to_string(), AttributeValue::from(*polarity));
            }
            Some(KeyRule::SourceCount) => {
                if let Some((count, source_type)) = value.split_once('/') {
                    attrs.insert("source_count".to_string(), AttributeValue::from(count));
                    attrs.insert("source_type".to_string(), AttributeValue::from(source_type));
                } else {
                    attrs.insert("source_count".to_string(), AttributeValue::from(value));
                }
            }
            Some(KeyRule::OptionalAddress(name)) => {
                let decoded = if value.is_empty() || value == "0.0.0.0" {
                    AttributeValue::Absent
                } else {
                    AttributeValue::from(value)
                };
                attrs.insert(name.to_string(), decoded);
            }
            None => {}
        }

        i += 1;
    }

    attrs
}

/// Decode a fixed-width pin-state string, one character per physical pin.
///
/// Lowercase `h`/`l` are steady levels, uppercase `H`/`L` are levels still
/// transitioning, anything else is an absent entry.
pub fn decode_pin_states(states: &str) -> Vec<PinState> {
    states
        .chars()
        .map(|ch| match ch {
            'h' => PinState {
                level: PinLevel::High,
                transitioning: false,
            },
            'H' => PinState {
                level: PinLevel::High,
                transitioning: true,
            },
            'l' => PinState {
                level: PinLevel::Low,
                transitioning: false,
            },
            'L' => PinState {
                level: PinLevel::Low,
                transitioning: true,
            },
            _ => PinState {
                level: PinLevel::Absent,
                transitioning: false,
            },
        })
        .collect()
}
