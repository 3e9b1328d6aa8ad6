//! Message parsing.
//!
//! A complete message (one line, or one BEGIN…END block) is split into
//! lines and each line is classified by its leading verb through a fixed
//! verb table. Every verb maps to a line shape that says how the remaining
//! tokens become a [`Record`]. Unknown verbs and malformed lines are
//! skipped, never an error: devices are free to emit message types this
//! client has not heard of.

use crate::protocol::attributes::{decode_attributes, decode_pin_states};
use crate::protocol::record::{IoDirection, Record, RecordType};
use crate::protocol::tokenizer::tokenize;

/// How the tokens after a verb are shaped.
enum LineShape {
    /// Attribute tokens only (`VER`, `IP`, `SET`).
    Attributes(RecordType),
    /// Channel index, then attributes (`SRC`, `DST`).
    Indexed(RecordType),
    /// I/O direction, channel index, then attributes (`MTR`).
    Metered,
    /// I/O direction, `index.side`, then attributes (`LVL`).
    Leveled,
    /// Channel index, then either a `CMD:` attribute or a pin-state
    /// string (`GPI`, `GPO`).
    Gpio(RecordType),
    /// Literal message text (`ERROR`).
    ErrorText,
    /// Block framing marker, produces no record (`BEGIN`, `END`).
    Framing,
}

/// Fixed verb table: verb → parse strategy.
const VERB_TABLE: &[(&str, LineShape)] = &[
    ("VER", LineShape::Attributes(RecordType::Device)),
    ("IP", LineShape::Attributes(RecordType::Network)),
    ("SET", LineShape::Attributes(RecordType::Set)),
    ("SRC", LineShape::Indexed(RecordType::Source)),
    ("DST", LineShape::Indexed(RecordType::Destination)),
    ("MTR", LineShape::Metered),
    ("LVL", LineShape::Leveled),
    ("GPI", LineShape::Gpio(RecordType::Gpi)),
    ("GPO", LineShape::Gpio(RecordType::Gpo)),
    ("ERROR", LineShape::ErrorText),
    ("BEGIN", LineShape::Framing),
    ("END", LineShape::Framing),
];

fn lookup(verb: &str) -> Option<&'static LineShape> {
    VERB_TABLE
        .iter()
        .find(|(v, _)| *v == verb)
        .map(|(_, shape)| shape)
}

/// Parse one complete message into zero or more records, in line order.
pub fn parse(message: &str) -> Vec<Record> {
    let mut records = Vec::new();

    for raw_line in message.lines() {
        let line = raw_line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }

        let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));

        match lookup(verb) {
            Some(shape) => {
                if let Some(record) = parse_line(shape, rest) {
                    records.push(record);
                }
            }
            None => {
                tracing::debug!(verb, "skipping line with unknown verb");
            }
        }
    }

    records
}

/// Parse the remainder of one line according to its shape.
///
/// Returns `None` for framing markers and for lines too short for their
/// shape (those are skipped, not errors).
fn parse_line(shape: &LineShape, rest: &str) -> Option<Record> {
    match shape {
        LineShape::Attributes(record_type) => {
            let tokens = tokenize(rest);
            let mut record = Record::new(*record_type);
            record.attributes = decode_attributes(&tokens);
            Some(record)
        }

        LineShape::Indexed(record_type) => {
            let tokens = tokenize(rest);
            let (num, rest) = tokens.split_first()?;
            let mut record = Record::new(*record_type);
            record.num = Some(num.clone());
            record.attributes = decode_attributes(rest);
            Some(record)
        }

        LineShape::Metered => {
            let tokens = tokenize(rest);
            if tokens.len() < 2 {
                tracing::debug!(rest, "skipping short meter line");
                return None;
            }
            let mut record = Record::new(RecordType::Meter);
            record.io = Some(IoDirection::from_wire(&tokens[0]));
            record.num = Some(tokens[1].clone());
            record.attributes = decode_attributes(&tokens[2..]);
            Some(record)
        }

        LineShape::Leveled => {
            let tokens = tokenize(rest);
            if tokens.len() < 2 {
                tracing::debug!(rest, "skipping short level alert line");
                return None;
            }
            let mut record = Record::new(RecordType::LevelAlert);
            record.io = Some(IoDirection::from_wire(&tokens[0]));
            match tokens[1].split_once('.') {
                Some((num, side)) => {
                    record.num = Some(num.to_string());
                    record.side = Some(side.to_string());
                }
                None => record.num = Some(tokens[1].clone()),
            }
            record.attributes = decode_attributes(&tokens[2..]);
            Some(record)
        }

        LineShape::Gpio(record_type) => {
            let tokens = tokenize(rest);
            let (num, rest) = tokens.split_first()?;
            let mut record = Record::new(*record_type);
            record.num = Some(num.clone());

            if rest.iter().any(|t| t.starts_with("CMD:")) {
                record.attributes = decode_attributes(rest);
            } else {
                let states = rest.first()?;
                record.pin_states = Some(decode_pin_states(states));
            }
            Some(record)
        }

        LineShape::ErrorText => {
            let mut record = Record::new(RecordType::Error);
            record.message = Some(rest.to_string());
            Some(record)
        }

        LineShape::Framing => None,
    }
}
