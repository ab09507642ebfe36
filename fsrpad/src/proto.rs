//! Wire frames exchanged with the pad backend.
//!
//! Every frame is a single line of JSON: a two element array
//! `[tag, payload]` for telemetry flowing in, and a three element array
//! `["update_threshold", thresholds, index]` for the one command flowing
//! out. The tag set is closed, so decoding is an exhaustive match and
//! anything outside it is a parse error for the link to drop.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Full scale of a sensor reading (10 bit ADC).
pub static FULL_SCALE: u16 = 1023;

/// Payload of a `values` frame: one reading per channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuesPayload {
    pub values: Vec<u16>,
}

/// Payload of a `thresholds` frame: the backend's full threshold vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdsPayload {
    pub thresholds: Vec<u16>,
}

/// Frames the backend sends to us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Values(ValuesPayload),
    Thresholds(ThresholdsPayload),
}

/// Frames we send to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Full threshold vector plus the index of the edited channel.
    UpdateThreshold { thresholds: Vec<u16>, index: usize },
}

#[derive(Debug)]
pub enum Error {
    /// The frame is not valid UTF-8.
    Text(std::str::Utf8Error),
    /// The frame is not valid JSON.
    Json(serde_json::Error),
    /// The frame is valid JSON but not an array of the expected arity.
    Structure(Value),
    /// The tag is known but the payload has the wrong shape.
    Payload(&'static str, serde_json::Error),
    /// The tag is outside the known set.
    UnknownTag(String),
}

fn frame_parts(raw: &[u8], arity: usize) -> Result<Vec<Value>, Error> {
    let text = std::str::from_utf8(raw).map_err(Error::Text)?;
    let frame: Value = serde_json::from_str(text).map_err(Error::Json)?;
    match frame {
        Value::Array(parts) if parts.len() == arity => Ok(parts),
        other => Err(Error::Structure(other)),
    }
}

fn frame_tag(part: Value) -> Result<String, Error> {
    match part {
        Value::String(tag) => Ok(tag),
        other => Err(Error::Structure(other)),
    }
}

impl Inbound {
    /// Parses one line (without its newline) into a frame.
    pub fn parse(raw: &[u8]) -> Result<Inbound, Error> {
        let mut parts = frame_parts(raw, 2)?;
        let payload = parts.pop().expect("arity checked");
        let tag = frame_tag(parts.pop().expect("arity checked"))?;
        match tag.as_str() {
            "values" => serde_json::from_value(payload)
                .map(Inbound::Values)
                .map_err(|e| Error::Payload("values", e)),
            "thresholds" => serde_json::from_value(payload)
                .map(Inbound::Thresholds)
                .map_err(|e| Error::Payload("thresholds", e)),
            _ => Err(Error::UnknownTag(tag)),
        }
    }

    /// Serializes to a newline terminated frame.
    pub fn serialize(&self) -> Vec<u8> {
        let frame = match self {
            Inbound::Values(payload) => json!(["values", payload]),
            Inbound::Thresholds(payload) => json!(["thresholds", payload]),
        };
        terminate(frame)
    }
}

impl Outbound {
    pub fn parse(raw: &[u8]) -> Result<Outbound, Error> {
        let mut parts = frame_parts(raw, 3)?;
        let index = parts.pop().expect("arity checked");
        let thresholds = parts.pop().expect("arity checked");
        let tag = frame_tag(parts.pop().expect("arity checked"))?;
        match tag.as_str() {
            "update_threshold" => {
                let thresholds = serde_json::from_value(thresholds)
                    .map_err(|e| Error::Payload("update_threshold", e))?;
                let index = serde_json::from_value(index)
                    .map_err(|e| Error::Payload("update_threshold", e))?;
                Ok(Outbound::UpdateThreshold { thresholds, index })
            }
            _ => Err(Error::UnknownTag(tag)),
        }
    }

    /// Serializes to a newline terminated frame.
    pub fn serialize(&self) -> Vec<u8> {
        let frame = match self {
            Outbound::UpdateThreshold { thresholds, index } => {
                json!(["update_threshold", thresholds, index])
            }
        };
        terminate(frame)
    }
}

fn terminate(frame: Value) -> Vec<u8> {
    let mut raw = frame.to_string().into_bytes();
    raw.push(b'\n');
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_values_frame() {
        let frame = Inbound::parse(br#"["values", {"values": [512, 300]}]"#).unwrap();
        assert_eq!(
            frame,
            Inbound::Values(ValuesPayload {
                values: vec![512, 300]
            })
        );
    }

    #[test]
    fn parse_thresholds_frame() {
        let frame = Inbound::parse(br#"["thresholds", {"thresholds": [400, 600]}]"#).unwrap();
        assert_eq!(
            frame,
            Inbound::Thresholds(ThresholdsPayload {
                thresholds: vec![400, 600]
            })
        );
    }

    #[test]
    fn unknown_tag_is_its_own_error() {
        match Inbound::parse(br#"["profiles", {}]"#) {
            Err(Error::UnknownTag(tag)) => assert_eq!(tag, "profiles"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn malformed_frames_fail() {
        assert!(matches!(Inbound::parse(b"not json"), Err(Error::Json(_))));
        assert!(matches!(
            Inbound::parse(br#"{"values": []}"#),
            Err(Error::Structure(_))
        ));
        assert!(matches!(
            Inbound::parse(br#"["values", {"values": "nope"}]"#),
            Err(Error::Payload("values", _))
        ));
        assert!(matches!(
            Inbound::parse(br#"["values", {"values": []}, 3]"#),
            Err(Error::Structure(_))
        ));
    }

    #[test]
    fn update_threshold_wire_shape() {
        let cmd = Outbound::UpdateThreshold {
            thresholds: vec![400, 600],
            index: 1,
        };
        let raw = cmd.serialize();
        assert_eq!(raw, b"[\"update_threshold\",[400,600],1]\n");
        assert_eq!(Outbound::parse(&raw[..raw.len() - 1]).unwrap(), cmd);
    }
}
