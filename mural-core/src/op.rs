//! Drawing operations and their JSON wire codec.
//!
//! The envelope carries no ordering and no sender identity — ordering is
//! arrival order at the relay, and exclusion of the originator during
//! fan-out is the registry's job.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::color::Rgba;

/// Wire discriminant for [`InitOp`].
pub const OP_INIT: u8 = 1;
/// Wire discriminant for [`LineOp`].
pub const OP_LINE: u8 = 2;
/// Wire discriminant for [`TextOp`].
pub const OP_TEXT: u8 = 3;

/// Declares or resets canvas dimensions and seeds pixel content.
///
/// Sent by the server to every newly joined session as the snapshot of the
/// authoritative canvas. `data` is row-major RGBA8, `width * height * 4`
/// bytes; empty means "blank".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitOp {
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<u8>,
}

/// One straight stroke segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineOp {
    pub color: Rgba,
    pub width: f64,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// Placement of a short text run. `y` is the text baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOp {
    pub color: Rgba,
    pub size: f64,
    pub x: f64,
    pub y: f64,
    pub text: String,
}

/// A single drawing command exchanged over the wire.
///
/// Closed sum type: every consumption site matches exhaustively, so adding
/// a variant is a compile error until each site handles it.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Init(InitOp),
    Line(LineOp),
    Text(TextOp),
}

#[derive(Serialize)]
struct EnvelopeOut<'a, T: Serialize> {
    op: u8,
    payload: &'a T,
}

#[derive(Deserialize)]
struct EnvelopeIn {
    op: u64,
    #[serde(default)]
    payload: Value,
}

impl Operation {
    /// Create an init operation.
    pub fn init(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self::Init(InitOp {
            width,
            height,
            data,
        })
    }

    /// Create a line operation.
    pub fn line(color: Rgba, width: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::Line(LineOp {
            color,
            width,
            x1,
            y1,
            x2,
            y2,
        })
    }

    /// Create a text operation. `y` is the baseline.
    pub fn text(color: Rgba, size: f64, x: f64, y: f64, text: impl Into<String>) -> Self {
        Self::Text(TextOp {
            color,
            size,
            x,
            y,
            text: text.into(),
        })
    }

    /// The wire discriminant of this operation.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Init(_) => OP_INIT,
            Self::Line(_) => OP_LINE,
            Self::Text(_) => OP_TEXT,
        }
    }

    /// Serialize to the textual wire format.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let result = match self {
            Self::Init(p) => serde_json::to_string(&EnvelopeOut {
                op: OP_INIT,
                payload: p,
            }),
            Self::Line(p) => serde_json::to_string(&EnvelopeOut {
                op: OP_LINE,
                payload: p,
            }),
            Self::Text(p) => serde_json::to_string(&EnvelopeOut {
                op: OP_TEXT,
                payload: p,
            }),
        };
        result.map_err(|e| ProtocolError::Serialize(e.to_string()))
    }

    /// Deserialize from the textual wire format.
    ///
    /// The discriminant is resolved before the payload is parsed, so a
    /// garbage payload under a known tag and an unknown tag are distinct
    /// errors.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let envelope: EnvelopeIn = serde_json::from_str(text)
            .map_err(|e| ProtocolError::InvalidEnvelope(e.to_string()))?;

        let malformed = |tag: u8| {
            move |e: serde_json::Error| ProtocolError::MalformedPayload {
                tag,
                detail: e.to_string(),
            }
        };

        match envelope.op {
            tag if tag == OP_INIT as u64 => serde_json::from_value(envelope.payload)
                .map(Self::Init)
                .map_err(malformed(OP_INIT)),
            tag if tag == OP_LINE as u64 => serde_json::from_value(envelope.payload)
                .map(Self::Line)
                .map_err(malformed(OP_LINE)),
            tag if tag == OP_TEXT as u64 => serde_json::from_value(envelope.payload)
                .map(Self::Text)
                .map_err(malformed(OP_TEXT)),
            tag => Err(ProtocolError::UnknownDiscriminant(tag)),
        }
    }
}

/// Codec and transport errors.
#[derive(Debug, Clone, Error)]
pub enum ProtocolError {
    /// The envelope itself could not be parsed.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),
    /// The discriminant is outside the known operation set.
    #[error("unknown operation discriminant {0}")]
    UnknownDiscriminant(u64),
    /// The payload under a known discriminant could not be parsed.
    #[error("malformed payload for op {tag}: {detail}")]
    MalformedPayload { tag: u8, detail: String },
    /// Serialization failed.
    #[error("serialization failed: {0}")]
    Serialize(String),
    /// The underlying connection is gone.
    #[error("connection closed")]
    ConnectionClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_roundtrip() {
        let op = Operation::init(4, 2, vec![7u8; 32]);
        let encoded = op.encode().unwrap();
        assert_eq!(Operation::decode(&encoded).unwrap(), op);
    }

    #[test]
    fn test_init_empty_data_omitted() {
        let op = Operation::init(640, 480, Vec::new());
        let encoded = op.encode().unwrap();
        // Blank canvases travel without a pixel array.
        assert!(!encoded.contains("data"));
        assert_eq!(Operation::decode(&encoded).unwrap(), op);
    }

    #[test]
    fn test_line_roundtrip() {
        let op = Operation::line(Rgba::opaque(255, 0, 0), 2.5, 0.0, 0.25, 10.0, 10.75);
        let encoded = op.encode().unwrap();
        assert_eq!(Operation::decode(&encoded).unwrap(), op);
    }

    #[test]
    fn test_text_roundtrip() {
        let op = Operation::text(Rgba::new(0, 0, 0, 255), 12.0, 5.0, 5.0, "A");
        let encoded = op.encode().unwrap();
        assert_eq!(Operation::decode(&encoded).unwrap(), op);
    }

    #[test]
    fn test_text_unicode_roundtrip() {
        let op = Operation::text(Rgba::opaque(1, 2, 3), 16.0, 0.0, 0.0, "héllo ✏");
        let encoded = op.encode().unwrap();
        assert_eq!(Operation::decode(&encoded).unwrap(), op);
    }

    #[test]
    fn test_tag_values() {
        assert_eq!(Operation::init(1, 1, Vec::new()).tag(), OP_INIT);
        assert_eq!(
            Operation::line(Rgba::opaque(0, 0, 0), 1.0, 0.0, 0.0, 1.0, 1.0).tag(),
            OP_LINE
        );
        assert_eq!(
            Operation::text(Rgba::opaque(0, 0, 0), 1.0, 0.0, 0.0, "x").tag(),
            OP_TEXT
        );
    }

    #[test]
    fn test_unknown_discriminant() {
        let err = Operation::decode(r#"{"op":9,"payload":{}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownDiscriminant(9)));
    }

    #[test]
    fn test_unknown_discriminant_out_of_byte_range() {
        let err = Operation::decode(r#"{"op":300,"payload":{}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownDiscriminant(300)));
    }

    #[test]
    fn test_malformed_payload() {
        // Valid tag, payload missing required fields.
        let err = Operation::decode(r#"{"op":2,"payload":{"x1":0}}"#).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MalformedPayload { tag: OP_LINE, .. }
        ));
    }

    #[test]
    fn test_missing_payload_is_malformed() {
        let err = Operation::decode(r#"{"op":1}"#).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MalformedPayload { tag: OP_INIT, .. }
        ));
    }

    #[test]
    fn test_invalid_envelope() {
        let err = Operation::decode("not json at all").unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidEnvelope(_)));

        let err = Operation::decode(r#"{"payload":{}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidEnvelope(_)));
    }

    #[test]
    fn test_envelope_shape() {
        let op = Operation::line(Rgba::opaque(9, 8, 7), 3.0, 1.0, 2.0, 3.0, 4.0);
        let value: Value = serde_json::from_str(&op.encode().unwrap()).unwrap();
        assert_eq!(value["op"], 2);
        assert_eq!(value["payload"]["color"]["r"], 9);
        assert_eq!(value["payload"]["width"], 3.0);
    }

    #[test]
    fn test_large_snapshot_roundtrip() {
        // A 100x100 snapshot: 40,000 pixel bytes.
        let data: Vec<u8> = (0..100u32 * 100 * 4).map(|i| (i % 251) as u8).collect();
        let op = Operation::init(100, 100, data);
        let encoded = op.encode().unwrap();
        assert_eq!(Operation::decode(&encoded).unwrap(), op);
    }
}
