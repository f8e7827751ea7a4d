//! # mural-core — wire model for the shared canvas
//!
//! The closed set of drawing operations exchanged between clients and the
//! relay, plus their JSON wire codec.
//!
//! Every message on the wire is an envelope carrying an integer
//! discriminant and a payload whose shape is fully determined by that tag:
//!
//! ```text
//! { "op": 1|2|3, "payload": { ... } }
//! ```
//!
//! - `1` — [`InitOp`]: canvas dimensions plus optional seed pixels
//! - `2` — [`LineOp`]: one straight stroke segment
//! - `3` — [`TextOp`]: a short text run
//!
//! Unknown tags are a decode error, never silently ignored. The codec is
//! symmetric: `decode(encode(op)) == op` for every constructible value.

pub mod color;
pub mod op;

pub use color::Rgba;
pub use op::{InitOp, LineOp, Operation, ProtocolError, TextOp};
