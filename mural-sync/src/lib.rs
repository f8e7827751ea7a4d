//! # mural-sync — session registry, broadcast relay, mirror client
//!
//! Multiplayer drawing over WebSocket: every operation a client sends is
//! applied to the server's authoritative canvas and relayed verbatim to
//! every other session; a joining session first receives a full snapshot.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     WebSocket      ┌──────────────┐
//! │ MirrorClient │ ◄────────────────► │ RelayServer  │
//! │  (per user)  │    JSON envelopes  │  (central)   │
//! └──────┬───────┘                    └──────┬───────┘
//!        │                                   │
//!        ▼                                   ▼
//! ┌──────────────┐                    ┌──────────────┐
//! │ Canvas       │                    │ Canvas       │
//! │ (mirror)     │                    │ (authority)  │
//! └──────────────┘                    └──────┬───────┘
//!                                            │
//!                                   ┌────────┴────────┐
//!                                   │ SessionRegistry │
//!                                   │ (fan-out, N-1)  │
//!                                   └─────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`registry`] — live sessions and N-1 fan-out
//! - [`server`] — the relay: snapshot on join, apply + rebroadcast
//! - [`client`] — headless client keeping a converging local mirror

pub mod client;
pub mod registry;
pub mod server;

pub use client::{CanvasEvent, ConnectionState, MirrorClient};
pub use registry::{SessionId, SessionRegistry};
pub use server::{RelayConfig, RelayServer, RelayStats};
