//! # Matchmaking Module
//!
//! The core session/matchmaking engine behind the WebSocket transport.
//!
//! ## Key Components:
//! - **Registry types**: per-connection state, waiting pool entries and the
//!   match table records (`registry`)
//! - **Profiles**: declared participant attributes and the symmetric
//!   compatibility check (`profile`)
//! - **Wire messages**: the closed control-message enums exchanged with
//!   clients (`messages`)
//! - **Service**: the single-writer engine tying it all together:
//!   lifecycle operations, the periodic matching pass, the cleanup sweeps
//!   and the audio relay (`service`)
//!
//! Audio payloads are opaque byte blobs end to end; nothing in here inspects
//! or transcodes them.

pub mod messages;
pub mod profile;
pub mod registry;
pub mod service;
