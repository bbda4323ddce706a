//! REST surface of the external room server.
//!
//! The server owns all authoritative state (room lifecycle, vote storage,
//! admin verification); this module only consumes its HTTP/JSON contract.

pub mod admin;
pub mod client;
pub mod rooms;

pub use admin::AdminSession;
pub use client::{ApiClient, ApiResponse};
pub use rooms::RoomApi;
