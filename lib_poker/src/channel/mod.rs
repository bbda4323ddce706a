//! Low-latency push channel for cosmetic room events.
//!
//! Distinct from the authoritative polled snapshot: the hub delivers
//! reactions in order for a single connection, but events missed while
//! disconnected are not backfilled. That loss is acceptable because
//! nothing here is part of room state.

pub mod events;
pub mod reactions;
pub mod service;
pub mod wire;

pub use events::{SmileSubscribers, SubscriptionId};
pub use reactions::{ReactionEvent, ReactionTray, REACTION_TTL};
pub use service::{ChannelConfig, ConnectionState, PushChannel, HUB_PATH};
pub use wire::{ClientMessage, ServerMessage};
