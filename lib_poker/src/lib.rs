// Declare the modules; each folder of functionality is gated behind the
// matching cargo feature so consumers only pull what they need.
pub mod error;
pub mod model;

#[cfg(feature = "api")]
pub mod api;
#[cfg(feature = "channel")]
pub mod channel;
#[cfg(feature = "storage")]
pub mod storage;
#[cfg(feature = "summary")]
pub mod summary;
#[cfg(feature = "sync")]
pub mod sync;

// Re-export the surface most consumers want.
pub use error::Error;
pub use model::{Participant, RoomDescriptor, RoomSnapshot, VoteValue, DEFAULT_VOTE_OPTIONS};

#[cfg(feature = "summary")]
pub use summary::{VoteSummary, calculate};
