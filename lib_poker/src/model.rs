//! Wire types for the room REST payloads.
//!
//! The server reports votes as plain strings with two sentinel values;
//! `VoteValue` lifts them into an enum so aggregation code cannot confuse
//! a hidden vote with the literal option `"voted"`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Wire sentinel for "committed but not yet revealed".
pub const VOTE_HIDDEN: &str = "voted";
/// Wire sentinel for "has not voted yet".
pub const VOTE_NOT_VOTED: &str = "not_voted";

/// Option deck offered when a room does not define its own.
pub const DEFAULT_VOTE_OPTIONS: [&str; 12] = [
    "0", "1", "2", "3", "5", "8", "13", "21", "34", "55", "89", "?",
];

/// A participant's vote as the server reports it.
///
/// Only the room owner's reveal transitions `Hidden` into `Cast` values;
/// the client never infers what a hidden vote holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum VoteValue {
    /// No vote submitted this round.
    #[default]
    NotVoted,
    /// A vote exists but the room has not revealed it.
    Hidden,
    /// A revealed concrete option, numeric ("8") or symbolic ("?").
    Cast(String),
}

impl VoteValue {
    /// The concrete value, if revealed.
    pub fn as_cast(&self) -> Option<&str> {
        match self {
            VoteValue::Cast(value) => Some(value),
            _ => None,
        }
    }

    /// True for both sentinels.
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, VoteValue::Cast(_))
    }
}

impl From<Option<String>> for VoteValue {
    fn from(raw: Option<String>) -> Self {
        match raw.as_deref() {
            None | Some("") | Some(VOTE_NOT_VOTED) => VoteValue::NotVoted,
            Some(VOTE_HIDDEN) => VoteValue::Hidden,
            Some(value) => VoteValue::Cast(value.to_string()),
        }
    }
}

impl From<VoteValue> for Option<String> {
    fn from(vote: VoteValue) -> Self {
        match vote {
            VoteValue::NotVoted => Some(VOTE_NOT_VOTED.to_string()),
            VoteValue::Hidden => Some(VOTE_HIDDEN.to_string()),
            VoteValue::Cast(value) => Some(value),
        }
    }
}

/// One seated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    #[serde(default)]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub vote: VoteValue,
}

/// The room as returned by `GET /rooms/{id}`.
///
/// Fetched wholesale on every synchronization tick; there are no partial
/// or delta updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    #[serde(default)]
    pub users: HashMap<String, Participant>,
    #[serde(default)]
    pub votes: HashMap<String, VoteValue>,
    #[serde(default)]
    pub show_votes: bool,
    #[serde(default)]
    pub vote_options: Vec<String>,
}

impl RoomSnapshot {
    /// Usernames currently seated, for join-time collision checks. The
    /// server stays authoritative; this is only as fresh as the snapshot.
    pub fn usernames(&self) -> Vec<&str> {
        self.users.values().map(|u| u.username.as_str()).collect()
    }
}

/// Response of `POST /rooms`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDescriptor {
    #[serde(default)]
    pub room_id: String,
    #[serde(default)]
    pub vote_options: Vec<String>,
}
