//! JSON frames exchanged with the push hub.

use serde::{Deserialize, Serialize};

/// Client -> server invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_id: String },
    #[serde(rename_all = "camelCase")]
    LeaveRoom { room_id: String },
    #[serde(rename_all = "camelCase")]
    SendSmile {
        room_id: String,
        to_user: String,
        emoji: String,
    },
}

/// Server -> client events. Frames with unknown `type` tags are ignored
/// by the reader so the hub can grow without breaking old clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    ReceiveSmile {
        to_user: String,
        emoji: String,
        /// The hub may announce who sent the reaction; older hubs omit it.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_user: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn invocations_serialize_with_camel_case_fields() {
        let join = ClientMessage::JoinRoom {
            room_id: "sprint-12".into(),
        };
        assert_eq!(
            serde_json::to_value(&join).unwrap(),
            json!({ "type": "JoinRoom", "roomId": "sprint-12" })
        );

        let smile = ClientMessage::SendSmile {
            room_id: "sprint-12".into(),
            to_user: "alice".into(),
            emoji: "🎉".into(),
        };
        assert_eq!(
            serde_json::to_value(&smile).unwrap(),
            json!({
                "type": "SendSmile",
                "roomId": "sprint-12",
                "toUser": "alice",
                "emoji": "🎉"
            })
        );
    }

    #[test]
    fn receive_smile_parses_with_and_without_sender() {
        let anonymous: ServerMessage =
            serde_json::from_value(json!({ "type": "ReceiveSmile", "toUser": "bob", "emoji": "👍" }))
                .unwrap();
        assert_eq!(
            anonymous,
            ServerMessage::ReceiveSmile {
                to_user: "bob".into(),
                emoji: "👍".into(),
                from_user: None
            }
        );

        let attributed: ServerMessage = serde_json::from_value(json!({
            "type": "ReceiveSmile",
            "toUser": "bob",
            "emoji": "👍",
            "fromUser": "alice"
        }))
        .unwrap();
        assert_eq!(
            attributed,
            ServerMessage::ReceiveSmile {
                to_user: "bob".into(),
                emoji: "👍".into(),
                from_user: Some("alice".into())
            }
        );
    }

    #[test]
    fn unknown_frames_fail_to_parse() {
        let result =
            serde_json::from_value::<ServerMessage>(json!({ "type": "SomethingElse", "x": 1 }));
        assert!(result.is_err());
    }
}
