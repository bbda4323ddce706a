//! Typed operations for the room endpoints.
//!
//! Status mapping, room by room with the server's quirks: a fetch can
//! report "no such room" either as a 404 or as a 2xx body carrying an
//! `error` field, and `verify-admin` answers a wrong password with a 401
//! that is a negative verification rather than a failure.

use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::Error;
use crate::model::{RoomDescriptor, RoomSnapshot};

use super::client::{ApiClient, ApiResponse};

/// Typed client for the room REST endpoints.
pub struct RoomApi {
    client: ApiClient,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponse {
    #[serde(default, alias = "verified")]
    is_valid: bool,
}

impl RoomApi {
    pub fn new(base_url: &str) -> Result<Self, Error> {
        Ok(Self {
            client: ApiClient::new(base_url)?,
        })
    }

    /// `GET /rooms/{id}`.
    ///
    /// A 404, or a 2xx body flagging an `error`, is an authoritative
    /// not-found; anything else non-2xx keeps its own category so the
    /// sync engine can retry transient trouble without discarding state.
    pub async fn fetch_room(&self, room_id: &str) -> Result<RoomSnapshot, Error> {
        let res: ApiResponse<Value> = self
            .client
            .request(Method::GET, &format!("rooms/{room_id}"), None::<&Value>)
            .await?;

        if !res.success {
            return Err(match res.status {
                404 => Error::RoomNotFound,
                status => Error::Api {
                    status,
                    message: server_message(res.error_body),
                },
            });
        }

        let body = res.data.unwrap_or(Value::Null);
        if body.is_null() || error_flagged(&body) {
            return Err(Error::RoomNotFound);
        }
        Ok(serde_json::from_value(body)?)
    }

    /// `POST /rooms/{id}/join`.
    pub async fn join_room(&self, room_id: &str, username: &str) -> Result<(), Error> {
        let res: ApiResponse<Value> = self
            .client
            .request(
                Method::POST,
                &format!("rooms/{room_id}/join"),
                Some(&json!({ "username": username })),
            )
            .await?;
        expect_success(res)
    }

    /// `POST /rooms/{id}/vote`.
    pub async fn cast_vote(&self, room_id: &str, username: &str, vote: &str) -> Result<(), Error> {
        let res: ApiResponse<Value> = self
            .client
            .request(
                Method::POST,
                &format!("rooms/{room_id}/vote"),
                Some(&json!({ "username": username, "vote": vote })),
            )
            .await?;
        expect_success(res)
    }

    /// `POST /rooms/{id}/reveal`. Privileged; 401 maps to `Unauthorized`.
    pub async fn reveal_votes(
        &self,
        room_id: &str,
        admin_password: Option<&str>,
    ) -> Result<(), Error> {
        self.privileged(&format!("rooms/{room_id}/reveal"), Method::POST, admin_password)
            .await
    }

    /// `POST /rooms/{id}/reset`. Privileged.
    pub async fn reset_votes(
        &self,
        room_id: &str,
        admin_password: Option<&str>,
    ) -> Result<(), Error> {
        self.privileged(&format!("rooms/{room_id}/reset"), Method::POST, admin_password)
            .await
    }

    /// `DELETE /rooms/{id}`. Privileged.
    pub async fn delete_room(
        &self,
        room_id: &str,
        admin_password: Option<&str>,
    ) -> Result<(), Error> {
        self.privileged(&format!("rooms/{room_id}"), Method::DELETE, admin_password)
            .await
    }

    /// `POST /rooms`. Only the provided fields go on the wire.
    pub async fn create_room(
        &self,
        room_id: Option<&str>,
        vote_options: Option<&[String]>,
        admin_password: Option<&str>,
    ) -> Result<RoomDescriptor, Error> {
        let mut body = serde_json::Map::new();
        if let Some(id) = room_id {
            body.insert("roomId".to_string(), json!(id));
        }
        if let Some(options) = vote_options.filter(|o| !o.is_empty()) {
            body.insert("voteOptions".to_string(), json!(options));
        }
        if let Some(password) = admin_password {
            body.insert("adminPassword".to_string(), json!(password));
        }

        let res: ApiResponse<RoomDescriptor> = self
            .client
            .request(Method::POST, "rooms", Some(&Value::Object(body)))
            .await?;

        if !res.success {
            return Err(map_failure(res.status, res.error_body));
        }
        res.data.ok_or(Error::Api {
            status: res.status,
            message: "empty create-room response".to_string(),
        })
    }

    /// `GET /rooms/{id}/vote-options`.
    pub async fn vote_options(&self, room_id: &str) -> Result<Vec<String>, Error> {
        let res: ApiResponse<Vec<String>> = self
            .client
            .request(
                Method::GET,
                &format!("rooms/{room_id}/vote-options"),
                None::<&Value>,
            )
            .await?;

        if !res.success {
            return Err(map_failure(res.status, res.error_body));
        }
        Ok(res.data.unwrap_or_default())
    }

    /// `POST /rooms/{id}/verify-admin`. A 401 means "not valid", not an
    /// error, so callers can probe a cached credential safely.
    pub async fn verify_admin(
        &self,
        room_id: &str,
        admin_password: Option<&str>,
    ) -> Result<bool, Error> {
        let res: ApiResponse<VerifyResponse> = self
            .client
            .request(
                Method::POST,
                &format!("rooms/{room_id}/verify-admin"),
                Some(&json!({ "adminPassword": admin_password })),
            )
            .await?;

        if res.status == 401 {
            return Ok(false);
        }
        if !res.success {
            return Err(map_failure(res.status, res.error_body));
        }
        Ok(res.data.map(|v| v.is_valid).unwrap_or(false))
    }

    async fn privileged(
        &self,
        path: &str,
        method: Method,
        admin_password: Option<&str>,
    ) -> Result<(), Error> {
        let res: ApiResponse<Value> = self
            .client
            .request(method, path, Some(&json!({ "adminPassword": admin_password })))
            .await?;
        expect_success(res)
    }
}

fn expect_success(res: ApiResponse<Value>) -> Result<(), Error> {
    if res.success {
        Ok(())
    } else {
        Err(map_failure(res.status, res.error_body))
    }
}

fn map_failure(status: u16, error_body: Option<String>) -> Error {
    match status {
        404 => Error::RoomNotFound,
        401 | 403 => Error::Unauthorized,
        status => Error::Api {
            status,
            message: server_message(error_body),
        },
    }
}

/// Pull the server's `message` field out of an error body when present.
fn server_message(body: Option<String>) -> String {
    if let Some(raw) = body.as_deref() {
        if let Ok(value) = serde_json::from_str::<Value>(raw) {
            if let Some(message) = value.get("message").and_then(Value::as_str) {
                return message.to_string();
            }
        }
    }
    body.unwrap_or_else(|| "request failed".to_string())
}

/// True when a 2xx body still carries a truthy `error` field.
fn error_flagged(body: &Value) -> bool {
    body.get("error").is_some_and(|e| match e {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(text) => !text.is_empty(),
        _ => true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_statuses_map_onto_the_taxonomy() {
        assert!(matches!(map_failure(404, None), Error::RoomNotFound));
        assert!(matches!(map_failure(401, None), Error::Unauthorized));
        assert!(matches!(map_failure(403, None), Error::Unauthorized));
        assert!(matches!(
            map_failure(500, Some(r#"{"message":"boom"}"#.into())),
            Error::Api { status: 500, message } if message == "boom"
        ));
    }

    #[test]
    fn server_message_falls_back_to_the_raw_body() {
        assert_eq!(server_message(Some("plain text".into())), "plain text");
        assert_eq!(server_message(None), "request failed");
        assert_eq!(
            server_message(Some(r#"{"message":"no such room"}"#.into())),
            "no such room"
        );
    }

    #[test]
    fn error_field_detection_follows_truthiness() {
        assert!(error_flagged(&json!({ "error": "gone" })));
        assert!(error_flagged(&json!({ "error": true })));
        assert!(!error_flagged(&json!({ "error": null })));
        assert!(!error_flagged(&json!({ "error": "" })));
        assert!(!error_flagged(&json!({ "votes": {} })));
    }
}
