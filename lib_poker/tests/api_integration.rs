//! Integration tests for the room API client against an in-process stub
//! server implementing the REST contract.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use lib_poker::api::{AdminSession, RoomApi};
use lib_poker::storage::{admin_key, SessionStore};
use lib_poker::{Error, VoteValue};

#[derive(Clone, Default)]
struct StubState {
    rooms: Arc<Mutex<HashMap<String, StubRoom>>>,
    created: Arc<AtomicUsize>,
}

#[derive(Clone, Default)]
struct StubRoom {
    users: Vec<String>,
    votes: HashMap<String, String>,
    show_votes: bool,
    vote_options: Vec<String>,
    admin_password: Option<String>,
}

async fn start_stub() -> (String, StubState) {
    let state = StubState::default();
    let app = Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/{id}", get(fetch_room).delete(delete_room))
        .route("/rooms/{id}/join", post(join_room))
        .route("/rooms/{id}/vote", post(cast_vote))
        .route("/rooms/{id}/reveal", post(reveal_votes))
        .route("/rooms/{id}/reset", post(reset_votes))
        .route("/rooms/{id}/vote-options", get(vote_options))
        .route("/rooms/{id}/verify-admin", post(verify_admin))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://127.0.0.1:{port}/"), state)
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": "Room not found" })),
    )
        .into_response()
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "message": "Invalid admin password" })),
    )
        .into_response()
}

fn password_matches(room: &StubRoom, body: &Value) -> bool {
    let given = body.get("adminPassword").and_then(Value::as_str);
    match &room.admin_password {
        None => true,
        Some(expected) => given == Some(expected.as_str()),
    }
}

async fn create_room(State(state): State<StubState>, Json(body): Json<Value>) -> Response {
    let id = body
        .get("roomId")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("room-{}", state.created.fetch_add(1, Ordering::Relaxed) + 1));
    let vote_options: Vec<String> = body
        .get("voteOptions")
        .and_then(Value::as_array)
        .map(|options| {
            options
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let room = StubRoom {
        vote_options: vote_options.clone(),
        admin_password: body
            .get("adminPassword")
            .and_then(Value::as_str)
            .map(str::to_string),
        ..StubRoom::default()
    };
    state.rooms.lock().unwrap().insert(id.clone(), room);
    Json(json!({ "roomId": id, "voteOptions": vote_options })).into_response()
}

async fn fetch_room(State(state): State<StubState>, Path(id): Path<String>) -> Response {
    // Some deployments answer a missing room with a 2xx error body.
    if id == "legacy-error" {
        return Json(json!({ "error": "Room not found" })).into_response();
    }
    let rooms = state.rooms.lock().unwrap();
    let Some(room) = rooms.get(&id) else {
        return not_found();
    };

    let votes: serde_json::Map<String, Value> = room
        .users
        .iter()
        .map(|user| {
            let value = match room.votes.get(user) {
                None => "not_voted".to_string(),
                Some(vote) if room.show_votes => vote.clone(),
                Some(_) => "voted".to_string(),
            };
            (user.clone(), Value::String(value))
        })
        .collect();
    let users: serde_json::Map<String, Value> = room
        .users
        .iter()
        .map(|user| {
            (
                user.clone(),
                json!({ "id": user, "username": user, "vote": votes.get(user) }),
            )
        })
        .collect();

    Json(json!({
        "users": users,
        "votes": votes,
        "showVotes": room.show_votes,
        "voteOptions": room.vote_options,
    }))
    .into_response()
}

async fn join_room(
    State(state): State<StubState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut rooms = state.rooms.lock().unwrap();
    let Some(room) = rooms.get_mut(&id) else {
        return not_found();
    };
    if let Some(username) = body.get("username").and_then(Value::as_str) {
        if !room.users.iter().any(|user| user == username) {
            room.users.push(username.to_string());
        }
    }
    Json(json!({ "joined": true })).into_response()
}

async fn cast_vote(
    State(state): State<StubState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut rooms = state.rooms.lock().unwrap();
    let Some(room) = rooms.get_mut(&id) else {
        return not_found();
    };
    if let (Some(username), Some(vote)) = (
        body.get("username").and_then(Value::as_str),
        body.get("vote").and_then(Value::as_str),
    ) {
        room.votes.insert(username.to_string(), vote.to_string());
    }
    Json(json!({ "ok": true })).into_response()
}

async fn reveal_votes(
    State(state): State<StubState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut rooms = state.rooms.lock().unwrap();
    let Some(room) = rooms.get_mut(&id) else {
        return not_found();
    };
    if !password_matches(room, &body) {
        return unauthorized();
    }
    room.show_votes = true;
    Json(json!({ "ok": true })).into_response()
}

async fn reset_votes(
    State(state): State<StubState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut rooms = state.rooms.lock().unwrap();
    let Some(room) = rooms.get_mut(&id) else {
        return not_found();
    };
    if !password_matches(room, &body) {
        return unauthorized();
    }
    room.votes.clear();
    room.show_votes = false;
    Json(json!({ "ok": true })).into_response()
}

async fn delete_room(
    State(state): State<StubState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut rooms = state.rooms.lock().unwrap();
    let Some(room) = rooms.get(&id) else {
        return not_found();
    };
    if !password_matches(room, &body) {
        return unauthorized();
    }
    rooms.remove(&id);
    Json(json!({ "deleted": true })).into_response()
}

async fn vote_options(State(state): State<StubState>, Path(id): Path<String>) -> Response {
    let rooms = state.rooms.lock().unwrap();
    let Some(room) = rooms.get(&id) else {
        return not_found();
    };
    Json(room.vote_options.clone()).into_response()
}

async fn verify_admin(
    State(state): State<StubState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let rooms = state.rooms.lock().unwrap();
    let Some(room) = rooms.get(&id) else {
        return not_found();
    };
    if password_matches(room, &body) {
        Json(json!({ "isValid": true })).into_response()
    } else {
        // A wrong password comes back as a 401; the client must read
        // that as "not valid", not as a failure.
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "isValid": false })),
        )
            .into_response()
    }
}

#[tokio::test]
async fn missing_room_is_an_authoritative_not_found() {
    let (base_url, _state) = start_stub().await;
    let api = RoomApi::new(&base_url).unwrap();

    match api.fetch_room("nope").await {
        Err(Error::RoomNotFound) => {}
        other => panic!("expected RoomNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn error_flagged_2xx_body_reads_as_not_found() {
    let (base_url, _state) = start_stub().await;
    let api = RoomApi::new(&base_url).unwrap();

    match api.fetch_room("legacy-error").await {
        Err(Error::RoomNotFound) => {}
        other => panic!("expected RoomNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn join_vote_reveal_roundtrip() {
    let (base_url, _state) = start_stub().await;
    let api = Arc::new(RoomApi::new(&base_url).unwrap());

    let deck: Vec<String> = ["1", "2", "3"].iter().map(|s| s.to_string()).collect();
    let descriptor = api
        .create_room(Some("sprint"), Some(&deck), Some("sesame"))
        .await
        .unwrap();
    assert_eq!(descriptor.room_id, "sprint");
    assert_eq!(descriptor.vote_options, deck);

    api.join_room("sprint", "alice").await.unwrap();
    api.cast_vote("sprint", "alice", "2").await.unwrap();

    // Committed but hidden until the reveal.
    let snapshot = api.fetch_room("sprint").await.unwrap();
    assert!(!snapshot.show_votes);
    assert_eq!(snapshot.votes["alice"], VoteValue::Hidden);
    assert_eq!(api.vote_options("sprint").await.unwrap(), deck);

    let session = Arc::new(SessionStore::new());
    let admin = AdminSession::new("sprint", Arc::clone(&api), Arc::clone(&session));
    assert!(admin.verify("sesame").await.unwrap());
    admin.reveal().await.unwrap();

    let snapshot = api.fetch_room("sprint").await.unwrap();
    assert!(snapshot.show_votes);
    assert_eq!(snapshot.votes["alice"], VoteValue::Cast("2".into()));
}

#[tokio::test]
async fn rejected_credential_is_evicted_for_a_re_prompt() {
    let (base_url, _state) = start_stub().await;
    let api = Arc::new(RoomApi::new(&base_url).unwrap());
    api.create_room(Some("guarded"), None, Some("sesame"))
        .await
        .unwrap();

    // A stale credential cached from an earlier session.
    let session = Arc::new(SessionStore::new());
    session.set(&admin_key("guarded"), "stale-password");
    let admin = AdminSession::new("guarded", Arc::clone(&api), Arc::clone(&session));

    match admin.reveal().await {
        Err(Error::Unauthorized) => {}
        other => panic!("expected Unauthorized, got {other:?}"),
    }
    // The invariant: a rejected credential never stays cached.
    assert_eq!(admin.cached_password(), None);

    // Re-verification with the right password restores the cache and the
    // action succeeds on retry.
    assert!(admin.verify("sesame").await.unwrap());
    admin.reveal().await.unwrap();
}

#[tokio::test]
async fn wrong_password_verifies_as_invalid_without_erroring() {
    let (base_url, _state) = start_stub().await;
    let api = Arc::new(RoomApi::new(&base_url).unwrap());
    api.create_room(Some("locked"), None, Some("sesame"))
        .await
        .unwrap();

    let session = Arc::new(SessionStore::new());
    let admin = AdminSession::new("locked", Arc::clone(&api), Arc::clone(&session));

    assert!(!admin.verify("wrong").await.unwrap());
    assert_eq!(admin.cached_password(), None);

    // A stale cache entry probed by check_status is evicted quietly.
    session.set(&admin_key("locked"), "also-wrong");
    assert!(!admin.check_status().await.unwrap());
    assert_eq!(admin.cached_password(), None);
}

#[tokio::test]
async fn reset_clears_votes_and_delete_removes_the_room() {
    let (base_url, _state) = start_stub().await;
    let api = Arc::new(RoomApi::new(&base_url).unwrap());
    api.create_room(Some("ephemeral"), None, Some("sesame"))
        .await
        .unwrap();
    api.join_room("ephemeral", "alice").await.unwrap();
    api.cast_vote("ephemeral", "alice", "8").await.unwrap();

    let session = Arc::new(SessionStore::new());
    let admin = AdminSession::new("ephemeral", Arc::clone(&api), Arc::clone(&session));
    assert!(admin.verify("sesame").await.unwrap());

    admin.reset().await.unwrap();
    let snapshot = api.fetch_room("ephemeral").await.unwrap();
    assert_eq!(snapshot.votes["alice"], VoteValue::NotVoted);
    assert!(!snapshot.show_votes);

    admin.delete_room().await.unwrap();
    match api.fetch_room("ephemeral").await {
        Err(Error::RoomNotFound) => {}
        other => panic!("expected RoomNotFound after delete, got {other:?}"),
    }
}

#[tokio::test]
async fn server_assigns_an_id_when_none_is_requested() {
    let (base_url, _state) = start_stub().await;
    let api = RoomApi::new(&base_url).unwrap();

    let descriptor = api.create_room(None, None, None).await.unwrap();
    assert!(descriptor.room_id.starts_with("room-"));
}
