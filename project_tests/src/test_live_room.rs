//! # Live Room Journey
//!
//! Integration runner for the room API against a real server. Points at
//! `POKER_BASE_URL` (default `http://localhost:3222/`) and walks the full
//! lifecycle: create, fetch, join, vote, reveal, summary, reset, delete.
//!
//! Run manually with a server up; this is not part of `cargo test`.

use std::sync::Arc;

use lib_poker::api::{AdminSession, RoomApi};
use lib_poker::storage::SessionStore;
use lib_poker::{calculate, Error, VoteValue};

const ADMIN_PASSWORD: &str = "project-tests-admin";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let base_url =
        std::env::var("POKER_BASE_URL").unwrap_or_else(|_| "http://localhost:3222/".to_string());
    let api = Arc::new(RoomApi::new(&base_url)?);

    println!("--- Starting Live Room Tests against {base_url} ---");

    // --- TEST 1: Create a room with a custom deck ---
    println!("\n[Test 1] Creating a room...");
    let deck: Vec<String> = ["1", "2", "3", "5", "8", "?"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let descriptor = api
        .create_room(None, Some(&deck), Some(ADMIN_PASSWORD))
        .await?;
    let room_id = descriptor.room_id.clone();
    assert!(!room_id.is_empty());
    println!("✅ Room created: {room_id}");

    // --- TEST 2: Fetch and join ---
    println!("\n[Test 2] Joining as alice and bob...");
    api.join_room(&room_id, "alice").await?;
    api.join_room(&room_id, "bob").await?;
    let snapshot = api.fetch_room(&room_id).await?;
    let mut names = snapshot.usernames();
    names.sort();
    assert_eq!(names, vec!["alice", "bob"]);
    println!("✅ Both seats visible");

    // --- TEST 3: Votes stay hidden until revealed ---
    println!("\n[Test 3] Casting hidden votes...");
    api.cast_vote(&room_id, "alice", "5").await?;
    api.cast_vote(&room_id, "bob", "8").await?;
    let snapshot = api.fetch_room(&room_id).await?;
    assert!(!snapshot.show_votes);
    assert_eq!(snapshot.votes["alice"], VoteValue::Hidden);
    println!("✅ Votes committed but hidden");

    // --- TEST 4: Reveal requires the admin credential ---
    println!("\n[Test 4] Revealing with a wrong, then the right password...");
    let session = Arc::new(SessionStore::new());
    let admin = AdminSession::new(room_id.as_str(), Arc::clone(&api), Arc::clone(&session));
    assert!(!admin.verify("wrong-password").await?);
    assert!(admin.verify(ADMIN_PASSWORD).await?);
    admin.reveal().await?;
    let snapshot = api.fetch_room(&room_id).await?;
    assert!(snapshot.show_votes);
    assert_eq!(snapshot.votes["alice"], VoteValue::Cast("5".into()));
    println!("✅ Reveal worked with the cached credential");

    // --- TEST 5: Summary over the revealed votes ---
    let summary = calculate(&snapshot.votes);
    assert_eq!(summary.average, 6.5);
    assert!(!summary.unanimous);
    println!("✅ Summary: average {}, top {:?}", summary.average, summary.most_common);

    // --- TEST 6: Reset clears votes and hides them again ---
    println!("\n[Test 6] Resetting...");
    admin.reset().await?;
    let snapshot = api.fetch_room(&room_id).await?;
    assert!(!snapshot.show_votes);
    assert!(snapshot
        .votes
        .values()
        .all(|vote| *vote == VoteValue::NotVoted));
    println!("✅ Votes reset");

    // --- TEST 7: Delete, then fetch must be authoritative not-found ---
    println!("\n[Test 7] Deleting the room...");
    admin.delete_room().await?;
    match api.fetch_room(&room_id).await {
        Err(Error::RoomNotFound) => println!("✅ Deleted room reports not-found"),
        other => panic!("expected RoomNotFound, got {other:?}"),
    }

    println!("\n--- All Tests Passed Successfully ---");
    Ok(())
}
