//! Privileged room actions: verify, reveal, reset, delete.
//!
//! Demonstrates the credential flow: a verified password is cached for
//! the session, and any rejection evicts the cache and prompts again.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use lib_poker::api::{AdminSession, RoomApi};
use lib_poker::storage::SessionStore;
use lib_poker::Error;

#[derive(Parser, Debug)]
#[clap(about = "Administer a planning poker room", version)]
struct Args {
    /// Base URL of the room server.
    #[clap(long, env = "POKER_BASE_URL", default_value = "http://localhost:3222/")]
    base_url: String,

    /// Room identifier.
    room_id: String,

    /// Admin password; prompted for interactively when omitted.
    #[clap(long, env = "POKER_ADMIN_PASSWORD")]
    admin_password: Option<String>,

    #[clap(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Check a password against the room.
    Verify,
    /// Reveal all votes.
    Reveal,
    /// Clear all votes and hide them again.
    Reset,
    /// Delete the room.
    Delete,
}

const MAX_PROMPTS: usize = 3;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    let args = Args::parse();

    let api = Arc::new(RoomApi::new(&args.base_url).context("building API client")?);
    let session = Arc::new(SessionStore::new());
    let admin = AdminSession::new(args.room_id.as_str(), api, session);

    let mut password = args.admin_password.clone();
    for attempt in 0..MAX_PROMPTS {
        let candidate = match password.take() {
            Some(given) => given,
            None => prompt_password(attempt)?,
        };

        if !admin
            .verify(&candidate)
            .await
            .context("verifying admin password")?
        {
            eprintln!("Invalid admin password.");
            continue;
        }

        match run_action(&args.action, &admin).await {
            Ok(()) => return Ok(()),
            Err(Error::Unauthorized) => {
                // The cache was evicted by the rejection; go around and
                // re-prompt.
                eprintln!("The server rejected the credential. Try again.");
            }
            Err(e) => return Err(e).context("running admin action"),
        }
    }
    bail!("giving up after {MAX_PROMPTS} attempts");
}

async fn run_action(action: &Action, admin: &AdminSession) -> Result<(), Error> {
    match action {
        Action::Verify => {
            println!("Admin password verified.");
            Ok(())
        }
        Action::Reveal => {
            admin.reveal().await?;
            println!("Votes revealed.");
            Ok(())
        }
        Action::Reset => {
            admin.reset().await?;
            println!("Votes reset.");
            Ok(())
        }
        Action::Delete => {
            admin.delete_room().await?;
            println!("Room deleted.");
            Ok(())
        }
    }
}

fn prompt_password(attempt: usize) -> Result<String> {
    if attempt > 0 {
        eprintln!("(attempt {} of {MAX_PROMPTS})", attempt + 1);
    }
    eprint!("Admin password: ");
    io::stderr().flush().ok();
    let mut line = String::new();
    io::stdin().read_line(&mut line).context("reading password")?;
    let trimmed = line.trim();
    if trimmed.is_empty() {
        bail!("empty password");
    }
    Ok(trimmed.to_string())
}
