//! Create a planning poker room from the command line.

use anyhow::{Context, Result};
use clap::Parser;

use lib_poker::api::RoomApi;

#[derive(Parser, Debug)]
#[clap(about = "Create a planning poker room", version)]
struct Args {
    /// Base URL of the room server.
    #[clap(long, env = "POKER_BASE_URL", default_value = "http://localhost:3222/")]
    base_url: String,

    /// Room identifier to request; the server picks one when omitted.
    room_id: Option<String>,

    /// Comma-separated vote options (the server's default deck when omitted).
    #[clap(long)]
    vote_options: Option<String>,

    /// Admin password protecting reveal/reset/delete.
    #[clap(long, env = "POKER_ADMIN_PASSWORD")]
    admin_password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    let args = Args::parse();

    let api = RoomApi::new(&args.base_url).context("building API client")?;

    let options: Option<Vec<String>> = args.vote_options.as_deref().map(|raw| {
        raw.split(',')
            .map(|option| option.trim().to_string())
            .filter(|option| !option.is_empty())
            .collect()
    });

    let descriptor = api
        .create_room(
            args.room_id.as_deref(),
            options.as_deref(),
            args.admin_password.as_deref(),
        )
        .await
        .context("creating room")?;

    println!("Room created: {}", descriptor.room_id);
    if !descriptor.vote_options.is_empty() {
        println!("Vote options: {}", descriptor.vote_options.join(", "));
    }
    Ok(())
}
