//! Live room view in the terminal.
//!
//! Joins a room, polls the snapshot on the standard cadence, renders the
//! table and summary on every update, and wires the push channel for
//! reactions. Stdin drives votes and room actions.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};

use lib_poker::api::{AdminSession, RoomApi};
use lib_poker::channel::{ChannelConfig, PushChannel, ReactionTray};
use lib_poker::storage::{DurableStore, Identity, SessionStore, LAST_EMOJI_KEY};
use lib_poker::sync::{AlwaysVisible, RoomView, SyncConfig, SyncEngine, SyncUpdate};
use lib_poker::{calculate, Error, RoomSnapshot, VoteValue, DEFAULT_VOTE_OPTIONS};

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "Watch and vote in a planning poker room", version)]
#[serde(rename_all = "camelCase")]
struct Config {
    #[clap(long, env = "POKER_BASE_URL", help = "Base URL of the room server.")]
    base_url: Option<String>,

    #[clap(help = "Room identifier.")]
    room_id: Option<String>,

    #[clap(long, env = "POKER_USERNAME", help = "Username to join with; prompted for when omitted.")]
    username: Option<String>,

    #[clap(long, env = "POKER_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    config_path: Option<PathBuf>,

    #[clap(long, help = "Poll cadence in milliseconds.")]
    poll_interval_ms: Option<u64>,

    #[clap(long, env = "POKER_LOG_DIR", help = "Directory for log files.")]
    log_dir: Option<PathBuf>,

    #[clap(long, env = "POKER_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    log_level: Option<String>,

    #[clap(long, env = "POKER_STORE_PATH", help = "Durable store path (platform config dir when omitted).")]
    store_path: Option<PathBuf>,

    #[clap(long, help = "Skip the push channel (no reactions).")]
    #[serde(default)]
    no_reactions: bool,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            base_url: other.base_url.or(self.base_url),
            room_id: other.room_id.or(self.room_id),
            username: other.username.or(self.username),
            config_path: other.config_path.or(self.config_path),
            poll_interval_ms: other.poll_interval_ms.or(self.poll_interval_ms),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            store_path: other.store_path.or(self.store_path),
            no_reactions: self.no_reactions || other.no_reactions,
        }
    }
}

fn load_config() -> Config {
    // 1. Load defaults
    let default_config = Config {
        base_url: Some("http://localhost:3222/".to_string()),
        poll_interval_ms: Some(3000),
        log_dir: Some(PathBuf::from("./logs")),
        log_level: Some("info".to_string()),
        ..Default::default()
    };

    // 2. Load from config file (room_watch.conf) if present.
    //    Allow overriding the default config file path with a CLI arg.
    let cli_args_for_path = Config::parse();
    let config_file_path = cli_args_for_path
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("room_watch.conf"));

    let mut current_config = default_config;

    if config_file_path.exists() {
        if let Ok(config_str) = fs::read_to_string(&config_file_path) {
            if let Ok(file_config) = serde_json::from_str::<Config>(&config_str) {
                current_config = current_config.merge(file_config);
            } else {
                eprintln!(
                    "Failed to parse config file: {}. Falling back to other sources.",
                    config_file_path.display()
                );
            }
        } else {
            eprintln!(
                "Failed to read config file: {}. Falling back to other sources.",
                config_file_path.display()
            );
        }
    }

    // 3. Override with environment variables and CLI arguments.
    current_config.merge(cli_args_for_path)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = load_config();

    let log_dir = config.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"));
    let log_level = config.log_level.clone().unwrap_or_else(|| "info".to_string());
    setup_logging(&log_dir, &log_level)?;

    let base_url = config
        .base_url
        .clone()
        .unwrap_or_else(|| "http://localhost:3222/".to_string());
    let Some(room_id) = config.room_id.clone() else {
        bail!("a room id is required (positional argument or config file)");
    };

    let api = Arc::new(RoomApi::new(&base_url).context("building API client")?);
    let session = Arc::new(SessionStore::new());
    let durable = Arc::new(match &config.store_path {
        Some(path) => DurableStore::at(path),
        None => DurableStore::open_default().context("locating durable store")?,
    });
    let identity = Identity::new(Arc::clone(&session), Arc::clone(&durable));

    // The initial fetch decides between joining and offering creation.
    let snapshot = match api.fetch_room(&room_id).await {
        Ok(snapshot) => snapshot,
        Err(Error::RoomNotFound) => offer_create(&api, &room_id).await?,
        Err(e) => return Err(e).context("fetching room"),
    };

    let username = join_flow(&api, &room_id, &identity, &snapshot, config.username.clone()).await?;

    let vote_options = match api.vote_options(&room_id).await {
        Ok(options) if !options.is_empty() => options,
        Ok(_) => default_deck(),
        Err(e) => {
            log::warn!("Could not fetch vote options: {e}; using the default deck");
            default_deck()
        }
    };
    println!("Vote options: {}", vote_options.join(", "));
    println!(
        "Commands: <vote>, /admin <password>, /reveal, /reset, /smile <user> [emoji], /delete, /quit"
    );

    let (engine, mut updates) = SyncEngine::new(
        room_id.clone(),
        Arc::clone(&api),
        AlwaysVisible,
        Arc::clone(&session),
        SyncConfig {
            poll_interval: Duration::from_millis(config.poll_interval_ms.unwrap_or(3000)),
        },
    );
    let engine = Arc::new(engine);
    let poller = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.run().await })
    };

    let tray = Arc::new(ReactionTray::new());
    let channel = if config.no_reactions {
        None
    } else {
        let hub_config = ChannelConfig::for_base_url(&base_url)?;
        let channel = PushChannel::new(hub_config);
        let subscriber_tray = Arc::clone(&tray);
        channel.on_smile(move |event| {
            let from = event.sender.as_deref().unwrap_or("someone");
            println!("  {} {from} -> {}", event.emoji, event.recipient);
            subscriber_tray.push(event.clone());
        });
        if let Err(e) = channel.connect(&room_id).await {
            // Reactions are cosmetic; a dead hub must not block the room.
            log::warn!("Push channel unavailable: {e}");
        }
        Some(channel)
    };

    let admin = AdminSession::new(room_id.as_str(), Arc::clone(&api), Arc::clone(&session));

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            update = updates.recv() => {
                match update {
                    Some(SyncUpdate::Applied) => render(&engine.view(), &username),
                    Some(SyncUpdate::NotFound) => {
                        println!(
                            "Room {} no longer exists. Recreate it with room-create.",
                            room_id
                        );
                        break;
                    }
                    Some(SyncUpdate::Transient(reason)) => {
                        // Non-blocking notice; the next tick retries.
                        log::warn!("Sync hiccup: {reason}");
                    }
                    None => break,
                }
            }
            line = stdin.next_line() => {
                let Ok(Some(line)) = line else { break };
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                let keep_going = handle_command(
                    &line,
                    &room_id,
                    &username,
                    &vote_options,
                    &api,
                    &engine,
                    &admin,
                    channel.as_ref(),
                    &durable,
                )
                .await;
                if !keep_going {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    poller.abort();
    if let Some(channel) = &channel {
        if let Err(e) = channel.disconnect(&room_id).await {
            log::debug!("Push channel disconnect failed: {e}");
        }
    }
    log::info!("Left room {}", room_id);
    Ok(())
}

/// Returns false when the loop should end.
async fn handle_command(
    line: &str,
    room_id: &str,
    username: &str,
    vote_options: &[String],
    api: &RoomApi,
    engine: &SyncEngine<Arc<RoomApi>, AlwaysVisible>,
    admin: &AdminSession,
    channel: Option<&PushChannel>,
    durable: &DurableStore,
) -> bool {
    match line.split_whitespace().collect::<Vec<_>>().as_slice() {
        ["/quit"] => return false,
        ["/admin", password] => match admin.verify(password).await {
            Ok(true) => println!("Admin password verified."),
            Ok(false) => println!("Invalid admin password."),
            Err(e) => println!("Verification failed: {e}"),
        },
        ["/reveal"] => match admin.reveal().await {
            Ok(()) => println!("Votes revealed."),
            Err(e) => report_admin_error(e),
        },
        ["/reset"] => match admin.reset().await {
            Ok(()) => {
                engine.clear_votes();
                println!("Votes reset.");
            }
            Err(e) => report_admin_error(e),
        },
        ["/delete"] => match admin.delete_room().await {
            Ok(()) => {
                println!("Room deleted.");
                return false;
            }
            // Inline error; the action stays retryable.
            Err(e) => report_admin_error(e),
        },
        ["/smile", to_user, rest @ ..] => {
            let Some(channel) = channel else {
                println!("Reactions are disabled.");
                return true;
            };
            let emoji = rest
                .first()
                .map(|raw| raw.to_string())
                .or_else(|| durable.get(LAST_EMOJI_KEY))
                .unwrap_or_else(|| "🙂".to_string());
            match channel.send_smile(room_id, to_user, &emoji).await {
                Ok(()) => {
                    if let Err(e) = durable.set(LAST_EMOJI_KEY, &emoji) {
                        log::debug!("Could not remember the emoji: {e}");
                    }
                }
                Err(e) => println!("Could not send reaction: {e}"),
            }
        }
        [vote] if vote_options.iter().any(|option| option == vote) => {
            match api.cast_vote(room_id, username, vote).await {
                Ok(()) => engine.record_own_vote(username, VoteValue::Hidden),
                Err(e) => println!("Vote failed: {e}"),
            }
        }
        _ => println!("Unrecognized command: {line}"),
    }
    true
}

fn report_admin_error(e: Error) {
    if matches!(e, Error::Unauthorized) {
        println!("Admin password rejected; verify again with /admin <password>.");
    } else {
        println!("Action failed: {e}");
    }
}

/// Establish a username: prefill from the stores, confirm the seat is
/// free, join, and remember the name in both stores.
async fn join_flow(
    api: &RoomApi,
    room_id: &str,
    identity: &Identity,
    first_snapshot: &RoomSnapshot,
    preset: Option<String>,
) -> Result<String> {
    let mut taken: Vec<String> = first_snapshot
        .usernames()
        .iter()
        .map(|name| name.to_string())
        .collect();

    // A session copy means this process already joined; trust the server
    // list to decide whether the seat is still there.
    if let Some(existing) = identity.session_username() {
        if taken.iter().any(|name| *name == existing) {
            return Ok(existing);
        }
    }

    let mut candidate = preset.or_else(|| identity.prefill());
    loop {
        let username = match candidate.take() {
            Some(name) => name,
            None => prompt("Username: ")?,
        };
        if username.is_empty() {
            continue;
        }
        if taken.iter().any(|name| *name == username) {
            println!("This name is already taken. Pick a different one.");
            continue;
        }
        match api.join_room(room_id, &username).await {
            Ok(()) => {
                identity.remember(&username)?;
                println!("Joined room {room_id} as {username}.");
                return Ok(username);
            }
            Err(e) => {
                println!("Failed to join: {e}. Try another name.");
                // Refresh the seat list before the next attempt.
                if let Ok(snapshot) = api.fetch_room(room_id).await {
                    taken = snapshot
                        .usernames()
                        .iter()
                        .map(|name| name.to_string())
                        .collect();
                }
            }
        }
    }
}

/// The room is gone or never existed: offer to create it.
async fn offer_create(api: &RoomApi, room_id: &str) -> Result<RoomSnapshot> {
    let answer = prompt(&format!("Room {room_id} was not found. Create it? [y/N] "))?;
    if !answer.eq_ignore_ascii_case("y") {
        bail!("room {room_id} does not exist");
    }
    let options = default_deck();
    api.create_room(Some(room_id), Some(&options), None)
        .await
        .context("creating room")?;
    api.fetch_room(room_id).await.context("fetching the new room")
}

/// Print the table and, when revealed, the summary.
fn render(view: &RoomView, me: &str) {
    println!();
    println!("--- {} in the room ---", view.users.len());
    let mut users: Vec<_> = view.users.values().collect();
    users.sort_by(|a, b| a.username.cmp(&b.username));
    for user in users {
        let vote = view
            .votes
            .get(&user.username)
            .cloned()
            .unwrap_or_default();
        let shown = match vote {
            VoteValue::NotVoted => "-".to_string(),
            VoteValue::Hidden => "▒▒".to_string(),
            VoteValue::Cast(value) => value,
        };
        let marker = if user.username == me { "*" } else { " " };
        println!("{marker} {:<16} {shown}", user.username);
    }
    if view.votes_visible {
        let summary = calculate(&view.votes);
        println!("average: {:.1}", summary.average);
        let distribution: Vec<String> = summary
            .distribution
            .iter()
            .map(|(value, count)| format!("{value} x{count}"))
            .collect();
        println!("votes:   {}", distribution.join(", "));
        if summary.unanimous {
            if let Some(value) = &summary.most_common {
                println!("unanimous on {value}!");
            }
        }
    }
}

fn default_deck() -> Vec<String> {
    DEFAULT_VOTE_OPTIONS.iter().map(|o| o.to_string()).collect()
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush().ok();
    let mut line = String::new();
    io::stdin().read_line(&mut line).context("reading input")?;
    Ok(line.trim().to_string())
}

fn setup_logging(log_dir: &Path, log_level: &str) -> Result<()> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)?;
    }

    // Clean up old log files, keeping only the most recent one
    cleanup_old_logs(log_dir)?;

    let log_file_name = format!(
        "room_watch_{}.log",
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = log_dir.join(log_file_name);

    let level = match log_level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    };

    // File only; the console belongs to the table.
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d %H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(fern::log_file(log_path)?)
        .apply()?;

    Ok(())
}

fn cleanup_old_logs(log_dir: &Path) -> Result<()> {
    let mut entries: Vec<_> = fs::read_dir(log_dir)?
        .filter_map(|res| res.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "log"))
        .collect();

    // Sort by modification time, newest first
    entries.sort_by_key(|e| {
        std::cmp::Reverse(
            e.metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH),
        )
    });

    // Keep the most recent one, delete the rest
    for entry in entries.iter().skip(1) {
        if let Err(e) = fs::remove_file(entry.path()) {
            eprintln!("Failed to delete old log file {:?}: {}", entry.path(), e);
        }
    }

    Ok(())
}
