//! The reconnecting push channel service.
//!
//! An explicitly constructed, injectable service with a clear lifecycle
//! (create, connect, disconnect, drop) instead of a module-level
//! singleton. One supervisor task owns the websocket transport; the
//! handle talks to it over a command channel and observes its state
//! through a watch channel.

use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval, sleep, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};

use crate::error::Error;

use super::events::{SmileSubscribers, SubscriptionId};
use super::reactions::ReactionEvent;
use super::wire::{ClientMessage, ServerMessage};

use std::sync::Arc;

/// Hub endpoint path relative to the server base URL.
pub const HUB_PATH: &str = "/hubs/poker";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;

/// Connection lifecycle as observed by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Timing knobs for the channel. Tests compress these; production uses
/// the defaults.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// ws:// or wss:// endpoint of the hub.
    pub url: String,
    /// Ping cadence keeping the server's liveness check fed.
    pub keepalive_interval: Duration,
    /// Silence window before the peer counts as gone. Generous, because
    /// throttled background tabs produce long legitimate silences.
    pub server_timeout: Duration,
    /// Bound on waiting for the connected state.
    pub connect_wait_timeout: Duration,
    /// Escalating automatic reconnect delays; the last entry repeats.
    pub reconnect_delays: Vec<Duration>,
    /// Automatic attempts before the channel closes fully and the manual
    /// fallback takes over.
    pub max_auto_attempts: usize,
    /// Delay before the single manual retry after a full close.
    pub manual_retry_delay: Duration,
}

impl ChannelConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            keepalive_interval: Duration::from_secs(20),
            server_timeout: Duration::from_secs(120),
            connect_wait_timeout: Duration::from_secs(15),
            reconnect_delays: vec![
                Duration::ZERO,
                Duration::from_secs(2),
                Duration::from_secs(10),
                Duration::from_secs(30),
            ],
            max_auto_attempts: 8,
            manual_retry_delay: Duration::from_secs(5),
        }
    }

    /// Derive the hub endpoint from the REST base URL (http becomes ws,
    /// https becomes wss; a base path is kept underneath the hub path).
    pub fn for_base_url(base_url: &str) -> Result<Self, Error> {
        let mut url = url::Url::parse(base_url)
            .map_err(|e| Error::Channel(format!("invalid base url {base_url:?}: {e}")))?;
        let scheme = match url.scheme() {
            "http" => "ws".to_string(),
            "https" => "wss".to_string(),
            s @ ("ws" | "wss") => s.to_string(),
            other => {
                return Err(Error::Channel(format!(
                    "cannot derive a hub endpoint from scheme {other:?}"
                )))
            }
        };
        url.set_scheme(&scheme)
            .map_err(|_| Error::Channel("could not derive hub scheme".to_string()))?;
        let path = format!("{}{}", url.path().trim_end_matches('/'), HUB_PATH);
        url.set_path(&path);
        Ok(Self::new(url.to_string()))
    }

    /// Delay before reconnect `attempt` (0-based); repeats at the ceiling.
    pub fn reconnect_delay(&self, attempt: usize) -> Duration {
        self.reconnect_delays
            .get(attempt)
            .or(self.reconnect_delays.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }
}

enum Command {
    Connect {
        room_id: String,
        ack: oneshot::Sender<Result<(), Error>>,
    },
    Disconnect {
        room_id: String,
        ack: oneshot::Sender<()>,
    },
    SendSmile {
        room_id: String,
        to_user: String,
        emoji: String,
        ack: oneshot::Sender<Result<(), Error>>,
    },
}

/// Handle to the push channel.
pub struct PushChannel {
    config: ChannelConfig,
    cmd_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    subscribers: Arc<SmileSubscribers>,
    supervisor: tokio::task::JoinHandle<()>,
}

impl PushChannel {
    /// Create the service and spawn its supervisor task. Must run inside
    /// a tokio runtime.
    pub fn new(config: ChannelConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let subscribers = Arc::new(SmileSubscribers::new());
        let supervisor = tokio::spawn(supervise(
            config.clone(),
            cmd_rx,
            state_tx,
            Arc::clone(&subscribers),
        ));
        Self {
            config,
            cmd_tx,
            state_rx,
            subscribers,
            supervisor,
        }
    }

    /// Current transport state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Ensure the transport is up and this client is announced in
    /// `room_id`. Idempotent; when already connected it only re-announces
    /// membership. Bounded by the configured connect wait timeout.
    pub async fn connect(&self, room_id: &str) -> Result<(), Error> {
        let (ack, rx) = oneshot::channel();
        self.send_cmd(Command::Connect {
            room_id: room_id.to_string(),
            ack,
        })?;
        self.await_ack(rx, "push channel connected state").await
    }

    /// Announce departure from `room_id` (best effort) and stop the
    /// transport. The stop is intentional: any pending reconnect timer is
    /// cancelled and no further retries occur.
    pub async fn disconnect(&self, room_id: &str) -> Result<(), Error> {
        let (ack, rx) = oneshot::channel();
        self.send_cmd(Command::Disconnect {
            room_id: room_id.to_string(),
            ack,
        })?;
        rx.await
            .map_err(|_| Error::Channel("push channel service stopped".to_string()))
    }

    /// Send a reaction. Connects and joins first if needed, and fails
    /// loudly when the channel cannot reach the connected state.
    pub async fn send_smile(
        &self,
        room_id: &str,
        to_user: &str,
        emoji: &str,
    ) -> Result<(), Error> {
        self.connect(room_id).await?;
        let (ack, rx) = oneshot::channel();
        self.send_cmd(Command::SendSmile {
            room_id: room_id.to_string(),
            to_user: to_user.to_string(),
            emoji: emoji.to_string(),
            ack,
        })?;
        self.await_ack(rx, "reaction send").await
    }

    /// Register a reaction subscriber. Callbacks run on the channel task
    /// in registration order.
    pub fn on_smile<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ReactionEvent) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    /// Remove a subscriber. Takes effect for the next dispatch; an
    /// in-flight dispatch keeps its snapshot.
    pub fn off_smile(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    fn send_cmd(&self, command: Command) -> Result<(), Error> {
        self.cmd_tx
            .send(command)
            .map_err(|_| Error::Channel("push channel service stopped".to_string()))
    }

    async fn await_ack(
        &self,
        rx: oneshot::Receiver<Result<(), Error>>,
        what: &'static str,
    ) -> Result<(), Error> {
        match timeout(self.config.connect_wait_timeout, rx).await {
            Err(_) => Err(Error::Timeout(what)),
            Ok(Err(_)) => Err(Error::Channel("push channel service stopped".to_string())),
            Ok(Ok(result)) => result,
        }
    }
}

impl Drop for PushChannel {
    fn drop(&mut self) {
        self.supervisor.abort();
    }
}

enum SessionEnd {
    /// The client asked for the stop; no reconnect.
    Intentional,
    /// The transport died underneath us; walk the reconnect schedule.
    Dropped,
    /// The handle is gone; the service winds down.
    Shutdown,
}

async fn supervise(
    config: ChannelConfig,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<ConnectionState>,
    subscribers: Arc<SmileSubscribers>,
) {
    let mut current_room: Option<String> = None;
    let mut intentional_stop = false;

    'idle: loop {
        // Idle: no transport until someone asks for one.
        let Some(cmd) = cmd_rx.recv().await else { return };
        let mut ws = match cmd {
            Command::Connect { room_id, ack } => {
                intentional_stop = false;
                current_room = Some(room_id.clone());
                let _ = state_tx.send(ConnectionState::Connecting);
                match establish(&config, &room_id).await {
                    Ok(ws) => {
                        let _ = state_tx.send(ConnectionState::Connected);
                        let _ = ack.send(Ok(()));
                        ws
                    }
                    Err(e) => {
                        let _ = state_tx.send(ConnectionState::Disconnected);
                        let _ = ack.send(Err(e));
                        continue 'idle;
                    }
                }
            }
            Command::Disconnect { room_id, ack } => {
                intentional_stop = true;
                if current_room.as_deref() == Some(room_id.as_str()) {
                    current_room = None;
                }
                let _ = ack.send(());
                continue 'idle;
            }
            Command::SendSmile { ack, .. } => {
                let _ = ack.send(Err(Error::Channel(
                    "push channel is not connected".to_string(),
                )));
                continue 'idle;
            }
        };

        // Established: pump the transport, reconnecting on unintentional
        // drops until the channel goes down for good.
        loop {
            match pump(
                &config,
                &mut cmd_rx,
                &subscribers,
                &mut current_room,
                &mut intentional_stop,
                ws,
            )
            .await
            {
                SessionEnd::Shutdown => return,
                SessionEnd::Intentional => {
                    let _ = state_tx.send(ConnectionState::Disconnected);
                    continue 'idle;
                }
                SessionEnd::Dropped => {
                    match reconnect(
                        &config,
                        &mut cmd_rx,
                        &state_tx,
                        &mut current_room,
                        &mut intentional_stop,
                    )
                    .await
                    {
                        Some(next) => {
                            ws = next;
                        }
                        None => continue 'idle,
                    }
                }
            }
        }
    }
}

/// Open the transport and announce membership in `room_id`.
async fn establish(config: &ChannelConfig, room_id: &str) -> Result<WsStream, Error> {
    log::info!("Connecting to push hub: {}", config.url);
    let (mut ws, _) = connect_async(config.url.as_str()).await?;
    let join = ClientMessage::JoinRoom {
        room_id: room_id.to_string(),
    };
    let text = serde_json::to_string(&join)?;
    ws.send(WsMessage::Text(text.into())).await?;
    log::debug!("Announced membership in room {room_id}");
    Ok(ws)
}

async fn send_json(write: &mut WsSink, message: &ClientMessage) -> Result<(), Error> {
    let text = serde_json::to_string(message)?;
    write.send(WsMessage::Text(text.into())).await?;
    Ok(())
}

fn handle_frame(subscribers: &SmileSubscribers, text: &str) {
    match serde_json::from_str::<ServerMessage>(text) {
        Ok(ServerMessage::ReceiveSmile {
            to_user,
            emoji,
            from_user,
        }) => {
            let event = ReactionEvent::received(from_user, to_user, emoji);
            log::debug!("Reaction for {}: {}", event.recipient, event.emoji);
            subscribers.dispatch(&event);
        }
        Err(_) => log::trace!("Ignoring unrecognized hub frame: {text}"),
    }
}

/// Pump one established transport until it ends.
async fn pump(
    config: &ChannelConfig,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    subscribers: &SmileSubscribers,
    current_room: &mut Option<String>,
    intentional_stop: &mut bool,
    ws: WsStream,
) -> SessionEnd {
    let (mut write, mut read) = ws.split();
    let mut keepalive = interval(config.keepalive_interval);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Skip);
    keepalive.reset();
    let mut last_activity = Instant::now();

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    None => {
                        let _ = write.close().await;
                        return SessionEnd::Shutdown;
                    }
                    Some(Command::Connect { room_id, ack }) => {
                        // Already connected: announcing membership again is
                        // safe and covers a room switch.
                        *intentional_stop = false;
                        *current_room = Some(room_id.clone());
                        match send_json(&mut write, &ClientMessage::JoinRoom { room_id }).await {
                            Ok(()) => {
                                let _ = ack.send(Ok(()));
                            }
                            Err(e) => {
                                log::warn!("Rejoin announcement failed: {e}");
                                let _ = ack.send(Err(e));
                                return SessionEnd::Dropped;
                            }
                        }
                    }
                    Some(Command::Disconnect { room_id, ack }) => {
                        *intentional_stop = true;
                        // Best-effort departure announcement.
                        if let Err(e) = send_json(
                            &mut write,
                            &ClientMessage::LeaveRoom { room_id: room_id.clone() },
                        )
                        .await
                        {
                            log::debug!("LeaveRoom announcement failed: {e}");
                        }
                        let _ = write.close().await;
                        if current_room.as_deref() == Some(room_id.as_str()) {
                            *current_room = None;
                        }
                        let _ = ack.send(());
                        return SessionEnd::Intentional;
                    }
                    Some(Command::SendSmile { room_id, to_user, emoji, ack }) => {
                        let message = ClientMessage::SendSmile { room_id, to_user, emoji };
                        match send_json(&mut write, &message).await {
                            Ok(()) => {
                                let _ = ack.send(Ok(()));
                            }
                            Err(e) => {
                                let _ = ack.send(Err(e));
                                return SessionEnd::Dropped;
                            }
                        }
                    }
                }
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        last_activity = Instant::now();
                        handle_frame(subscribers, &text.to_string());
                    }
                    Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => {
                        // Heartbeats count as activity so quiet rooms do not
                        // look like dead connections.
                        last_activity = Instant::now();
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        log::warn!("Push hub closed the connection");
                        return SessionEnd::Dropped;
                    }
                    Some(Err(e)) => {
                        log::error!("Push channel read error: {e}");
                        return SessionEnd::Dropped;
                    }
                    _ => {}
                }
            }
            _ = keepalive.tick() => {
                if let Err(e) = write.send(WsMessage::Ping(Vec::new().into())).await {
                    log::warn!("Keep-alive ping failed: {e}");
                    return SessionEnd::Dropped;
                }
            }
            // Watchdog: silence is normal for a throttled background view;
            // only give up past the generous server timeout.
            _ = sleep(Duration::from_secs(1)) => {
                if last_activity.elapsed() > config.server_timeout {
                    log::warn!(
                        "No hub activity for {}s. Reconnecting...",
                        config.server_timeout.as_secs()
                    );
                    return SessionEnd::Dropped;
                }
            }
        }
    }
}

/// Walk the automatic reconnect schedule after an unintentional drop.
///
/// Returns a fresh transport, or `None` when the channel should stay
/// down (intentional stop, cancelled retry, or every attempt failed).
async fn reconnect(
    config: &ChannelConfig,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    state_tx: &watch::Sender<ConnectionState>,
    current_room: &mut Option<String>,
    intentional_stop: &mut bool,
) -> Option<WsStream> {
    if *intentional_stop || current_room.is_none() {
        let _ = state_tx.send(ConnectionState::Disconnected);
        return None;
    }
    let _ = state_tx.send(ConnectionState::Reconnecting);
    let mut pending_acks: Vec<oneshot::Sender<Result<(), Error>>> = Vec::new();

    for attempt in 0..config.max_auto_attempts {
        let delay = config.reconnect_delay(attempt);
        if !wait_or_cancel(delay, cmd_rx, current_room, intentional_stop, &mut pending_acks).await {
            resolve_pending(&mut pending_acks, Err("push channel stopped"));
            let _ = state_tx.send(ConnectionState::Disconnected);
            return None;
        }
        let Some(room) = current_room.clone() else {
            resolve_pending(&mut pending_acks, Err("no room to rejoin"));
            let _ = state_tx.send(ConnectionState::Disconnected);
            return None;
        };
        match establish(config, &room).await {
            Ok(ws) => {
                // Server-side membership did not survive the drop;
                // establish() re-announced it.
                log::info!("Reconnected to push hub (attempt {})", attempt + 1);
                resolve_pending(&mut pending_acks, Ok(()));
                let _ = state_tx.send(ConnectionState::Connected);
                return Some(ws);
            }
            Err(e) => log::warn!("Reconnect attempt {} failed: {e}", attempt + 1),
        }
    }

    // Automatic budget exhausted: the channel closes fully. One manual
    // retry after a fixed delay, unless the stop became intentional in
    // the meantime.
    let _ = state_tx.send(ConnectionState::Disconnected);
    log::warn!(
        "Automatic reconnect budget exhausted; manual retry in {:?}",
        config.manual_retry_delay
    );
    if !wait_or_cancel(
        config.manual_retry_delay,
        cmd_rx,
        current_room,
        intentional_stop,
        &mut pending_acks,
    )
    .await
    {
        resolve_pending(&mut pending_acks, Err("push channel stopped"));
        return None;
    }
    let Some(room) = current_room.clone() else {
        resolve_pending(&mut pending_acks, Err("no room to rejoin"));
        return None;
    };
    let _ = state_tx.send(ConnectionState::Connecting);
    match establish(config, &room).await {
        Ok(ws) => {
            resolve_pending(&mut pending_acks, Ok(()));
            let _ = state_tx.send(ConnectionState::Connected);
            Some(ws)
        }
        Err(e) => {
            log::error!("Manual reconnect failed: {e}");
            resolve_pending(&mut pending_acks, Err("push channel closed"));
            let _ = state_tx.send(ConnectionState::Disconnected);
            None
        }
    }
}

/// Sleep while still answering commands.
///
/// A `Disconnect` cancels the pending retry (returns false). An explicit
/// `Connect` cuts the wait short so the next attempt happens immediately;
/// its ack resolves with that attempt's outcome.
async fn wait_or_cancel(
    delay: Duration,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    current_room: &mut Option<String>,
    intentional_stop: &mut bool,
    pending_acks: &mut Vec<oneshot::Sender<Result<(), Error>>>,
) -> bool {
    let deadline = Instant::now() + delay;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return true;
        }
        tokio::select! {
            _ = sleep(remaining) => return true,
            cmd = cmd_rx.recv() => match cmd {
                None => return false,
                Some(Command::Disconnect { room_id, ack }) => {
                    *intentional_stop = true;
                    if current_room.as_deref() == Some(room_id.as_str()) {
                        *current_room = None;
                    }
                    let _ = ack.send(());
                    return false;
                }
                Some(Command::Connect { room_id, ack }) => {
                    *intentional_stop = false;
                    *current_room = Some(room_id);
                    pending_acks.push(ack);
                    return true;
                }
                Some(Command::SendSmile { ack, .. }) => {
                    let _ = ack.send(Err(Error::Channel(
                        "push channel is reconnecting".to_string(),
                    )));
                }
            }
        }
    }
}

fn resolve_pending(
    pending: &mut Vec<oneshot::Sender<Result<(), Error>>>,
    outcome: Result<(), &str>,
) {
    for ack in pending.drain(..) {
        let _ = ack.send(outcome.map_err(|reason| Error::Channel(reason.to_string())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_schedule_escalates_then_repeats_at_the_ceiling() {
        let config = ChannelConfig::new("ws://localhost:1/hubs/poker");
        let seconds: Vec<u64> = (0..6)
            .map(|attempt| config.reconnect_delay(attempt).as_secs())
            .collect();
        assert_eq!(seconds, vec![0, 2, 10, 30, 30, 30]);
    }

    #[test]
    fn hub_url_derives_from_the_rest_base() {
        let config = ChannelConfig::for_base_url("http://localhost:3222").unwrap();
        assert_eq!(config.url, "ws://localhost:3222/hubs/poker");

        let config = ChannelConfig::for_base_url("https://poker.example.com/api/").unwrap();
        assert_eq!(config.url, "wss://poker.example.com/api/hubs/poker");

        assert!(ChannelConfig::for_base_url("ftp://nope").is_err());
    }

    #[test]
    fn liveness_defaults_are_generous() {
        let config = ChannelConfig::new("ws://localhost:1/hubs/poker");
        assert_eq!(config.keepalive_interval, Duration::from_secs(20));
        assert_eq!(config.server_timeout, Duration::from_secs(120));
        assert_eq!(config.connect_wait_timeout, Duration::from_secs(15));
        assert_eq!(config.manual_retry_delay, Duration::from_secs(5));
    }
}
