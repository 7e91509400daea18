use crate::domain::{Command, JoinRequest, PlayerId, PlayerInput, RejectReason, Rejection, Role};
use crate::interface_adapters::clients::auth::{AuthClient, VerifyTokenError};
use crate::interface_adapters::http::ErrorResponse;
use crate::interface_adapters::protocol::{
    ClientMessage, Inbound, ServerMessage, StructureListingDto, WorldUpdateDto,
};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::ids::{next_conn_id, next_conn_token};
use crate::use_cases::{
    Announcement, DirectMessage, GameEvent, ServerState, WorldHandle, WorldRegistry, WorldUpdate,
};

use axum::{
    Error, Json,
    extract::{
        Query, State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures::SinkExt;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Notify, broadcast, mpsc, watch};
use tokio::time::timeout;
use tracing::{Instrument, debug, error, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    InputClosed,
    WorldUpdatesClosed,
    DirectClosed,
    AnnouncementsClosed,
    ServerStateClosed,
    JoinRequired,
    JoinTimeout,
    AuthVerify,
    ClosedBeforeJoin,
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct WorldQuery {
    // The world the client wants to join.
    #[serde(default)]
    world_id: Option<String>,
}

// Only the tag, for recognising malformed Input payloads.
#[derive(serde::Deserialize)]
struct MessageTag {
    #[serde(rename = "type")]
    kind: String,
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);
const MAX_INVALID_JSON: u32 = 10;
const MAX_SESSION_TOKEN_LEN: usize = 4096;
const JOIN_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn world_update_serializer(
    mut world_rx: broadcast::Receiver<WorldUpdate>,
    world_bytes_tx: broadcast::Sender<Utf8Bytes>,
    world_latest_tx: watch::Sender<Utf8Bytes>,
) {
    // Serialize each world update once and broadcast the shared bytes.
    loop {
        match world_rx.recv().await {
            Ok(update) => {
                let msg = ServerMessage::WorldUpdate(WorldUpdateDto::from(update));
                let txt = match serde_json::to_string(&msg) {
                    Ok(txt) => txt,
                    Err(e) => {
                        error!(error = ?e, "failed to serialize world update");
                        continue;
                    }
                };

                let bytes = Utf8Bytes::from(txt);
                // Latest bytes back lag recovery.
                world_latest_tx.send_replace(bytes.clone());
                let _ = world_bytes_tx.send(bytes);
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(
                    missed = n,
                    "world serializer lagged; skipping to latest update"
                );
            }
            Err(broadcast::error::RecvError::Closed) => {
                warn!("world updates channel closed; serializer exiting");
                break;
            }
        }
    }
}

pub fn spawn_world_serializer(world: &WorldHandle) {
    tokio::spawn(world_update_serializer(
        world.world_tx.subscribe(),
        world.world_bytes_tx.clone(),
        world.world_latest_tx.clone(),
    ));
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WorldQuery>,
) -> impl IntoResponse {
    let world_id = query
        .world_id
        .unwrap_or_else(|| state.default_world_id.to_string());

    let Some(world) = state.world_registry.get_world(&world_id).await else {
        // Keep not-found responses consistent with the JSON error schema.
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("world not found")),
        )
            .into_response();
    };

    let world_registry = state.world_registry.clone();
    let auth_client = state.auth_client.clone();
    ws.on_upgrade(move |socket| {
        // Separate connection id for correlating logs before/after a player_id exists.
        let conn_id = next_conn_id();
        let span = info_span!(
            "conn",
            conn_id,
            world_id = %world.world_id,
            player_id = tracing::field::Empty
        );
        handle_socket(socket, world, world_registry, auth_client).instrument(span)
    })
}

async fn handle_socket(
    mut socket: WebSocket,
    world: WorldHandle,
    world_registry: Arc<WorldRegistry>,
    auth_client: Arc<AuthClient>,
) {
    let mut ctx = match bootstrap_connection(&mut socket, &world, &world_registry, auth_client)
        .await
    {
        Ok(ctx) => ctx,
        Err(NetError::ClosedBeforeJoin) => {
            info!("client disconnected before join handshake");
            return;
        }
        Err(
            e @ (NetError::JoinRequired | NetError::JoinTimeout | NetError::AuthVerify),
        ) => {
            // Close frame with the reason was already sent.
            info!(error = ?e, "join handshake rejected");
            return;
        }
        Err(e) => {
            error!(error = ?e, "failed to bootstrap connection");
            let _ = send_close_with_reason(&mut socket, close_code::POLICY, "bootstrap failed")
                .await;
            return;
        }
    };

    tracing::Span::current().record("player_id", ctx.player_id);
    info!(
        player_id = ctx.player_id,
        session_id = %ctx.session_id,
        display_name = %ctx.display_name,
        role = ?ctx.role,
        "client connected"
    );

    if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
        warn!(error = ?e, "client loop exited with error");
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<usize, NetError> {
    let txt = serde_json::to_string(msg).map_err(NetError::Serialization)?;
    let bytes = txt.len();
    socket
        .send(Message::Text(txt.into()))
        .await
        .map_err(NetError::Ws)?;
    Ok(bytes)
}

#[derive(Debug, Default)]
struct ConnStats {
    msgs_in: u64,
    msgs_out: u64,
    bytes_in: u64,
    bytes_out: u64,
    invalid_json: u32,
    // Count lag recovery snapshots sent to this client.
    lag_recovery_count: u64,
    // Direct messages (rejections) skipped because the receiver fell behind.
    direct_dropped: u64,
}

impl ConnStats {
    fn sent(&mut self, bytes: usize) {
        self.msgs_out += 1;
        self.bytes_out += bytes as u64;
    }
}

// Last time each noisy warning was logged for this connection.
struct LogThrottle {
    input_full: Instant,
    world_lag: Instant,
    invalid_input: Instant,
    direct_lag: Instant,
}

impl LogThrottle {
    fn new() -> Self {
        let now = Instant::now() - LOG_THROTTLE;
        Self {
            input_full: now,
            world_lag: now,
            invalid_input: now,
            direct_lag: now,
        }
    }
}

struct ConnCtx {
    player_id: PlayerId,
    session_id: String,
    display_name: String,
    role: Role,
    // World handle for per-player connection ownership cleanup.
    world: WorldHandle,
    // Token used to verify ownership of the player connection slot.
    player_conn_token: u64,
    // Shutdown signal used to replace stale connections.
    player_conn_shutdown: Arc<Notify>,
    world_bytes_rx: broadcast::Receiver<Utf8Bytes>,
    world_latest_rx: watch::Receiver<Utf8Bytes>,
    direct_rx: broadcast::Receiver<DirectMessage>,
    announcements_rx: broadcast::Receiver<Announcement>,
    server_state_rx: watch::Receiver<ServerState>,
    stats: ConnStats,
    throttle: LogThrottle,
    close_frame: Option<CloseFrame>,
}

#[derive(Debug)]
struct JoinHandshake {
    player_id: PlayerId,
    session_id: String,
    display_name: String,
    role: Role,
    bytes_in: u64,
    msgs_in: u64,
}

async fn bootstrap_connection(
    socket: &mut WebSocket,
    world: &WorldHandle,
    world_registry: &WorldRegistry,
    auth_client: Arc<AuthClient>,
) -> Result<ConnCtx, NetError> {
    // Subscribe to updates *before* doing anything else (awaits) to not miss packets.
    let world_bytes_rx = world.world_bytes_tx.subscribe();
    let world_latest_rx = world.world_latest_tx.subscribe();
    let direct_rx = world.direct_tx.subscribe();
    let server_state_rx = world.server_state_tx.subscribe();
    let announcements_rx = world_registry.subscribe_announcements();

    // Authenticate the very first meaningful client message before assigning player ownership.
    let join = match timeout(
        JOIN_HANDSHAKE_TIMEOUT,
        read_join_handshake(socket, auth_client.as_ref()),
    )
    .await
    {
        Ok(result) => result?,
        Err(_) => {
            let _ = send_close_with_reason(socket, close_code::POLICY, "join timeout").await;
            return Err(NetError::JoinTimeout);
        }
    };
    let player_id = join.player_id;

    // Player identity is the verified user id from auth. The token lets a newer connection
    // for the same id replace this one.
    let player_conn_token = next_conn_token();
    let player_conn_shutdown = world
        .register_or_replace_player_connection(player_id, player_conn_token)
        .await;

    let mut stats = ConnStats {
        msgs_in: join.msgs_in,
        bytes_in: join.bytes_in,
        ..ConnStats::default()
    };

    let identity_msg = ServerMessage::Identity {
        player_id: player_id.to_string(),
    };
    match send_message(socket, &identity_msg).await {
        Ok(bytes) => stats.sent(bytes),
        Err(err) => {
            world
                .unregister_player_connection_if_owner(player_id, player_conn_token)
                .await;
            return Err(err);
        }
    }

    // Join happens before the initial state so the first snapshot includes the player.
    // If anything after Join fails, compensate with Leave to avoid "spawned but never connected".
    let join_request = JoinRequest {
        player_id,
        conn_token: player_conn_token,
        display_name: join.display_name.clone(),
        session_role: join.role,
    };
    if let Err(err) = world
        .input_tx
        .send(GameEvent::Join(join_request))
        .await
        .map_err(|_| NetError::InputClosed)
    {
        world
            .unregister_player_connection_if_owner(player_id, player_conn_token)
            .await;
        return Err(err);
    }

    // Clone as soon as we borrow so the watch lock is never held across an await.
    let initial_state = server_state_rx.borrow().clone();
    let listing = world.structures_tx.borrow().clone();
    let initial = [
        ServerMessage::GameState(initial_state.into()),
        ServerMessage::Structures(StructureListingDto::from(&listing)),
    ];
    for msg in &initial {
        match send_message(socket, msg).await {
            Ok(bytes) => stats.sent(bytes),
            Err(e) => {
                world
                    .input_tx
                    .send(GameEvent::Leave {
                        player_id,
                        conn_token: player_conn_token,
                    })
                    .await
                    .map_err(|_| NetError::InputClosed)?; // InputClosed takes precedence
                world
                    .unregister_player_connection_if_owner(player_id, player_conn_token)
                    .await;
                return Err(e);
            }
        }
    }

    Ok(ConnCtx {
        player_id,
        session_id: join.session_id,
        display_name: join.display_name,
        role: join.role,
        world: world.clone(),
        player_conn_token,
        player_conn_shutdown,
        world_bytes_rx,
        world_latest_rx,
        direct_rx,
        announcements_rx,
        server_state_rx,
        stats,
        throttle: LogThrottle::new(),
        close_frame: None,
    })
}

enum LoopControl {
    Continue,
    Disconnect,
}

async fn send_close_with_reason(
    socket: &mut WebSocket,
    code: u16,
    reason: &'static str,
) -> Result<(), NetError> {
    socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await
        .map_err(NetError::Ws)?;
    socket.close().await.map_err(NetError::Ws)
}

async fn read_join_handshake(
    socket: &mut WebSocket,
    auth_client: &AuthClient,
) -> Result<JoinHandshake, NetError> {
    loop {
        let Some(incoming) = socket.recv().await else {
            return Err(NetError::ClosedBeforeJoin);
        };

        let message = incoming.map_err(NetError::Ws)?;
        match message {
            Message::Text(text) => {
                let bytes_in = text.len() as u64;
                let payload = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Join(payload)) => payload,
                    Ok(_) => {
                        let _ = send_close_with_reason(socket, close_code::POLICY, "join required")
                            .await;
                        return Err(NetError::JoinRequired);
                    }
                    Err(_) => {
                        let _ = send_close_with_reason(
                            socket,
                            close_code::POLICY,
                            "invalid join payload",
                        )
                        .await;
                        return Err(NetError::JoinRequired);
                    }
                };

                let session_token = payload.session_token.trim();
                if session_token.is_empty() || session_token.len() > MAX_SESSION_TOKEN_LEN {
                    let _ =
                        send_close_with_reason(socket, close_code::POLICY, "invalid session token")
                            .await;
                    return Err(NetError::AuthVerify);
                }

                let identity = match auth_client.verify_token(session_token).await {
                    Ok(identity) => identity,
                    Err(VerifyTokenError::InvalidToken) => {
                        let _ = send_close_with_reason(
                            socket,
                            close_code::POLICY,
                            "invalid session token",
                        )
                        .await;
                        return Err(NetError::AuthVerify);
                    }
                    Err(VerifyTokenError::SessionExpired) => {
                        let _ =
                            send_close_with_reason(socket, close_code::POLICY, "session expired")
                                .await;
                        return Err(NetError::AuthVerify);
                    }
                    Err(VerifyTokenError::UpstreamUnavailable) => {
                        let _ =
                            send_close_with_reason(socket, close_code::ERROR, "auth unavailable")
                                .await;
                        return Err(NetError::AuthVerify);
                    }
                };

                // Expiry and role are checked once, at join; the session is trusted afterwards.
                let role = identity.session_role();
                return Ok(JoinHandshake {
                    player_id: identity.user_id,
                    session_id: identity.session_id,
                    display_name: identity.display_name,
                    role,
                    bytes_in,
                    msgs_in: 1,
                });
            }
            Message::Binary(_) => {
                let _ = send_close_with_reason(
                    socket,
                    close_code::UNSUPPORTED,
                    "binary messages not supported",
                )
                .await;
                return Err(NetError::JoinRequired);
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => return Err(NetError::ClosedBeforeJoin),
        }
    }
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

// Lagged rejections are gone for good; count every loss even when the warning is throttled.
fn note_direct_lag(
    player_id: PlayerId,
    missed: u64,
    stats: &mut ConnStats,
    throttle: &mut LogThrottle,
) -> LoopControl {
    stats.direct_dropped += missed;
    if should_log(&mut throttle.direct_lag) {
        warn!(
            player_id,
            missed,
            total_dropped = stats.direct_dropped,
            "direct messages lagged; rejections dropped"
        );
    }
    LoopControl::Continue
}

fn input_is_finite(input: &PlayerInput) -> bool {
    [input.move_x, input.move_y, input.aim_x, input.aim_y]
        .iter()
        .all(|v| v.is_finite())
}

// Input is latest-value state; a full channel just drops this sample.
fn process_input_message(
    player_id: PlayerId,
    input_tx: &mpsc::Sender<GameEvent>,
    input: PlayerInput,
    throttle: &mut LogThrottle,
) -> Result<LoopControl, NetError> {
    let event = if input_is_finite(&input) {
        GameEvent::Input { player_id, input }
    } else {
        if should_log(&mut throttle.invalid_input) {
            warn!(player_id, "invalid input values (NaN/inf); dropping");
        }
        GameEvent::DropInput { player_id }
    };

    match input_tx.try_send(event) {
        Ok(()) => Ok(LoopControl::Continue),
        Err(TrySendError::Full(_evt)) => {
            if should_log(&mut throttle.input_full) {
                warn!(player_id, "input channel full; dropping input");
            }
            Ok(LoopControl::Continue)
        }
        Err(TrySendError::Closed(_evt)) => Err(NetError::InputClosed),
    }
}

// Actions are never dropped silently: a full channel answers with QueueFull.
async fn process_command(
    socket: &mut WebSocket,
    player_id: PlayerId,
    input_tx: &mpsc::Sender<GameEvent>,
    command: Command,
    stats: &mut ConnStats,
    throttle: &mut LogThrottle,
) -> Result<LoopControl, NetError> {
    let action = command.action();
    match input_tx.try_send(GameEvent::Command { player_id, command }) {
        Ok(()) => Ok(LoopControl::Continue),
        Err(TrySendError::Full(_evt)) => {
            if should_log(&mut throttle.input_full) {
                warn!(player_id, "input channel full; rejecting action");
            }
            let msg = ServerMessage::from(Rejection {
                player_id,
                action,
                reason: RejectReason::QueueFull,
            });
            Ok(send_counted(socket, &msg, stats, "rejection").await)
        }
        Err(TrySendError::Closed(_evt)) => Err(NetError::InputClosed),
    }
}

async fn send_counted(
    socket: &mut WebSocket,
    msg: &ServerMessage,
    stats: &mut ConnStats,
    what: &'static str,
) -> LoopControl {
    match send_message(socket, msg).await {
        Ok(bytes) => {
            stats.sent(bytes);
            LoopControl::Continue
        }
        Err(err) => {
            // Disconnect follows immediately.
            warn!(error = ?err, what, "failed to send message");
            LoopControl::Disconnect
        }
    }
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let player_id = ctx.player_id;

    // Split borrows so `tokio::select!` can hold them concurrently.
    let ConnCtx {
        world,
        player_conn_token,
        player_conn_shutdown,
        world_bytes_rx,
        world_latest_rx,
        direct_rx,
        announcements_rx,
        server_state_rx,
        stats,
        throttle,
        close_frame,
        ..
    } = ctx;
    let input_tx = world.input_tx.clone();

    let mut fatal: Option<NetError> = None;

    loop {
        let control: LoopControl = tokio::select! {
            incoming = socket.recv() => {
                match handle_incoming_ws(
                    socket,
                    incoming,
                    player_id,
                    &input_tx,
                    stats,
                    throttle,
                    close_frame,
                ).await {
                    Ok(control) => control,
                    Err(e) => {
                        fatal = Some(e);
                        LoopControl::Disconnect
                    }
                }
            }

            world_msg = world_bytes_rx.recv() => {
                match world_msg {
                    Ok(bytes) => forward_world_bytes(bytes, socket, stats).await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        if should_log(&mut throttle.world_lag) {
                            warn!(missed = n, "world updates lagged; sending snapshot");
                        }
                        recover_from_lag(socket, world, world_latest_rx, stats).await
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::WorldUpdatesClosed);
                        LoopControl::Disconnect
                    }
                }
            }

            direct = direct_rx.recv() => {
                match direct {
                    Ok(message) if message.player_id() == player_id => {
                        let DirectMessage::Rejected(rejection) = message;
                        send_counted(socket, &ServerMessage::from(rejection), stats, "rejection").await
                    }
                    Ok(_) => LoopControl::Continue,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        note_direct_lag(player_id, n, stats, throttle)
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::DirectClosed);
                        LoopControl::Disconnect
                    }
                }
            }

            announcement = announcements_rx.recv() => {
                match announcement {
                    Ok(announcement) => {
                        send_counted(socket, &ServerMessage::from(announcement), stats, "announcement").await
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(player_id, missed = n, "announcements lagged");
                        LoopControl::Continue
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::AnnouncementsClosed);
                        LoopControl::Disconnect
                    }
                }
            }

            changed_state = server_state_rx.changed() => {
                match changed_state {
                    Ok(()) => {
                        let state = server_state_rx.borrow_and_update().clone();
                        let stopped = state == ServerState::Stopped;
                        let control = send_counted(
                            socket,
                            &ServerMessage::GameState(state.into()),
                            stats,
                            "server state",
                        )
                        .await;
                        if stopped {
                            *close_frame = Some(CloseFrame {
                                code: close_code::AWAY,
                                reason: "world stopped".into(),
                            });
                            LoopControl::Disconnect
                        } else {
                            control
                        }
                    }
                    Err(_) => {
                        warn!(player_id, "server state channel closed; disconnecting");
                        fatal = Some(NetError::ServerStateClosed);
                        LoopControl::Disconnect
                    }
                }
            }

            // Connection replacement signal for duplicate player ids.
            _ = player_conn_shutdown.notified() => {
                *close_frame = Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: "connection replaced".into(),
                });
                info!(player_id, "connection replaced by newer session");
                LoopControl::Disconnect
            }
        };

        if let LoopControl::Disconnect = control {
            if let Some(frame) = close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    if let Err(e) = disconnect_cleanup(player_id, world, *player_conn_token, stats).await {
        warn!(error = ?e, "error during disconnect cleanup");
        if fatal.is_none() {
            fatal = Some(e);
        }
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn handle_incoming_ws(
    socket: &mut WebSocket,
    incoming: Option<Result<Message, Error>>,
    player_id: PlayerId,
    input_tx: &mpsc::Sender<GameEvent>,
    stats: &mut ConnStats,
    throttle: &mut LogThrottle,
    close_frame: &mut Option<CloseFrame>,
) -> Result<LoopControl, NetError> {
    let msg = match incoming {
        Some(Ok(msg)) => msg,
        Some(Err(e)) => {
            warn!(player_id, error = %e, "websocket recv error");
            return Ok(LoopControl::Disconnect);
        }
        None => {
            info!(player_id, "websocket closed");
            return Ok(LoopControl::Disconnect);
        }
    };

    let text = match msg {
        Message::Text(text) => text,
        Message::Binary(_) => {
            *close_frame = Some(CloseFrame {
                code: close_code::UNSUPPORTED,
                reason: "binary messages not supported".into(),
            });
            return Ok(LoopControl::Disconnect);
        }
        Message::Ping(_) | Message::Pong(_) => return Ok(LoopControl::Continue),
        Message::Close(_) => return Ok(LoopControl::Disconnect),
    };

    stats.msgs_in += 1;
    stats.bytes_in += text.len() as u64;

    match serde_json::from_str::<ClientMessage>(&text).map(Inbound::from) {
        Ok(Inbound::Join) => {
            // Repeated Join packets after bootstrap are ignored to keep the session stable.
            if should_log(&mut throttle.invalid_input) {
                warn!(player_id, "duplicate join ignored");
            }
            Ok(LoopControl::Continue)
        }
        Ok(Inbound::Input(input)) => process_input_message(player_id, input_tx, input, throttle),
        Ok(Inbound::Command(command)) => {
            process_command(socket, player_id, input_tx, command, stats, throttle).await
        }
        Err(parse_err) => {
            stats.invalid_json += 1;
            if should_log(&mut throttle.invalid_input) {
                warn!(
                    player_id,
                    bytes = text.len(),
                    error = %parse_err,
                    "failed to parse client message"
                );
            }

            if stats.invalid_json > MAX_INVALID_JSON {
                *close_frame = Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: "too many invalid messages".into(),
                });
                return Ok(LoopControl::Disconnect);
            }

            // A broken Input still counts as "no input" for the next tick.
            let is_input = serde_json::from_str::<MessageTag>(&text)
                .map(|tag| tag.kind == "Input")
                .unwrap_or(false);
            if is_input {
                return match input_tx.try_send(GameEvent::DropInput { player_id }) {
                    Err(TrySendError::Closed(_)) => Err(NetError::InputClosed),
                    _ => Ok(LoopControl::Continue),
                };
            }
            Ok(LoopControl::Continue)
        }
    }
}

async fn forward_world_bytes(
    world_msg: Utf8Bytes,
    socket: &mut WebSocket,
    stats: &mut ConnStats,
) -> LoopControl {
    let bytes_len = world_msg.len();
    match socket
        .send(Message::Text(world_msg))
        .await
        .map_err(NetError::Ws)
    {
        Ok(()) => {
            stats.sent(bytes_len);
            LoopControl::Continue
        }
        Err(err) => {
            warn!(error = ?err, "failed to send world update");
            LoopControl::Disconnect
        }
    }
}

// Resync: the latest world snapshot plus the full structure grid, since diffs were missed.
async fn recover_from_lag(
    socket: &mut WebSocket,
    world: &WorldHandle,
    world_latest_rx: &watch::Receiver<Utf8Bytes>,
    stats: &mut ConnStats,
) -> LoopControl {
    let latest = world_latest_rx.borrow().clone();
    if latest.is_empty() {
        debug!("world snapshot unavailable during lag recovery");
        return LoopControl::Continue;
    }

    stats.lag_recovery_count += 1;
    let bytes_len = latest.len();
    if let LoopControl::Disconnect = forward_world_bytes(latest, socket, stats).await {
        return LoopControl::Disconnect;
    }

    let listing = world.structures_tx.borrow().clone();
    let msg = ServerMessage::Structures(StructureListingDto::from(&listing));
    let control = send_counted(socket, &msg, stats, "structures").await;
    debug!(
        bytes = bytes_len,
        count = stats.lag_recovery_count,
        "sent lag recovery snapshot"
    );
    control
}

async fn disconnect_cleanup(
    player_id: PlayerId,
    world: &WorldHandle,
    player_conn_token: u64,
    stats: &ConnStats,
) -> Result<(), NetError> {
    // The world ignores this if a newer connection has already rebound the player.
    world
        .input_tx
        .send(GameEvent::Leave {
            player_id,
            conn_token: player_conn_token,
        })
        .await
        .map_err(|_| NetError::InputClosed)?;

    // Release the player connection slot if this connection still owns it.
    world
        .unregister_player_connection_if_owner(player_id, player_conn_token)
        .await;

    debug!(
        player_id,
        msgs_in = stats.msgs_in,
        msgs_out = stats.msgs_out,
        bytes_in = stats.bytes_in,
        bytes_out = stats.bytes_out,
        invalid_json = stats.invalid_json,
        lag_recovery_count = stats.lag_recovery_count,
        direct_dropped = stats.direct_dropped,
        "connection stats"
    );
    info!(player_id, "client disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_throttle_fires_then_it_stays_quiet_for_the_window() {
        let mut last = Instant::now() - LOG_THROTTLE;
        assert!(should_log(&mut last));
        assert!(!should_log(&mut last));
    }

    #[test]
    fn when_input_has_nan_then_it_is_not_finite() {
        let input = PlayerInput {
            move_x: f32::NAN,
            ..PlayerInput::default()
        };
        assert!(!input_is_finite(&input));
        assert!(input_is_finite(&PlayerInput::default()));
    }

    #[tokio::test]
    async fn when_input_is_not_finite_then_movement_is_dropped() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut throttle = LogThrottle::new();
        let input = PlayerInput {
            aim_x: f32::INFINITY,
            ..PlayerInput::default()
        };
        let control = process_input_message(9, &tx, input, &mut throttle).expect("channel open");
        assert!(matches!(control, LoopControl::Continue));
        assert!(matches!(
            rx.recv().await,
            Some(GameEvent::DropInput { player_id: 9 })
        ));
    }

    #[test]
    fn when_direct_messages_lag_then_every_drop_is_counted() {
        let mut stats = ConnStats::default();
        let mut throttle = LogThrottle::new();
        let first = note_direct_lag(4, 3, &mut stats, &mut throttle);
        // Inside the throttle window: no warning, still counted.
        let second = note_direct_lag(4, 2, &mut stats, &mut throttle);
        assert!(matches!(first, LoopControl::Continue));
        assert!(matches!(second, LoopControl::Continue));
        assert_eq!(stats.direct_dropped, 5);
    }

    #[tokio::test]
    async fn when_input_channel_is_closed_then_loop_fails() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let mut throttle = LogThrottle::new();
        let result = process_input_message(1, &tx, PlayerInput::default(), &mut throttle);
        assert!(matches!(result, Err(NetError::InputClosed)));
    }
}
