//! WebSocket upgrade handler and per-connection I/O

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::input::SessionEvent;
use crate::game::SessionError;
use crate::http::middleware::verify_jwt;
use crate::matchmaking::{QueueError, QueueTicket};
use crate::sync::codec::{encode_diff, CodecError};
use crate::sync::diff::StateDiff;
use crate::sync::dispatch::{ClientFeed, ClientLink, Outbound};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{diff_json, ClientMsg, ServerMsg};

type WsSink = SplitSink<WebSocket, Message>;

/// Errors writing to the socket
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("json encode failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("diff encode failed: {0}")]
    Codec(#[from] CodecError),

    #[error("socket write failed: {0}")]
    Socket(#[from] axum::Error),
}

/// WebSocket upgrade handler. Authentication happens on the first `join`
/// frame rather than during the upgrade.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (link, feed) = ClientLink::channel();
    let connection_id = link.id;
    info!(connection = %connection_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    link.send(ServerMsg::Welcome {
        server_time: unix_millis(),
    });

    // Writer task: outbound feed -> WebSocket
    let compress = state.config.compress_diffs;
    let writer_handle = tokio::spawn(write_loop(ws_sink, feed, compress, connection_id));

    let mut conn = Connection {
        state,
        link,
        user_id: None,
        ticket: None,
        rate_limiter: ConnectionRateLimiter::new(),
    };
    conn.read_loop(ws_stream).await;
    conn.disconnect().await;

    writer_handle.abort();
    info!(connection = %connection_id, user_id = ?conn.user_id, "WebSocket connection closed");
}

/// Reader-side state of one socket
struct Connection {
    state: AppState,
    link: ClientLink,
    /// Set once `join` has been verified
    user_id: Option<Uuid>,
    ticket: Option<QueueTicket>,
    rate_limiter: ConnectionRateLimiter,
}

impl Connection {
    async fn read_loop(&mut self, mut ws_stream: SplitStream<WebSocket>) {
        while let Some(result) = ws_stream.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    if !self.rate_limiter.check_input() {
                        warn!(connection = %self.link.id, "Rate limited input message");
                        self.reject(SessionError::InvalidInput("rate limited".into()));
                        continue;
                    }

                    match serde_json::from_str::<ClientMsg>(&text) {
                        Ok(msg) => self.handle(msg).await,
                        Err(e) => {
                            warn!(connection = %self.link.id, error = %e, "Failed to parse client message");
                            self.reject(SessionError::InvalidInput(e.to_string()));
                        }
                    }
                }
                Ok(Message::Binary(_)) => {
                    warn!(connection = %self.link.id, "Received binary message, ignoring");
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    debug!(connection = %self.link.id, "Received control frame");
                }
                Ok(Message::Close(_)) => {
                    info!(connection = %self.link.id, "Client initiated close");
                    break;
                }
                Err(e) => {
                    error!(connection = %self.link.id, error = %e, "WebSocket error");
                    break;
                }
            }
        }
    }

    async fn handle(&mut self, msg: ClientMsg) {
        match msg {
            ClientMsg::Join { token } => self.join(&token).await,
            ClientMsg::Cancel => self.cancel().await,
            ClientMsg::Ping { t } => {
                self.link.send(ServerMsg::Pong { t });
            }
            msg => self.forward(msg),
        }
    }

    /// Authenticate, then re-attach to a live session or queue up. The same
    /// socket may join again once its previous session has ended.
    async fn join(&mut self, token: &str) {
        let claims = match verify_jwt(token, &self.state.config.supabase_jwt_secret) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(connection = %self.link.id, error = %e, "Join rejected");
                self.link.send(ServerMsg::error(e.code(), e.to_string()));
                return;
            }
        };
        let user_id = claims.sub;
        if self.user_id.is_some_and(|current| current != user_id) {
            self.reject(SessionError::InvalidInput("already joined as another player".into()));
            return;
        }
        self.user_id = Some(user_id);
        info!(connection = %self.link.id, user_id = %user_id, "Player authenticated");

        // Rejoin a live session
        if let Some(session) = self.state.registry.session_for(user_id) {
            match session.submit(user_id, SessionEvent::Attach(self.link.clone()), None) {
                Ok(_) => return,
                Err(e) => {
                    debug!(user_id = %user_id, error = %e, "Reattach to finished session refused");
                    self.reject(e);
                    return;
                }
            }
        }

        if !self.rate_limiter.check_matchmaking() {
            self.reject(SessionError::InvalidInput("matchmaking rate limited".into()));
            return;
        }
        match self.state.matchmaking.enqueue(user_id, self.link.clone()).await {
            Ok(ticket) => self.ticket = Some(ticket),
            Err(e) => self.reject_queue(e),
        }
    }

    async fn cancel(&mut self) {
        let Some(ticket) = self.ticket.take() else {
            self.reject_queue(QueueError::UnknownTicket);
            return;
        };
        if let Err(e) = self.state.matchmaking.cancel(ticket).await {
            self.reject_queue(e);
        }
    }

    /// Route an in-session message to the player's session queue
    fn forward(&mut self, msg: ClientMsg) {
        let Some(user_id) = self.user_id else {
            self.reject(SessionError::InvalidInput("join first".into()));
            return;
        };
        let Some(session) = self.state.registry.session_for(user_id) else {
            self.reject(SessionError::InvalidInput("not in a session".into()));
            return;
        };

        let tick_hint = match &msg {
            ClientMsg::Input { tick_hint, .. } => *tick_hint,
            _ => None,
        };
        let result = SessionEvent::try_from(msg)
            .and_then(|event| session.submit(user_id, event, tick_hint));
        match result {
            Ok(true) => {}
            Ok(false) => {
                warn!(user_id = %user_id, session_id = %session.id, "Input shed under backpressure");
            }
            Err(e) => self.reject(e),
        }
    }

    /// Tell whoever owns this player that the socket is gone
    async fn disconnect(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            let _ = self.state.matchmaking.cancel(ticket).await;
        }
        let Some(user_id) = self.user_id else {
            return;
        };
        if let Some(session) = self.state.registry.session_for(user_id) {
            let event = SessionEvent::Disconnected {
                connection: self.link.id,
            };
            if let Err(e) = session.submit(user_id, event, None) {
                debug!(user_id = %user_id, error = %e, "Session already closed on disconnect");
            }
        }
    }

    fn reject(&self, err: SessionError) {
        self.link.send(ServerMsg::error(err.code(), err.to_string()));
    }

    fn reject_queue(&self, err: QueueError) {
        self.link.send(ServerMsg::error(err.code(), err.to_string()));
    }
}

/// Drain the outbound feed into the socket until either side goes away
async fn write_loop(mut sink: WsSink, mut feed: ClientFeed, compress: bool, connection: Uuid) {
    while let Some(outbound) = feed.next().await {
        let result = match outbound {
            Outbound::Message(msg) => send_msg(&mut sink, &msg).await,
            Outbound::Diff(diff) => send_diff(&mut sink, &diff, compress).await,
        };
        if let Err(e) = result {
            debug!(connection = %connection, error = %e, "WebSocket send failed");
            break;
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut WsSink, msg: &ServerMsg) -> Result<(), SendError> {
    let json = serde_json::to_string(msg)?;
    sink.send(Message::Text(json)).await?;
    Ok(())
}

/// Send a state diff, as a compact binary frame when compression is on
async fn send_diff(sink: &mut WsSink, diff: &StateDiff, compress: bool) -> Result<(), SendError> {
    if !compress {
        sink.send(Message::Text(diff_json(diff)?)).await?;
        return Ok(());
    }

    let (frame, stats) = encode_diff(diff)?;
    debug!(
        version = diff.version,
        raw_len = stats.raw_len,
        wire_len = stats.wire_len,
        format = stats.format,
        "Diff frame"
    );
    sink.send(Message::Binary(frame.to_vec())).await?;
    Ok(())
}
