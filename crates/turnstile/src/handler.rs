//! Per-connection handler: handshake, auth, and request dispatch.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `Hello` → check version
//!   2. Authenticate the token → `PlayerId`
//!   3. Send `Welcome`
//!   4. Loop: receive requests → answer each one with `reply_to` set
//!
//! Dropping the connection does not give up the player's seat; they can
//! reconnect with the same token and carry on.

use std::sync::Arc;
use std::time::Instant;

use turnstile_authority::{AuthorityError, Seat, SessionHandle, archive, joinable_summaries};
use turnstile_protocol::{
    Codec, Envelope, GameSession, Payload, PlayerId, ProtocolError, Request, Response, SessionId,
    PROTOCOL_VERSION,
};
use turnstile_transport::{Connection, WebSocketConnection};

use crate::error::{is_rejection, status_code};
use crate::server::ServerState;
use crate::{Authenticator, TurnstileError};

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A: Authenticator>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A>>,
) -> Result<(), TurnstileError> {
    let conn_id = conn.id();
    let mut replies = Replies::new(&conn, &state);
    tracing::debug!(%conn_id, "handling new connection");

    let player_id = perform_handshake(&mut replies).await?;
    tracing::info!(%conn_id, %player_id, "player authenticated");

    loop {
        let data = match tokio::time::timeout(state.idle_timeout, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%player_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%player_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%player_id, "connection idle, closing");
                break;
            }
        };

        let envelope = match state.codec.decode_envelope(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "failed to decode envelope");
                continue;
            }
        };

        let request = match envelope.payload {
            Payload::Request(request) => request,
            Payload::Response(_) => {
                tracing::warn!(%player_id, seq = envelope.seq, "client sent a response, ignoring");
                continue;
            }
        };

        if let Request::Goodbye { reason } = &request {
            tracing::info!(%player_id, %reason, "client said goodbye");
            break;
        }

        let response = dispatch(&state, player_id, request, replies.elapsed_ms()).await;
        replies.send(envelope.seq, response).await?;
    }

    if let Err(e) = conn.close().await {
        tracing::debug!(%player_id, error = %e, "close failed");
    }
    Ok(())
}

/// Receives `Hello`, checks the version, and authenticates.
async fn perform_handshake<A: Authenticator>(
    replies: &mut Replies<'_, A>,
) -> Result<PlayerId, TurnstileError> {
    let state = replies.state;
    let data = match tokio::time::timeout(state.handshake_timeout, replies.conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage("connection closed before hello".into()).into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("hello timed out".into()).into());
        }
    };

    let envelope = state.codec.decode_envelope(&data)?;
    let (version, token) = match envelope.payload {
        Payload::Request(Request::Hello { version, token }) => (version, token),
        _ => {
            replies.error(envelope.seq, 400, "expected Hello").await?;
            return Err(ProtocolError::InvalidMessage("first message must be Hello".into()).into());
        }
    };

    if version != PROTOCOL_VERSION {
        let message = format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}");
        replies.error(envelope.seq, 400, &message).await?;
        return Err(ProtocolError::InvalidMessage(message).into());
    }

    let player_id = match state.auth.authenticate(token.as_deref().unwrap_or("")).await {
        Ok(pid) => pid,
        Err(e) => {
            replies.error(envelope.seq, 401, "unauthorized").await?;
            return Err(e);
        }
    };

    let welcome = Response::Welcome {
        player_id,
        server_time: replies.elapsed_ms(),
    };
    replies.send(envelope.seq, welcome).await?;
    Ok(player_id)
}

/// Serves one request. Never fails: authority errors become
/// `Response::Error`, rule violations on moves become a rejected
/// `Response::Outcome`.
async fn dispatch<A: Authenticator>(
    state: &ServerState<A>,
    player_id: PlayerId,
    request: Request,
    now_ms: u64,
) -> Response {
    tracing::debug!(%player_id, ?request, "request");

    let result = match request {
        Request::Heartbeat { client_time } => {
            return Response::HeartbeatAck {
                client_time,
                server_time: now_ms,
            };
        }

        Request::Hello { .. } => {
            return bad_request("already said hello");
        }

        Request::Goodbye { .. } => return bad_request("goodbye ends the connection"),

        Request::CreateSession { name, token } => {
            let seat = Seat::new(player_id, name, token);
            state.authority.lock().await.create_session(seat).map(session)
        }

        // The manager lock covers index updates only; actor round trips
        // happen with it released.
        Request::JoinSession { code, name, token } => {
            let reserved = state.authority.lock().await.reserve_seat(&code, player_id);
            match reserved {
                Ok(h) => {
                    let joined = h.join(Seat::new(player_id, name, token)).await;
                    if joined.is_err() {
                        state
                            .authority
                            .lock()
                            .await
                            .release_seat(player_id, h.session_id());
                    }
                    joined.map(session)
                }
                Err(e) => Err(e),
            }
        }

        Request::LeaveSession { session_id } => {
            let member = state.authority.lock().await.member_handle(player_id, session_id);
            match member {
                Ok(h) => match h.leave(player_id).await {
                    Ok(after) => {
                        let closed = state.authority.lock().await.settle_leave(player_id, &after);
                        if let Some(closed) = closed {
                            archive(closed).await;
                        }
                        Ok(session(after))
                    }
                    Err(e) => Err(e),
                },
                Err(e) => Err(e),
            }
        }

        Request::StartSession { session_id } => match handle(state, session_id).await {
            Ok(h) => h.start(player_id).await.map(session),
            Err(e) => Err(e),
        },

        Request::ListSessions => {
            let handles = state.authority.lock().await.session_handles();
            let sessions = joinable_summaries(handles).await;
            Ok(Response::SessionList { sessions })
        }

        Request::GetSessionByCode { code } => {
            let found = state.authority.lock().await.handle_by_code(&code);
            match found {
                Ok(h) => h.snapshot().await.map(session),
                Err(e) => Err(e),
            }
        }

        Request::CheckEligibility { session_id } => match handle(state, session_id).await {
            Ok(h) => h
                .check_eligibility(player_id)
                .await
                .map(|can_roll| Response::Eligibility { can_roll }),
            Err(e) => Err(e),
        },

        Request::CommitPosition {
            session_id,
            new_position,
            rolled_total,
        } => match handle(state, session_id).await {
            Ok(h) => outcome(
                h.commit_position(player_id, new_position, rolled_total)
                    .await,
            ),
            Err(e) => Err(e),
        },

        Request::EndTurn { session_id } => match handle(state, session_id).await {
            Ok(h) => outcome(h.end_turn(player_id).await),
            Err(e) => Err(e),
        },
    };

    result.unwrap_or_else(|e| {
        tracing::debug!(%player_id, error = %e, "request refused");
        Response::Error {
            code: status_code(&e),
            message: e.to_string(),
        }
    })
}

async fn handle<A: Authenticator>(
    state: &ServerState<A>,
    session_id: SessionId,
) -> Result<SessionHandle, AuthorityError> {
    state.authority.lock().await.handle(session_id)
}

fn session(session: GameSession) -> Response {
    Response::Session { session }
}

/// Moves report rule violations in-band so the client can roll back.
fn outcome(result: Result<GameSession, AuthorityError>) -> Result<Response, AuthorityError> {
    match result {
        Ok(session) => Ok(Response::Outcome {
            success: true,
            message: None,
            session: Some(session),
        }),
        Err(e) if is_rejection(&e) => Ok(Response::Outcome {
            success: false,
            message: Some(e.to_string()),
            session: None,
        }),
        Err(e) => Err(e),
    }
}

fn bad_request(message: &str) -> Response {
    Response::Error {
        code: 400,
        message: message.to_string(),
    }
}

/// Outgoing side of a connection: numbers replies and stamps them.
struct Replies<'a, A: Authenticator> {
    conn: &'a WebSocketConnection,
    state: &'a ServerState<A>,
    seq: u64,
    started: Instant,
}

impl<'a, A: Authenticator> Replies<'a, A> {
    fn new(conn: &'a WebSocketConnection, state: &'a Arc<ServerState<A>>) -> Self {
        Self {
            conn,
            state: state.as_ref(),
            seq: 1,
            started: Instant::now(),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    async fn send(&mut self, reply_to: u64, response: Response) -> Result<(), TurnstileError> {
        let envelope = Envelope::response(self.seq, reply_to, self.elapsed_ms(), response);
        self.seq += 1;
        let bytes = self.state.codec.encode(&envelope)?;
        self.conn.send(&bytes).await?;
        Ok(())
    }

    async fn error(&mut self, reply_to: u64, code: u16, message: &str) -> Result<(), TurnstileError> {
        let response = Response::Error {
            code,
            message: message.to_string(),
        };
        self.send(reply_to, response).await
    }
}
