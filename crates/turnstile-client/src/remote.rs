//! [`SessionApi`] over a WebSocket connection to a Turnstile server.
//!
//! One background task reads every incoming envelope and hands each
//! response to the request waiting on its `reply_to`, so several calls
//! (a poll and a commit, say) can be outstanding on one socket.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time;
use turnstile_protocol::{
    Codec, Envelope, GameSession, JoinCode, JsonCodec, PROTOCOL_VERSION, Payload, PlayerId,
    ProtocolError, Request, Response, SessionId, SessionSummary,
};
use turnstile_transport::{Connection, TransportError, WebSocketConnection};

use crate::{ClientError, CommitReply, SessionApi};

type Waiters = HashMap<u64, oneshot::Sender<Response>>;

struct Shared {
    conn: WebSocketConnection,
    codec: JsonCodec,
    next_seq: AtomicU64,
    /// Never held across an await.
    pending: Mutex<Waiters>,
    started: Instant,
}

/// A request's slot in `pending`. Dropping it removes the slot, so a
/// request abandoned by its caller, through a timeout or otherwise,
/// leaves nothing behind.
struct PendingEntry<'a> {
    shared: &'a Shared,
    seq: u64,
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        self.shared.waiters().remove(&self.seq);
    }
}

/// A connected, authenticated client.
pub struct RemoteApi {
    shared: Arc<Shared>,
    reader: JoinHandle<()>,
    player_id: PlayerId,
    timeout: Duration,
}

impl RemoteApi {
    /// Dials `url`, says hello, and waits for the server's welcome.
    pub async fn connect(
        url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let conn = WebSocketConnection::connect(url).await?;
        let shared = Arc::new(Shared {
            conn,
            codec: JsonCodec,
            next_seq: AtomicU64::new(1),
            pending: Mutex::new(Waiters::new()),
            started: Instant::now(),
        });
        let reader = tokio::spawn(read_loop(Arc::clone(&shared)));

        let mut api = Self {
            shared,
            reader,
            player_id: PlayerId(0),
            timeout,
        };

        let hello = Request::Hello {
            version: PROTOCOL_VERSION,
            token,
        };
        match api.request(hello).await? {
            Response::Welcome { player_id, .. } => {
                tracing::info!(%player_id, url, "connected to server");
                api.player_id = player_id;
                Ok(api)
            }
            other => Err(unexpected(&other)),
        }
    }

    /// The identity the server assigned on welcome.
    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    /// Requests still waiting on a reply.
    pub fn pending_requests(&self) -> usize {
        self.shared.waiters().len()
    }

    /// Sends one request and waits for its response.
    ///
    /// `Response::Error` is turned into [`ClientError::Server`].
    pub async fn request(&self, request: Request) -> Result<Response, ClientError> {
        let seq = self.shared.next_seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.shared.waiters().insert(seq, tx);
        let _entry = PendingEntry {
            shared: &self.shared,
            seq,
        };

        let envelope = Envelope::request(seq, self.shared.elapsed_ms(), request);
        let bytes = self.shared.codec.encode(&envelope)?;
        self.shared.conn.send(&bytes).await?;

        match time::timeout(self.timeout, rx).await {
            Ok(Ok(Response::Error { code, message })) => Err(ClientError::Server { code, message }),
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(TransportError::ConnectionClosed(
                "connection closed while waiting for a reply".into(),
            )
            .into()),
            Err(_) => Err(ClientError::Timeout(self.timeout)),
        }
    }

    pub async fn create_session(
        &self,
        name: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<GameSession, ClientError> {
        let request = Request::CreateSession {
            name: name.into(),
            token: token.into(),
        };
        expect_session(self.request(request).await?)
    }

    pub async fn join_session(
        &self,
        code: &JoinCode,
        name: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<GameSession, ClientError> {
        let request = Request::JoinSession {
            code: code.clone(),
            name: name.into(),
            token: token.into(),
        };
        expect_session(self.request(request).await?)
    }

    pub async fn start_session(&self, session_id: SessionId) -> Result<GameSession, ClientError> {
        expect_session(self.request(Request::StartSession { session_id }).await?)
    }

    pub async fn leave_session(&self, session_id: SessionId) -> Result<GameSession, ClientError> {
        expect_session(self.request(Request::LeaveSession { session_id }).await?)
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, ClientError> {
        match self.request(Request::ListSessions).await? {
            Response::SessionList { sessions } => Ok(sessions),
            other => Err(unexpected(&other)),
        }
    }

    /// Round trip time to the server.
    pub async fn heartbeat(&self) -> Result<Duration, ClientError> {
        let sent = Instant::now();
        let client_time = self.shared.elapsed_ms();
        match self.request(Request::Heartbeat { client_time }).await? {
            Response::HeartbeatAck { .. } => Ok(sent.elapsed()),
            other => Err(unexpected(&other)),
        }
    }

    /// Says goodbye and closes the socket.
    pub async fn close(self, reason: impl Into<String>) -> Result<(), ClientError> {
        let seq = self.shared.next_seq.fetch_add(1, Ordering::Relaxed);
        let goodbye = Envelope::request(
            seq,
            self.shared.elapsed_ms(),
            Request::Goodbye {
                reason: reason.into(),
            },
        );
        let bytes = self.shared.codec.encode(&goodbye)?;
        let _ = self.shared.conn.send(&bytes).await;
        self.shared.conn.close().await?;
        Ok(())
    }
}

impl Drop for RemoteApi {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl SessionApi for RemoteApi {
    async fn get_session_by_code(&self, code: &JoinCode) -> Result<GameSession, ClientError> {
        expect_session(self.request(Request::GetSessionByCode { code: code.clone() }).await?)
    }

    async fn check_eligibility(
        &self,
        _user: PlayerId,
        session_id: SessionId,
    ) -> Result<bool, ClientError> {
        match self.request(Request::CheckEligibility { session_id }).await? {
            Response::Eligibility { can_roll } => Ok(can_roll),
            other => Err(unexpected(&other)),
        }
    }

    async fn commit_position(
        &self,
        _user: PlayerId,
        session_id: SessionId,
        new_position: u32,
        rolled_total: u32,
    ) -> Result<CommitReply, ClientError> {
        let request = Request::CommitPosition {
            session_id,
            new_position,
            rolled_total,
        };
        expect_outcome(self.request(request).await?)
    }

    async fn end_turn(&self, _user: PlayerId, session_id: SessionId) -> Result<CommitReply, ClientError> {
        expect_outcome(self.request(Request::EndTurn { session_id }).await?)
    }
}

impl Shared {
    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn waiters(&self) -> MutexGuard<'_, Waiters> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Routes responses to their waiters until the connection ends, then
/// drops every remaining waiter so they fail instead of hanging.
async fn read_loop(shared: Arc<Shared>) {
    loop {
        match shared.conn.recv().await {
            Ok(Some(bytes)) => match shared.codec.decode_envelope(&bytes) {
                Ok(Envelope {
                    reply_to: Some(reply_to),
                    payload: Payload::Response(response),
                    ..
                }) => {
                    let waiter = shared.waiters().remove(&reply_to);
                    match waiter {
                        Some(tx) => {
                            let _ = tx.send(response);
                        }
                        None => tracing::debug!(reply_to, "response for unknown request, dropping"),
                    }
                }
                Ok(envelope) => {
                    tracing::warn!(seq = envelope.seq, "unexpected request from server, ignoring");
                }
                Err(e) => tracing::warn!(error = %e, "undecodable message from server"),
            },
            Ok(None) => {
                tracing::debug!("server closed the connection");
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "connection error");
                break;
            }
        }
    }
    shared.waiters().clear();
}

fn expect_session(response: Response) -> Result<GameSession, ClientError> {
    match response {
        Response::Session { session } => Ok(session),
        other => Err(unexpected(&other)),
    }
}

fn expect_outcome(response: Response) -> Result<CommitReply, ClientError> {
    match response {
        Response::Outcome {
            success,
            message,
            session,
        } => Ok(CommitReply {
            success,
            message,
            session,
        }),
        other => Err(unexpected(&other)),
    }
}

fn unexpected(response: &Response) -> ClientError {
    ProtocolError::InvalidMessage(format!("unexpected response: {response:?}")).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnstile_transport::{Listener, WebSocketListener};

    /// A server that welcomes the client and then never answers again.
    async fn silent_server() -> String {
        let mut listener = WebSocketListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let conn = listener.accept().await.unwrap();
            let codec = JsonCodec;
            let hello = codec.decode_envelope(&conn.recv().await.unwrap().unwrap()).unwrap();
            let welcome = Envelope::response(
                1,
                hello.seq,
                0,
                Response::Welcome {
                    player_id: PlayerId(7),
                    server_time: 0,
                },
            );
            conn.send(&codec.encode(&welcome).unwrap()).await.unwrap();
            while let Ok(Some(_)) = conn.recv().await {}
        });
        url
    }

    #[tokio::test]
    async fn test_request_timeout_clears_waiter() {
        let url = silent_server().await;
        let api = RemoteApi::connect(&url, Some("t".into()), Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(api.player_id(), PlayerId(7));

        let err = api.request(Request::ListSessions).await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout(_)));
        assert_eq!(api.pending_requests(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_request_clears_waiter() {
        let url = silent_server().await;
        let api = RemoteApi::connect(&url, Some("t".into()), Duration::from_secs(30))
            .await
            .unwrap();

        let outer = time::timeout(Duration::from_millis(50), api.request(Request::ListSessions)).await;
        assert!(outer.is_err());
        assert_eq!(api.pending_requests(), 0);
    }
}
