//! Session actor: one Tokio task owns each session record.
//!
//! Every read and write for a session goes through its mpsc channel, so
//! commits for one session apply strictly in arrival order and the
//! eligibility check inside a commit can never race another commit.

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, oneshot};
use turnstile_protocol::{GameSession, JoinCode, PlayerId, SessionId, SessionSummary};

use crate::turn::{self, Seat};
use crate::{AuthorityError, SessionConfig};

type Reply<T> = oneshot::Sender<Result<T, AuthorityError>>;

/// Commands sent to a session actor through its channel.
pub(crate) enum SessionCommand {
    Snapshot {
        reply: oneshot::Sender<GameSession>,
    },
    Summary {
        reply: oneshot::Sender<SessionSummary>,
    },
    Join {
        seat: Seat,
        reply: Reply<GameSession>,
    },
    Start {
        user: PlayerId,
        reply: Reply<GameSession>,
    },
    Leave {
        user: PlayerId,
        reply: Reply<GameSession>,
    },
    CheckEligibility {
        user: PlayerId,
        reply: oneshot::Sender<bool>,
    },
    Commit {
        user: PlayerId,
        new_position: u32,
        rolled_total: u32,
        reply: Reply<GameSession>,
    },
    EndTurn {
        user: PlayerId,
        reply: Reply<GameSession>,
    },
    /// Stops the actor and hands back the final record.
    Shutdown {
        reply: oneshot::Sender<GameSession>,
    },
}

/// Handle to a running session actor.
///
/// Cheap to clone. Callers that only need to talk to one session should
/// clone the handle out of the manager and release any manager lock
/// before awaiting.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    code: JoinCode,
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn code(&self) -> &JoinCode {
        &self.code
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, AuthorityError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| AuthorityError::Unavailable(self.session_id))?;
        reply_rx
            .await
            .map_err(|_| AuthorityError::Unavailable(self.session_id))
    }

    /// The full current record.
    pub async fn snapshot(&self) -> Result<GameSession, AuthorityError> {
        self.call(|reply| SessionCommand::Snapshot { reply }).await
    }

    /// Lobby listing data.
    pub async fn summary(&self) -> Result<SessionSummary, AuthorityError> {
        self.call(|reply| SessionCommand::Summary { reply }).await
    }

    pub async fn join(&self, seat: Seat) -> Result<GameSession, AuthorityError> {
        self.call(|reply| SessionCommand::Join { seat, reply }).await?
    }

    pub async fn start(&self, user: PlayerId) -> Result<GameSession, AuthorityError> {
        self.call(|reply| SessionCommand::Start { user, reply }).await?
    }

    pub async fn leave(&self, user: PlayerId) -> Result<GameSession, AuthorityError> {
        self.call(|reply| SessionCommand::Leave { user, reply }).await?
    }

    /// Whether `user` may roll right now. Read-only.
    pub async fn check_eligibility(&self, user: PlayerId) -> Result<bool, AuthorityError> {
        self.call(|reply| SessionCommand::CheckEligibility { user, reply })
            .await
    }

    /// Validates and applies a move, returning the updated record.
    pub async fn commit_position(
        &self,
        user: PlayerId,
        new_position: u32,
        rolled_total: u32,
    ) -> Result<GameSession, AuthorityError> {
        self.call(|reply| SessionCommand::Commit {
            user,
            new_position,
            rolled_total,
            reply,
        })
        .await?
    }

    pub async fn end_turn(&self, user: PlayerId) -> Result<GameSession, AuthorityError> {
        self.call(|reply| SessionCommand::EndTurn { user, reply })
            .await?
    }

    /// Stops the actor. Returns the final record for archiving.
    pub async fn shutdown(&self) -> Result<GameSession, AuthorityError> {
        self.call(|reply| SessionCommand::Shutdown { reply }).await
    }
}

/// The internal actor state. Runs inside a Tokio task.
struct SessionActor {
    session: GameSession,
    config: SessionConfig,
    receiver: mpsc::Receiver<SessionCommand>,
}

impl SessionActor {
    async fn run(mut self) {
        let session_id = self.session.id;
        tracing::info!(%session_id, code = %self.session.code, "session actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                SessionCommand::Snapshot { reply } => {
                    let _ = reply.send(self.session.clone());
                }
                SessionCommand::Summary { reply } => {
                    let _ = reply.send(self.summary());
                }
                SessionCommand::Join { seat, reply } => {
                    let player_id = seat.user_id;
                    let result = turn::join(
                        &mut self.session,
                        seat,
                        self.config.starting_balance,
                        self.config.max_players,
                    );
                    if result.is_ok() {
                        tracing::info!(
                            %session_id,
                            %player_id,
                            players = self.session.players.len(),
                            "player joined"
                        );
                    }
                    let _ = reply.send(self.reply(result));
                }
                SessionCommand::Start { user, reply } => {
                    let result = turn::start(&mut self.session, user, self.config.min_players, now_ms());
                    if result.is_ok() {
                        tracing::info!(
                            %session_id,
                            players = self.session.players.len(),
                            "session started"
                        );
                    }
                    let _ = reply.send(self.reply(result));
                }
                SessionCommand::Leave { user, reply } => {
                    let result = turn::leave(&mut self.session, user, now_ms());
                    if result.is_ok() {
                        tracing::info!(%session_id, player_id = %user, "player left");
                        if let Some(winner) = self.session.winner_id {
                            tracing::info!(%session_id, %winner, "session finished");
                        }
                    }
                    let _ = reply.send(self.reply(result));
                }
                SessionCommand::CheckEligibility { user, reply } => {
                    let _ = reply.send(turn::can_act(&self.session, user));
                }
                SessionCommand::Commit {
                    user,
                    new_position,
                    rolled_total,
                    reply,
                } => {
                    let result = turn::commit_move(
                        &mut self.session,
                        &self.config.board,
                        user,
                        new_position,
                        rolled_total,
                        now_ms(),
                    );
                    match &result {
                        Ok(movement) => tracing::debug!(
                            %session_id,
                            player_id = %user,
                            from = movement.from,
                            to = movement.to,
                            total = movement.total,
                            "move committed"
                        ),
                        Err(e) => tracing::debug!(
                            %session_id,
                            player_id = %user,
                            error = %e,
                            "commit rejected"
                        ),
                    }
                    let _ = reply.send(self.reply(result));
                }
                SessionCommand::EndTurn { user, reply } => {
                    let result = turn::end_turn(&mut self.session, user, now_ms());
                    match &result {
                        Ok(next) => tracing::debug!(%session_id, player_id = %user, %next, "turn ended"),
                        Err(e) => tracing::debug!(
                            %session_id,
                            player_id = %user,
                            error = %e,
                            "end turn rejected"
                        ),
                    }
                    let _ = reply.send(self.reply(result));
                }
                SessionCommand::Shutdown { reply } => {
                    tracing::info!(%session_id, "session shutting down");
                    let _ = reply.send(self.session.clone());
                    break;
                }
            }
        }

        tracing::info!(%session_id, "session actor stopped");
    }

    /// Maps a mutation result to the snapshot that goes back to the caller.
    fn reply<T>(&self, result: Result<T, AuthorityError>) -> Result<GameSession, AuthorityError> {
        result.map(|_| self.session.clone())
    }

    fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session.id,
            code: self.session.code.clone(),
            status: self.session.status,
            player_count: self.session.players.len(),
            max_players: self.config.max_players,
        }
    }
}

/// Spawns a session actor owning `session` and returns its handle.
pub(crate) fn spawn_session(
    session: GameSession,
    config: SessionConfig,
    channel_size: usize,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(channel_size);
    let handle = SessionHandle {
        session_id: session.id,
        code: session.code.clone(),
        sender: tx,
    };

    let actor = SessionActor {
        session,
        config,
        receiver: rx,
    };
    tokio::spawn(actor.run());

    handle
}

/// Milliseconds since the UNIX epoch.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
