//! Authority manager: creates, tracks, and routes players to sessions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;
use turnstile_protocol::{
    GameSession, JoinCode, PlayerId, SessionId, SessionStatus, SessionSummary,
};

use crate::session::{SessionHandle, spawn_session};
use crate::turn::{self, Seat};
use crate::{AuthorityError, SessionConfig};

/// Counter for generating unique session IDs.
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Default command channel size for session actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Join codes are this many characters long.
pub const CODE_LEN: usize = 6;

/// Letters and digits that can't be confused with each other when read
/// aloud or off a screen (no 0/O, 1/I).
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Owns every live session and the indexes used to find them.
///
/// Holds the "one session per player" invariant: a user may sit in at
/// most one session at a time.
pub struct AuthorityManager {
    config: SessionConfig,

    /// Live sessions, keyed by id.
    sessions: HashMap<SessionId, SessionHandle>,

    /// Join code to session id.
    codes: HashMap<JoinCode, SessionId>,

    /// Which session each player currently sits in.
    player_sessions: HashMap<PlayerId, SessionId>,
}

impl AuthorityManager {
    /// Creates a manager after checking `config`.
    pub fn new(config: SessionConfig) -> Result<Self, AuthorityError> {
        config.validate()?;
        Ok(Self {
            config,
            sessions: HashMap::new(),
            codes: HashMap::new(),
            player_sessions: HashMap::new(),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Opens a new `PENDING` session with `creator` in the first seat.
    pub fn create_session(&mut self, creator: Seat) -> Result<GameSession, AuthorityError> {
        if let Some(current) = self.player_sessions.get(&creator.user_id) {
            return Err(AuthorityError::AlreadyInSession(creator.user_id, *current));
        }

        let session_id = SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed));
        let code = self.unused_code();
        let player_id = creator.user_id;
        let session = turn::new_session(
            session_id,
            code.clone(),
            &self.config.board,
            creator,
            self.config.starting_balance,
        );

        let handle = spawn_session(session.clone(), self.config.clone(), DEFAULT_CHANNEL_SIZE);
        self.sessions.insert(session_id, handle);
        self.codes.insert(code.clone(), session_id);
        self.player_sessions.insert(player_id, session_id);

        tracing::info!(%session_id, %code, %player_id, "session created");
        Ok(session)
    }

    /// Seats a player in the session behind `code`.
    ///
    /// Holds `&mut self` across the actor round trip. Callers sharing the
    /// manager behind a lock should use [`reserve_seat`](Self::reserve_seat)
    /// and [`release_seat`](Self::release_seat) instead.
    pub async fn join_session(
        &mut self,
        code: &JoinCode,
        seat: Seat,
    ) -> Result<GameSession, AuthorityError> {
        let player_id = seat.user_id;
        let handle = self.reserve_seat(code, player_id)?;
        let joined = handle.join(seat).await;
        if joined.is_err() {
            self.release_seat(player_id, handle.session_id());
        }
        joined
    }

    /// First half of a join: checks the player is free, records them as
    /// seated in the session behind `code`, and returns its handle.
    ///
    /// The reservation keeps a second join by the same player out while
    /// the actor is asked. Undo it with [`release_seat`](Self::release_seat)
    /// if the actor refuses.
    pub fn reserve_seat(
        &mut self,
        code: &JoinCode,
        user: PlayerId,
    ) -> Result<SessionHandle, AuthorityError> {
        if let Some(current) = self.player_sessions.get(&user) {
            return Err(AuthorityError::AlreadyInSession(user, *current));
        }
        let handle = self.handle_by_code(code)?;
        self.player_sessions.insert(user, handle.session_id());
        Ok(handle)
    }

    /// Forgets that `user` sits in `session_id`. No-op if they sit elsewhere.
    pub fn release_seat(&mut self, user: PlayerId, session_id: SessionId) {
        if self.player_sessions.get(&user) == Some(&session_id) {
            self.player_sessions.remove(&user);
        }
    }

    pub async fn start_session(
        &self,
        user: PlayerId,
        session_id: SessionId,
    ) -> Result<GameSession, AuthorityError> {
        self.handle(session_id)?.start(user).await
    }

    /// Removes `user` from the session. A session that ends up empty or
    /// finished is destroyed and everyone left in it is freed.
    pub async fn leave_session(
        &mut self,
        user: PlayerId,
        session_id: SessionId,
    ) -> Result<GameSession, AuthorityError> {
        let handle = self.member_handle(user, session_id)?;
        let session = handle.leave(user).await?;
        if let Some(closed) = self.settle_leave(user, &session) {
            archive(closed).await;
        }
        Ok(session)
    }

    /// Handle for a session `user` sits in.
    pub fn member_handle(
        &self,
        user: PlayerId,
        session_id: SessionId,
    ) -> Result<SessionHandle, AuthorityError> {
        if self.player_sessions.get(&user) != Some(&session_id) {
            return Err(AuthorityError::NotMember(user, session_id));
        }
        self.handle(session_id)
    }

    /// Updates the indexes after the actor accepted a leave.
    ///
    /// Returns the session's handle if it was detached because it is now
    /// empty or finished; pass it to [`archive`] once any lock is dropped.
    pub fn settle_leave(&mut self, user: PlayerId, after: &GameSession) -> Option<SessionHandle> {
        self.release_seat(user, after.id);
        let done = after.players.is_empty() || after.status == SessionStatus::Finished;
        if !done {
            return None;
        }
        self.detach_session(after.id).ok()
    }

    /// Snapshot of the session behind `code`.
    pub async fn get_session_by_code(&self, code: &JoinCode) -> Result<GameSession, AuthorityError> {
        self.handle_by_code(code)?.snapshot().await
    }

    pub async fn get_session(&self, session_id: SessionId) -> Result<GameSession, AuthorityError> {
        self.handle(session_id)?.snapshot().await
    }

    /// Read-only check: may `user` roll now?
    pub async fn check_eligibility(
        &self,
        user: PlayerId,
        session_id: SessionId,
    ) -> Result<bool, AuthorityError> {
        self.handle(session_id)?.check_eligibility(user).await
    }

    pub async fn commit_position(
        &self,
        user: PlayerId,
        session_id: SessionId,
        new_position: u32,
        rolled_total: u32,
    ) -> Result<GameSession, AuthorityError> {
        self.handle(session_id)?
            .commit_position(user, new_position, rolled_total)
            .await
    }

    pub async fn end_turn(
        &self,
        user: PlayerId,
        session_id: SessionId,
    ) -> Result<GameSession, AuthorityError> {
        self.handle(session_id)?.end_turn(user).await
    }

    /// Lists sessions that are still accepting players.
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        joinable_summaries(self.session_handles()).await
    }

    /// Cloned handles to every live session.
    pub fn session_handles(&self) -> Vec<SessionHandle> {
        self.sessions.values().cloned().collect()
    }

    /// Stops a session and forgets it. Returns the final record so the
    /// caller can archive it.
    pub async fn destroy_session(&mut self, session_id: SessionId) -> Result<GameSession, AuthorityError> {
        let last = self.detach_session(session_id)?.shutdown().await?;
        tracing::info!(%session_id, status = %last.status, "session destroyed");
        Ok(last)
    }

    /// Removes a session from every index and frees its players, without
    /// stopping the actor. The caller owns the returned handle.
    pub fn detach_session(&mut self, session_id: SessionId) -> Result<SessionHandle, AuthorityError> {
        let handle = self
            .sessions
            .remove(&session_id)
            .ok_or(AuthorityError::NotFound(session_id))?;
        self.codes.remove(handle.code());
        self.player_sessions.retain(|_, sid| *sid != session_id);
        Ok(handle)
    }

    /// Handle for a session, for callers that want to drop a lock on the
    /// manager before awaiting the actor.
    pub fn handle(&self, session_id: SessionId) -> Result<SessionHandle, AuthorityError> {
        self.sessions
            .get(&session_id)
            .cloned()
            .ok_or(AuthorityError::NotFound(session_id))
    }

    pub fn handle_by_code(&self, code: &JoinCode) -> Result<SessionHandle, AuthorityError> {
        let session_id = self
            .codes
            .get(code)
            .ok_or_else(|| AuthorityError::CodeNotFound(code.clone()))?;
        self.handle(*session_id)
    }

    /// The session a player currently sits in, if any.
    pub fn player_session(&self, user: PlayerId) -> Option<SessionId> {
        self.player_sessions.get(&user).copied()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn unused_code(&self) -> JoinCode {
        loop {
            let code = generate_code();
            if !self.codes.contains_key(&code) {
                return code;
            }
        }
    }
}

/// Summaries of the sessions behind `handles` that are still joinable.
///
/// Sessions that fail to respond (e.g., shutting down) are skipped.
pub async fn joinable_summaries(handles: impl IntoIterator<Item = SessionHandle>) -> Vec<SessionSummary> {
    let mut out = Vec::new();
    for handle in handles {
        if let Ok(summary) = handle.summary().await {
            if summary.status.is_joinable() {
                out.push(summary);
            }
        }
    }
    out
}

/// Stops a detached session's actor and logs its final record.
pub async fn archive(handle: SessionHandle) {
    let session_id = handle.session_id();
    match handle.shutdown().await {
        Ok(last) => tracing::info!(
            %session_id,
            status = %last.status,
            winner = ?last.winner_id,
            version = last.version,
            "session archived"
        ),
        Err(e) => tracing::debug!(%session_id, error = %e, "session already stopped"),
    }
}

fn generate_code() -> JoinCode {
    let mut rng = rand::rng();
    let code: String = (0..CODE_LEN)
        .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
        .collect();
    JoinCode::new(code)
}
