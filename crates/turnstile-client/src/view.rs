//! The client's local copy of a session.
//!
//! A [`SessionView`] is created when the client joins a session, updated
//! only by authoritative snapshots (commit/end-turn replies, polls,
//! resyncs) and by one optimistic prediction at a time, and dropped when
//! the client leaves.

use turnstile_protocol::{GameSession, Player, PlayerId};

/// What [`SessionView::adopt`] did with a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adoption {
    /// The snapshot differed and replaced the local copy.
    Replaced,
    /// Structurally equal to what we have; nothing changed.
    Unchanged,
    /// Older than the local copy; ignored.
    Stale,
}

#[derive(Debug, Clone)]
pub struct SessionView {
    me: PlayerId,
    session: GameSession,
    /// Pre-prediction copy while an optimistic move is outstanding.
    backup: Option<GameSession>,
    disabled: Option<String>,
}

impl SessionView {
    pub fn new(me: PlayerId, session: GameSession) -> Self {
        Self {
            me,
            session,
            backup: None,
            disabled: None,
        }
    }

    pub fn me(&self) -> PlayerId {
        self.me
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    /// Version of the last authoritative snapshot adopted.
    pub fn version(&self) -> u64 {
        self.backup.as_ref().unwrap_or(&self.session).version
    }

    pub fn my_player(&self) -> Option<&Player> {
        self.session.player(self.me)
    }

    /// Local hint only; the authority decides.
    pub fn is_my_turn(&self) -> bool {
        self.session.status.is_running() && self.session.next_player_id == Some(self.me)
    }

    /// Replaces the local copy with `snapshot` unless it is older or
    /// identical. Any outstanding prediction is discarded.
    pub fn adopt(&mut self, snapshot: GameSession) -> Adoption {
        if snapshot.version < self.version() {
            return Adoption::Stale;
        }
        if self.backup.is_none() && snapshot == self.session {
            return Adoption::Unchanged;
        }
        self.session = snapshot;
        self.backup = None;
        Adoption::Replaced
    }

    /// Moves our own token to `position` ahead of the authority.
    ///
    /// Returns `false` (and changes nothing) if a prediction is already
    /// outstanding or we have no seat.
    pub fn predict_move(&mut self, position: u32) -> bool {
        if self.backup.is_some() || self.my_player().is_none() {
            return false;
        }
        let backup = self.session.clone();
        if let Some(me) = self.session.player_mut(self.me) {
            me.position = position;
            me.rolls += 1;
        }
        self.backup = Some(backup);
        true
    }

    /// Restores the pre-prediction snapshot in one assignment.
    ///
    /// No-op if nothing is outstanding, e.g. because an authoritative
    /// snapshot was adopted in the meantime.
    pub fn rollback(&mut self) -> bool {
        match self.backup.take() {
            Some(backup) => {
                self.session = backup;
                true
            }
            None => false,
        }
    }

    pub fn is_predicting(&self) -> bool {
        self.backup.is_some()
    }

    /// Marks the view unusable after a fatal error.
    pub fn disable(&mut self, reason: impl Into<String>) {
        self.disabled = Some(reason.into());
    }

    pub fn disabled_reason(&self) -> Option<&str> {
        self.disabled.as_deref()
    }

    pub fn into_session(self) -> GameSession {
        self.session
    }
}
