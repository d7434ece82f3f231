//! The Action Lock: at most one mutating intent in flight per client.
//!
//! This only deduplicates a single client's own intents (double clicks,
//! overlapping callbacks). The Turn Authority still arbitrates between
//! clients.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

const FREE: u8 = 0;
const ROLL: u8 = 1;
const END_TURN: u8 = 2;

/// Which intent holds the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Roll,
    EndTurn,
}

impl ActionKind {
    fn to_raw(self) -> u8 {
        match self {
            Self::Roll => ROLL,
            Self::EndTurn => END_TURN,
        }
    }

    fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            ROLL => Some(Self::Roll),
            END_TURN => Some(Self::EndTurn),
            _ => None,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Roll => write!(f, "roll"),
            Self::EndTurn => write!(f, "end turn"),
        }
    }
}

/// A single-slot lock shared by all intents of one client.
///
/// Cloning shares the slot.
#[derive(Debug, Clone, Default)]
pub struct ActionLock {
    state: Arc<AtomicU8>,
}

impl ActionLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the lock for `kind`. Returns `false` if any kind is held.
    pub fn acquire(&self, kind: ActionKind) -> bool {
        self.state
            .compare_exchange(FREE, kind.to_raw(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Frees the lock whoever holds it.
    pub fn release(&self) {
        self.state.store(FREE, Ordering::Release);
    }

    /// Like [`acquire`](Self::acquire) but hands back a guard that
    /// releases on drop, so every exit path (errors, cancellation,
    /// teardown) frees the slot.
    pub fn try_acquire(&self, kind: ActionKind) -> Option<LockGuard> {
        self.acquire(kind).then(|| LockGuard {
            lock: self.clone(),
            kind,
        })
    }

    /// The kind currently holding the lock, if any.
    pub fn held(&self) -> Option<ActionKind> {
        ActionKind::from_raw(self.state.load(Ordering::Acquire))
    }

    pub fn is_held(&self) -> bool {
        self.held().is_some()
    }
}

/// Releases its [`ActionLock`] when dropped.
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct LockGuard {
    lock: ActionLock,
    kind: ActionKind,
}

impl LockGuard {
    pub fn kind(&self) -> ActionKind {
        self.kind
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.lock.release();
    }
}
