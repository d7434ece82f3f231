//! The reconciliation loop.
//!
//! [`TurnClient`] ties the pieces together for one player in one session:
//!
//! 1. An intent takes the [`ActionLock`]; a second overlapping intent gets
//!    [`ClientError::Busy`].
//! 2. A roll asks the authority whether we may act, rolls the dice, moves
//!    our token locally ahead of confirmation, then commits.
//! 3. An accepted commit's snapshot replaces the local copy wholesale. A
//!    rejection or transport failure restores the pre-roll snapshot and
//!    forces a refetch.
//! 4. Between intents, [`TurnClient::run`] refetches the session on a timer
//!    and adopts it if it changed. Polls are skipped while an intent holds
//!    the lock, so a poll can never overwrite a prediction in flight.
//!
//! Every failure of an authoritative call ends here: it is turned into a
//! [`Notice`] and returned, never panicked on.

use std::future::Future;

use tokio::sync::{Mutex, mpsc};
use tokio::time;
use turnstile_protocol::{GameSession, JoinCode, PlayerId, SessionId};
use turnstile_rules::{ActionCategory, Dice, DiceOutcome, Movement, RollResult};

use crate::view::{Adoption, SessionView};
use crate::{
    ActionKind, ActionLock, ClientConfig, ClientError, CommitReply, LockGuard, Notice, Notifier,
    PollScheduler, SessionApi,
};

/// What a finished roll intent produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollReport {
    /// The move was committed and adopted.
    Moved {
        roll: RollResult,
        movement: Movement,
        landed_on: ActionCategory,
    },
    /// Maximum double. The lock is still held; call
    /// [`TurnClient::roll`] again or [`TurnClient::cancel_reroll`].
    RollAgain { roll: RollResult, rerolls_left: u32 },
}

/// Result of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// An intent held the lock; nothing was fetched or changed.
    Skipped,
    Fetched(Adoption),
}

/// Player input fed to [`TurnClient::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Roll,
    EndTurn,
    CancelReroll,
}

/// A roll intent parked on a double six, still holding the lock.
struct PendingReroll {
    guard: LockGuard,
    rerolls: u32,
}

/// One player's connection to one session.
///
/// All methods take `&self`, so intents, polls and teardown can be driven
/// from a single task or several without extra wrapping.
pub struct TurnClient<A, N> {
    api: A,
    notifier: N,
    config: ClientConfig,
    me: PlayerId,
    session_id: SessionId,
    code: JoinCode,
    lock: ActionLock,
    dice: Mutex<Dice>,
    view: Mutex<SessionView>,
    reroll: Mutex<Option<PendingReroll>>,
    /// Double sixes thrown against a given view version. Survives
    /// cancelled and abandoned rolls; a new snapshot resets it.
    streak: Mutex<RerollStreak>,
}

#[derive(Debug, Default, Clone, Copy)]
struct RerollStreak {
    version: u64,
    rerolls: u32,
}

impl<A: SessionApi, N: Notifier> TurnClient<A, N> {
    /// Fetches the session behind `code` and builds the local view of it.
    pub async fn join(
        api: A,
        notifier: N,
        me: PlayerId,
        code: JoinCode,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        let session = match time::timeout(config.request_timeout, api.get_session_by_code(&code)).await {
            Ok(result) => result?,
            Err(_) => return Err(ClientError::Timeout(config.request_timeout)),
        };

        let local = config.board.size().get();
        if local != session.board_size {
            return Err(ClientError::BoardMismatch {
                local,
                remote: session.board_size,
            });
        }

        tracing::info!(
            session_id = %session.id,
            player_id = %me,
            %code,
            version = session.version,
            "joined session view"
        );

        Ok(Self {
            api,
            notifier,
            me,
            session_id: session.id,
            code: session.code.clone(),
            lock: ActionLock::new(),
            dice: Mutex::new(Dice::from_os_rng()),
            view: Mutex::new(SessionView::new(me, session)),
            reroll: Mutex::new(None),
            streak: Mutex::new(RerollStreak::default()),
            config,
        })
    }

    /// Replaces the dice, e.g. with seeded or scripted ones.
    pub fn with_dice(mut self, dice: Dice) -> Self {
        self.dice = Mutex::new(dice);
        self
    }

    pub fn me(&self) -> PlayerId {
        self.me
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn action_lock(&self) -> &ActionLock {
        &self.lock
    }

    /// Copy of the local session state.
    pub async fn snapshot(&self) -> GameSession {
        self.view.lock().await.session().clone()
    }

    pub async fn is_disabled(&self) -> bool {
        self.view.lock().await.disabled_reason().is_some()
    }

    pub async fn is_reroll_pending(&self) -> bool {
        self.reroll.lock().await.is_some()
    }

    /// Rolls for this turn and commits the move.
    pub async fn roll(&self) -> Result<RollReport, ClientError> {
        self.ensure_enabled().await?;

        let pending = self.reroll.lock().await.take();
        let (guard, rerolls) = match pending {
            Some(p) => (p.guard, p.rerolls),
            None => match self.lock.try_acquire(ActionKind::Roll) {
                Some(guard) => (guard, self.rerolls_this_turn().await),
                None => return Err(self.busy()),
            },
        };

        if rerolls > self.config.max_rerolls {
            tracing::debug!(player_id = %self.me, rerolls, "reroll limit already reached this turn");
            self.notifier
                .notify(Notice::warning("No rolls left this turn. End your turn instead."));
            return Err(ClientError::RerollLimit(rerolls));
        }

        match self.call(self.api.check_eligibility(self.me, self.session_id)).await {
            Ok(true) => {}
            Ok(false) => {
                let message = "You can't roll right now: not your turn, or you already rolled";
                self.notifier.notify(Notice::warning(message));
                return Err(ClientError::Ineligible(message.into()));
            }
            Err(e) => {
                self.report(&e).await;
                return Err(e);
            }
        }

        if !self.config.animation_delay.is_zero() {
            time::sleep(self.config.animation_delay).await;
        }

        let outcome = self.dice.lock().await.roll();
        let roll = match outcome {
            DiceOutcome::Consumable(roll) => roll,
            DiceOutcome::RollAgain(roll) => {
                let rerolls = rerolls + 1;
                let version = self.view.lock().await.version();
                *self.streak.lock().await = RerollStreak { version, rerolls };
                if rerolls > self.config.max_rerolls {
                    tracing::warn!(player_id = %self.me, rerolls, "reroll limit reached, abandoning roll");
                    self.notifier.notify(Notice::warning(format!(
                        "Double six {rerolls} times in a row. Roll abandoned."
                    )));
                    return Err(ClientError::RerollLimit(rerolls));
                }
                let rerolls_left = self.config.max_rerolls - rerolls;
                *self.reroll.lock().await = Some(PendingReroll { guard, rerolls });
                tracing::debug!(player_id = %self.me, rerolls, "double six, roll again");
                self.notifier.notify(Notice::info("Double six! Roll again."));
                return Ok(RollReport::RollAgain { roll, rerolls_left });
            }
        };

        let total = roll.total();
        let (movement, landed_on) = {
            let mut view = self.view.lock().await;
            let Some(from) = view.my_player().map(|p| p.position) else {
                return Err(ClientError::Ineligible("no seat in this session".into()));
            };
            let (movement, category) = self.config.board.advance(from, total);
            view.predict_move(movement.to);
            (movement, category.clone())
        };

        let reply = self
            .call(self.api.commit_position(self.me, self.session_id, movement.to, total))
            .await;

        match reply {
            Ok(CommitReply {
                success: true,
                session,
                ..
            }) => {
                self.adopt_or_resync(session).await;
                tracing::debug!(
                    player_id = %self.me,
                    from = movement.from,
                    to = movement.to,
                    total,
                    "move confirmed"
                );
                self.notifier.notify(Notice::info(format!(
                    "Rolled {roll}, landed on {}",
                    landed_on.label()
                )));
                Ok(RollReport::Moved {
                    roll,
                    movement,
                    landed_on,
                })
            }
            Ok(CommitReply { message, .. }) => {
                let message = message.unwrap_or_else(|| "move rejected".into());
                self.undo_prediction().await;
                self.notifier.notify(Notice::warning(message.clone()));
                let _ = self.resync().await;
                Err(ClientError::Rejected(message))
            }
            Err(e) => {
                self.undo_prediction().await;
                self.report(&e).await;
                if !e.is_fatal() {
                    let _ = self.resync().await;
                }
                Err(e)
            }
        }
    }

    /// Double sixes already thrown against the current view.
    async fn rerolls_this_turn(&self) -> u32 {
        let version = self.view.lock().await.version();
        let streak = *self.streak.lock().await;
        if streak.version == version { streak.rerolls } else { 0 }
    }

    /// Abandons a roll parked on a double six and frees the lock.
    ///
    /// The double sixes thrown so far still count against the limit
    /// until the session moves on.
    ///
    /// Returns `false` if no reroll was pending.
    pub async fn cancel_reroll(&self) -> bool {
        let cancelled = self.reroll.lock().await.take().is_some();
        if cancelled {
            tracing::debug!(player_id = %self.me, "reroll cancelled");
            self.notifier.notify(Notice::info("Roll cancelled."));
        }
        cancelled
    }

    /// Passes the turn. Returns the snapshot the view ended up with.
    pub async fn end_turn(&self) -> Result<GameSession, ClientError> {
        self.ensure_enabled().await?;
        let Some(_guard) = self.lock.try_acquire(ActionKind::EndTurn) else {
            return Err(self.busy());
        };

        match self.call(self.api.end_turn(self.me, self.session_id)).await {
            Ok(CommitReply {
                success: true,
                session,
                ..
            }) => {
                self.adopt_or_resync(session).await;
                self.notifier.notify(Notice::info("Turn ended."));
                Ok(self.snapshot().await)
            }
            Ok(CommitReply { message, .. }) => {
                let message = message.unwrap_or_else(|| "end turn rejected".into());
                self.notifier.notify(Notice::warning(message.clone()));
                let _ = self.resync().await;
                Err(ClientError::Rejected(message))
            }
            Err(e) => {
                self.report(&e).await;
                if !e.is_fatal() {
                    let _ = self.resync().await;
                }
                Err(e)
            }
        }
    }

    /// Refetches the session and adopts it if it changed, unless an
    /// intent is in flight.
    pub async fn poll_once(&self) -> Result<PollOutcome, ClientError> {
        self.ensure_enabled().await?;
        if self.lock.is_held() {
            tracing::trace!(player_id = %self.me, "intent in flight, skipping poll");
            return Ok(PollOutcome::Skipped);
        }

        let snapshot = self.fetch().await?;

        // An intent may have started while the fetch was out.
        if self.lock.is_held() {
            return Ok(PollOutcome::Skipped);
        }

        let version = snapshot.version;
        let adoption = self.view.lock().await.adopt(snapshot);
        if adoption == Adoption::Replaced {
            tracing::debug!(player_id = %self.me, version, "session changed, adopted poll snapshot");
        }
        Ok(PollOutcome::Fetched(adoption))
    }

    /// Forced refetch after a failed intent. Ignores the lock.
    pub async fn resync(&self) -> Result<Adoption, ClientError> {
        let snapshot = self.fetch().await?;
        let adoption = self.view.lock().await.adopt(snapshot);
        tracing::debug!(player_id = %self.me, ?adoption, "resynced");
        Ok(adoption)
    }

    /// Drives intents and polling until `shutdown` resolves, the intent
    /// channel closes, or the view is disabled.
    ///
    /// Dropping this future is teardown: any lock it holds is released.
    pub async fn run(&self, mut intents: mpsc::Receiver<Intent>, shutdown: impl Future<Output = ()>) {
        let mut poller = PollScheduler::new(self.config.poll);
        tokio::pin!(shutdown);

        tracing::info!(player_id = %self.me, session_id = %self.session_id, "client loop started");

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                intent = intents.recv() => match intent {
                    Some(Intent::Roll) => {
                        let _ = self.roll().await;
                    }
                    Some(Intent::EndTurn) => {
                        let _ = self.end_turn().await;
                    }
                    Some(Intent::CancelReroll) => {
                        self.cancel_reroll().await;
                    }
                    None => break,
                },
                _ = poller.wait_for_poll() => {
                    if let Err(ClientError::Disabled(reason)) = self.poll_once().await {
                        tracing::info!(player_id = %self.me, %reason, "view disabled, stopping client loop");
                        break;
                    }
                }
            }

            if self.is_disabled().await {
                break;
            }
        }

        self.reroll.lock().await.take();
        tracing::info!(player_id = %self.me, session_id = %self.session_id, "client loop stopped");
    }

    /// Discards the view, returning the last state it held.
    pub fn exit(self) -> GameSession {
        self.view.into_inner().into_session()
    }

    // -- internals --

    async fn call<T>(
        &self,
        request: impl Future<Output = Result<T, ClientError>>,
    ) -> Result<T, ClientError> {
        match time::timeout(self.config.request_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout(self.config.request_timeout)),
        }
    }

    async fn fetch(&self) -> Result<GameSession, ClientError> {
        match self.call(self.api.get_session_by_code(&self.code)).await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                if e.is_fatal() {
                    self.report(&e).await;
                } else {
                    tracing::debug!(player_id = %self.me, error = %e, "session fetch failed");
                }
                Err(e)
            }
        }
    }

    async fn adopt_or_resync(&self, session: Option<GameSession>) {
        match session {
            Some(snapshot) => {
                self.view.lock().await.adopt(snapshot);
            }
            None => {
                let _ = self.resync().await;
            }
        }
    }

    async fn undo_prediction(&self) {
        if self.view.lock().await.rollback() {
            tracing::debug!(player_id = %self.me, "optimistic move rolled back");
        }
    }

    async fn ensure_enabled(&self) -> Result<(), ClientError> {
        match self.view.lock().await.disabled_reason() {
            Some(reason) => Err(ClientError::Disabled(reason.to_string())),
            None => Ok(()),
        }
    }

    fn busy(&self) -> ClientError {
        let kind = self.lock.held().unwrap_or(ActionKind::Roll);
        tracing::debug!(player_id = %self.me, %kind, "intent refused, lock held");
        self.notifier
            .notify(Notice::warning(format!("Please wait, a {kind} is in progress.")));
        ClientError::Busy(kind)
    }

    /// Turns a failed call into a notice; fatal errors also disable the view.
    async fn report(&self, e: &ClientError) {
        if e.is_fatal() {
            tracing::warn!(player_id = %self.me, error = %e, "fatal session error, disabling view");
            self.view.lock().await.disable(e.to_string());
            self.notifier
                .notify(Notice::error(format!("This game is no longer available: {e}")));
        } else {
            tracing::debug!(player_id = %self.me, error = %e, "authoritative call failed");
            self.notifier.notify(Notice::error(format!("Something went wrong: {e}")));
        }
    }
}
