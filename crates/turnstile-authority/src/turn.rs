//! Turn arbitration over a [`GameSession`].
//!
//! Everything here is synchronous and pure apart from mutating the record
//! it is handed. The session actor calls these functions one command at a
//! time, which is what makes check-then-mutate atomic: nothing can slip in
//! between [`check_turn`] and the write that follows it.
//!
//! Every accepted mutation bumps `version` by exactly one.

use turnstile_protocol::{GameSession, JoinCode, MoveHistoryEntry, Player, PlayerId, SessionId, SessionStatus};
use turnstile_rules::{BoardLayout, MAX_CONSUMABLE_TOTAL, MIN_TOTAL, Movement};

use crate::{AuthorityError, Ineligibility};

/// Identity and display data for a player taking a seat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    pub user_id: PlayerId,
    pub name: String,
    pub token: String,
}

impl Seat {
    pub fn new(user_id: PlayerId, name: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            token: token.into(),
        }
    }

    fn into_player(self, turn_order: usize, balance: i64) -> Player {
        Player {
            user_id: self.user_id,
            name: self.name,
            token: self.token,
            position: 0,
            balance,
            turn_order,
            rolls: 0,
        }
    }
}

/// A fresh `PENDING` session with the creator in the first seat.
pub fn new_session(
    id: SessionId,
    code: JoinCode,
    board: &BoardLayout,
    creator: Seat,
    starting_balance: i64,
) -> GameSession {
    GameSession {
        id,
        code,
        status: SessionStatus::Pending,
        board_size: board.size().get(),
        players: vec![creator.into_player(0, starting_balance)],
        next_player_id: None,
        winner_id: None,
        history: Vec::new(),
        version: 1,
    }
}

/// Checks whether `user` may roll now.
///
/// It runs once for the eligibility query and again inside
/// [`commit_move`], so a query that said yes can still lose to a commit
/// that arrived first.
pub fn check_turn(session: &GameSession, user: PlayerId) -> Result<(), Ineligibility> {
    if !session.status.is_running() {
        return Err(Ineligibility::NotRunning(session.status));
    }
    if session.next_player_id != Some(user) {
        return Err(Ineligibility::NotYourTurn);
    }
    match session.player(user) {
        Some(p) if p.rolls > 0 => Err(Ineligibility::RollConsumed),
        Some(_) => Ok(()),
        None => Err(Ineligibility::NotYourTurn),
    }
}

/// `true` if `user` is next to act, the session is running, and the
/// turn's roll is unused.
pub fn can_act(session: &GameSession, user: PlayerId) -> bool {
    check_turn(session, user).is_ok()
}

/// Applies a client-computed move after re-validating it.
///
/// The client rolled the dice and computed `new_position`; the authority
/// only accepts it if the total is one the dice can actually produce as a
/// move and the position follows from it.
pub fn commit_move(
    session: &mut GameSession,
    board: &BoardLayout,
    user: PlayerId,
    new_position: u32,
    rolled_total: u32,
    at_ms: u64,
) -> Result<Movement, AuthorityError> {
    check_turn(session, user)?;

    if !(MIN_TOTAL..=MAX_CONSUMABLE_TOTAL).contains(&rolled_total) {
        return Err(AuthorityError::InvalidMove(format!(
            "total {rolled_total} is not a movable roll"
        )));
    }

    let session_id = session.id;
    let player = session
        .player_mut(user)
        .ok_or(AuthorityError::NotMember(user, session_id))?;
    let (movement, category) = board.advance(player.position, rolled_total);
    if new_position != movement.to {
        return Err(AuthorityError::InvalidMove(format!(
            "{} + {} lands on {}, not {}",
            player.position, rolled_total, movement.to, new_position
        )));
    }

    player.position = movement.to;
    player.rolls += 1;
    let comment = format!(
        "{} rolled {} and landed on {}",
        player.name,
        rolled_total,
        category.label()
    );

    record(session, user, rolled_total, comment, at_ms);
    Ok(movement)
}

/// Passes the turn to the next player in turn order.
///
/// Returns the new `next_player_id`.
pub fn end_turn(
    session: &mut GameSession,
    user: PlayerId,
    at_ms: u64,
) -> Result<PlayerId, AuthorityError> {
    if !session.status.is_running() {
        return Err(Ineligibility::NotRunning(session.status).into());
    }
    if session.next_player_id != Some(user) {
        return Err(Ineligibility::NotYourTurn.into());
    }
    let idx = seat_index(session, user).ok_or(AuthorityError::NotMember(user, session.id))?;
    if session.players[idx].rolls == 0 {
        return Err(Ineligibility::NoRollYet.into());
    }

    let next_idx = (idx + 1) % session.players.len();
    let next = &mut session.players[next_idx];
    next.rolls = 0;
    let next_id = next.user_id;
    let comment = format!("turn passed to {}", next.name);

    session.next_player_id = Some(next_id);
    record(session, user, 0, comment, at_ms);
    Ok(next_id)
}

/// Seats a new player at the end of the turn order.
pub fn join(
    session: &mut GameSession,
    seat: Seat,
    starting_balance: i64,
    max_players: usize,
) -> Result<(), AuthorityError> {
    if !session.status.is_joinable() {
        return Err(AuthorityError::InvalidState(format!(
            "cannot join a {} session",
            session.status
        )));
    }
    if session.contains(seat.user_id) {
        return Err(AuthorityError::AlreadyInSession(seat.user_id, session.id));
    }
    if session.players.len() >= max_players {
        return Err(AuthorityError::SessionFull(session.id));
    }

    let order = session.players.len();
    session.players.push(seat.into_player(order, starting_balance));
    session.version += 1;
    Ok(())
}

/// Starts play: turn order is frozen and the first seat acts first.
pub fn start(
    session: &mut GameSession,
    user: PlayerId,
    min_players: usize,
    at_ms: u64,
) -> Result<(), AuthorityError> {
    if !session.contains(user) {
        return Err(AuthorityError::NotMember(user, session.id));
    }
    if !session.status.is_joinable() {
        return Err(AuthorityError::InvalidState(format!(
            "cannot start a {} session",
            session.status
        )));
    }
    if session.players.len() < min_players {
        return Err(AuthorityError::InvalidState(format!(
            "need {min_players} players to start, have {}",
            session.players.len()
        )));
    }

    for p in &mut session.players {
        p.rolls = 0;
    }
    session.status = SessionStatus::Running;
    let first = session.players[0].user_id;
    session.next_player_id = Some(first);
    record(session, user, 0, "game started".into(), at_ms);
    Ok(())
}

/// Removes a player's seat.
///
/// Turn order is compacted. If the leaver was next to act the turn passes to
/// whoever sat after them. A running session reduced to one player is
/// finished with that player as the winner.
pub fn leave(session: &mut GameSession, user: PlayerId, at_ms: u64) -> Result<(), AuthorityError> {
    let idx = seat_index(session, user).ok_or(AuthorityError::NotMember(user, session.id))?;
    let leaver = session.players.remove(idx);

    for (order, p) in session.players.iter_mut().enumerate() {
        p.turn_order = order;
    }

    if session.status.is_running() {
        if session.players.len() == 1 {
            let winner = session.players[0].user_id;
            session.status = SessionStatus::Finished;
            session.next_player_id = None;
            session.winner_id = Some(winner);
        } else if session.next_player_id == Some(user) {
            let next_idx = idx % session.players.len();
            let successor = &mut session.players[next_idx];
            successor.rolls = 0;
            session.next_player_id = Some(successor.user_id);
        }
    }
    if session.players.is_empty() {
        session.next_player_id = None;
    }

    record(session, user, 0, format!("{} left the game", leaver.name), at_ms);
    Ok(())
}

fn seat_index(session: &GameSession, user: PlayerId) -> Option<usize> {
    session.players.iter().position(|p| p.user_id == user)
}

/// Prepends a history entry and bumps the version.
fn record(session: &mut GameSession, player: PlayerId, rolled: u32, comment: String, at_ms: u64) {
    session.history.insert(
        0,
        MoveHistoryEntry {
            player,
            rolled,
            comment,
            at_ms,
        },
    );
    session.version += 1;
}
