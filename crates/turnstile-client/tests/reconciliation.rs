//! Integration tests for the reconciliation loop against a scripted
//! authority.
//!
//! All async tests run on paused time, so animation delays, request
//! timeouts and poll intervals elapse instantly and deterministically.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use turnstile_client::{
    ActionKind, Adoption, ChannelNotifier, ClientConfig, ClientError, CommitReply, Intent,
    NoticeLevel, PollConfig, PollOutcome, RollReport, SessionApi, TurnClient,
};
use turnstile_protocol::{GameSession, JoinCode, Player, PlayerId, SessionId, SessionStatus};
use turnstile_rules::Dice;

// =========================================================================
// Scripted authority
// =========================================================================

#[derive(Debug, Clone, PartialEq)]
enum CommitMode {
    Accept,
    Reject(String),
    /// Never answers; the client's request timeout fires.
    Hang,
}

struct MockState {
    session: GameSession,
    eligible: bool,
    commit: CommitMode,
    gone: bool,
    fetches: u32,
    commits: Vec<(u32, u32)>,
}

#[derive(Clone)]
struct MockApi {
    state: Arc<Mutex<MockState>>,
}

impl MockApi {
    fn new(session: GameSession) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                session,
                eligible: true,
                commit: CommitMode::Accept,
                gone: false,
                fetches: 0,
                commits: Vec::new(),
            })),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    fn fetches(&self) -> u32 {
        self.with(|s| s.fetches)
    }
}

impl SessionApi for MockApi {
    async fn get_session_by_code(&self, _code: &JoinCode) -> Result<GameSession, ClientError> {
        self.with(|s| {
            s.fetches += 1;
            if s.gone {
                Err(ClientError::Server {
                    code: 404,
                    message: "no such session".into(),
                })
            } else {
                Ok(s.session.clone())
            }
        })
    }

    async fn check_eligibility(&self, user: PlayerId, _session_id: SessionId) -> Result<bool, ClientError> {
        Ok(self.with(|s| s.eligible && s.session.next_player_id == Some(user)))
    }

    async fn commit_position(
        &self,
        user: PlayerId,
        _session_id: SessionId,
        new_position: u32,
        rolled_total: u32,
    ) -> Result<CommitReply, ClientError> {
        let mode = self.with(|s| {
            s.commits.push((new_position, rolled_total));
            s.commit.clone()
        });
        match mode {
            CommitMode::Accept => Ok(self.with(|s| {
                let p = s.session.player_mut(user).unwrap();
                p.position = new_position;
                p.rolls += 1;
                s.session.version += 1;
                CommitReply::accepted(s.session.clone())
            })),
            CommitMode::Reject(message) => Ok(CommitReply::rejected(message)),
            CommitMode::Hang => std::future::pending().await,
        }
    }

    async fn end_turn(&self, user: PlayerId, _session_id: SessionId) -> Result<CommitReply, ClientError> {
        Ok(self.with(|s| {
            if s.session.next_player_id != Some(user) {
                return CommitReply::rejected("it is not your turn");
            }
            let idx = s.session.players.iter().position(|p| p.user_id == user).unwrap();
            let next = (idx + 1) % s.session.players.len();
            s.session.players[next].rolls = 0;
            s.session.next_player_id = Some(s.session.players[next].user_id);
            s.session.version += 1;
            CommitReply::accepted(s.session.clone())
        }))
    }
}

// =========================================================================
// Helpers
// =========================================================================

const A: PlayerId = PlayerId(1);
const B: PlayerId = PlayerId(2);

fn player(id: PlayerId, order: usize, position: u32) -> Player {
    Player {
        user_id: id,
        name: format!("{id}"),
        token: "t".into(),
        position,
        balance: 1500,
        turn_order: order,
        rolls: 0,
    }
}

/// `[A, B]`, running, A to act, A on square 35.
fn session() -> GameSession {
    GameSession {
        id: SessionId(1),
        code: JoinCode::new("ABCDEF"),
        status: SessionStatus::Running,
        board_size: 40,
        players: vec![player(A, 0, 35), player(B, 1, 0)],
        next_player_id: Some(A),
        winner_id: None,
        history: Vec::new(),
        version: 1,
    }
}

fn config() -> ClientConfig {
    ClientConfig {
        poll: PollConfig {
            interval: Duration::from_secs(5),
            initial_jitter: Duration::ZERO,
        },
        animation_delay: Duration::from_millis(100),
        request_timeout: Duration::from_secs(2),
        max_rerolls: 3,
        ..ClientConfig::default()
    }
}

async fn client(
    api: &MockApi,
    me: PlayerId,
    dice: &[(u8, u8)],
    config: ClientConfig,
) -> (TurnClient<MockApi, ChannelNotifier>, mpsc::UnboundedReceiver<turnstile_client::Notice>) {
    let (notifier, notices) = ChannelNotifier::new();
    let client = TurnClient::join(api.clone(), notifier, me, JoinCode::new("abcdef"), config)
        .await
        .unwrap()
        .with_dice(Dice::scripted(dice).unwrap());
    (client, notices)
}

// =========================================================================
// Roll / commit / end turn
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_roll_wraps_commits_and_end_turn_passes() {
    let api = MockApi::new(session());
    let (client, _notices) = client(&api, A, &[(4, 3)], config()).await;

    let report = client.roll().await.unwrap();
    match report {
        RollReport::Moved { roll, movement, .. } => {
            assert_eq!(roll.total(), 7);
            assert_eq!(movement.from, 35);
            assert_eq!(movement.to, 2);
        }
        other => panic!("expected a move, got {other:?}"),
    }
    assert_eq!(api.with(|s| s.commits.clone()), vec![(2, 7)]);

    let local = client.snapshot().await;
    assert_eq!(local.player(A).unwrap().position, 2);
    assert_eq!(local, api.with(|s| s.session.clone()));
    assert!(!client.action_lock().is_held());

    let after = client.end_turn().await.unwrap();
    assert_eq!(after.next_player_id, Some(B));
}

#[tokio::test(start_paused = true)]
async fn test_ineligible_roll_changes_nothing() {
    let api = MockApi::new(session());
    let (client, mut notices) = client(&api, B, &[(4, 3)], config()).await;
    let before = client.snapshot().await;

    let result = client.roll().await;

    assert!(matches!(result, Err(ClientError::Ineligible(_))));
    assert_eq!(client.snapshot().await, before);
    assert!(api.with(|s| s.commits.is_empty()));
    assert!(!client.action_lock().is_held());
    assert_eq!(notices.try_recv().unwrap().level, NoticeLevel::Warning);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_commit_rolls_back_and_resyncs() {
    let mut s = session();
    s.next_player_id = Some(B);
    let api = MockApi::new(s);
    api.with(|s| s.commit = CommitMode::Reject("it is not your turn".into()));
    let (client, _notices) = client(&api, B, &[(4, 3)], config()).await;
    let fetches_before = api.fetches();

    let result = client.roll().await;

    assert!(matches!(result, Err(ClientError::Rejected(ref m)) if m == "it is not your turn"));
    assert_eq!(client.snapshot().await.player(B).unwrap().position, 0);
    assert_eq!(api.fetches(), fetches_before + 1);
    assert!(!client.action_lock().is_held());
}

#[tokio::test(start_paused = true)]
async fn test_commit_timeout_reverts_position_and_resyncs() {
    let api = MockApi::new(session());
    api.with(|s| s.commit = CommitMode::Hang);
    let (client, _notices) = client(&api, A, &[(4, 3)], config()).await;
    let fetches_before = api.fetches();

    let result = client.roll().await;

    assert!(matches!(result, Err(ClientError::Timeout(_))));
    let local = client.snapshot().await;
    assert_eq!(local.player(A).unwrap().position, 35);
    assert_eq!(local.player(A).unwrap().rolls, 0);
    assert_eq!(api.fetches(), fetches_before + 1);
    assert!(!client.action_lock().is_held());
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_rolls_one_is_busy() {
    let api = MockApi::new(session());
    let (client, _notices) = client(&api, A, &[(4, 3)], config()).await;

    let (first, second) = tokio::join!(client.roll(), client.roll());

    let busy = [&first, &second]
        .iter()
        .filter(|r| matches!(r, Err(ClientError::Busy(ActionKind::Roll))))
        .count();
    assert_eq!(busy, 1);
    assert_eq!(api.with(|s| s.commits.len()), 1);
}

#[tokio::test(start_paused = true)]
async fn test_end_turn_during_roll_is_busy() {
    let api = MockApi::new(session());
    let (client, _notices) = client(&api, A, &[(4, 3)], config()).await;

    let (roll, end) = tokio::join!(client.roll(), client.end_turn());

    assert!(roll.is_ok());
    assert!(matches!(end, Err(ClientError::Busy(ActionKind::Roll))));
}

// =========================================================================
// Double six
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_double_six_keeps_lock_until_next_roll() {
    let api = MockApi::new(session());
    let (client, _notices) = client(&api, A, &[(6, 6), (4, 3)], config()).await;

    let first = client.roll().await.unwrap();
    assert!(matches!(first, RollReport::RollAgain { rerolls_left: 2, .. }));
    assert!(api.with(|s| s.commits.is_empty()));
    assert_eq!(client.snapshot().await.player(A).unwrap().position, 35);
    assert!(client.action_lock().is_held());
    assert!(client.is_reroll_pending().await);

    // Nothing else may run meanwhile.
    assert!(matches!(client.end_turn().await, Err(ClientError::Busy(_))));
    assert_eq!(client.poll_once().await.unwrap(), PollOutcome::Skipped);

    let second = client.roll().await.unwrap();
    assert!(matches!(second, RollReport::Moved { .. }));
    assert!(!client.action_lock().is_held());
    assert_eq!(client.snapshot().await.player(A).unwrap().position, 2);
}

#[tokio::test(start_paused = true)]
async fn test_reroll_limit_abandons_and_releases() {
    let api = MockApi::new(session());
    let cfg = ClientConfig {
        max_rerolls: 1,
        ..config()
    };
    let (client, _notices) = client(&api, A, &[(6, 6)], cfg).await;

    assert!(matches!(client.roll().await, Ok(RollReport::RollAgain { rerolls_left: 0, .. })));
    assert!(matches!(client.roll().await, Err(ClientError::RerollLimit(2))));
    assert!(!client.action_lock().is_held());
    assert!(api.with(|s| s.commits.is_empty()));
}

#[tokio::test(start_paused = true)]
async fn test_reroll_limit_holds_for_rest_of_turn() {
    let api = MockApi::new(session());
    let cfg = ClientConfig {
        max_rerolls: 1,
        ..config()
    };
    let (client, mut notices) = client(&api, A, &[(6, 6), (6, 6), (4, 3)], cfg).await;

    assert!(matches!(client.roll().await, Ok(RollReport::RollAgain { .. })));
    assert!(matches!(client.roll().await, Err(ClientError::RerollLimit(2))));
    while notices.try_recv().is_ok() {}

    // No fresh streak until the session moves on.
    assert!(matches!(client.roll().await, Err(ClientError::RerollLimit(2))));
    assert_eq!(notices.try_recv().unwrap().level, NoticeLevel::Warning);
    assert!(!client.action_lock().is_held());
    assert!(api.with(|s| s.commits.is_empty()));

    // The next turn starts clean and the dice were not consumed meanwhile.
    client.end_turn().await.unwrap();
    api.with(|s| {
        s.session.next_player_id = Some(A);
        s.session.version += 1;
    });
    client.poll_once().await.unwrap();
    assert!(matches!(client.roll().await, Ok(RollReport::Moved { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_reroll_still_counts() {
    let api = MockApi::new(session());
    let cfg = ClientConfig {
        max_rerolls: 1,
        ..config()
    };
    let (client, _notices) = client(&api, A, &[(6, 6)], cfg).await;

    assert!(matches!(client.roll().await, Ok(RollReport::RollAgain { rerolls_left: 0, .. })));
    assert!(client.cancel_reroll().await);
    assert!(matches!(client.roll().await, Err(ClientError::RerollLimit(2))));
    assert!(matches!(client.roll().await, Err(ClientError::RerollLimit(2))));
    assert!(api.with(|s| s.commits.is_empty()));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_reroll_releases_lock() {
    let api = MockApi::new(session());
    let (client, _notices) = client(&api, A, &[(6, 6)], config()).await;

    client.roll().await.unwrap();
    assert!(client.cancel_reroll().await);
    assert!(!client.action_lock().is_held());
    assert!(!client.cancel_reroll().await);
}

// =========================================================================
// Polling
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_poll_adopts_only_changed_snapshots() {
    let api = MockApi::new(session());
    let (client, _notices) = client(&api, B, &[(4, 3)], config()).await;

    assert_eq!(client.poll_once().await.unwrap(), PollOutcome::Fetched(Adoption::Unchanged));

    api.with(|s| {
        s.session.players[0].position = 2;
        s.session.next_player_id = Some(B);
        s.session.version += 2;
    });
    assert_eq!(client.poll_once().await.unwrap(), PollOutcome::Fetched(Adoption::Replaced));
    assert_eq!(client.snapshot().await.next_player_id, Some(B));
}

#[tokio::test(start_paused = true)]
async fn test_poll_ignores_older_snapshot() {
    let mut newer = session();
    newer.version = 5;
    let api = MockApi::new(newer);
    let (client, _notices) = client(&api, B, &[(4, 3)], config()).await;

    api.with(|s| {
        s.session.version = 4;
        s.session.players[0].position = 0;
    });
    assert_eq!(client.poll_once().await.unwrap(), PollOutcome::Fetched(Adoption::Stale));
    assert_eq!(client.snapshot().await.player(A).unwrap().position, 35);
}

#[tokio::test(start_paused = true)]
async fn test_missing_session_disables_view() {
    let api = MockApi::new(session());
    let (client, mut notices) = client(&api, A, &[(4, 3)], config()).await;
    api.with(|s| s.gone = true);

    let result = client.poll_once().await;

    assert!(matches!(result, Err(ClientError::Server { code: 404, .. })));
    assert!(client.is_disabled().await);
    assert_eq!(notices.try_recv().unwrap().level, NoticeLevel::Error);
    assert!(matches!(client.roll().await, Err(ClientError::Disabled(_))));
}

#[tokio::test(start_paused = true)]
async fn test_join_rejects_board_mismatch() {
    let mut s = session();
    s.board_size = 12;
    let api = MockApi::new(s);
    let (notifier, _rx) = ChannelNotifier::new();

    let result = TurnClient::join(api, notifier, A, JoinCode::new("ABCDEF"), config()).await;

    assert!(matches!(
        result,
        Err(ClientError::BoardMismatch { local: 40, remote: 12 })
    ));
}

// =========================================================================
// Run loop
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_run_polls_and_handles_intents_until_shutdown() {
    let api = MockApi::new(session());
    let (client, _notices) = client(&api, A, &[(4, 3)], config()).await;
    let client = Arc::new(client);

    let (intent_tx, intent_rx) = mpsc::channel(8);
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let task = {
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            client
                .run(intent_rx, async {
                    let _ = stop_rx.await;
                })
                .await;
        })
    };

    intent_tx.send(Intent::Roll).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(client.snapshot().await.player(A).unwrap().position, 2);

    // Another client's turn shows up on the next poll.
    api.with(|s| {
        s.session.players[1].position = 9;
        s.session.version += 1;
    });
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(client.snapshot().await.player(B).unwrap().position, 9);

    stop_tx.send(()).unwrap();
    task.await.unwrap();
    assert!(!client.action_lock().is_held());
}

#[tokio::test(start_paused = true)]
async fn test_exit_returns_last_view() {
    let api = MockApi::new(session());
    let (client, _notices) = client(&api, A, &[(4, 3)], config()).await;
    client.roll().await.unwrap();

    let last = client.exit();
    assert_eq!(last.player(A).unwrap().position, 2);
}
