//! Two players on one machine, each with their own WebSocket connection
//! and polling client, taking turns on a local Turnstile server.
//!
//! ```text
//! RUST_LOG=debug cargo run -p hot-seat -- 4
//! ```
//!
//! The optional argument is the number of rounds (default 3).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use turnstile::prelude::*;

type Client = TurnClient<RemoteApi, TracingNotifier>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

struct Participant {
    name: &'static str,
    client: Arc<Client>,
    intents: mpsc::Sender<Intent>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging("info");

    let rounds: usize = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 3,
    };

    let server = TurnstileServerBuilder::new()
        .bind("127.0.0.1:0")
        .build(TokenAuth::new())
        .await?;
    let url = format!("ws://{}", server.local_addr()?);
    tokio::spawn(server.run());

    let alice = RemoteApi::connect(&url, Some("alice".into()), REQUEST_TIMEOUT).await?;
    let bob = RemoteApi::connect(&url, Some("bob".into()), REQUEST_TIMEOUT).await?;

    let created = alice.create_session("Alice", "car").await?;
    bob.join_session(&created.code, "Bob", "hat").await?;
    alice.start_session(created.id).await?;
    tracing::info!(code = %created.code, "session started");

    let config = ClientConfig {
        poll: PollConfig::with_interval(Duration::from_secs(1)),
        animation_delay: Duration::from_millis(300),
        ..ClientConfig::default()
    };

    let (stop_tx, stop_rx) = watch::channel(false);
    let mut seats = Vec::new();
    let mut loops = Vec::new();
    for (name, api) in [("Alice", alice), ("Bob", bob)] {
        let me = api.player_id();
        let client = Arc::new(
            TurnClient::join(api, TracingNotifier, me, created.code.clone(), config.clone()).await?,
        );
        let (intents, rx) = mpsc::channel(8);

        let runner = Arc::clone(&client);
        let mut stop = stop_rx.clone();
        loops.push(tokio::spawn(async move {
            runner
                .run(rx, async move {
                    let _ = stop.wait_for(|stopped| *stopped).await;
                })
                .await;
        }));
        seats.push(Participant {
            name,
            client,
            intents,
        });
    }

    for round in 1..=rounds {
        for seat in &seats {
            play_turn(seat, &config).await?;
        }
        tracing::info!(round, "round complete");
    }

    // Let both views catch up on the last turn before reporting.
    tokio::time::sleep(config.poll.interval * 2).await;
    for seat in &seats {
        let view = seat.client.snapshot().await;
        for player in &view.players {
            println!(
                "[{}'s view] {} is on square {} ({})",
                seat.name,
                player.name,
                player.position,
                config.board.classify(player.position).label()
            );
        }
    }

    stop_tx.send(true)?;
    for handle in loops {
        handle.await?;
    }
    Ok(())
}

/// Rolls (again, while double sixes keep coming) and ends the turn.
async fn play_turn(seat: &Participant, config: &ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let settle = config.animation_delay + Duration::from_millis(200);

    seat.intents.send(Intent::Roll).await?;
    tokio::time::sleep(settle).await;
    while seat.client.is_reroll_pending().await {
        tracing::info!(player = seat.name, "double six, rolling again");
        seat.intents.send(Intent::Roll).await?;
        tokio::time::sleep(settle).await;
    }

    seat.intents.send(Intent::EndTurn).await?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let view = seat.client.snapshot().await;
    if let Some(last) = view.last_move() {
        tracing::info!(player = seat.name, "{}", last.comment);
    }
    Ok(())
}
