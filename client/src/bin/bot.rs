//! Headless wandering client.
//!
//! Connects to a presence server, joins with a generated pose and keeps
//! walking until the process is stopped. Useful for populating a session
//! during development without opening browser tabs.
//!
//! Usage: brawl-bot [options]
//!
//! Options:
//!   --url URL     Server URL (default: ws://127.0.0.1:3000/ws)
//!   --name NAME   Display name (default: "bot")
//!   --seed N      Walk seed, for reproducible paths (default: random)

use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use brawl_client::bot::WanderBot;
use brawl_client::connection::{NetEvent, ServerConnection};
use brawl_client::shadow::ShadowSet;
use brawl_shared::protocol::{ServerMsg, MOVE_PUSH_INTERVAL_MS};

const JOIN_RETRY_PERIOD: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();

    let mut url = "ws://127.0.0.1:3000/ws".to_string();
    let mut name = "bot".to_string();
    let mut seed: Option<u64> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--url" => {
                i += 1;
                url = args.get(i).cloned().unwrap_or(url);
            }
            "--name" => {
                i += 1;
                name = args.get(i).cloned().unwrap_or(name);
            }
            "--seed" => {
                i += 1;
                seed = args.get(i).and_then(|s| s.parse().ok());
            }
            _ => {}
        }
        i += 1;
    }

    let seed = seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut bot = WanderBot::new(name, &mut rng);

    tracing::info!(url = %url, seed, name = bot.name(), "Bot starting");

    let mut conn = ServerConnection::open(url);
    let mut shadow = ShadowSet::default();
    let mut connected = false;
    let mut joined = false;

    let mut push = tokio::time::interval(Duration::from_millis(MOVE_PUSH_INTERVAL_MS));
    push.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // First retry tick lands a full period out, the welcome handler covers
    // the initial join.
    let mut retry = tokio::time::interval_at(
        tokio::time::Instant::now() + JOIN_RETRY_PERIOD,
        JOIN_RETRY_PERIOD,
    );
    retry.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut last_tick = Instant::now();

    loop {
        tokio::select! {
            event = conn.next_event() => {
                let Some(event) = event else { break; };
                match event {
                    NetEvent::Connected => {
                        connected = true;
                        tracing::info!("Connected");
                    }
                    NetEvent::Disconnected => {
                        connected = false;
                        joined = false;
                        shadow.clear();
                        tracing::info!("Disconnected, reconnecting");
                    }
                    NetEvent::ProtocolMismatch { server, client } => {
                        tracing::error!(server, client, "Protocol mismatch, giving up");
                        break;
                    }
                    NetEvent::Message(msg) => {
                        match &msg {
                            ServerMsg::Welcome(w) => {
                                tracing::info!(
                                    self_id = w.self_id,
                                    server_version = %w.server_version,
                                    current = w.count.current,
                                    max = w.count.max,
                                    "Welcome"
                                );
                                send_join(&conn, &bot);
                            }
                            ServerMsg::ExistingPlayers(e) => {
                                joined = true;
                                tracing::info!(peers = e.players.len(), "Joined session");
                            }
                            ServerMsg::ServerFull => {
                                tracing::warn!("Server full, will retry");
                            }
                            ServerMsg::PlayerJoined(p) => {
                                tracing::info!(id = p.id, name = %p.name, "Player joined");
                            }
                            ServerMsg::PlayerLeft(l) => {
                                tracing::info!(id = l.id, "Player left");
                            }
                            _ => {}
                        }
                        shadow.apply(&msg);
                    }
                }
            }

            _ = push.tick() => {
                let now = Instant::now();
                let dt = now.duration_since(last_tick).as_secs_f64();
                last_tick = now;

                let repaint = bot.tick(dt, &mut rng);
                if joined {
                    if let Some(color) = repaint {
                        conn.send_color_change(color);
                    }
                    conn.send_move(bot.position(), bot.rotation());
                }
            }

            _ = retry.tick(), if connected && !joined => {
                send_join(&conn, &bot);
            }
        }
    }
}

fn send_join(conn: &ServerConnection, bot: &WanderBot) {
    conn.send_join(
        bot.position(),
        bot.rotation(),
        bot.color().to_string(),
        bot.name().to_string(),
    );
}
