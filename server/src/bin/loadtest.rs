//! Load test for the brawl server.
//!
//! Spawns multiple fake WebSocket clients that:
//! - Connect and wait for the welcome handshake
//! - Try to join (only a handful get a slot, the rest collect server_full)
//! - Push player_move messages at the configured rate while joined
//! - Receive and count the resulting broadcasts
//!
//! Usage: cargo run --bin loadtest -- [OPTIONS]
//!
//! Options:
//!   --clients N      Number of clients to spawn (default: 20)
//!   --duration S     Test duration in seconds (default: 30)
//!   --move-rate R    Moves per second per joined client (default: 20)
//!   --url URL        Server URL (default: ws://127.0.0.1:3000/ws)

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};

// === Protocol types (minimal subset) ===

#[derive(Serialize)]
struct RotationMsg {
    y: f64,
}

#[derive(Serialize)]
struct JoinMsg {
    #[serde(rename = "type")]
    msg_type: &'static str,
    position: [f64; 3],
    rotation: RotationMsg,
    color: String,
    name: String,
}

#[derive(Serialize)]
struct MoveMsg {
    #[serde(rename = "type")]
    msg_type: &'static str,
    position: [f64; 3],
    rotation: RotationMsg,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ServerMsg {
    #[serde(rename = "welcome")]
    Welcome {
        #[serde(rename = "selfId")]
        self_id: u32,
    },
    #[serde(rename = "capacity_response")]
    CapacityResponse {},
    #[serde(rename = "server_full")]
    ServerFull,
    #[serde(rename = "existing_players")]
    ExistingPlayers { players: Vec<serde_json::Value> },
    #[serde(rename = "player_joined")]
    PlayerJoined {},
    #[serde(rename = "player_moved")]
    PlayerMoved {},
    #[serde(rename = "player_color_changed")]
    PlayerColorChanged {},
    #[serde(rename = "player_left")]
    PlayerLeft {},
    #[serde(rename = "player_count")]
    PlayerCount { current: u32 },
}

// === Metrics ===

struct Metrics {
    connected: AtomicU64,
    admitted: AtomicU64,
    refusals: AtomicU64,
    joins_sent: AtomicU64,
    moves_sent: AtomicU64,
    moves_received: AtomicU64,
    counts_received: AtomicU64,
    messages_received: AtomicU64,
    errors: AtomicU64,
    latency_sum_ms: AtomicU64,
    latency_count: AtomicU64,
}

impl Metrics {
    fn new() -> Self {
        Self {
            connected: AtomicU64::new(0),
            admitted: AtomicU64::new(0),
            refusals: AtomicU64::new(0),
            joins_sent: AtomicU64::new(0),
            moves_sent: AtomicU64::new(0),
            moves_received: AtomicU64::new(0),
            counts_received: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            latency_sum_ms: AtomicU64::new(0),
            latency_count: AtomicU64::new(0),
        }
    }
}

const COLORS: [&str; 5] = ["#e74c3c", "#3498db", "#2ecc71", "#f1c40f", "#9b59b6"];

// === Client task ===

async fn run_client(
    client_id: u32,
    url: String,
    move_rate: f64,
    duration: Duration,
    metrics: Arc<Metrics>,
) {
    let connect_start = Instant::now();

    let ws_result = connect_async(&url).await;
    let (mut ws, _) = match ws_result {
        Ok(conn) => {
            if client_id < 3 {
                eprintln!("Client {} connected", client_id);
            }
            conn
        }
        Err(e) => {
            if client_id < 5 {
                eprintln!("Client {} failed to connect: {}", client_id, e);
            }
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };

    let connect_latency = connect_start.elapsed();
    metrics
        .latency_sum_ms
        .fetch_add(connect_latency.as_millis() as u64, Ordering::Relaxed);
    metrics.latency_count.fetch_add(1, Ordering::Relaxed);
    metrics.connected.fetch_add(1, Ordering::Relaxed);

    // Wait for welcome message before doing anything else
    let welcome_timeout = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                    if text.contains("\"type\":\"welcome\"") {
                        return true;
                    }
                }
                Ok(Message::Close(frame)) => {
                    if client_id < 3 {
                        eprintln!("Client {} closed during welcome: {:?}", client_id, frame);
                    }
                    return false;
                }
                Err(e) => {
                    if client_id < 3 {
                        eprintln!("Client {} error during welcome: {}", client_id, e);
                    }
                    return false;
                }
                _ => {}
            }
        }
        false
    })
    .await;

    match welcome_timeout {
        Ok(true) => {}
        _ => {
            if client_id < 3 {
                eprintln!("Client {} never got a welcome", client_id);
            }
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            metrics.connected.fetch_sub(1, Ordering::Relaxed);
            return;
        }
    }

    // Simple LCG so every client wanders deterministically but differently
    let mut rng_state: u64 = client_id as u64 * 12345 + 67890;
    let mut next_f64 = move |scale: f64| {
        rng_state = rng_state.wrapping_mul(6364136223846793005).wrapping_add(1);
        ((rng_state >> 32) as f64 / u32::MAX as f64) * scale
    };

    let mut x = next_f64(20.0) - 10.0;
    let mut z = next_f64(20.0) - 10.0;
    let mut yaw = next_f64(std::f64::consts::TAU);

    let join = JoinMsg {
        msg_type: "join",
        position: [x, 0.0, z],
        rotation: RotationMsg { y: yaw },
        color: COLORS[client_id as usize % COLORS.len()].to_string(),
        name: format!("load{}", client_id),
    };
    let json = serde_json::to_string(&join).unwrap();
    if ws.send(Message::Text(json.into())).await.is_err() {
        metrics.errors.fetch_add(1, Ordering::Relaxed);
        metrics.connected.fetch_sub(1, Ordering::Relaxed);
        return;
    }
    metrics.joins_sent.fetch_add(1, Ordering::Relaxed);

    let move_interval = if move_rate > 0.0 {
        Duration::from_secs_f64(1.0 / move_rate)
    } else {
        Duration::from_secs(3600) // Effectively never
    };

    let mut move_timer = tokio::time::interval(move_interval);
    move_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    // Refused clients retry a join every couple of seconds
    let mut retry_timer = tokio::time::interval(Duration::from_secs(2));
    retry_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let test_end = Instant::now() + duration;
    let mut joined = false;

    loop {
        if Instant::now() >= test_end {
            break;
        }

        tokio::select! {
            _ = move_timer.tick() => {
                if !joined {
                    continue;
                }
                x += next_f64(0.5) - 0.25;
                z += next_f64(0.5) - 0.25;
                yaw = (yaw + next_f64(0.2) - 0.1) % std::f64::consts::TAU;

                let msg = MoveMsg {
                    msg_type: "player_move",
                    position: [x, 0.0, z],
                    rotation: RotationMsg { y: yaw },
                };
                let json = serde_json::to_string(&msg).unwrap();
                if ws.send(Message::Text(json.into())).await.is_ok() {
                    metrics.moves_sent.fetch_add(1, Ordering::Relaxed);
                } else {
                    metrics.errors.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }

            _ = retry_timer.tick() => {
                if joined {
                    continue;
                }
                let retry = JoinMsg {
                    msg_type: "join",
                    position: [x, 0.0, z],
                    rotation: RotationMsg { y: yaw },
                    color: COLORS[client_id as usize % COLORS.len()].to_string(),
                    name: format!("load{}", client_id),
                };
                let json = serde_json::to_string(&retry).unwrap();
                if ws.send(Message::Text(json.into())).await.is_ok() {
                    metrics.joins_sent.fetch_add(1, Ordering::Relaxed);
                } else {
                    metrics.errors.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }

            msg = ws.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                        if let Ok(server_msg) = serde_json::from_str::<ServerMsg>(&text) {
                            match server_msg {
                                ServerMsg::ExistingPlayers { players } => {
                                    if client_id < 3 {
                                        eprintln!(
                                            "Client {} joined, {} others present",
                                            client_id,
                                            players.len()
                                        );
                                    }
                                    joined = true;
                                    metrics.admitted.fetch_add(1, Ordering::Relaxed);
                                }
                                ServerMsg::ServerFull => {
                                    metrics.refusals.fetch_add(1, Ordering::Relaxed);
                                }
                                ServerMsg::PlayerMoved {} => {
                                    metrics.moves_received.fetch_add(1, Ordering::Relaxed);
                                }
                                ServerMsg::PlayerCount { .. } => {
                                    metrics.counts_received.fetch_add(1, Ordering::Relaxed);
                                }
                                _ => {}
                            }
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = ws.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        if client_id < 3 {
                            eprintln!("Client {} got Close: {:?}", client_id, frame);
                        }
                        break;
                    }
                    None => {
                        if client_id < 3 {
                            eprintln!("Client {} stream ended", client_id);
                        }
                        break;
                    }
                    Some(Err(e)) => {
                        if client_id < 3 {
                            eprintln!("Client {} error: {}", client_id, e);
                        }
                        metrics.errors.fetch_add(1, Ordering::Relaxed);
                        break;
                    }
                    Some(_) => {}
                }
            }
        }
    }

    let _ = ws.close(None).await;
    metrics.connected.fetch_sub(1, Ordering::Relaxed);
}

// === Main ===

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut num_clients: u32 = 20;
    let mut duration_secs: u64 = 30;
    let mut move_rate: f64 = 20.0;
    let mut url = "ws://127.0.0.1:3000/ws".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--clients" => {
                i += 1;
                num_clients = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(20);
            }
            "--duration" => {
                i += 1;
                duration_secs = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(30);
            }
            "--move-rate" => {
                i += 1;
                move_rate = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(20.0);
            }
            "--url" => {
                i += 1;
                url = args.get(i).cloned().unwrap_or(url);
            }
            _ => {}
        }
        i += 1;
    }

    println!("=== Brawl Server Load Test ===");
    println!("Clients: {}", num_clients);
    println!("Duration: {}s", duration_secs);
    println!("Move rate: {}/s per joined client", move_rate);
    println!("URL: {}", url);
    println!();

    let metrics = Arc::new(Metrics::new());
    let duration = Duration::from_secs(duration_secs);

    // Spawn all clients
    let mut handles = Vec::with_capacity(num_clients as usize);

    println!("Spawning {} clients...", num_clients);
    let spawn_start = Instant::now();

    for client_id in 0..num_clients {
        let url = url.clone();
        let metrics = Arc::clone(&metrics);

        handles.push(tokio::spawn(async move {
            run_client(client_id, url, move_rate, duration, metrics).await;
        }));

        // Stagger spawns slightly to avoid thundering herd
        if client_id % 50 == 49 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    println!("All clients spawned in {:?}", spawn_start.elapsed());
    println!();

    // Print stats periodically
    let metrics_clone = Arc::clone(&metrics);
    let stats_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        let start = Instant::now();

        loop {
            interval.tick().await;
            let elapsed = start.elapsed().as_secs();
            if elapsed >= duration_secs + 5 {
                break;
            }

            let connected = metrics_clone.connected.load(Ordering::Relaxed);
            let admitted = metrics_clone.admitted.load(Ordering::Relaxed);
            let refusals = metrics_clone.refusals.load(Ordering::Relaxed);
            let moves_sent = metrics_clone.moves_sent.load(Ordering::Relaxed);
            let moves_received = metrics_clone.moves_received.load(Ordering::Relaxed);
            let errors = metrics_clone.errors.load(Ordering::Relaxed);

            println!(
                "[{:3}s] connected={}, admitted={}, refusals={}, sent={}, received={}, errors={}",
                elapsed, connected, admitted, refusals, moves_sent, moves_received, errors
            );
        }
    });

    // Wait for all clients to finish
    for handle in handles {
        let _ = handle.await;
    }

    stats_handle.abort();

    // Final stats
    println!();
    println!("=== Final Results ===");
    let msgs = metrics.messages_received.load(Ordering::Relaxed);
    let admitted = metrics.admitted.load(Ordering::Relaxed);
    let refusals = metrics.refusals.load(Ordering::Relaxed);
    let joins = metrics.joins_sent.load(Ordering::Relaxed);
    let moves_sent = metrics.moves_sent.load(Ordering::Relaxed);
    let moves_received = metrics.moves_received.load(Ordering::Relaxed);
    let counts = metrics.counts_received.load(Ordering::Relaxed);
    let errors = metrics.errors.load(Ordering::Relaxed);
    let latency_sum = metrics.latency_sum_ms.load(Ordering::Relaxed);
    let latency_count = metrics.latency_count.load(Ordering::Relaxed);

    println!("Total messages received: {}", msgs);
    println!("Joins sent: {} (admitted={}, refused={})", joins, admitted, refusals);
    println!("Total player_move sent: {}", moves_sent);
    println!("Total player_moved received: {}", moves_received);
    println!("Total player_count received: {}", counts);
    println!("Total errors: {}", errors);

    if latency_count > 0 {
        println!("Average connect latency: {}ms", latency_sum / latency_count);
    }

    let msgs_per_sec = msgs as f64 / duration_secs as f64;
    println!();
    println!("Messages/sec (total): {:.0}", msgs_per_sec);

    // Each accepted move fans out to every other joined client.
    let fan_out = admitted.saturating_sub(1);
    if fan_out > 0 && moves_sent > 0 {
        let expected = moves_sent * fan_out;
        let delivery_rate = moves_received as f64 / expected as f64 * 100.0;
        println!("Expected player_moved deliveries: {}", expected);
        println!("Delivery rate: {:.1}%", delivery_rate);
    }
}
