//! Shared connection with several subscribers.
//!
//! Demonstrates:
//! - Building a client with an event handler
//! - Two subscribers with overlapping topics on one connection
//! - Watching state changes for a disconnected indicator
//! - Unsubscribing and shutting down
//!
//! Usage:
//!   cargo run --example 001_subscribe
//!   cargo run --example 001_subscribe -- --url ws://localhost:8000/ws/metrics
//!   cargo run --example 001_subscribe -- --debug --no-wait

mod common;

// ============================================================================
// Imports
// ============================================================================

use common::Args;
use topic_stream::{ClientConfig, ClientEvent, Result, StreamClient};

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== 001: Subscribe ===\n");

    // ========================================================================
    // Create Client
    // ========================================================================

    println!("[1] Creating client for {}...", args.url);

    let client = StreamClient::builder(ClientConfig::new(&args.url)?)
        .on_event(|event| {
            if let ClientEvent::ReconnectScheduled { attempt, delay } = event {
                println!("    ! reconnect #{attempt} in {delay:?}");
            }
        })
        .build()?;

    println!("    ✓ Client ready (state: {})\n", client.state());

    // ========================================================================
    // Subscribe
    // ========================================================================

    println!("[2] Subscribing...");

    let metrics = client.subscribe(["metrics_update"], |message| {
        println!("    [metrics] {}", message.payload);
    })?;

    let alerts = client.subscribe(["alert", "metrics_update"], |message| {
        println!("    [alerts:{}] {}", message.topic, message.payload);
    })?;

    println!("    ✓ Subscribed {metrics} and {alerts}\n");

    // ========================================================================
    // Watch State
    // ========================================================================

    let mut changes = client.state_changes();
    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let state = *changes.borrow_and_update();
            let marker = if state.is_degraded() { "✗" } else { "✓" };
            println!("    {marker} state: {state}");
        }
    });

    common::wait_for_exit(args.no_wait).await;

    // ========================================================================
    // Cleanup
    // ========================================================================

    println!("\n[3] Unsubscribing...");
    client.unsubscribe(alerts);
    client.unsubscribe(metrics);
    client.shutdown().await;
    println!("    ✓ Closed\n");

    println!("=== Done ===");
    Ok(())
}
