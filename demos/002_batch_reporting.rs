//! Batched client metric reporting.
//!
//! Demonstrates:
//! - Loading client options from JSON
//! - Queuing metric records in a dispatcher
//! - Timer flush and page-hide delivery
//!
//! Usage:
//!   cargo run --example 002_batch_reporting
//!   cargo run --example 002_batch_reporting -- --report http://localhost:8000/api/metrics/client

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use anyhow::Context;
use common::Args;
use topic_stream::{
    BatchDispatcher, ClientConfig, ClientOptions, DispatcherConfig, HttpBatchTransport,
    MetricRecord, SessionId,
};

// ============================================================================
// Constants
// ============================================================================

const OPTIONS: &str = r#"{
    "url": "ws://localhost:8000/ws/metrics",
    "batchFlushMs": 2000
}"#;

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    println!("=== 002: Batch Reporting ===\n");

    // ========================================================================
    // Configuration
    // ========================================================================

    println!("[1] Loading options...");

    let options = ClientOptions::from_json(OPTIONS).context("parsing options")?;
    let config = ClientConfig::try_from(options).context("validating options")?;

    println!("    ✓ Flush every {:?}\n", config.batch_flush);

    // ========================================================================
    // Dispatcher
    // ========================================================================

    println!("[2] Creating dispatcher for {}...", args.report_url);

    let transport = HttpBatchTransport::new(&args.report_url).context("building transport")?;
    let dispatcher = BatchDispatcher::new(
        DispatcherConfig::default().with_flush(config.batch_flush),
        transport,
    )?;
    let session = SessionId::generate();

    println!("    ✓ Session {session}\n");

    // ========================================================================
    // Enqueue
    // ========================================================================

    println!("[3] Recording measurements...");

    for (name, value) in [("ttfb", 82.0), ("fcp", 640.0), ("lcp", 1210.0), ("cls", 0.03)] {
        dispatcher.enqueue(MetricRecord::new(name, value, "/dashboard", session));
    }
    println!("    ✓ {} pending", dispatcher.len());

    tokio::time::sleep(config.batch_flush + Duration::from_millis(500)).await;
    println!("    ✓ {} pending after timer flush\n", dispatcher.len());

    // ========================================================================
    // Page Hide
    // ========================================================================

    println!("[4] Page hide...");

    dispatcher.enqueue(
        MetricRecord::new("inp", 96.0, "/dashboard", session).with_field("interaction", "click"),
    );
    dispatcher.page_hide();
    println!("    ✓ Handed off\n");

    common::wait_for_exit(args.no_wait).await;

    println!("=== Done ===");
    Ok(())
}
