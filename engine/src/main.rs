//! Engine demo binary
//!
//! Runs the generation engine against simulated collaborators: admits a
//! batch of requests across the slot pool, tails each session's log, and
//! prints the persisted results.

use clap::Parser;
use engine::services::{HashEmbedder, InMemoryIdeaStore, SimulatedAiProvider, StaticConfigSource};
use engine::{Engine, EngineConfig, SessionHandle};
use shared::GenerationRequest;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "engine")]
#[command(about = "Idea generation engine with simulated collaborators")]
struct Args {
    /// Number of concurrent generation slots (1-10)
    #[arg(long, default_value_t = 3)]
    slots: u32,

    /// Number of generation requests to run
    #[arg(long, default_value_t = 5)]
    requests: u32,

    /// Optional domain hint for every request
    #[arg(long)]
    domain: Option<String>,

    /// Cosine similarity threshold for duplicate detection
    #[arg(long, default_value_t = 0.92)]
    threshold: f64,

    /// RNG seed for the simulated provider
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    shared::logging::init_tracing_with_level(Some(&args.log_level));

    let config = EngineConfig {
        slot_count: args.slots,
        duplicate_threshold: args.threshold,
        ..EngineConfig::default()
    };

    let store = Arc::new(InMemoryIdeaStore::new());
    let engine = Engine::new(
        config,
        Arc::new(StaticConfigSource::with_default_profile()),
        Arc::new(SimulatedAiProvider::new(args.seed)),
        Arc::new(HashEmbedder::default()),
        store.clone(),
    )?;

    println!(
        "Running {} request(s) across {} slot(s)",
        args.requests, args.slots
    );

    let mut pending = Vec::new();
    for n in 1..=args.requests {
        let mut request = GenerationRequest::for_profile("default");
        request.domain = args.domain.clone();

        match engine.generate(request).await {
            Ok(handle) => {
                println!("[{n}] admitted to slot {} as {}", handle.slot_number, handle.session_id);
                pending.push(handle);
            }
            Err(e) => {
                // No queueing by design: wait for a slot and try again
                println!("[{n}] rejected ({e}); waiting for a free slot");
                if let Some(handle) = pending.pop() {
                    report(&engine, handle).await;
                }
                let mut request = GenerationRequest::for_profile("default");
                request.domain = args.domain.clone();
                let handle = engine.generate(request).await?;
                println!("[{n}] admitted to slot {} as {}", handle.slot_number, handle.session_id);
                pending.push(handle);
            }
        }
    }

    for handle in pending {
        report(&engine, handle).await;
    }

    println!("{} idea(s) persisted", store.count().await);
    Ok(())
}

/// Wait for one session and print its log and outcome
async fn report(engine: &Engine, handle: SessionHandle) {
    let session_id = handle.session_id.clone();
    let outcome = handle.outcome.await;

    for entry in engine.get_logs_since(&session_id, 0).await {
        let duration = entry
            .duration_ms
            .map(|ms| format!(" ({ms}ms)"))
            .unwrap_or_default();
        println!("  [{}] {:>15} {}{duration}", entry.id, entry.stage, entry.message);
    }

    match outcome {
        Ok(Ok(idea)) => {
            let duplicate = idea
                .duplicate_of_id
                .as_deref()
                .map(|id| format!(", duplicate of {id}"))
                .unwrap_or_default();
            println!(
                "  => {} scored {:.1}{duplicate}",
                idea.id.as_deref().unwrap_or("?"),
                idea.score
            );
        }
        Ok(Err(e)) => println!("  => failed: {e}"),
        Err(e) => println!("  => task error: {e}"),
    }

    engine.release_logs(&session_id).await;
}
