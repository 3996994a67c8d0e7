use std::sync::Arc;

use jobcast_chat::{ChatRelayConfig, ChatRequest, ChatSession, Message};
use jobcast_events::{JobContext, MemorySink, StepPhase};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    println!("Jobcast Streaming Chat - Example");
    println!("=================================\n");

    // 1. Configuration from the environment (JOBCAST_PROXY_URL,
    //    JOBCAST_AUTH_TOKEN), falling back to the local proxy default.
    println!("1. Loading configuration...");
    let config = ChatRelayConfig::from_env();
    println!("   Proxy: {}\n", config.proxy_base_url);

    // 2. An in-memory sink records every progress event so we can dump
    //    them at the end. Swap in your own EventSink to publish the same
    //    steps to a real backend.
    let sink = Arc::new(MemorySink::new());
    let job = JobContext::new(sink.clone());

    // 3. Run a streaming chat session.
    println!("2. Streaming chat completion...");
    let request = ChatRequest::new(
        "gpt-4o",
        vec![
            Message::system("You are a concise assistant."),
            Message::human("Explain what a bounded channel is, in two sentences."),
        ],
    )
    .temperature(0.2);

    let mut session = ChatSession::new(config, job);
    let result = session.run(request).await?;

    println!("   ✓ Done in {:.2}s\n", result.elapsed_seconds);
    println!("Response:\n{}\n", result.response_text);
    println!(
        "Stats: {} chunks, {} batches, ~{} tokens, {} events",
        result.chunks_emitted,
        result.batches_flushed,
        result.approx_tokens_emitted,
        result.total_events,
    );

    // 4. Show the progress-event trail the session produced.
    println!("\nProgress events:");
    for step in sink.recorded().await {
        let phase = match step.phase {
            StepPhase::Started => "started ",
            StepPhase::Finished => "finished",
        };
        println!("   [{phase}] {}", step.step_id);
    }

    Ok(())
}
