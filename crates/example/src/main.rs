//! Math quiz CLI.
//!
//! Replies are taken from the command line, or read line by line from stdin
//! when none are given.
//!
//! # Usage
//!
//! ```bash
//! math-quiz [--workers <n>] [reply...]
//! ```
//!
//! # Example
//!
//! ```bash
//! math-quiz five yes 6 nope
//! COLLOQUY_LOG_FORMAT=json RUST_LOG=colloquy_graph=debug math-quiz five
//! ```

#![expect(
    clippy::print_stdout,
    clippy::print_stderr,
    reason = "interactive command-line front end"
)]

use std::sync::Arc;

use colloquy_core::TracingConfig;
use colloquy_graph::prelude::*;
use example::{quiz_detector, quiz_engine, quiz_graph, render};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::Level;

fn exit_with(message: impl core::fmt::Display) -> ! {
    eprintln!("Error: {message}");
    std::process::exit(1);
}

fn show(engine: &ConversationEngine) {
    let state = engine.get_state();
    let Some(node) = state.current_node().and_then(|id| engine.graph().get_node(id)) else {
        return;
    };
    for line in render(node, &state) {
        println!("  {line}");
    }
}

async fn reply(engine: &mut ConversationEngine, text: &str) {
    println!("> {text}");
    match engine.handle_incoming_message(text).await {
        Ok(result) if result.ok => show(engine),
        Ok(result) => match result.error_code {
            Some(ErrorCode::IntentUnderstandingFailed) => {
                let misunderstood = engine
                    .get_state()
                    .conversation()
                    .map_or(0, |c| c.misunderstood_count);
                println!("  Sorry, I did not get that ({misunderstood} in a row).");
            }
            _ => println!(
                "  Something went wrong: {}",
                result.error_message.unwrap_or_default()
            ),
        },
        Err(err) => println!("  I don't know where to go from here: {err}"),
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    match TracingConfig::from_env() {
        Ok(config) => {
            config.with_level(Level::WARN).init();
        }
        Err(err) => exit_with(err),
    }

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let workers = match args.iter().position(|arg| arg == "--workers") {
        Some(at) => {
            let Some(value) = args.get(at + 1) else {
                exit_with("--workers needs a value");
            };
            let workers = value
                .parse::<usize>()
                .unwrap_or_else(|err| exit_with(format!("invalid --workers '{value}': {err}")));
            args.drain(at..=at + 1);
            Some(workers)
        }
        None => None,
    };

    let graph = quiz_graph().unwrap_or_else(|err| exit_with(err));
    let detector = quiz_detector().unwrap_or_else(|err| exit_with(err));

    let builder = quiz_engine(Arc::new(graph), detector);
    let mut engine = match workers {
        Some(n) => builder.with_scheduler(WorkerPool::new(n)),
        None => builder,
    }
    .build();

    if let Err(errors) = engine.validate() {
        for error in &errors {
            eprintln!("Error: {error}");
        }
        std::process::exit(1);
    }

    show(&engine);

    if !args.is_empty() {
        for text in &args {
            reply(&mut engine, text).await;
        }
        return;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => reply(&mut engine, line.trim()).await,
            Ok(None) => break,
            Err(err) => exit_with(err),
        }
    }
}
