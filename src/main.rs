use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use docpilot::config::CopilotConfig;
use docpilot::host::FileHost;
use docpilot::llm::LlmClient;
use docpilot::services::copilot::{AnalysisOutcome, Copilot};
use docpilot::sink::UiSink;
use docpilot::state::Suggestion;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(name = "docpilot", about = "AI copilot for a markup + style document")]
struct Cli {
    /// Markup file to watch.
    #[arg(long, env = "DOCPILOT_MARKUP")]
    markup: PathBuf,

    /// Style sheet file to watch.
    #[arg(long, env = "DOCPILOT_STYLE")]
    style: PathBuf,

    /// Optional project JSON sent as the serialized editor state.
    #[arg(long, env = "DOCPILOT_PROJECT")]
    project: Option<PathBuf>,
}

/// Prints everything the copilot delivers to the terminal.
struct TerminalSink;

impl UiSink for TerminalSink {
    fn on_suggestion_updated(&self, suggestion: &Suggestion, is_user_prompt_result: bool) {
        let origin = if is_user_prompt_result { "requested" } else { "periodic" };
        println!("\n[{origin} suggestion] {}\n{}\n", suggestion.explanation, suggestion.code);
    }

    fn on_loading_changed(&self, loading: bool) {
        if loading {
            println!("… thinking");
        }
    }

    fn on_error(&self, message: &str) {
        eprintln!("error: {message}");
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config = CopilotConfig::from_env().expect("invalid copilot configuration");
    let llm = LlmClient::from_env().expect("LLM client init failed");
    tracing::info!(provider = llm.provider_name(), model = llm.model(), "docpilot: llm ready");

    let host = Arc::new(FileHost::load(cli.markup, cli.style, cli.project).await);
    let copilot = Copilot::new(config, host.clone(), Arc::new(llm), Arc::new(TerminalSink))
        .expect("copilot init failed");

    let (tx, rx) = mpsc::channel(256);
    let tasks = copilot.start(rx);

    let _watch = host.watch(tx).expect("file watch failed");

    println!("docpilot ready. Commands: refresh, abort, stats, history, clear, reload, quit; anything else is a prompt.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        match line {
            "" => {}
            "quit" | "exit" => break,
            "refresh" => spawn_analysis(copilot.clone(), None),
            "abort" => {
                if !copilot.abort_current_request() {
                    println!("nothing to abort");
                }
            }
            "stats" => {
                let stats = copilot.request_stats();
                println!(
                    "requests={} retries={} tokens={} recent_errors={} changes={}",
                    stats.total_requests,
                    stats.total_retries,
                    stats.total_tokens_used,
                    stats.errors.len(),
                    copilot.change_count(),
                );
            }
            "history" => {
                for entry in copilot.response_history() {
                    let origin = entry.user_prompt.as_deref().unwrap_or("periodic");
                    println!("{} [{origin}] {}", entry.id, entry.suggestion.explanation);
                }
            }
            "clear" => {
                copilot.clear_response_history();
                println!("response history cleared");
            }
            "reload" => {
                let template = copilot.reload_prompt().await;
                println!("prompt reloaded ({} chars)", template.chars().count());
            }
            prompt => spawn_analysis(copilot.clone(), Some(prompt.to_owned())),
        }
    }

    copilot.abort_current_request();
    tasks.shutdown();
}

/// Run an analysis without blocking stdin, so `abort` stays responsive.
fn spawn_analysis(copilot: Copilot, prompt: Option<String>) {
    tokio::spawn(async move {
        let outcome = match prompt {
            Some(text) => copilot.handle_user_prompt(&text).await,
            None => copilot.force_analysis().await,
        };
        match outcome {
            AnalysisOutcome::Skipped(reason) => println!("skipped: {reason}"),
            AnalysisOutcome::Cancelled => println!("cancelled"),
            AnalysisOutcome::Completed(_) | AnalysisOutcome::Failed(_) => {}
        }
    });
}
