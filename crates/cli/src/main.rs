use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mirage_agents::{HoneypotAgent, HttpReportSink};
use mirage_core::{
    classify, extract, EngageRequest, InboundMessage, ScoringConfig, Sender,
};
use mirage_observability::{init_tracing, AppMetrics};
use mirage_storage::{Archive, SessionStore};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "mirage")]
#[command(about = "Mirage scam honeypot CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive loop: each line is fed to the engine as a scammer message.
    Chat {
        #[arg(long)]
        session: Option<String>,
    },
    /// Classify one message and print the scoring breakdown.
    Classify { text: String },
    /// Run the intelligence extractor over one message.
    Extract { text: String },
    /// Replay a JSON transcript of engagement requests through the engine.
    Replay { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("mirage_cli");
    let cli = Cli::parse();

    match cli.command {
        Command::Chat { session } => {
            let agent = build_agent().await?;
            run_chat(agent, session).await?;
        }
        Command::Classify { text } => {
            let classification = classify(&text, &[], &ScoringConfig::default());
            println!("{}", serde_json::to_string_pretty(&classification)?);
        }
        Command::Extract { text } => {
            let intelligence = extract(&text);
            println!("{}", serde_json::to_string_pretty(&intelligence)?);
        }
        Command::Replay { path } => {
            let agent = build_agent().await?;
            run_replay(agent, &path).await?;
        }
    }

    Ok(())
}

async fn run_chat(
    agent: HoneypotAgent<Archive, HttpReportSink>,
    session: Option<String>,
) -> Result<()> {
    let session_id = session.unwrap_or_else(|| Uuid::new_v4().to_string());

    println!("Mirage honeypot chat mode (session {session_id}). type 'exit' to quit.");

    loop {
        print!("scammer> ");
        io::stdout().flush()?;

        let mut line = String::new();
        io::stdin().read_line(&mut line)?;

        let text = line.trim();
        if text.eq_ignore_ascii_case("exit") || text.eq_ignore_ascii_case("quit") {
            break;
        }

        if text.is_empty() {
            continue;
        }

        let outcome = agent
            .handle_message(EngageRequest {
                session_id: session_id.clone(),
                message: InboundMessage {
                    sender: Sender::Scammer,
                    text: text.to_string(),
                    timestamp: None,
                },
                conversation_history: Vec::new(),
                metadata: None,
            })
            .await?;

        println!("\nagent> {}", outcome.reply);
        println!(
            "[stage: {} | confidence: {:.2} | concluded: {}]\n",
            outcome.stage.as_code(),
            outcome.scam_confidence,
            outcome.concluded
        );

        if outcome.concluded {
            break;
        }
    }

    if let Some(session) = agent.snapshot(&session_id) {
        println!("{}", serde_json::to_string_pretty(&session)?);
    }

    Ok(())
}

async fn run_replay(
    agent: HoneypotAgent<Archive, HttpReportSink>,
    path: &PathBuf,
) -> Result<()> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading transcript {}", path.display()))?;
    let requests: Vec<EngageRequest> =
        serde_json::from_str(&raw).context("transcript must be a JSON array of requests")?;

    for request in requests {
        let session_id = request.session_id.clone();
        let outcome = agent.handle_message(request).await?;
        println!(
            "[{}] stage={} reply={}",
            session_id,
            outcome.stage.as_code(),
            outcome.reply
        );
    }

    Ok(())
}

async fn build_agent() -> Result<HoneypotAgent<Archive, HttpReportSink>> {
    let metrics = AppMetrics::shared();
    let store = Arc::new(SessionStore::new());

    let archive = if let Ok(database_url) = env::var("MIRAGE_DATABASE_URL") {
        Archive::sqlite(&database_url).await?
    } else {
        Archive::memory()
    };

    let report_url = env::var("MIRAGE_REPORT_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:9009/honeypot/final-result".to_string());
    let sink = HttpReportSink::new(report_url, Duration::from_secs(10))?;

    Ok(HoneypotAgent::new(
        store,
        Arc::new(archive),
        Arc::new(sink),
        ScoringConfig::default(),
        metrics,
    ))
}
