//! graphsync command line.
//!
//! - `explore`: drive the sync engine from stdin and print every update
//! - `serve`: run the reference graph API over a JSON dataset

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use graphsync::server::{self, ServerState};
use graphsync::sink::ConsoleSink;
use graphsync::{session, source, Config, InputEvent, QueryField, Sinks, SyncEngine};

#[derive(Debug, Parser)]
#[command(name = "graphsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Read filter edits from stdin and print the synchronized graph.
    Explore(ExploreArgs),
    /// Serve a JSON dataset over the graph API.
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
struct ExploreArgs {
    /// Data API URL or path to a JSON dataset (overrides GRAPHSYNC_DATA_API).
    #[arg(long)]
    api: Option<String>,
    /// Debounce delay in milliseconds (overrides GRAPHSYNC_DEBOUNCE_MS).
    #[arg(long)]
    debounce_ms: Option<u64>,
    /// Initial keyword (overrides GRAPHSYNC_DEFAULT_KEYWORD).
    #[arg(long)]
    keyword: Option<String>,
    /// Session token (overrides GRAPHSYNC_TOKEN).
    #[arg(long)]
    token: Option<String>,
}

#[derive(Debug, Args)]
struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: SocketAddr,
    /// Dataset file; its directory is also served under /data.
    #[arg(long, default_value = "data/custom.json")]
    dataset: PathBuf,
    /// Token that unlocks private nodes (overrides GRAPHSYNC_TOKEN).
    #[arg(long)]
    token: Option<String>,
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Explore(args) => explore(args).await,
        Commands::Serve(args) => serve(args).await,
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let token = args.token.or_else(session::token_from_env);
    println!("Graph API running at http://{}/api/graph", args.addr);
    println!("Dataset: {}", args.dataset.display());
    if token.is_some() {
        println!("Private nodes: ENABLED for bearer token");
    } else {
        println!("Private nodes: HIDDEN (set GRAPHSYNC_TOKEN to enable)");
    }

    server::serve(args.addr, ServerState::new(args.dataset, token))
        .await
        .context("server error")
}

async fn explore(args: ExploreArgs) -> Result<()> {
    let mut config = Config::from_env();
    if let Some(api) = args.api {
        config.api_base_url = api;
    }
    if let Some(ms) = args.debounce_ms {
        config.debounce_delay = Duration::from_millis(ms);
        config.suggest_delay = config.debounce_delay;
    }
    if args.keyword.is_some() {
        config.default_keyword = args.keyword;
    }

    let source = source::connect(&config.api_base_url, config.request_timeout)
        .with_context(|| format!("cannot use data API '{}'", config.api_base_url))?;
    let console = Arc::new(ConsoleSink::stdout());
    let sinks = Sinks {
        visualization: console.clone(),
        suggestions: console.clone(),
        notifier: console,
    };
    let token = args.token.or_else(session::token_from_env);
    let engine = SyncEngine::new(config, source, sinks, token);
    engine.start();

    let (tx, rx) = mpsc::channel(64);
    let runner = tokio::spawn({
        let engine = engine.clone();
        async move { engine.run(rx).await }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            Ok(Command::Event(event)) => {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            Ok(Command::Wait(delay)) => tokio::time::sleep(delay).await,
            Ok(Command::Skip) => {}
            Ok(Command::Quit) => break,
            Err(message) => eprintln!("{}", message),
        }
    }

    drop(tx);
    runner.await?;
    Ok(())
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Debug, PartialEq)]
enum Command {
    Event(InputEvent),
    Wait(Duration),
    Skip,
    Quit,
}

const HELP: &str = "commands: q <text> | subject|predicate|object <text> | field +name|-name | login <token> | logout | refresh | wait <ms> | quit";

fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(Command::Skip);
    }
    let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    let event = match verb {
        "q" => InputEvent::Keyword(rest.to_string()),
        "subject" | "predicate" | "object" => {
            let field = QueryField::parse(verb).ok_or_else(|| HELP.to_string())?;
            InputEvent::Field(field, rest.to_string())
        }
        "field" => {
            let (active, name) = match rest.split_at_checked(1) {
                Some(("+", name)) => (true, name),
                Some(("-", name)) => (false, name),
                _ => return Err(format!("expected +name or -name, got '{}'", rest)),
            };
            match QueryField::parse(name) {
                Some(field) if field.is_structured() => InputEvent::SetActive(field, active),
                _ => return Err(format!("unknown field '{}'", name)),
            }
        }
        "login" if !rest.is_empty() => InputEvent::Session(Some(rest.to_string())),
        "logout" => InputEvent::Session(None),
        "refresh" => InputEvent::Refresh,
        "wait" => {
            let ms = rest
                .parse::<u64>()
                .map_err(|_| format!("expected milliseconds, got '{}'", rest))?;
            return Ok(Command::Wait(Duration::from_millis(ms)));
        }
        "quit" | "exit" => return Ok(Command::Quit),
        _ => return Err(HELP.to_string()),
    };
    Ok(Command::Event(event))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field_edits() {
        assert_eq!(
            parse_command("q blue nile").unwrap(),
            Command::Event(InputEvent::Keyword("blue nile".into()))
        );
        assert_eq!(
            parse_command("q").unwrap(),
            Command::Event(InputEvent::Keyword(String::new()))
        );
        assert_eq!(
            parse_command("object egypt").unwrap(),
            Command::Event(InputEvent::Field(QueryField::Object, "egypt".into()))
        );
        assert_eq!(
            parse_command("field +subject").unwrap(),
            Command::Event(InputEvent::SetActive(QueryField::Subject, true))
        );
    }

    #[test]
    fn test_parse_session_and_control() {
        assert_eq!(
            parse_command("login abc").unwrap(),
            Command::Event(InputEvent::Session(Some("abc".into())))
        );
        assert_eq!(
            parse_command("logout").unwrap(),
            Command::Event(InputEvent::Session(None))
        );
        assert_eq!(parse_command("wait 500").unwrap(), Command::Wait(Duration::from_millis(500)));
        assert_eq!(parse_command("  # comment").unwrap(), Command::Skip);
        assert_eq!(parse_command("quit").unwrap(), Command::Quit);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_command("field subject").is_err());
        assert!(parse_command("field +q").is_err());
        assert!(parse_command("login").is_err());
        assert!(parse_command("wait soon").is_err());
        assert!(parse_command("dance").is_err());
    }
}
