use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

use oversessions::config::{load_roster, Config};
use oversessions::logging::init_logging;
use oversessions::publish::StdoutPublisher;
use oversessions::report::HeroLabels;
use oversessions::router::{EventRouter, PresenceEvent, RouterOptions};
use oversessions::state::SessionRegistry;
use oversessions::stats::{ReqwestTransport, StatsClient};

#[derive(Parser)]
#[command(version, about = "Reports competitive stat changes over game sessions")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Roster file with one `<userId> <battleTag>` per line
    #[arg(short, long)]
    battle_tags: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    debug: bool,

    /// Also write daily log files here
    #[arg(long)]
    log_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if cli.debug {
        config.log.level = "debug".to_string();
    }
    if cli.log_dir.is_some() {
        config.log.dir = cli.log_dir.clone();
    }

    let _log_guard = init_logging(&config.log);

    if let Some(path) = &cli.battle_tags {
        load_roster(&mut config, path)?;
    }

    let registry = SessionRegistry::from_roster(&config.validated_roster(), config.debounce());
    tracing::info!(players = registry.len(), game = %config.target_game, "tracking roster");

    let transport = ReqwestTransport::new().map_err(|e| e.to_string())?;
    let client = StatsClient::new(Arc::new(transport), config.api_base_url.clone())
        .with_inter_call_delay(config.inter_call_delay());

    let router = Arc::new(
        EventRouter::new(
            Arc::new(registry),
            Arc::new(client),
            Arc::new(StdoutPublisher::new()),
            RouterOptions::from_config(&config),
        )
        .with_labels(HeroLabels::new(config.hero_labels.clone())),
    );

    tokio::select! {
        result = read_events(Arc::clone(&router)) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted, shutting down"),
    }

    Ok(())
}

/// Feed newline-delimited presence events from stdin to the router.
async fn read_events(router: Arc<EventRouter>) -> Result<(), String> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = Vec::new();

    while let Some(line) = lines.next_line().await.map_err(|e| e.to_string())? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: PresenceEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, line, "skipping malformed presence event");
                continue;
            }
        };

        if event.prime {
            router.handle_at(event, Utc::now()).await;
        } else {
            tasks.retain(|task: &JoinHandle<_>| !task.is_finished());
            tasks.push(router.dispatch(event));
        }
    }

    tracing::info!("input closed, waiting for sessions in flight");
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "presence handler failed");
        }
    }
    Ok(())
}
