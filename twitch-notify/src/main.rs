use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use twitch_api::{Credentials, TwitchClient};

use twitch_notify::config::{ConfigService, JsonFileStore, Settings};
use twitch_notify::logging::{self, LoggingConfig};
use twitch_notify::messaging::{DiscordConfig, DiscordSink, LogSink, MessageSink};
use twitch_notify::notifier::{
    Collaborators, NotifierContext, StreamNotifier, StreamSource, TwitchLookup,
};
use twitch_notify::presence::PresenceUpdate;
use twitch_notify::utils::http_client::build_http_client;

/// Presence updates buffered between the reader and the notifier.
const PRESENCE_CHANNEL_CAPACITY: usize = 256;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read presence updates as JSON lines from stdin and announce go-live edges.
    Run,
    /// Show the live status of a Twitch channel (login or twitch.tv URL).
    Lookup { target: String },
    /// Set the notify channels of a server; no channels disables announcements.
    Channels {
        server_id: String,
        channels: Vec<String>,
    },
    /// Print the stored configuration, optionally for one server.
    Show { server_id: Option<String> },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = Settings::from_env().context("Failed to load settings")?;

    let (logging, _guard) = logging::init_logging(&settings.log_dir)?;

    let http = build_http_client(settings.http_timeout);
    let twitch = Arc::new(TwitchClient::new(
        http.clone(),
        Credentials {
            client_id: settings.twitch_client_id.clone(),
            client_secret: settings.twitch_client_secret.clone(),
        },
    ));
    let lookup = Arc::new(TwitchLookup::new(twitch.clone()));

    let store = Arc::new(JsonFileStore::new(
        &settings.config_dir,
        JsonFileStore::DEFAULT_KEY,
    ));
    let configs = Arc::new(
        ConfigService::load(store.clone())
            .await
            .with_context(|| format!("Failed to load {}", store.path().display()))?,
    );

    let sink: Arc<dyn MessageSink> = match &settings.discord_bot_token {
        Some(token) => Arc::new(DiscordSink::new(DiscordConfig::new(token), http)),
        None => {
            warn!("DISCORD_BOT_TOKEN not set, announcements are only logged");
            Arc::new(LogSink)
        }
    };

    let notifier = Arc::new(StreamNotifier::new(
        settings.notifier_config(),
        NotifierContext::new(),
        Collaborators {
            configs: configs.clone(),
            resolver: lookup.clone(),
            source: lookup.clone(),
            sink,
        },
    ));

    match args.command {
        Command::Run => run(notifier, &logging).await?,
        Command::Lookup { target } => {
            let streamer_id = if twitch_api::login_from_url(&target).is_some() {
                twitch.user_id_from_url(&target).await?
            } else {
                twitch.user_id(&target).await?
            };
            let stream = lookup.fetch_stream(&streamer_id).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "streamer_id": streamer_id,
                    "stream": stream,
                }))?
            );
        }
        Command::Channels {
            server_id,
            channels,
        } => {
            let channels = channels
                .iter()
                .map(|c| twitch_notify::commands::parse_channel(c))
                .collect::<Result<Vec<_>, _>>()?;
            let confirmation = notifier.configure_channels(&server_id, channels).await?;
            println!("{confirmation}");
        }
        Command::Show { server_id } => {
            let snapshot = configs.snapshot();
            let output = match server_id {
                Some(id) => serde_json::to_string_pretty(&snapshot.servers.get(&id))?,
                None => serde_json::to_string_pretty(&snapshot)?,
            };
            println!("{output}");
        }
    }

    Ok(())
}

/// Feed stdin presence updates to the notifier until stdin closes.
async fn run(notifier: Arc<StreamNotifier>, logging: &LoggingConfig) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let log_cleanup = logging.start_retention_cleanup(shutdown.clone());
    info!(log_dir = %logging.log_dir().display(), "Log retention cleanup started");

    let (tx, rx) = mpsc::channel::<PresenceUpdate>(PRESENCE_CHANNEL_CAPACITY);
    let listener = notifier.spawn_listener(rx);
    let sweeper = notifier.start_history_sweeper();

    info!("Reading presence updates from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<PresenceUpdate>(&line) {
            Ok(update) => {
                // Waits while the listener is behind; fails once it has stopped.
                if tx.send(update).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!(error = %e, "Skipping malformed presence update"),
        }
    }

    drop(tx);
    listener.await?;
    notifier.stop();
    sweeper.await?;
    shutdown.cancel();
    log_cleanup.await?;
    info!("Presence input closed, shutting down");
    Ok(())
}
