//! CLI binary for the jarvis voice assistant.

use clap::{Parser, Subcommand};
use jarvis::assistant::Assistant;
use jarvis::audio::capture::CpalMicrophone;
use jarvis::audio::playback::CpalPlayback;
use jarvis::config::AssistantConfig;
use jarvis::pipeline::Voice;
use jarvis::router::RouteOutcome;
use jarvis::services::stt::WhisperTranscriber;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Jarvis: always-listening desktop voice assistant.
#[derive(Parser)]
#[command(name = "jarvis", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also write daily-rotated logs into this directory.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Listen on the microphone and respond (default).
    Run,

    /// List available audio devices.
    Devices,

    /// Speak a line through the speech pipeline and exit.
    Say {
        /// Text to speak.
        text: Vec<String>,
    },

    /// Route one text command as if it had been heard, then exit.
    Command {
        /// Command text, e.g. "jarvis what time is it".
        text: Vec<String>,
    },

    /// Write the default configuration file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

/// Speech still queued after this long is abandoned on exit.
const SAY_TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let log_dir = cli
        .log_dir
        .clone()
        .or_else(|| config.logging.file.then(|| config.resolved_data_dir().join("logs")));
    let _log_guard = init_tracing(log_dir.as_deref());

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Devices => list_devices(),
        Command::Say { text } => say(config, &text.join(" ")).await,
        Command::Command { text } => command(config, &text.join(" ")).await,
        Command::InitConfig { force } => init_config(cli.config.as_deref(), force),
    }
}

/// Install the subscriber. The returned guard flushes the file writer on drop.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Quiet HTTP internals by default; RUST_LOG overrides.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("jarvis=info,reqwest=warn,hyper=warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "jarvis.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    guard
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AssistantConfig> {
    if let Some(path) = path {
        return Ok(AssistantConfig::from_file(path)?);
    }
    let default_path = AssistantConfig::default_config_path();
    if default_path.exists() {
        Ok(AssistantConfig::from_file(&default_path)?)
    } else {
        Ok(AssistantConfig::default())
    }
}

async fn run(config: AssistantConfig) -> anyhow::Result<()> {
    println!("Jarvis v{}", env!("CARGO_PKG_VERSION"));

    let client = jarvis::services::http_client(config.services.timeout_secs);
    let transcriber = Arc::new(WhisperTranscriber::new(&config.stt, client));
    let microphone = CpalMicrophone::new(&config.audio);
    let wake = config
        .gate
        .wake_tokens
        .first()
        .cloned()
        .unwrap_or_else(|| "jarvis".to_owned());

    let assistant = Assistant::from_config(config)?;
    println!("\nSay \"{wake}\" followed by a command. Say \"exit\" or press Ctrl+C to quit.\n");

    assistant
        .run(&microphone, transcriber, CancellationToken::new())
        .await?;
    info!("assistant stopped");
    Ok(())
}

fn list_devices() -> anyhow::Result<()> {
    println!("Input devices:");
    for name in CpalMicrophone::list_input_devices()? {
        println!("  - {name}");
    }

    println!("\nOutput devices:");
    for name in CpalPlayback::list_output_devices()? {
        println!("  - {name}");
    }
    Ok(())
}

async fn say(config: AssistantConfig, text: &str) -> anyhow::Result<()> {
    let assistant = Assistant::from_config(config)?;
    assistant.voice().speak(text);
    assistant.wait_for_speech(SAY_TIMEOUT).await;
    assistant.shutdown().await;
    Ok(())
}

async fn command(config: AssistantConfig, text: &str) -> anyhow::Result<()> {
    let assistant = Assistant::from_config(config)?;
    let outcome = assistant.handle_text(text).await;
    assistant.wait_for_speech(SAY_TIMEOUT).await;
    assistant.shutdown().await;
    if outcome == RouteOutcome::Exit {
        info!("exit command received");
    }
    Ok(())
}

fn init_config(path: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(AssistantConfig::default_config_path);
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    AssistantConfig::default().save_to_file(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
