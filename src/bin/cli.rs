//! CLI binary for kotoba.

use clap::{Parser, Subcommand};
use cpal::traits::{DeviceTrait, HostTrait};
use kotoba::ChatConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Kotoba: terminal chat with local and self-hosted language models.
#[derive(Parser)]
#[command(name = "kotoba", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Start the chat UI.
    Chat,

    /// List available audio input devices.
    Devices,

    /// Write the default configuration file and print its path.
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => run_chat(config).await,
        Command::Devices => list_devices(),
        Command::Init => init_config(),
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<ChatConfig> {
    if let Some(path) = path {
        return Ok(ChatConfig::from_file(path)?);
    }
    // Fall back to the per-user config file when present.
    if let Some(default) = ChatConfig::default_path()
        && default.exists()
    {
        return Ok(ChatConfig::from_file(&default)?);
    }
    Ok(ChatConfig::default())
}

async fn run_chat(config: ChatConfig) -> anyhow::Result<()> {
    // The terminal belongs to the UI, so logs go to a file. Override
    // verbosity with RUST_LOG as usual.
    let log_dir = config.models.cache_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let appender = tracing_appender::rolling::daily(&log_dir, "kotoba.log");
    let (writer, _guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("kotoba=info,hf_hub=warn,ort=warn,mistralrs_core=warn")
        }))
        .with_writer(writer)
        .with_ansi(false)
        .init();

    kotoba::ui::tui::run(config).await?;
    Ok(())
}

fn list_devices() -> anyhow::Result<()> {
    let host = cpal::default_host();
    let default_name = host
        .default_input_device()
        .and_then(|d| d.description().ok())
        .map(|d| d.name().to_owned());

    println!("Input devices:");
    for device in host.input_devices()? {
        let name = device
            .description()
            .map(|d| d.name().to_owned())
            .unwrap_or_else(|_| "<unknown>".to_owned());
        if Some(&name) == default_name.as_ref() {
            println!("  {name} (default)");
        } else {
            println!("  {name}");
        }
    }
    Ok(())
}

fn init_config() -> anyhow::Result<()> {
    let Some(path) = ChatConfig::default_path() else {
        anyhow::bail!("no config directory available on this system");
    };
    if path.exists() {
        anyhow::bail!("config already exists at {}", path.display());
    }
    ChatConfig::default().save_to_file(&path)?;
    println!("wrote {}", path.display());
    Ok(())
}
