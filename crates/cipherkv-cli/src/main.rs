mod cli;
mod config;
mod storage;

use cipherkv_aead::{AeadController, Strategy};
use cipherkv_core::store::MetadataStore;
use clap::Parser;
use color_eyre::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{Command, ConfigCommand};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config_path = config::Config::path()?;
    let file_config = config::Config::read(&config_path)?;
    let config = file_config
        .clone()
        .with_env_fallbacks(|name| std::env::var(name).ok());

    match cli.command {
        Command::Encrypt {
            text,
            password,
            store,
        } => {
            let controller = controller_for(&config, store)?;
            let encrypted = controller
                .encrypt(&text, password.as_deref())
                .await
                .map_err(|e| color_eyre::eyre::eyre!(e.to_string()))?;
            println!("{encrypted}");
        }
        Command::Decrypt {
            ciphertext,
            password,
            delete,
            store,
        } => {
            let controller = controller_for(&config, store)?;
            let plain = controller
                .decrypt(&ciphertext, password.as_deref(), delete)
                .await
                .map_err(|e| color_eyre::eyre::eyre!(e.to_string()))?;
            println!("{plain}");
        }
        Command::Health { store } => {
            let controller = controller_for(&config, store)?;
            run_health(&controller).await?;
            println!("Metadata store ({}): ok", controller.strategy());
        }
        Command::Version => print_version(),
        Command::Config(ConfigCommand::Init) => init_config(&file_config, &config_path)?,
    }

    Ok(())
}

fn init_tracing() {
    // Logs go to stderr so stdout stays pipeable.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("cipherkv {}", env!("CARGO_PKG_VERSION"));
}

fn controller_for(
    config: &config::Config,
    store: Option<Strategy>,
) -> Result<storage::CliController> {
    let mut controller = storage::controller_from_config(config)?;
    if let Some(strategy) = store {
        controller.set_strategy(strategy);
    }
    Ok(controller)
}

/// Round-trips a probe through the active backend and removes its metadata.
async fn run_health<R: MetadataStore, F: MetadataStore>(
    controller: &AeadController<R, F>,
) -> Result<()> {
    let probe = "health/probe";
    let encrypted = controller
        .encrypt(probe, None)
        .await
        .map_err(|e| color_eyre::eyre::eyre!(e.to_string()))?;
    let round_trip = controller
        .decrypt(&encrypted, None, true)
        .await
        .map_err(|e| color_eyre::eyre::eyre!(e.to_string()))?;

    if round_trip != probe {
        color_eyre::eyre::bail!("metadata store round-trip failed");
    }
    info!(strategy = %controller.strategy(), "health probe passed");
    Ok(())
}

fn init_config(config: &config::Config, path: &std::path::Path) -> Result<()> {
    let path = config.write_if_missing(path)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}
