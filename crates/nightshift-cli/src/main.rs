mod config;
mod display;
mod server;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use nightshift_core::{DeliveryKey, IntakeNormalizer, Normalized, build_prompt};
use nightshift_store::{FileStore, KeyedStore};
use tracing_subscriber::EnvFilter;

use config::{Cli, Command, ServeArgs};
use server::{AppState, SharedSecret};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Normalize {
            file,
            catalog,
            json,
        } => {
            let normalized = normalize_file(&catalog.normalizer(), &file)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&normalized.intake)?);
                for w in &normalized.warnings {
                    eprintln!("warning: {w}");
                }
            } else {
                print!("{}", display::intake_card(&normalized.intake, &normalized.warnings));
            }
            Ok(())
        }
        Command::Prompt { file, catalog } => {
            let normalized = normalize_file(&catalog.normalizer(), &file)?;
            println!("{}", build_prompt(&normalized.intake));
            Ok(())
        }
        Command::Show { address, store_dir } => {
            let key = DeliveryKey::from_address(&address).context("address is blank")?;
            let store = FileStore::open(&store_dir)
                .await
                .with_context(|| format!("opening plan store {}", store_dir.display()))?;
            match store.get(&key).await? {
                Some(record) => print!("{}", display::record_card(&record)),
                None => anyhow::bail!("no plan stored for {key}"),
            }
            Ok(())
        }
    }
}

fn normalize_file(normalizer: &IntakeNormalizer, path: &Path) -> anyhow::Result<Normalized> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    normalizer
        .normalize_slice(&bytes)
        .with_context(|| format!("normalizing {}", path.display()))
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    tracing::info!("nightshift v{}", env!("CARGO_PKG_VERSION"));
    let pipeline = args.pipeline().await?;
    let secret = args.webhook_secret().map(SharedSecret::new).transpose()?;
    if secret.is_none() {
        tracing::warn!("WEBHOOK_SECRET is not set; accepting unauthenticated webhooks");
    }

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;
    server::serve(listener, Arc::new(AppState { pipeline, secret })).await
}
