//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use nightshift_ai::{ChatClient, DEFAULT_BASE_URL, DEFAULT_MODEL};
use nightshift_core::{FieldCatalog, IntakeNormalizer, SemanticRole};
use nightshift_mail::MailClient;
use nightshift_pipeline::{DeliveryOrchestrator, Pipeline, Sink, SinkKind};
use nightshift_store::FileStore;

#[derive(Parser, Debug)]
#[command(name = "nightshift", version, about = "Night shift sleep plans from form submissions")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the webhook server.
    Serve(ServeArgs),
    /// Normalize a saved webhook body and print the intake.
    Normalize {
        file: PathBuf,
        #[command(flatten)]
        catalog: CatalogArgs,
        /// Print the intake as JSON instead of a card.
        #[arg(long)]
        json: bool,
    },
    /// Print the prompt a saved webhook body would produce.
    Prompt {
        file: PathBuf,
        #[command(flatten)]
        catalog: CatalogArgs,
    },
    /// Print the stored plan for an address.
    Show {
        address: String,
        #[arg(long, env = "NIGHTSHIFT_STORE_DIR", default_value = "./plans")]
        store_dir: PathBuf,
    },
}

/// A provider field key pinned to a role, given as `key=role`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPin {
    pub identifier: String,
    pub role: SemanticRole,
}

pub fn parse_pin(s: &str) -> Result<FieldPin, String> {
    let (identifier, role) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=role, got `{s}`"))?;
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Err(format!("empty field key in `{s}`"));
    }
    Ok(FieldPin {
        identifier: identifier.to_string(),
        role: role.parse()?,
    })
}

#[derive(Args, Debug, Clone, Default)]
pub struct CatalogArgs {
    /// Pin a form field key to a role, e.g. `--field question_3=shift_start`.
    #[arg(long = "field", value_name = "KEY=ROLE", value_parser = parse_pin)]
    pub fields: Vec<FieldPin>,
}

impl CatalogArgs {
    pub fn normalizer(&self) -> IntakeNormalizer {
        let catalog = self
            .fields
            .iter()
            .fold(FieldCatalog::builtin(), |catalog, pin| {
                catalog.with_pinned(pin.role, &pin.identifier)
            });
        IntakeNormalizer::new(catalog)
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, env = "NIGHTSHIFT_BIND", default_value = "0.0.0.0:5000")]
    pub bind: SocketAddr,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub openai_base_url: String,

    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_MODEL)]
    pub openai_model: String,

    #[arg(long, env = "NIGHTSHIFT_GENERATION_TIMEOUT_SECS", default_value_t = 60)]
    pub generation_timeout_secs: u64,

    /// Shared secret expected in the `X-Webhook-Secret` header.
    #[arg(long, env = "WEBHOOK_SECRET", hide_env_values = true)]
    pub webhook_secret: Option<String>,

    #[arg(long, env = "NIGHTSHIFT_SINK", default_value = "inline")]
    pub sink: SinkKind,

    #[arg(long, env = "NIGHTSHIFT_STORE_DIR", default_value = "./plans")]
    pub store_dir: PathBuf,

    #[arg(long, env = "MAIL_RELAY_URL")]
    pub mail_relay_url: Option<String>,

    #[arg(long, env = "MAIL_API_KEY", hide_env_values = true)]
    pub mail_api_key: Option<String>,

    #[arg(long, env = "MAIL_FROM")]
    pub mail_from: Option<String>,

    #[command(flatten)]
    pub catalog: CatalogArgs,
}

impl ServeArgs {
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    /// The configured secret, with a blank value meaning none.
    pub fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }

    pub async fn sink(&self) -> anyhow::Result<Sink> {
        Ok(match self.sink {
            SinkKind::Inline => Sink::Inline,
            SinkKind::Store => {
                let store = FileStore::open(&self.store_dir)
                    .await
                    .with_context(|| format!("opening plan store {}", self.store_dir.display()))?;
                Sink::Store(Arc::new(store))
            }
            SinkKind::Email => {
                let (Some(url), Some(key), Some(from)) =
                    (&self.mail_relay_url, &self.mail_api_key, &self.mail_from)
                else {
                    bail!("the email sink needs MAIL_RELAY_URL, MAIL_API_KEY and MAIL_FROM");
                };
                Sink::Email(MailClient::new(url.clone(), key.clone(), from.clone()))
            }
        })
    }

    pub async fn pipeline(&self) -> anyhow::Result<Pipeline> {
        let api_key = self
            .openai_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .context("OPENAI_API_KEY is required to serve")?;
        let generator = ChatClient::new(api_key)
            .with_base_url(&self.openai_base_url)
            .with_model(&self.openai_model);

        let orchestrator = DeliveryOrchestrator::new(self.sink().await?);
        Ok(
            Pipeline::new(self.catalog.normalizer(), Arc::new(generator), orchestrator)
                .with_timeout(self.generation_timeout()),
        )
    }
}
