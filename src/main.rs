use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use checkout_substeps::config::Config;
use checkout_substeps::logging;
use checkout_substeps::order::{FileOrderStore, OrderCommitter};
use checkout_substeps::render::{render_order_section, HtmlRenderSink};
use checkout_substeps::rest::{self, ApiState};
use checkout_substeps::schema::{sections, BuiltinSchemaProvider, FieldSchemaProvider};
use checkout_substeps::session::{FileSessionBackend, SessionStore};
use checkout_substeps::summary::SummaryRenderer;

#[derive(Parser)]
#[command(name = "checkout-substeps")]
#[command(about = "Collapsible checkout sections backed by the customer session")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective checkout settings as JSON
    Settings,

    /// Print the resolved field schema of a section
    Schema {
        /// Section key (contact, shipping, billing, gift_options, order_notes)
        section: String,
    },

    /// Print the summary of a section as stored in a session
    Summary {
        /// Session id
        session: String,

        /// Section key
        section: String,
    },

    /// Commit a session's sections onto an order
    Commit {
        /// Session id
        session: String,

        /// Order id
        order: String,

        /// Sections to commit (default: all)
        sections: Vec<String>,
    },

    /// Print a section of a placed order
    Order {
        /// Order id
        order: String,

        /// Section key
        section: String,

        /// Print the rendered HTML instead of plain text
        #[arg(long)]
        html: bool,
    },

    /// Start the REST API server
    Serve {
        /// Port to listen on (default from config)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;

    let is_server = matches!(cli.command, Commands::Serve { .. });
    let logging_handle = logging::init_logging(&config, is_server, cli.debug)?;
    if let Some(path) = &logging_handle.log_file_path {
        eprintln!("Logging to {}", path.display());
    }

    match cli.command {
        Commands::Settings => cmd_settings(&config)?,
        Commands::Schema { section } => cmd_schema(&config, &section)?,
        Commands::Summary { session, section } => cmd_summary(&config, &session, &section).await?,
        Commands::Commit {
            session,
            order,
            sections,
        } => cmd_commit(&config, &session, &order, sections).await?,
        Commands::Order {
            order,
            section,
            html,
        } => cmd_order(&config, &order, &section, html).await?,
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.rest_api.port);
            let state = ApiState::new(config).context("Failed to build API state")?;
            rest::serve(state, port).await?;
        }
    }

    Ok(())
}

fn session_store(config: &Config, session_id: &str) -> SessionStore {
    SessionStore::new(
        Arc::new(FileSessionBackend::new(config.sessions_path())),
        session_id,
    )
    .with_retry(config.session.write_retry)
}

fn committer(config: &Config) -> OrderCommitter {
    OrderCommitter::new(
        Arc::new(BuiltinSchemaProvider::new()),
        Arc::new(FileOrderStore::new(config.orders_path())),
    )
    .with_retry_config(config.commit.retry, config.commit.timeout())
}

fn cmd_settings(config: &Config) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&config.checkout)?);
    Ok(())
}

fn cmd_schema(config: &Config, section: &str) -> Result<()> {
    let schema = BuiltinSchemaProvider::new().resolve(section, &config.checkout);
    if schema.is_empty() {
        println!("Section '{}' has no fields with the current settings", section);
        return Ok(());
    }

    println!("{} ({})", schema.title, schema.key);
    println!("{}", "─".repeat(40));
    for field in &schema.fields {
        let required = if field.required { "*" } else { " " };
        println!("{} {:<24} {:<10} {}", required, field.id, field.kind.name(), field.label);
    }
    Ok(())
}

async fn cmd_summary(config: &Config, session_id: &str, section: &str) -> Result<()> {
    let schema = BuiltinSchemaProvider::new().resolve(section, &config.checkout);
    let record = session_store(config, session_id).record().await?;
    let summary = SummaryRenderer::from_settings(&config.checkout).render(&schema, &record);
    println!("{}", summary.to_text());
    Ok(())
}

async fn cmd_commit(
    config: &Config,
    session_id: &str,
    order_id: &str,
    requested: Vec<String>,
) -> Result<()> {
    let requested: Vec<&str> = if requested.is_empty() {
        sections::ALL.to_vec()
    } else {
        requested.iter().map(String::as_str).collect()
    };

    let session = session_store(config, session_id);
    let report = committer(config)
        .commit(order_id, &session, &config.checkout, &requested)
        .await?;

    for commit in &report.sections {
        println!(
            "{}: {} written, {} cleared ({} attempt(s))",
            commit.section,
            commit.written.len(),
            commit.deleted.len(),
            commit.attempts
        );
    }
    for section in &report.skipped {
        println!("{}: skipped", section);
    }
    for section in &report.uncleared {
        eprintln!("warning: {} is still in the session", section);
    }
    Ok(())
}

async fn cmd_order(config: &Config, order_id: &str, section: &str, html: bool) -> Result<()> {
    let provider = BuiltinSchemaProvider::new();
    let schema = provider.resolve(section, &config.checkout);
    if schema.is_empty() {
        bail!("Section '{}' is not enabled", section);
    }

    let order = committer(config).load(order_id).await?;

    if html {
        let mut sink = HtmlRenderSink::new()?;
        render_order_section(&provider, &config.checkout, &order, section, &mut sink)?;
        println!("{}", sink.into_html());
    } else {
        let summary = SummaryRenderer::from_settings(&config.checkout).render(&schema, &order);
        println!("{}", summary.to_text());
    }
    Ok(())
}
