//! Content view CLI
//!
//! # Usage
//!
//! ```bash
//! # Print the subtree report, plus a keyword search section
//! content-view report --fixture demos/site.yaml --keyword myhippo
//!
//! # Log every change under the configured root until Ctrl-C
//! content-view --config demos/content-view.yaml watch --fixture demos/site.yaml
//!
//! # Show the registered change listeners
//! content-view listeners --fixture demos/site.yaml
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use content_store::InMemoryRepository;
use content_view::{ContentViewHost, ViewConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "content-view")]
#[command(about = "Content repository reports and change logging", long_about = None)]
struct Cli {
    /// Configuration file (falls back to $CONTENT_VIEW_CONFIG, then defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the report for a fixture repository
    Report {
        /// Repository fixture (YAML or JSON)
        #[arg(short, long)]
        fixture: PathBuf,

        /// Add a keyword search section
        #[arg(short, long)]
        keyword: Option<String>,
    },

    /// Subscribe and log changes until interrupted
    Watch {
        /// Repository fixture (YAML or JSON)
        #[arg(short, long)]
        fixture: PathBuf,
    },

    /// List the change listeners registered with the repository
    Listeners {
        /// Repository fixture (YAML or JSON)
        #[arg(short, long)]
        fixture: PathBuf,
    },
}

fn load_repository(fixture: &Path) -> anyhow::Result<Arc<InMemoryRepository>> {
    let repo = InMemoryRepository::from_fixture_file(fixture)
        .with_context(|| format!("Failed to load fixture {}", fixture.display()))?;
    Ok(Arc::new(repo))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "content_view=info,content_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = ViewConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Report { fixture, keyword } => {
            let repo = load_repository(&fixture)?;
            let host = ContentViewHost::new(repo, config);
            let response = host.service().handle_async(keyword).await;
            if !response.is_success() {
                anyhow::bail!("Report failed with status {}", response.status);
            }
            println!("{}", response.body);
        }

        Commands::Watch { fixture } => {
            let repo = load_repository(&fixture)?;
            let host = ContentViewHost::new(repo, config);
            host.start().context("Failed to subscribe")?;
            tracing::info!("Watching for changes, press Ctrl-C to stop");

            let signal = tokio::signal::ctrl_c().await;
            host.shutdown();
            signal.context("Failed to listen for Ctrl-C")?;
        }

        Commands::Listeners { fixture } => {
            let repo = load_repository(&fixture)?;
            let host = ContentViewHost::new(repo, config);
            host.start().context("Failed to subscribe")?;
            let listeners = host.list_active_subscriptions();
            host.shutdown();

            for listener in listeners.context("Failed to list listeners")? {
                println!("{}", listener);
            }
        }
    }

    Ok(())
}
