use anyhow::Context;
use clap::{Parser, Subcommand};
use rss_notifier::{NotifierConfig, RssNotifier};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rss-notifier")]
#[command(about = "Emails subscribers when their RSS feeds publish new posts")]
struct Cli {
    #[command(flatten)]
    config: NotifierConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the record and queue tables
    Setup,

    /// Subscribe an email address to a feed
    Subscribe { feed: String, email: String },

    /// Queue every subscribed feed for processing
    Tick,

    /// Consume the feed queue and fan new posts out to subscribers
    FeedWorker {
        /// Exit once the queue is empty
        #[arg(long)]
        once: bool,
    },

    /// Consume the notification queue and send emails
    DeliveryWorker {
        /// Exit once the queue is empty
        #[arg(long)]
        once: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let notifier = RssNotifier::connect(&cli.config).await.map_err(|e| {
        error!("Failed to connect to database. Make sure PostgreSQL is running and DATABASE_URL is set");
        e
    })?;

    match cli.command {
        Commands::Setup => {
            notifier.setup().await.context("schema setup failed")?;
            info!("Schema ready");
        }
        Commands::Subscribe { feed, email } => {
            notifier
                .subscribe(&feed, &email)
                .await
                .with_context(|| format!("failed to subscribe {} to {}", email, feed))?;
        }
        Commands::Tick => {
            let dispatched = notifier.tick().await.context("feed dispatch failed")?;
            info!("Dispatched {} feeds", dispatched);
        }
        Commands::FeedWorker { once } => {
            notifier.run_feed_worker(once).await?;
        }
        Commands::DeliveryWorker { once } => {
            notifier.run_delivery_worker(once).await?;
        }
    }

    Ok(())
}
