use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use fiindo_etl::api::{FiindoClient, MarketDataProvider};
use fiindo_etl::database_sqlx::DatabaseManager;
use fiindo_etl::models::Config;
use fiindo_etl::pipeline;

#[derive(Parser, Debug)]
#[command(author, version, about = "Fiindo market data ETL pipeline", long_about = None)]
struct Args {
    /// Database file path (overrides DATABASE_PATH)
    #[arg(long)]
    db: Option<String>,

    /// Process at most N tickers (for testing)
    #[arg(long)]
    limit: Option<usize>,

    /// Print the raw debug payload for one symbol and exit
    #[arg(long, value_name = "SYMBOL")]
    debug: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let mut config = Config::from_env()?;
    if let Some(db) = args.db {
        config.database_path = db;
    }

    let client = FiindoClient::new(&config)?;

    if let Some(symbol) = &args.debug {
        let payload = client.get_debug(symbol).await?;
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    info!("🚀 Fiindo ETL");
    info!("💾 Database: {}", config.database_path);
    let database = DatabaseManager::new(&config.database_path).await?;

    let provider: Arc<dyn MarketDataProvider> = Arc::new(client);
    let summary = pipeline::run(provider, &database, &config, args.limit).await?;

    info!("📊 Run summary:");
    info!("   - Discovered: {}", summary.discovered);
    info!("   - Fetched: {}", summary.fetched);
    info!("   - Dropped: {}", summary.failures.len());
    for failure in &summary.failures {
        warn!(
            "   - {} dropped at {} fetch: {}",
            failure.symbol, failure.stage, failure.error
        );
    }
    info!("   - Industries written: {}", summary.industries_written);

    Ok(())
}
