use std::collections::HashSet;

use clap::{Arg, Command};
use fiindo_etl::api::FiindoClient;
use fiindo_etl::database_sqlx::DatabaseManager;
use fiindo_etl::models::Config;

const TABLES: [&str; 5] = [
    "tickers",
    "ticker_stats",
    "ticker_stats_history",
    "industry_stats",
    "industry_stats_history",
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = Command::new("Fiindo Database Check Tool")
        .version("1.0")
        .about("Inspect the ETL database between runs")
        .arg(
            Arg::new("database")
                .long("db")
                .value_name("FILE")
                .help("Path to SQLite database")
                .default_value("fiindo.db"),
        )
        .subcommand(Command::new("status").about("Show row counts and the latest run timestamp"))
        .subcommand(
            Command::new("preview")
                .about("Print current snapshot rows")
                .arg(
                    Arg::new("limit")
                        .long("limit")
                        .value_name("N")
                        .help("Maximum ticker rows to print")
                        .default_value("10"),
                ),
        )
        .subcommand(Command::new("check").about("Run consistency checks on the snapshot tables"))
        .subcommand(
            Command::new("missing")
                .about("List master tickers absent from the current snapshot"),
        )
        .get_matches();

    let db_path = matches.get_one::<String>("database").unwrap();

    match matches.subcommand() {
        Some(("status", _)) => {
            let db = DatabaseManager::new(db_path).await?;

            println!("📊 Database Status: {}", db_path);
            for table in TABLES {
                let count = db.count_rows(table).await?;
                println!("   {:<24} {:>8}", table, count);
            }
            match db.latest_run_timestamp().await? {
                Some(ts) => println!("   🕒 Latest run: {}", ts),
                None => println!("   🕒 Latest run: never"),
            }
        }

        Some(("preview", sub_matches)) => {
            let limit: usize = sub_matches
                .get_one::<String>("limit")
                .unwrap()
                .parse()
                .unwrap_or(10);
            let db = DatabaseManager::new(db_path).await?;

            let stats = db.get_ticker_stats().await?;
            println!("📈 Ticker snapshot ({} rows):", stats.len());
            println!(
                "   {:<8} {:<26} {:>10} {:>10} {:>14} {:>8} {:>14}",
                "symbol", "industry", "pe", "growth", "ttm income", "debt", "revenue"
            );
            for row in stats.iter().take(limit) {
                println!(
                    "   {:<8} {:<26} {:>10} {:>10} {:>14} {:>8} {:>14}",
                    row.symbol,
                    row.industry,
                    fmt_opt(row.pe_ratio),
                    fmt_opt(row.revenue_growth),
                    fmt_opt(row.net_income_ttm),
                    fmt_opt(row.debt_ratio),
                    fmt_opt(row.latest_revenue),
                );
            }

            let industries = db.get_industry_stats().await?;
            println!("🏢 Industry snapshot ({} rows):", industries.len());
            println!(
                "   {:<26} {:>10} {:>10} {:>16}",
                "industry", "avg pe", "growth", "total revenue"
            );
            for row in &industries {
                println!(
                    "   {:<26} {:>10} {:>10} {:>16}",
                    row.industry,
                    fmt_opt(row.avg_pe_ratio),
                    fmt_opt(row.avg_revenue_growth),
                    fmt_opt(row.total_revenue),
                );
            }
        }

        Some(("check", _)) => {
            let db = DatabaseManager::new(db_path).await?;
            let mut failed = false;

            println!("🔍 Checking snapshot consistency...");

            let ticker_stats = db.get_ticker_stats().await?;
            let industry_stats = db.get_industry_stats().await?;

            // Every snapshot row must have a master ticker record
            let mut orphans = Vec::new();
            for row in &ticker_stats {
                if db.get_ticker(&row.symbol).await?.is_none() {
                    orphans.push(row.symbol.clone());
                }
            }
            if orphans.is_empty() {
                println!("   ✅ Every stats row has a master ticker record");
            } else {
                failed = true;
                println!("   ❌ Orphaned stats rows: {}", orphans.join(", "));
            }

            // All rows of a snapshot must come from a single run
            let mut timestamps: HashSet<String> = HashSet::new();
            for row in &ticker_stats {
                timestamps.insert(row.calculated_at.to_rfc3339());
            }
            for row in &industry_stats {
                timestamps.insert(row.calculated_at.to_rfc3339());
            }
            if timestamps.len() <= 1 {
                println!("   ✅ Snapshot rows share one run timestamp");
            } else {
                failed = true;
                println!(
                    "   ❌ Snapshot mixes {} different run timestamps",
                    timestamps.len()
                );
            }

            // History never loses runs, so it can't be shorter than the snapshot
            let snapshot_count = db.count_rows("ticker_stats").await?;
            let history_count = db.count_rows("ticker_stats_history").await?;
            if history_count >= snapshot_count {
                println!(
                    "   ✅ History covers the snapshot ({} history rows, {} snapshot rows)",
                    history_count, snapshot_count
                );
            } else {
                failed = true;
                println!(
                    "   ❌ History has fewer rows ({}) than the snapshot ({})",
                    history_count, snapshot_count
                );
            }

            if failed {
                println!("❌ Consistency check failed");
                std::process::exit(1);
            }
            println!("✅ Consistency check passed");
        }

        Some(("missing", _)) => {
            let db = DatabaseManager::new(db_path).await?;
            let missing = db.get_symbols_without_stats().await?;

            if missing.is_empty() {
                println!("✅ Every master ticker has current stats");
                return Ok(());
            }

            println!("⚠️ {} tickers have no current stats:", missing.len());
            for symbol in &missing {
                println!("   - {}", symbol);
            }

            // With credentials present, ask the provider why each one is missing
            let config = match Config::from_env() {
                Ok(config) => config,
                Err(_) => {
                    println!("\nSet FIRST_NAME / LAST_NAME to query /debug for these symbols.");
                    return Ok(());
                }
            };
            let client = FiindoClient::new(&config)?;

            println!("\n🔍 Provider debug records:");
            for symbol in &missing {
                match client.get_debug(symbol).await {
                    Ok(payload) => {
                        let keys: Vec<&str> = payload
                            .as_object()
                            .map(|o| o.keys().map(String::as_str).collect())
                            .unwrap_or_default();
                        println!("   {}: keys = [{}]", symbol, keys.join(", "));
                        let is_valid = payload.get("is_valid").and_then(|v| v.as_bool());
                        let message = payload.get("message").and_then(|v| v.as_str());
                        if is_valid.is_some() || message.is_some() {
                            println!(
                                "      is_valid={:?}, message={:?}",
                                is_valid, message
                            );
                        }
                    }
                    Err(e) => println!("   {}: no debug data ({})", symbol, e),
                }
            }
        }

        _ => {
            println!("📋 Available commands:");
            println!("   status   - Show row counts and the latest run timestamp");
            println!("   preview  - Print current snapshot rows");
            println!("   check    - Run consistency checks on the snapshot tables");
            println!("   missing  - List master tickers absent from the current snapshot");
            println!("\nExamples:");
            println!("   cargo run --bin db-check -- status");
            println!("   cargo run --bin db-check -- --db fiindo.db preview --limit 25");
        }
    }

    Ok(())
}

fn fmt_opt(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => "-".to_string(),
    }
}
