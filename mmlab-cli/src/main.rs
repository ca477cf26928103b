//! MMLab CLI — backtests, market inspection, and cache management.
//!
//! Commands:
//! - `backtest` — run the volatility market-maker over one market's history
//! - `info` — show a market's metadata
//! - `cache status` — report cached markets, index state, and sizes
//! - `cache clear` — drop all cached artifacts

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use mmlab_core::data::MarketDataStore;
use mmlab_runner::{run_market_backtest, BacktestConfig, StrategyParams};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mmlab", about = "MMLab CLI — volatility market-maker backtesting")]
struct Cli {
    /// Root of the partitioned trade source.
    #[arg(long, default_value = "data")]
    data_root: PathBuf,

    /// Local cache directory.
    #[arg(long, default_value = ".cache/mmlab")]
    cache_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest over one market's trade history.
    Backtest {
        /// Market condition id.
        market_id: String,

        /// Path to a TOML strategy config; defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Initial capital.
        #[arg(long, default_value_t = 10_000.0)]
        capital: f64,

        /// Start of the simulated range (YYYY-MM-DDTHH:MM:SS).
        #[arg(long)]
        start: Option<String>,

        /// End of the simulated range (YYYY-MM-DDTHH:MM:SS).
        #[arg(long)]
        end: Option<String>,

        /// Write the full result JSON here.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show a market's metadata.
    Info {
        /// Market condition id.
        market_id: String,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cache contents and sizes.
    Status,
    /// Remove all cached artifacts; the next run rebuilds from source.
    Clear,
}

fn parse_datetime(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| {
            chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(|d| d.and_hms_opt(0, 0, 0).unwrap())
        })
        .with_context(|| format!("invalid datetime '{raw}', expected YYYY-MM-DD[THH:MM:SS]"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut store = MarketDataStore::new(&cli.data_root, &cli.cache_dir);

    match cli.command {
        Commands::Backtest {
            market_id,
            config,
            capital,
            start,
            end,
            output,
        } => {
            let params = match config {
                Some(path) => StrategyParams::from_toml_file(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => StrategyParams::default(),
            };
            if capital <= 0.0 {
                bail!("--capital must be positive");
            }

            let config = BacktestConfig {
                params,
                initial_capital: capital,
                start: start.as_deref().map(parse_datetime).transpose()?,
                end: end.as_deref().map(parse_datetime).transpose()?,
            };

            let result = run_market_backtest(&mut store, &market_id, &config)
                .with_context(|| format!("backtest for {market_id}"))?;

            println!("Backtest: {market_id}");
            if let (Some(start), Some(end)) = (result.start, result.end) {
                println!("  range:        {start} .. {end}");
            }
            println!("  total pnl:    {:.4}", result.stats.total_pnl);
            println!("  return:       {:.2}%", result.stats.return_pct);
            println!("  sharpe:       {:.3}", result.stats.sharpe_ratio);
            println!("  max drawdown: {:.4}", result.stats.max_drawdown);
            println!(
                "  trades:       {} ({} wins / {} losses, win rate {:.1}%)",
                result.stats.total_trades,
                result.stats.winning_trades,
                result.stats.losing_trades,
                result.stats.win_rate * 100.0
            );

            if let Some(path) = output {
                result
                    .save_json(&path)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("  result saved to {}", path.display());
            }
        }
        Commands::Info { market_id } => match store.get_market_info(&market_id) {
            Some(info) => {
                println!("{}", serde_json::to_string_pretty(&info)?);
            }
            None => bail!("market '{market_id}' not found in metadata"),
        },
        Commands::Cache { action } => match action {
            CacheAction::Status => {
                let stats = store.cache_stats();
                println!("Cache: {}", stats.cache_dir);
                println!("  markets cached: {}", stats.markets_cached);
                println!("  index present:  {}", stats.index_exists);
                println!("  trades cached:  {}", stats.trades_cached);
                println!("  trades size:    {:.2} MB", stats.total_cache_size_mb);
                println!("  markets size:   {:.2} MB", stats.markets_cache_size_mb);
            }
            CacheAction::Clear => {
                store.clear_cache();
                println!("cache cleared");
            }
        },
    }

    Ok(())
}
