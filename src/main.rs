mod config;
mod engine;
mod exchange;
mod indicators;
mod journal;
mod market;
mod risk;
mod strategy;
mod types;

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::EngineConfig;
use engine::{
    run_exit_monitor, run_orchestrator, EngineHandle, EngineState, Orchestrator, PaperVenue,
};
use exchange::{BinanceSource, MarketDataSource};
use indicators::IndicatorSet;
use journal::{Journal, JournalWriter, MemoryJournal, SledJournal};
use market::{run_ingestor, Ingestor, MarketHub};
use strategy::synthesize;
use types::{Interval, Symbol};

#[derive(Parser)]
#[command(name = "scalper")]
#[command(version = "0.1.0")]
#[command(about = "Automated intraday scalping engine with simulated execution", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "scalper.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine against the simulated venue
    Run,
    /// Write a default configuration file
    Init {
        /// Destination path
        #[arg(default_value = "scalper.toml")]
        path: String,
    },
    /// One-shot indicator and signal readout for a symbol
    Analyze {
        /// Symbol to analyze (e.g. BTCUSDT)
        symbol: String,

        /// Candle interval (1m, 5m, 15m)
        #[arg(short, long, default_value = "1m")]
        interval: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("scalper v0.1.0");

    match cli.command {
        Commands::Run => run_engine(&cli.config).await,
        Commands::Init { path } => EngineConfig::write_default(Path::new(&path)),
        Commands::Analyze { symbol, interval } => analyze(&symbol, &interval).await,
    }
}

async fn run_engine(config_path: &str) -> Result<()> {
    let cfg = EngineConfig::load(config_path)?;
    info!(
        "starting engine: {} symbols, ${} balance, {} candles",
        cfg.watchlist.len(),
        cfg.initial_balance,
        cfg.interval()
    );

    let (journal, resume_seq): (Arc<dyn Journal>, u64) = match &cfg.journal_path {
        Some(path) => {
            let sled = SledJournal::open(path)?;
            let resume = sled.last_seq()?.unwrap_or(0);
            if resume > 0 {
                info!("resuming journal at sequence {}", resume);
            }
            (Arc::new(sled), resume)
        }
        None => (Arc::new(MemoryJournal::new()), 0),
    };
    let (journal_writer, journal_task) = JournalWriter::spawn(journal);

    let mut state = EngineState::new(
        cfg.settings.clone(),
        cfg.watchlist.iter().map(|s| Symbol::new(s.as_str())),
        cfg.initial_balance,
        Utc::now(),
    );
    state.next_seq = resume_seq;

    let hub = Arc::new(MarketHub::new());
    let venue = Arc::new(PaperVenue::new(Arc::clone(&hub)));
    let source: Arc<dyn MarketDataSource> = Arc::new(BinanceSource::new());

    let (state_tx, state_rx) = watch::channel(Arc::new(state.clone()));
    let (cmd_tx, cmd_rx) = mpsc::channel(256);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let ingestor = Ingestor::new(source, Arc::clone(&hub), cfg.interval());
    let ingest_task = tokio::spawn(run_ingestor(
        ingestor,
        state_rx.clone(),
        shutdown_rx.clone(),
        Duration::from_secs(cfg.poll_interval_secs),
    ));

    let monitor_task = tokio::spawn(run_exit_monitor(
        Arc::clone(&hub),
        state_rx.clone(),
        cmd_tx.clone(),
        shutdown_rx,
        Duration::from_secs(cfg.exit_interval_secs),
    ));

    let orchestrator = Orchestrator::new(
        state,
        Arc::clone(&hub),
        venue,
        journal_writer,
        state_tx,
        cfg.quantity_precision,
        PathBuf::from(&cfg.crash_file),
    );
    let orchestrator_task = tokio::spawn(run_orchestrator(
        orchestrator,
        cmd_rx,
        shutdown_tx,
        Duration::from_millis(cfg.decision_interval_ms),
    ));

    let handle = EngineHandle::new(cmd_tx, state_rx.clone(), Arc::clone(&hub));
    info!("engine running; press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    info!("shutting down...");
    handle.shutdown().await.ok();

    orchestrator_task.await?;
    ingest_task.await?;
    monitor_task.await?;
    drop(handle);
    journal_task.await?;

    let final_state = Arc::clone(&state_rx.borrow());
    println!("\n=== Final Results ===");
    println!("Trading Balance:  ${:.2}", final_state.trading_balance);
    println!("Available:        ${:.2}", final_state.available_balance);
    println!("Total P&L:        ${:.2}", final_state.total_pnl);
    println!("Day P&L:          ${:.2}", final_state.day_pnl);
    println!("Trades:           {}", final_state.trades_count);

    Ok(())
}

async fn analyze(symbol: &str, interval: &str) -> Result<()> {
    let interval = Interval::parse(interval)
        .ok_or_else(|| anyhow!("invalid interval: {} (use 1m, 5m or 15m)", interval))?;
    let symbol = Symbol::new(symbol);
    let source = BinanceSource::new();

    let candles = source.history(&symbol, interval, 200).await?;
    if candles.is_empty() {
        bail!("no candles returned for {}", symbol);
    }
    let price = candles.last().map(|c| c.close).expect("non-empty");
    let set = IndicatorSet::compute(&candles, Utc::now());
    let signal = synthesize(&set, price);

    println!("\n--- {} ({} candles @ {}) ---", symbol, candles.len(), interval);
    println!("Price:     ${}", price);
    if let Some(rsi) = set.rsi {
        println!("RSI(14):   {:.1}", rsi);
    }
    if let (Some(e9), Some(e21)) = (set.ema9, set.ema21) {
        println!("EMA9/21:   {:.2} / {:.2}", e9, e21);
    }
    if let (Some(e50), Some(e200)) = (set.ema50, set.ema200) {
        println!("EMA50/200: {:.2} / {:.2}", e50, e200);
    }
    if let Some(vwap) = set.vwap {
        println!("VWAP:      {:.2}", vwap);
    }
    if let (Some(low), Some(high)) = (set.swing_low, set.swing_high) {
        println!("Swings:    {:.2} / {:.2}", low, high);
    }
    if let Some(ratio) = set.volume_ratio() {
        println!("Vol ratio: {:.2}x", ratio);
    }
    println!(
        "Signal:    {} ({:.0}% confidence, {})",
        signal.signal, signal.confidence, signal.reason
    );

    Ok(())
}
