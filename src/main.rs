//! Alt Rotator - Main Entry Point
//!
//! Runs the rotation loop against Binance, live or paper.

use alt_rotator::config::{Config, RotationMode, SnapshotSource};
use alt_rotator::exchange::{
    BinanceClient, BinanceKlineStream, Exchange, PaperExchange, PaperState,
};
use alt_rotator::market::{
    CandleCache, RestSnapshotProvider, SnapshotProvider, StreamSnapshotProvider,
};
use alt_rotator::persistence::{BotState, JsonFile};
use alt_rotator::strategy::Rotator;
use alt_rotator::utils::decimal::pct_to_fraction;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Alt Rotator CLI
#[derive(Parser)]
#[command(name = "alt-rotator")]
#[command(version, about = "Single-position quote/alt rotation on Binance")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the persisted rotator state
    Status {
        /// Path to the state file (default: persistence.state_path)
        #[arg(short, long)]
        state: Option<String>,
    },

    /// Validate configuration and exit
    CheckConfig,
}

type PaperHandle = (Arc<PaperExchange<BinanceClient>>, JsonFile<PaperState>);
type SnapshotHandle = (Box<dyn SnapshotProvider>, Option<JoinHandle<()>>);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    let config = Config::load()?;

    match cli.command {
        Some(Commands::Status { state }) => {
            let path = state.or_else(|| config.persistence.state_path.clone());
            return show_status(path.as_deref());
        }
        Some(Commands::CheckConfig) => {
            config.validate().context("Invalid configuration")?;
            log_config(&config);
            info!("✅ Configuration is valid");
            return Ok(());
        }
        None => {}
    }

    config.validate().context("Invalid configuration")?;
    run(config).await
}

async fn run(config: Config) -> Result<()> {
    info!("╔════════════════════════════════════════════════════════════╗");
    info!(
        "║              Alt Rotator v{}                            ║",
        env!("CARGO_PKG_VERSION")
    );
    info!("╚════════════════════════════════════════════════════════════╝");

    if config.binance.live_trading {
        warn!("⚠️  LIVE TRADING MODE - Real money at risk!");
    } else {
        info!("📝 PAPER TRADING MODE - Simulated fills against live prices");
    }
    log_config(&config);

    let client = BinanceClient::new(&config.binance)?;

    let live = config.binance.live_trading;
    let (exchange, paper): (Arc<dyn Exchange>, Option<PaperHandle>) = if live {
        (Arc::new(client), None)
    } else {
        let paper = Arc::new(
            PaperExchange::new(
                client,
                &config.rotation.quote_asset,
                config.persistence.paper_initial_balance,
            )
            .with_fee_rate(pct_to_fraction(config.execution.fee_pct)),
        );
        let store: JsonFile<PaperState> = JsonFile::new(&config.persistence.paper_state_path);
        if store.exists() {
            paper.restore_state(store.load()?).await;
            info!("📂 [PERSISTENCE] Paper wallet restored");
        } else {
            info!(
                "📂 [PERSISTENCE] No paper wallet found, starting with {} {}",
                config.persistence.paper_initial_balance, config.rotation.quote_asset
            );
        }
        (paper.clone() as Arc<dyn Exchange>, Some((paper, store)))
    };

    let (snapshots, stream): SnapshotHandle = match config.market.source {
        SnapshotSource::Rest => (
            Box::new(RestSnapshotProvider::new(exchange.clone(), config.market.window)),
            None,
        ),
        SnapshotSource::Stream => {
            let interval = config
                .market
                .window
                .interval()
                .context("Streaming snapshots need a candle window")?;
            let cache = CandleCache::new();
            let handle = BinanceKlineStream::new(config.binance.testnet).spawn(
                &config.rotation.symbols,
                interval,
                cache.clone(),
            )?;
            (Box::new(StreamSnapshotProvider::new(cache, interval)), Some(handle))
        }
    };

    let store = config
        .persistence
        .state_path
        .as_ref()
        .map(JsonFile::<BotState>::new);

    let mut rotator = Rotator::new(exchange, snapshots, &config, store);
    rotator.initialize().await.context("Failed to initialize rotator")?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Shutdown signal received");
        shutdown_clone.store(true, Ordering::SeqCst);
    });

    let interval = Duration::from_secs(config.execution.cycle_interval_secs);
    let cooldown = interval * config.execution.error_cooldown_multiplier;
    let mut cycle: u64 = 0;
    let mut errors: u64 = 0;

    info!("🚀 Starting rotation loop...");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    while !shutdown.load(Ordering::SeqCst) {
        cycle += 1;

        let wait = match rotator.run_cycle().await {
            Ok(report) => {
                debug!(
                    cycle,
                    position = %report.position,
                    scored = report.scored,
                    equity = %report.equity,
                    "Cycle complete"
                );
                interval
            }
            Err(e) => {
                errors += 1;
                error!("❌ [CYCLE] #{} failed: {:#}", cycle, e);
                cooldown
            }
        };

        if let Some(paper) = &paper {
            save_paper_state(paper).await;
        }

        tokio::time::sleep(wait).await;
    }

    if let Some(handle) = stream {
        handle.abort();
    }
    if let Some(paper) = &paper {
        save_paper_state(paper).await;
    }

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!(
        "🏁 Stopped after {} cycles ({} failed). Position: {}, realized PnL: {}",
        cycle,
        errors,
        rotator.position(),
        rotator.state().realized_pnl
    );

    Ok(())
}

async fn save_paper_state((paper, store): &PaperHandle) {
    let state = paper.export_state().await;
    if let Err(e) = store.save(&state) {
        warn!("⚠️  [PERSISTENCE] Failed to save paper wallet: {:#}", e);
    }
}

/// Initialize logging to stdout and an hourly rolling file.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "alt-rotator.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the writer alive for the whole process
    Box::leak(Box::new(guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("alt_rotator=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    let rotation = &config.rotation;
    info!("📋 Configuration:");
    info!("   Quote Asset: {}", rotation.quote_asset);
    info!("   Pairs: {}", rotation.symbols.join(", "));
    info!("   Selection: {:?} (weight {})", rotation.selection, rotation.score_weight);
    info!("   Capital Fraction: {}", rotation.capital_fraction);
    match rotation.mode {
        RotationMode::TakeProfitStopLoss => info!(
            "   Mode: take-profit {}% / stop-loss {}%",
            rotation.take_profit_pct, rotation.stop_loss_pct
        ),
        RotationMode::Edge => info!(
            "   Mode: edge >= {}% (cost floor {}%)",
            rotation.min_edge_pct,
            config.execution.edge_floor_pct()
        ),
    }
    info!(
        "   Snapshots: {:?} over {}",
        config.market.source, config.market.window
    );
    if config.margin.enabled {
        info!("   Cross Margin: {}x", config.margin.leverage);
    }
    info!("   Cycle Interval: {}s", config.execution.cycle_interval_secs);
    if config.limits.max_trades_per_day > 0 || config.limits.max_losses_per_day > 0 {
        info!(
            "   Daily Limits: {} trades / {} losses (0 = unlimited)",
            config.limits.max_trades_per_day, config.limits.max_losses_per_day
        );
    }
}

/// Print the persisted rotator state.
fn show_status(path: Option<&str>) -> Result<()> {
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║              ALT ROTATOR STATUS                            ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    let Some(path) = path else {
        println!("\n❌ State persistence is disabled (persistence.state_path unset).");
        return Ok(());
    };

    if !Path::new(path).exists() {
        println!("\n❌ State file not found: {}", path);
        println!("   The rotator has not been started yet, or the path is incorrect.");
        return Ok(());
    }

    let state = JsonFile::<BotState>::new(path).load()?;

    println!("\n📊 Position");
    match (&state.holding, state.entry_price) {
        (Some(symbol), Some(entry)) => {
            println!("   ├─ Holding:      {}", symbol);
            println!("   └─ Entry Price:  {}", entry);
        }
        _ => println!("   └─ Holding:      quote"),
    }
    if let Some(symbol) = &state.unsettled_order {
        println!("\n⚠️  Unconfirmed order on {}, balances re-read on next start", symbol);
    }

    println!("\n📈 Activity");
    if let Some(equity) = state.equity {
        println!("   ├─ Equity:        {:.4}", equity);
    }
    println!("   ├─ Realized PnL:  {:.4}", state.realized_pnl);
    println!("   ├─ Total Trades:  {}", state.total_trades);
    if let Some(day) = state.trading_day {
        println!(
            "   ├─ Today ({}): {} trades, {} losses",
            day, state.trades_today, state.losses_today
        );
    }
    match state.last_trade_at {
        Some(ts) => println!("   └─ Last Trade:    {}", ts.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("   └─ Last Trade:    never"),
    }

    println!();
    Ok(())
}
