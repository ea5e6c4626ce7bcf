use clap::{Parser, Subcommand};
use market_sim::config::{EngineConfig, GeneratorConfig};
use market_sim::engine::Engine;
use market_sim::generator::BackgroundGenerator;
use market_sim::logger::EventLog;
use market_sim::metrics::Metrics;
use market_sim::orders::OrderIds;
use market_sim::ui::Ui;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "market-sim")]
#[command(
    version = "0.1",
    about = "A single-instrument limit-order-book matching simulator"
)]
struct Cli {
    /// Matching worker threads (default: max(4, hardware threads))
    #[arg(long)]
    workers: Option<usize>,

    /// Background order flow, orders per second
    #[arg(long, default_value_t = 500.0)]
    rate: f64,

    /// Price-collar half-width in basis points (500 = 5%)
    #[arg(long, default_value_t = 500)]
    collar_bps: u64,

    /// Directory for the CSV audit logs
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Tracing level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine with background flow and the interactive prompt
    Interactive,
    /// Headless run: background flow only, report at the end
    Simulate {
        /// Seconds to run
        secs: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // tracing goes to stderr so the interactive prompt owns stdout
    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = EngineConfig::default();
    if let Some(workers) = cli.workers {
        config.workers = workers.max(1);
    }
    config.collar_bps = cli.collar_bps;

    let metrics = Arc::new(Metrics::new());
    let log = Arc::new(EventLog::open(&cli.log_dir));
    let ids = Arc::new(OrderIds::new());

    let mut engine = Engine::start(&config, metrics.clone(), log);
    let generator_config = GeneratorConfig {
        rate_hz: cli.rate,
        ..GeneratorConfig::default()
    };
    let mut generator = BackgroundGenerator::start(
        generator_config,
        engine.handle(),
        engine.last_trade(),
        ids.clone(),
        metrics.clone(),
    );

    match cli.command {
        Commands::Interactive => {
            println!(
                "Engine running: {} workers, collar {}bps, ~{} background orders/s",
                config.workers, config.collar_bps, cli.rate
            );
            let ui = Ui::new(
                engine.handle(),
                engine.book(),
                engine.last_trade(),
                ids,
                metrics.clone(),
                config.collar_bps,
            );
            ui.run();
        }
        Commands::Simulate { secs } => {
            tracing::info!(secs, "headless simulation running");
            std::thread::sleep(Duration::from_secs(secs));
        }
    }

    generator.stop();
    engine.stop();
    print!("{}", metrics.report());
    Ok(())
}
