use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use walkscape_ledger::{
    ledger::LedgerSnapshot,
    market::Market,
    rewards::Rarity,
    scanner::{EnvironmentAnalyzer, ImagePayload, OfflineAnalyzer},
    sim::{demo_script, ScriptStep, Simulation, StepReport, DEFAULT_START_MS},
    LedgerConfig,
};

#[derive(Parser)]
#[command(name = "walkscape")]
#[command(version)]
#[command(about = "WalkScape GUI token ledger simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML ledger configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// RNG seed (overrides rng_seed from the config)
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the built-in play-through
    Demo {
        /// Write the report here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Run a JSON script of connect/advance/call steps
    Run {
        script: PathBuf,
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Simulated start time, unix ms
        #[arg(long, default_value_t = DEFAULT_START_MS)]
        start_ms: u64,
    },
    /// Sample jittered GUI prices
    Market {
        #[arg(short = 'n', long, default_value_t = 10)]
        samples: usize,
    },
    /// Roll artifact rarities and print the observed distribution
    Rarity {
        #[arg(short = 'n', long, default_value_t = 10_000)]
        trials: usize,
    },
    /// Classify an image file or data URL
    Scan { image: String },
}

#[derive(Serialize)]
struct RunReport {
    steps: Vec<StepReport>,
    snapshot: LedgerSnapshot,
}

#[derive(Serialize)]
struct RarityRow {
    rarity: Rarity,
    count: usize,
    share: f64,
    gui_value: u64,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn load_config(path: Option<&Path>, seed: Option<u64>) -> anyhow::Result<LedgerConfig> {
    let mut config = match path {
        Some(path) => LedgerConfig::load(path)?,
        None => LedgerConfig::default(),
    };
    if seed.is_some() {
        config.rng_seed = seed;
    }
    Ok(config)
}

fn rng_for(config: &LedgerConfig) -> StdRng {
    match config.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn emit<T: Serialize>(value: &T, out: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).ok();
            }
            let mut f = fs::File::create(path)
                .with_context(|| format!("create {}", path.display()))?;
            f.write_all(json.as_bytes())?;
            println!("Report → {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

//==================== simulation ====================//

fn run_steps(
    config: LedgerConfig,
    start_ms: u64,
    steps: &[ScriptStep],
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let mut sim = Simulation::new(config, start_ms)?;
    let reports = sim.run(steps)?;
    let report = RunReport {
        steps: reports,
        snapshot: sim.snapshot(),
    };
    tracing::info!(state_root = %report.snapshot.state_root, "ledger settled");
    emit(&report, out)
}

fn demo_cmd(config: LedgerConfig, out: Option<&Path>) -> anyhow::Result<()> {
    run_steps(config, DEFAULT_START_MS, &demo_script(), out)
}

fn run_cmd(config: LedgerConfig, script: &Path, start_ms: u64, out: Option<&Path>) -> anyhow::Result<()> {
    let json = fs::read_to_string(script)
        .with_context(|| format!("read script {}", script.display()))?;
    let steps = Simulation::parse_script(&json)?;
    tracing::info!(steps = steps.len(), script = %script.display(), "running script");
    run_steps(config, start_ms, &steps, out)
}

//==================== market / rarity ====================//

fn market_cmd(config: LedgerConfig, samples: usize) -> anyhow::Result<()> {
    let mut rng = rng_for(&config);
    let mut market = Market::new(&config);
    let quotes: Vec<_> = (0..samples)
        .map(|i| market.market_data(&mut rng, i as u64))
        .collect();
    emit(&quotes, None)
}

fn rarity_cmd(config: LedgerConfig, trials: usize) -> anyhow::Result<()> {
    let mut rng = rng_for(&config);
    let mut counts = vec![0usize; Rarity::ALL.len()];
    for _ in 0..trials {
        let rarity = Rarity::roll(&mut rng);
        if let Some(idx) = Rarity::ALL.iter().position(|r| *r == rarity) {
            counts[idx] += 1;
        }
    }
    let rows: Vec<RarityRow> = Rarity::ALL
        .iter()
        .zip(counts)
        .map(|(rarity, count)| RarityRow {
            rarity: *rarity,
            count,
            share: if trials == 0 { 0.0 } else { count as f64 / trials as f64 },
            gui_value: rarity.gui_value(),
        })
        .collect();
    emit(&rows, None)
}

//==================== scanner ====================//

fn scan_cmd(image: &str) -> anyhow::Result<()> {
    let path = Path::new(image);
    let payload = if path.is_file() {
        let bytes = fs::read(path).with_context(|| format!("read image {}", path.display()))?;
        let data_url = std::str::from_utf8(&bytes)
            .ok()
            .filter(|text| text.trim_start().starts_with("data:"))
            .map(str::to_owned);
        match data_url {
            Some(text) => ImagePayload::from_data_url(&text)?,
            None => ImagePayload { mime: None, bytes },
        }
    } else {
        ImagePayload::from_data_url(image)?
    };
    let analyzer = OfflineAnalyzer;
    tracing::debug!(analyzer = analyzer.name(), bytes = payload.bytes.len(), "scanning");
    let result = analyzer.analyze(&payload);
    emit(&result, None)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = load_config(cli.config.as_deref(), cli.seed)?;

    match cli.command {
        Commands::Demo { out } => demo_cmd(config, out.as_deref()),
        Commands::Run {
            script,
            out,
            start_ms,
        } => run_cmd(config, &script, start_ms, out.as_deref()),
        Commands::Market { samples } => market_cmd(config, samples),
        Commands::Rarity { trials } => rarity_cmd(config, trials),
        Commands::Scan { image } => scan_cmd(&image),
    }
}
