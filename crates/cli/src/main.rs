//! Netprobe CLI - probe many addresses concurrently, one log file per address

mod console;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tabled::{Table, Tabled};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use netprobe_core::application::constants::{
    DEFAULT_REPEAT_COUNT, MAX_REPEAT_COUNT, STOP_DRAIN_TIMEOUT,
};
use netprobe_core::application::{SessionContext, SessionRegistry};
use netprobe_core::domain::{BannerLocale, PingCommandFactory, SessionSnapshot};
use netprobe_core::port::SystemClock;
use netprobe_infra_system::{
    host_encoding, lingering, FileLogStore, SubprocessRunner, SubprocessRunnerConfig,
};

use console::ConsoleSink;

const DEFAULT_LOG_FILTER: &str = "netprobe=info,netprobe_core=info,netprobe_infra_system=info";

#[derive(Parser, Debug)]
#[command(name = "netprobe")]
#[command(about = "Ping many addresses at once and log each one to its own file", long_about = None)]
#[command(version)]
struct Cli {
    /// Addresses to probe (host names, IPv4 or IPv6)
    addresses: Vec<String>,

    /// Echo requests per address
    #[arg(
        short = 'c',
        long,
        env = "NETPROBE_COUNT",
        default_value_t = DEFAULT_REPEAT_COUNT,
        value_parser = clap::value_parser!(u32).range(1..=MAX_REPEAT_COUNT as i64)
    )]
    count: u32,

    /// File with one address per line (blank lines and `#` comments ignored)
    #[arg(short = 'f', long)]
    targets_file: Option<PathBuf>,

    /// Directory that receives the log files
    #[arg(long, env = "NETPROBE_LOG_DIR", default_value = ".")]
    log_dir: String,

    /// Banner language (en, zh). Defaults to the one implied by LANG.
    #[arg(long, env = "NETPROBE_LOCALE")]
    locale: Option<BannerLocale>,

    /// Milliseconds between SIGTERM and SIGKILL when stopping (0 = kill at once)
    #[arg(long, env = "NETPROBE_STOP_GRACE_MS", default_value_t = 0)]
    stop_grace_ms: u64,

    /// Print the final summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Tabled)]
struct SummaryRow {
    address: String,
    state: String,
    outcome: String,
    log: String,
}

impl From<&SessionSnapshot> for SummaryRow {
    fn from(snapshot: &SessionSnapshot) -> Self {
        Self {
            address: snapshot.address.clone(),
            state: snapshot.state.to_string(),
            outcome: snapshot
                .outcome
                .as_ref()
                .map_or_else(|| "-".to_string(), |o| o.to_string()),
            log: snapshot
                .log_path
                .as_ref()
                .map_or_else(|| "-".to_string(), |p| p.display().to_string()),
        }
    }
}

fn init_tracing() -> Result<()> {
    let log_format =
        std::env::var("NETPROBE_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))
        .context("Failed to create env filter")?;

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()
                .context("Failed to install tracing subscriber")?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init()
                .context("Failed to install tracing subscriber")?;
        }
    }

    Ok(())
}

/// Addresses from a targets file body: trimmed, blanks and `#` comments dropped
fn parse_target_lines(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Positional addresses (trimmed, blanks dropped) followed by file addresses
fn collect_addresses(positional: &[String], from_file: Vec<String>) -> Vec<String> {
    positional
        .iter()
        .map(|address| address.trim())
        .filter(|address| !address.is_empty())
        .map(str::to_string)
        .chain(from_file)
        .collect()
}

fn read_targets_file(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read targets file {}", path.display()))?;
    Ok(parse_target_lines(&contents))
}

fn resolve_locale(flag: Option<BannerLocale>) -> BannerLocale {
    flag.unwrap_or_else(|| BannerLocale::from_lang(&std::env::var("LANG").unwrap_or_default()))
}

fn print_summary(snapshots: &[SessionSnapshot], json: bool) -> Result<()> {
    if json {
        let body =
            serde_json::to_string_pretty(snapshots).context("Failed to serialize summary")?;
        println!("{}", body);
        return Ok(());
    }

    let rows: Vec<SummaryRow> = snapshots.iter().map(SummaryRow::from).collect();
    println!();
    println!("{}", Table::new(rows));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing()?;

    // 1. Collect addresses (positional first, then the targets file)
    let from_file = match &cli.targets_file {
        Some(path) => read_targets_file(path)?,
        None => Vec::new(),
    };
    let addresses = collect_addresses(&cli.addresses, from_file);
    if addresses.is_empty() {
        anyhow::bail!("at least one address is required");
    }

    // 2. Wire adapters (DI)
    let log_dir = PathBuf::from(shellexpand::tilde(&cli.log_dir).into_owned());
    let locale = resolve_locale(cli.locale);
    let encoding = host_encoding();
    let runner = SubprocessRunner::new(SubprocessRunnerConfig {
        stop_grace: Duration::from_millis(cli.stop_grace_ms),
        encoding,
    });
    let context = SessionContext {
        runner: Arc::new(runner),
        log_store: Arc::new(FileLogStore::new(&log_dir)),
        commands: Arc::new(PingCommandFactory::default()),
        clock: Arc::new(SystemClock),
        locale,
    };

    info!(
        version = netprobe_core::VERSION,
        targets = addresses.len(),
        count = cli.count,
        log_dir = %log_dir.display(),
        output_encoding = encoding.name(),
        "netprobe starting"
    );

    let sink = Arc::new(ConsoleSink::new());
    let registry = SessionRegistry::new(context, sink.clone());

    // 3. Run until every probe finishes or the user interrupts
    let handle = registry
        .start_run(&addresses, cli.count)
        .context("Invalid probe request")?;

    let interrupted = tokio::select! {
        _ = handle.wait() => false,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            true
        }
    };

    if interrupted {
        eprintln!("{}", "Interrupted, stopping probes...".yellow());
        registry.stop_run();
        if tokio::time::timeout(STOP_DRAIN_TIMEOUT, handle.wait())
            .await
            .is_err()
        {
            let pids = lingering(handle.snapshot().iter().filter_map(|s| s.pid));
            warn!(
                completed = handle.completed(),
                total = handle.total(),
                lingering_pids = ?pids,
                "Some sessions did not unwind in time"
            );
        }
    }

    // 4. Report
    print_summary(&handle.snapshot(), cli.json)?;
    info!(
        run_id = %handle.run_id(),
        failures = sink.failures(),
        "netprobe finished"
    );

    Ok(())
}
