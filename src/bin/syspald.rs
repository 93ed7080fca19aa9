//! syspald - system inventory agent.
//!
//! Enumerates memory, OS, firmware, processors, disks, network interfaces and
//! installed packages on a fixed interval and logs (or prints) a snapshot of
//! each cycle.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use tracing::{debug, error, info, warn};

#[cfg(not(target_os = "linux"))]
use syspal::collector::MockFs;
#[cfg(target_os = "linux")]
use syspal::collector::RealFs;
use syspal::collector::{FileSystem, Inventory, InventorySnapshot};
use syspal::config::Config;
use syspal::logging::init_logging;

/// System inventory agent.
#[derive(Parser)]
#[command(name = "syspald", about = "System inventory agent", version)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Update interval in seconds (overrides the configuration).
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    interval: Option<u64>,

    /// Stop after this many updates.
    #[arg(short = 'n', long)]
    count: Option<u64>,

    /// Print every snapshot as a JSON line on stdout.
    #[arg(long)]
    json: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Describes the contents of a snapshot for logging.
fn describe_snapshot(snapshot: &InventorySnapshot) -> String {
    let mut parts = vec![
        format!("{} cpus", snapshot.cpu.instances.len()),
        format!("{} disks", snapshot.disk.instances.len()),
        format!("{} interfaces", snapshot.network.instances.len()),
        format!("{} packages", snapshot.software.instances.len()),
    ];

    let failed = snapshot.memory.failed()
        + snapshot.os.failed()
        + snapshot.bios.failed()
        + snapshot.cpu.failed()
        + snapshot.disk.failed()
        + snapshot.network.failed()
        + snapshot.software.failed();
    if failed > 0 {
        parts.push(format!("{} failed instances", failed));
    }

    let errors: Vec<&str> = [
        ("memory", &snapshot.memory.error),
        ("os", &snapshot.os.error),
        ("bios", &snapshot.bios.error),
        ("cpu", &snapshot.cpu.error),
        ("disk", &snapshot.disk.error),
        ("network", &snapshot.network.error),
        ("software", &snapshot.software.error),
    ]
    .into_iter()
    .filter(|(_, e)| e.is_some())
    .map(|(kind, _)| kind)
    .collect();
    if !errors.is_empty() {
        parts.push(format!("enumeration failed: {}", errors.join(" ")));
    }

    parts.join(", ")
}

fn run<F: FileSystem + Clone>(
    fs: F,
    config: &Config,
    args: &Args,
    running: &AtomicBool,
) {
    let interval = Duration::from_secs(args.interval.unwrap_or(config.collect.interval_secs).max(1));
    info!(
        "Config: interval={}s, proc={}, sys={}",
        interval.as_secs(),
        config.paths.proc.display(),
        config.paths.sys.display()
    );

    let mut inventory = Inventory::new(fs, config);
    inventory.init();

    let mut tick: u64 = 0;
    info!("Starting update loop");

    while running.load(Ordering::SeqCst) {
        if tick > 0 {
            inventory.update(true);
        }
        tick += 1;

        let snapshot = inventory.snapshot();
        info!("Snapshot #{}: {}", tick, describe_snapshot(&snapshot));
        if let Some(timing) = inventory.last_timing() {
            debug!(
                "Timing: total={:?} cpu={:?} disk={:?} network={:?} software={:?}",
                timing.total, timing.cpu, timing.disk, timing.network, timing.software
            );
        }
        if args.json {
            match serde_json::to_string(&snapshot) {
                Ok(line) => println!("{}", line),
                Err(e) => error!("Failed to serialize snapshot: {}", e),
            }
        }

        if args.count.is_some_and(|n| tick >= n) {
            break;
        }

        // Sleep with periodic checks for shutdown signal
        let sleep_interval = Duration::from_millis(100);
        let mut remaining = interval;
        while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
            let sleep_time = remaining.min(sleep_interval);
            std::thread::sleep(sleep_time);
            remaining = remaining.saturating_sub(sleep_time);
        }
    }

    info!("Shutting down...");
    inventory.cleanup();
}

fn main() {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("syspald: {}", e);
                std::process::exit(2);
            }
        },
        None => Config::default(),
    };

    if let Err(e) = init_logging(&config.log, args.verbose, args.quiet) {
        eprintln!("syspald: {}", e);
        std::process::exit(2);
    }

    info!("syspald {} starting", env!("CARGO_PKG_VERSION"));

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    #[cfg(target_os = "linux")]
    run(RealFs::new(), &config, &args, &running);
    #[cfg(not(target_os = "linux"))]
    run(MockFs::typical_system(), &config, &args, &running);

    info!("syspald stopped");
}
