//! metrologd - host metrics collector daemon.
//!
//! Samples CPU, RAM, GPU and disk throughput at a fixed interval, appends
//! every sample to the SQLite history file and mirrors the latest sample to
//! a live dashboard. Runs until interrupted; only a database that cannot be
//! created or opened at startup is fatal.

use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

use metrolog::collector::{CollectorLoop, SamplePublisher};
#[cfg(not(target_os = "linux"))]
use metrolog::sensor::MockFs;
use metrolog::sensor::MetricSource;
#[cfg(target_os = "linux")]
use metrolog::sensor::RealFs;
use metrolog::store::{DEFAULT_DB_NAME, SampleStore};
use metrolog::tui::DashboardApp;

/// Host metrics collector daemon.
#[derive(Parser)]
#[command(name = "metrologd", about = "Host metrics collector daemon", version)]
struct Args {
    /// Collection interval in seconds.
    #[arg(short, long, default_value = "1")]
    interval: u64,

    /// Path to the metrics database file.
    #[arg(long, default_value = DEFAULT_DB_NAME)]
    db: String,

    /// Path to the proc filesystem (for testing/mocking).
    #[arg(long, default_value = "/proc")]
    proc_path: String,

    /// Path to the DRM sysfs tree used for GPU discovery.
    #[arg(long, default_value = "/sys/class/drm")]
    drm_path: String,

    /// Run without the live dashboard (logs only).
    #[arg(long)]
    headless: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("metrologd={}", level).parse().unwrap())
        .add_directive(format!("metrolog={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() {
    let args = Args::parse();

    // The dashboard owns the terminal through the alternate screen, so the
    // stderr subscriber is only installed in headless mode.
    if args.headless {
        init_logging(args.verbose, args.quiet);
    }

    let store = match SampleStore::open(&args.db) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    #[cfg(target_os = "linux")]
    let source = MetricSource::new(RealFs::new(), &args.proc_path, &args.drm_path);
    #[cfg(not(target_os = "linux"))]
    let source = MetricSource::new(MockFs::typical_host(), &args.proc_path, &args.drm_path);

    info!("metrologd {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: interval={}s, db={}, proc={}",
        args.interval, args.db, args.proc_path
    );
    if source.gpu_available() {
        info!("GPU sensor: found");
    } else {
        info!("GPU sensor: none, gpu_percent recorded as null");
    }

    let running = Arc::new(AtomicBool::new(true));
    {
        let r = running.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            r.store(false, Ordering::SeqCst);
        }) {
            warn!("Failed to set Ctrl-C handler: {}", e);
        }
    }

    let publisher = Arc::new(SamplePublisher::new());
    let rx = publisher.subscribe();
    let mut collector = CollectorLoop::new(source, store, publisher);

    let period = Duration::from_secs(args.interval.max(1));
    let collector_running = running.clone();
    let handle = match thread::Builder::new()
        .name("collector".to_string())
        .spawn(move || collector.run(period, &collector_running))
    {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Error: cannot start collector thread: {}", e);
            process::exit(1);
        }
    };

    info!("Starting collection loop");

    if args.headless {
        drop(rx);
        // Sliced wait so the shutdown signal is honored promptly.
        while running.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
        }
    } else {
        let dashboard = DashboardApp::new(rx, running.clone());
        if let Err(e) = dashboard.run(Duration::from_millis(250)) {
            eprintln!("Error running dashboard: {}", e);
        }
    }

    running.store(false, Ordering::SeqCst);
    if handle.join().is_err() {
        eprintln!("Error: collector thread panicked");
        process::exit(1);
    }

    info!("Shutdown complete");
}
