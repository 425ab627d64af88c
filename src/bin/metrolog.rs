//! metrolog - chart viewer for recorded host metrics.
//!
//! Opens the metrics database written by metrologd read-only and renders
//! line charts over a selectable relative window (last hour / day / week /
//! all). A database that cannot be read is shown as an error state inside
//! the viewer rather than aborting.
//!
//! Usage:
//!   metrolog                   # charts over the last hour
//!   metrolog -w day            # charts over the last day
//!   metrolog --db ./other.db   # different database file

use std::process;
use std::time::Duration;

use clap::Parser;

use metrolog::store::{DEFAULT_DB_NAME, SampleStore, Window};
use metrolog::tui::AnalyzerApp;

/// Host metrics history viewer.
#[derive(Parser)]
#[command(name = "metrolog", about = "Host metrics history viewer", version)]
struct Args {
    /// Path to the metrics database file.
    #[arg(long, default_value = DEFAULT_DB_NAME)]
    db: String,

    /// Initial window: hour, day, week or all.
    #[arg(short, long, default_value = "hour")]
    window: Window,
}

fn main() {
    let args = Args::parse();

    let store = SampleStore::open_read_only(&args.db);
    let app = AnalyzerApp::new(store, args.window);

    if let Err(e) = app.run(Duration::from_secs(1)) {
        eprintln!("Error running viewer: {}", e);
        process::exit(1);
    }
}
