//! Terminal user interfaces.
//!
//! Two small apps share the event pump: the collector's live dashboard
//! (latest sample, one redraw per cycle) and the analyzer's historical
//! chart view (window selection plus line charts).

pub mod analyzer;
pub mod dashboard;
mod event;

pub use analyzer::AnalyzerApp;
pub use dashboard::DashboardApp;
pub use event::{Event, EventHandler};
