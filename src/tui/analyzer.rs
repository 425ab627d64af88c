//! Historical chart view for the analysis process.
//!
//! Queries the sample store over a named relative window and renders one
//! line chart per metric (CPU, RAM, GPU, disk throughput). Query failures
//! become an error banner in place of the charts, never a crash.

use std::io;
use std::time::Duration;

use chrono::Utc;
use crossterm::event::KeyCode;
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Frame;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols;
use ratatui::widgets::{Axis, Block, Chart, Dataset, GraphType, Paragraph};

use crate::sample::Sample;
use crate::store::{SampleStore, StoreError, Window};
use crate::util::{format_clock, format_rate};

use super::event::{Event, EventHandler};

/// Window-selection and chart app over the recorded history.
pub struct AnalyzerApp {
    store: Option<SampleStore>,
    window: Window,
    samples: Vec<Sample>,
    error: Option<String>,
    should_quit: bool,
}

impl AnalyzerApp {
    /// Creates the app and loads the initial window. An unopenable store is
    /// shown as an error state rather than refusing to start.
    pub fn new(store: Result<SampleStore, StoreError>, window: Window) -> Self {
        let (store, error) = match store {
            Ok(store) => (Some(store), None),
            Err(e) => (None, Some(e.to_string())),
        };

        let mut app = Self {
            store,
            window,
            samples: Vec::new(),
            error,
            should_quit: false,
        };
        app.reload();
        app
    }

    /// Re-queries the store for the current window.
    fn reload(&mut self) {
        let Some(store) = &self.store else {
            return; // Open failed; keep the startup error visible.
        };

        match store.query_relative(self.window, Utc::now().timestamp_millis()) {
            Ok(samples) => {
                self.samples = samples;
                self.error = None;
            }
            Err(e) => {
                self.samples.clear();
                self.error = Some(e.to_string());
            }
        }
    }

    fn set_window(&mut self, window: Window) {
        self.window = window;
        self.reload();
    }

    /// Runs the chart view until the user quits.
    pub fn run(mut self, tick_rate: Duration) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let events = EventHandler::new(tick_rate);

        loop {
            terminal.draw(|frame| {
                render(frame, self.window, &self.samples, self.error.as_deref())
            })?;

            match events.next() {
                Ok(Event::Tick) | Ok(Event::Resize) => {}
                Ok(Event::Key(key)) => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
                    KeyCode::Char('h') => self.set_window(Window::LastHour),
                    KeyCode::Char('d') => self.set_window(Window::LastDay),
                    KeyCode::Char('w') => self.set_window(Window::LastWeek),
                    KeyCode::Char('a') => self.set_window(Window::All),
                    KeyCode::Char('r') => self.reload(),
                    _ => {}
                },
                Err(_) => self.should_quit = true,
            }

            if self.should_quit {
                break;
            }
        }

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        Ok(())
    }
}

/// Extracts one chart series; x is the timestamp in seconds.
fn series(samples: &[Sample], value: impl Fn(&Sample) -> Option<f64>) -> Vec<(f64, f64)> {
    samples
        .iter()
        .filter_map(|s| value(s).map(|v| (s.timestamp_ms as f64 / 1000.0, v)))
        .collect()
}

/// X bounds in seconds covering all samples, padded when degenerate.
fn x_bounds(samples: &[Sample]) -> [f64; 2] {
    let first = samples.first().map(|s| s.timestamp_ms as f64 / 1000.0);
    let last = samples.last().map(|s| s.timestamp_ms as f64 / 1000.0);
    match (first, last) {
        (Some(a), Some(b)) if b > a => [a, b],
        (Some(a), _) => [a, a + 1.0],
        _ => [0.0, 1.0],
    }
}

fn x_axis_labels(bounds: [f64; 2]) -> Vec<String> {
    let mid = (bounds[0] + bounds[1]) / 2.0;
    [bounds[0], mid, bounds[1]]
        .iter()
        .map(|s| format_clock((*s * 1000.0) as i64))
        .collect()
}

fn render(frame: &mut Frame, window: Window, samples: &[Sample], error: Option<&str>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(8)])
        .split(frame.area());

    let header = format!(
        " window: {}  |  {} samples  |  [h]our [d]ay [w]eek [a]ll  [r]eload  [q]uit",
        window.label(),
        samples.len()
    );
    frame.render_widget(
        Paragraph::new(header).style(Style::default().add_modifier(Modifier::BOLD)),
        chunks[0],
    );

    if let Some(message) = error {
        let banner = Paragraph::new(format!("query failed: {}", message))
            .style(Style::default().fg(Color::Red))
            .block(Block::bordered().title("error"));
        frame.render_widget(banner, chunks[1]);
        return;
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[1]);
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[0]);
    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[1]);

    let bounds = x_bounds(samples);
    let labels = x_axis_labels(bounds);

    render_percent_chart(
        frame,
        top[0],
        "CPU %",
        series(samples, |s| Some(s.cpu_percent)),
        Color::Cyan,
        bounds,
        &labels,
    );
    render_percent_chart(
        frame,
        top[1],
        "GPU %",
        series(samples, |s| s.gpu_percent),
        Color::Red,
        bounds,
        &labels,
    );
    render_percent_chart(
        frame,
        bottom[0],
        "RAM %",
        series(samples, |s| Some(s.ram_percent)),
        Color::Green,
        bounds,
        &labels,
    );
    render_disk_chart(frame, bottom[1], samples, bounds, &labels);
}

fn render_percent_chart(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    data: Vec<(f64, f64)>,
    color: Color,
    bounds: [f64; 2],
    labels: &[String],
) {
    let datasets = vec![
        Dataset::default()
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(color))
            .data(&data),
    ];

    let chart = Chart::new(datasets)
        .block(Block::bordered().title(title.to_string()))
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds(bounds)
                .labels(labels.to_vec()),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([0.0, 100.0])
                .labels(vec!["0".to_string(), "50".to_string(), "100".to_string()]),
        );
    frame.render_widget(chart, area);
}

fn render_disk_chart(
    frame: &mut Frame,
    area: Rect,
    samples: &[Sample],
    bounds: [f64; 2],
    labels: &[String],
) {
    let read = series(samples, |s| Some(s.disk_read_bps));
    let write = series(samples, |s| Some(s.disk_write_bps));

    let peak = read
        .iter()
        .chain(write.iter())
        .map(|(_, v)| *v)
        .fold(0.0_f64, f64::max);
    // Headroom above the peak so the top of the trace stays visible.
    let y_max = if peak > 0.0 { peak * 1.1 } else { 1.0 };

    let datasets = vec![
        Dataset::default()
            .name("read")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Magenta))
            .data(&read),
        Dataset::default()
            .name("write")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Yellow))
            .data(&write),
    ];

    let chart = Chart::new(datasets)
        .block(Block::bordered().title("Disk R/W"))
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds(bounds)
                .labels(labels.to_vec()),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([0.0, y_max])
                .labels(vec![
                    format_rate(0.0),
                    format_rate(y_max / 2.0),
                    format_rate(y_max),
                ]),
        );
    frame.render_widget(chart, area);
}
