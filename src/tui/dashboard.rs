//! Live dashboard for the collector process.
//!
//! Subscribes to the collector's latest-sample stream and redraws once per
//! collection cycle. Quitting the dashboard stops the whole collector
//! process via the shared run flag.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Frame;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Cell, Paragraph, Row, Table};

use crate::sample::Sample;
use crate::util::{format_clock, format_percent, format_percent_opt, format_rate};

use super::event::{Event, EventHandler};

/// Live view of the most recent sample.
pub struct DashboardApp {
    rx: Receiver<Sample>,
    running: Arc<AtomicBool>,
    latest: Option<Sample>,
    cycles: u64,
    should_quit: bool,
}

impl DashboardApp {
    /// Creates a dashboard over a subscription channel. `running` is the
    /// collector's stop flag, shared so either side can end the process.
    pub fn new(rx: Receiver<Sample>, running: Arc<AtomicBool>) -> Self {
        Self {
            rx,
            running,
            latest: None,
            cycles: 0,
            should_quit: false,
        }
    }

    /// Runs the dashboard until the user quits or the collector stops.
    pub fn run(mut self, tick_rate: Duration) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let events = EventHandler::new(tick_rate);

        loop {
            self.drain_samples();
            terminal.draw(|frame| render(frame, self.latest.as_ref(), self.cycles))?;

            match events.next() {
                Ok(Event::Tick) | Ok(Event::Resize) => {}
                Ok(Event::Key(key)) => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        self.should_quit = true;
                    }
                    _ => {}
                },
                Err(_) => self.should_quit = true,
            }

            if !self.running.load(Ordering::SeqCst) {
                self.should_quit = true;
            }
            if self.should_quit {
                break;
            }
        }

        // Stop the collector along with the view.
        self.running.store(false, Ordering::SeqCst);

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        Ok(())
    }

    /// Takes everything queued since the last redraw; the newest sample
    /// wins, older ones only bump the cycle counter.
    fn drain_samples(&mut self) {
        while let Ok(sample) = self.rx.try_recv() {
            self.latest = Some(sample);
            self.cycles += 1;
        }
    }
}

/// Label/value rows for the metric table.
fn metric_rows(sample: &Sample) -> Vec<(&'static str, String)> {
    vec![
        ("CPU", format_percent(sample.cpu_percent)),
        ("GPU", format_percent_opt(sample.gpu_percent)),
        ("RAM", format_percent(sample.ram_percent)),
        ("Read", format_rate(sample.disk_read_bps)),
        ("Write", format_rate(sample.disk_write_bps)),
    ]
}

fn render(frame: &mut Frame, latest: Option<&Sample>, cycles: u64) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(7), Constraint::Length(1)])
        .split(frame.area());

    let rows: Vec<Row> = match latest {
        Some(sample) => metric_rows(sample)
            .into_iter()
            .map(|(label, value)| {
                Row::new(vec![
                    Cell::from(label),
                    Cell::from(value).style(Style::default().fg(Color::Cyan)),
                ])
            })
            .collect(),
        None => vec![Row::new(vec![
            Cell::from("waiting"),
            Cell::from("for first sample..."),
        ])],
    };

    let table = Table::new(rows, [Constraint::Length(10), Constraint::Min(12)])
        .header(
            Row::new(vec!["Component", "Usage"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(Block::bordered().title("metrologd - live"));
    frame.render_widget(table, chunks[0]);

    let status = match latest {
        Some(sample) => format!(
            " updated {}  |  {} cycles  |  q quit",
            format_clock(sample.timestamp_ms),
            cycles
        ),
        None => " collecting...  |  q quit".to_string(),
    };
    let footer = Paragraph::new(status).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, chunks[1]);
}
