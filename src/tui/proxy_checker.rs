//! TUI for proxy validation with progress display

use crate::proxy::{ProtocolKind, ValidationReport, ValidationResult};
use crate::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::collections::VecDeque;
use std::io;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::Duration;
use tracing::{info, warn};

/// Maximum number of recent results to keep for display
const MAX_RECENT_RESULTS: usize = 100;

/// Proxy validation TUI application state
pub struct ProxyCheckerApp {
    /// Completion channel of the running batch
    rx: mpsc::Receiver<ValidationResult>,
    /// Results recorded so far
    report: ValidationReport,
    /// Total number of candidates in the batch
    total: usize,
    /// Recent valid proxies
    recent_valid: VecDeque<ValidationResult>,
    /// Recent invalid proxies
    recent_invalid: VecDeque<ValidationResult>,
    /// Selected list (0 = valid, 1 = invalid)
    selected_list: usize,
    /// Selected item in current list
    list_state: ListState,
    /// Status message
    status_message: String,
    /// Whether every result has arrived
    is_complete: bool,
    /// Whether the user wants to leave the view
    should_quit: bool,
}

impl ProxyCheckerApp {
    /// Create the view for a batch of `total` candidates streaming into `rx`
    pub fn new(rx: mpsc::Receiver<ValidationResult>, total: usize) -> Self {
        let mut list_state = ListState::default();
        list_state.select(Some(0));

        Self {
            rx,
            report: ValidationReport::new(),
            total,
            recent_valid: VecDeque::new(),
            recent_invalid: VecDeque::new(),
            selected_list: 0,
            list_state,
            status_message: "Checking proxies... Press 'q' to hide this view.".to_string(),
            is_complete: false,
            should_quit: false,
        }
    }

    /// Run the TUI and return the finished report
    ///
    /// Leaving the view early does not stop the batch, and neither does a
    /// terminal error: the remaining results are still collected before
    /// returning.
    pub async fn run(mut self) -> Result<ValidationReport> {
        let outcome = self.run_terminal().await;
        Ok(self.collect_remaining(outcome).await)
    }

    async fn run_terminal(&mut self) -> Result<()> {
        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.run_app(&mut terminal).await;

        // Restore terminal
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result
    }

    /// Drain the channel after the view has closed, however it closed
    async fn collect_remaining(mut self, outcome: Result<()>) -> ValidationReport {
        if let Err(e) = outcome {
            let _ = disable_raw_mode();
            let mut stdout = io::stdout();
            let _ = execute!(stdout, LeaveAlternateScreen, DisableMouseCapture);
            warn!(error = %e, "progress view failed, continuing without it");
        }

        if !self.is_complete {
            info!(
                pending = self.total.saturating_sub(self.report.len()),
                "waiting for remaining probes"
            );
            while let Some(result) = self.rx.recv().await {
                self.report.record(result);
            }
        }

        self.report.finalize()
    }

    async fn run_app<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        loop {
            terminal.draw(|f| self.ui(f))?;

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_input(key.code);
                        if self.should_quit {
                            break;
                        }
                    }
                }
            }

            // drain whatever finished since the last frame
            loop {
                match self.rx.try_recv() {
                    Ok(result) => self.record(result),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        if !self.is_complete {
                            self.is_complete = true;
                            self.status_message = format!(
                                "Complete! Checked: {} | {} | Press 'q' to quit",
                                self.report.len(),
                                self.valid_counts()
                            );
                        }
                        break;
                    }
                }
            }

            // yield so the probe tasks get scheduled on a current-thread runtime
            tokio::task::yield_now().await;
        }

        Ok(())
    }

    fn record(&mut self, result: ValidationResult) {
        let recent = if result.is_valid() {
            &mut self.recent_valid
        } else {
            &mut self.recent_invalid
        };
        recent.push_back(result.clone());
        if recent.len() > MAX_RECENT_RESULTS {
            recent.pop_front();
        }

        self.report.record(result);

        let checked = self.report.len();
        let percentage = (checked as f64 / self.total.max(1) as f64 * 100.0) as u32;
        self.status_message = format!(
            "Checking... {}% ({}/{}) | {}",
            percentage,
            checked,
            self.total,
            self.valid_counts()
        );
    }

    fn valid_counts(&self) -> String {
        format!(
            "HTTP: {} | SOCKS4: {} | SOCKS5: {}",
            self.report.valid_count(ProtocolKind::Http),
            self.report.valid_count(ProtocolKind::Socks4),
            self.report.valid_count(ProtocolKind::Socks5)
        )
    }

    fn handle_input(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Tab => {
                self.selected_list = (self.selected_list + 1) % 2;
                self.list_state.select(Some(0));
            }
            KeyCode::Down => {
                let len = self.selected_len();
                let i = match self.list_state.selected() {
                    Some(i) if i < len.saturating_sub(1) => i + 1,
                    _ => 0,
                };
                self.list_state.select(Some(i));
            }
            KeyCode::Up => {
                let len = self.selected_len();
                let i = match self.list_state.selected() {
                    Some(0) | None => len.saturating_sub(1),
                    Some(i) => i - 1,
                };
                self.list_state.select(Some(i));
            }
            _ => {}
        }
    }

    fn selected_len(&self) -> usize {
        if self.selected_list == 0 {
            self.recent_valid.len()
        } else {
            self.recent_invalid.len()
        }
    }

    fn ui(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3), // Title
                Constraint::Length(3), // Progress bar
                Constraint::Min(0),    // Result lists
                Constraint::Length(3), // Status bar
            ])
            .split(f.size());

        let title = Paragraph::new("Proxy Validation")
            .style(Style::default().fg(Color::Magenta))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(title, chunks[0]);

        let checked = self.report.len();
        let progress = if self.total > 0 {
            (checked as f64 / self.total as f64 * 100.0) as u16
        } else {
            100
        };
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title("Progress"))
            .gauge_style(Style::default().fg(Color::Magenta).bg(Color::Black))
            .percent(progress.min(100))
            .label(format!("{}/{} ({}%)", checked, self.total, progress));
        f.render_widget(gauge, chunks[1]);

        let list_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[2]);

        let valid_total: usize = ProtocolKind::PROBED
            .into_iter()
            .map(|p| self.report.valid_count(p))
            .sum();
        let invalid_total = checked - valid_total;

        Self::render_result_list(
            f,
            list_chunks[0],
            "Valid",
            &self.recent_valid,
            valid_total,
            self.selected_list == 0,
            Color::Green,
            if self.selected_list == 0 { Some(&mut self.list_state) } else { None },
        );

        Self::render_result_list(
            f,
            list_chunks[1],
            "Invalid",
            &self.recent_invalid,
            invalid_total,
            self.selected_list == 1,
            Color::Red,
            if self.selected_list == 1 { Some(&mut self.list_state) } else { None },
        );

        let status = Paragraph::new(self.status_message.clone())
            .style(if self.is_complete {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Yellow)
            })
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Status"));
        f.render_widget(status, chunks[3]);
    }

    #[allow(clippy::too_many_arguments)]
    fn render_result_list(
        f: &mut Frame,
        area: Rect,
        title: &str,
        results: &VecDeque<ValidationResult>,
        total_count: usize,
        is_selected: bool,
        color: Color,
        list_state: Option<&mut ListState>,
    ) {
        let items: Vec<ListItem> = results
            .iter()
            .rev() // Show newest first
            .map(|result| {
                let content = match (result.response_time_ms, &result.reason) {
                    (Some(time), _) => {
                        format!("{} {} ({}ms)", result.protocol, result.address, time)
                    }
                    (None, Some(reason)) => {
                        format!("{} {} - {}", result.protocol, result.address, reason)
                    }
                    (None, None) => format!("{} {}", result.protocol, result.address),
                };
                ListItem::new(content).style(Style::default().fg(color))
            })
            .collect();

        let block_title = format!("{} ({})", title, total_count);
        let border_style = if is_selected {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(block_title)
                    .border_style(border_style),
            )
            .highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol(">> ");

        if let Some(state) = list_state {
            f.render_stateful_widget(list, area, state);
        } else {
            f.render_widget(list, area);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{Address, Candidate};

    fn result(addr: &str, protocol: ProtocolKind, valid: bool) -> ValidationResult {
        let candidate = Candidate::new(Address::parse(addr).unwrap(), protocol);
        if valid {
            ValidationResult::valid(candidate, 10)
        } else {
            ValidationResult::invalid(candidate, "refused".to_string())
        }
    }

    #[test]
    fn test_record_updates_lists_and_status() {
        let (_tx, rx) = mpsc::channel(4);
        let mut app = ProxyCheckerApp::new(rx, 4);

        app.record(result("1.1.1.1:80", ProtocolKind::Http, true));
        app.record(result("2.2.2.2:1080", ProtocolKind::Socks5, false));

        assert_eq!(app.report.len(), 2);
        assert_eq!(app.recent_valid.len(), 1);
        assert_eq!(app.recent_invalid.len(), 1);
        assert!(app.status_message.starts_with("Checking... 50% (2/4)"));
        assert!(app.status_message.contains("HTTP: 1"));
    }

    #[test]
    fn test_recent_results_are_bounded() {
        let (_tx, rx) = mpsc::channel(1);
        let mut app = ProxyCheckerApp::new(rx, MAX_RECENT_RESULTS + 10);
        for i in 0..MAX_RECENT_RESULTS + 10 {
            app.record(result(&format!("10.0.0.1:{}", i + 1), ProtocolKind::Socks4, true));
        }
        assert_eq!(app.recent_valid.len(), MAX_RECENT_RESULTS);
        assert_eq!(app.report.len(), MAX_RECENT_RESULTS + 10);
    }

    #[tokio::test]
    async fn test_terminal_failure_keeps_pending_results() {
        let (tx, rx) = mpsc::channel(4);
        let mut app = ProxyCheckerApp::new(rx, 3);
        app.record(result("1.1.1.1:80", ProtocolKind::Http, true));

        tx.send(result("2.2.2.2:1080", ProtocolKind::Socks5, true))
            .await
            .unwrap();
        tx.send(result("3.3.3.3:80", ProtocolKind::Http, false))
            .await
            .unwrap();
        drop(tx);

        let report = app
            .collect_remaining(Err(anyhow::anyhow!("terminal went away")))
            .await;
        assert_eq!(report.len(), 3);
        assert_eq!(report.valid_count(ProtocolKind::Http), 1);
        assert_eq!(report.valid_count(ProtocolKind::Socks5), 1);
    }

    #[tokio::test]
    async fn test_early_quit_drains_the_rest() {
        let (tx, rx) = mpsc::channel(4);
        let app = ProxyCheckerApp::new(rx, 2);
        let sender = tokio::spawn(async move {
            for addr in ["9.9.9.9:1", "8.8.8.8:2"] {
                tx.send(result(addr, ProtocolKind::Socks4, false)).await.unwrap();
            }
        });

        let report = app.collect_remaining(Ok(())).await;
        sender.await.unwrap();
        assert_eq!(report.len(), 2);
        // sorted by address once finished
        let addrs: Vec<&str> = report
            .results(ProtocolKind::Socks4)
            .iter()
            .map(|r| r.address.as_str())
            .collect();
        assert_eq!(addrs, vec!["8.8.8.8:2", "9.9.9.9:1"]);
    }

    #[test]
    fn test_handle_input() {
        let (_tx, rx) = mpsc::channel(1);
        let mut app = ProxyCheckerApp::new(rx, 0);
        app.record(result("1.1.1.1:80", ProtocolKind::Http, true));
        app.record(result("1.1.1.2:80", ProtocolKind::Http, true));

        app.handle_input(KeyCode::Down);
        assert_eq!(app.list_state.selected(), Some(1));
        app.handle_input(KeyCode::Down);
        assert_eq!(app.list_state.selected(), Some(0));
        app.handle_input(KeyCode::Up);
        assert_eq!(app.list_state.selected(), Some(1));

        app.handle_input(KeyCode::Tab);
        assert_eq!(app.selected_list, 1);
        assert_eq!(app.list_state.selected(), Some(0));

        assert!(!app.should_quit);
        app.handle_input(KeyCode::Char('q'));
        assert!(app.should_quit);
    }
}
