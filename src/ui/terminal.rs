use {
    super::layout::{render_layout, visible_rows, Screen},
    super::renderer::DisplayContext,
    super::{ViewError, ViewEvent, Viewer},
    crate::pipeline::{Aggregator, Metric, RateUnit, Stat},
    async_trait::async_trait,
    chrono::Utc,
    crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    ratatui::{backend::CrosstermBackend, Terminal},
    std::{sync::Arc, time::Duration},
    tokio::sync::mpsc,
};

/// How long one iteration waits for keyboard input before checking events
const INPUT_POLL: Duration = Duration::from_millis(100);

/// What a key press asks the event loop to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Quit,
    Redraw,
    Ignore,
}

/// Interactive full-screen viewer
pub struct TerminalViewer {
    aggregator: Arc<Aggregator>,
    metrics: Vec<Metric>,
    rate_unit: RateUnit,
    started_at: chrono::DateTime<Utc>,
    pipe_open: bool,
    paused: bool,
    /// Last drawn snapshot, kept on screen while paused
    frozen: Vec<Stat>,
}

impl TerminalViewer {
    pub fn new(aggregator: Arc<Aggregator>, metrics: Vec<Metric>, rate_unit: RateUnit) -> Self {
        Self {
            aggregator,
            metrics,
            rate_unit,
            started_at: Utc::now(),
            pipe_open: true,
            paused: false,
            frozen: Vec::new(),
        }
    }

    /// Apply a key press to the aggregator and viewer state
    pub fn handle_key(&mut self, key: KeyEvent) -> KeyAction {
        if key.kind != KeyEventKind::Press {
            return KeyAction::Ignore;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return KeyAction::Quit;
        }

        let sort_order = match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return KeyAction::Quit,
            KeyCode::Char('a') => Metric::Average,
            KeyCode::Char('d') => Metric::Decay,
            KeyCode::Char('r') => Metric::Rate,
            KeyCode::Char('s') => Metric::Sum,
            KeyCode::Char('n') => Metric::Seen,
            KeyCode::Char('<') => Metric::Min,
            KeyCode::Char('>') => Metric::Max,
            KeyCode::Char('l') => Metric::LastSeen,
            KeyCode::Char('C') => {
                self.aggregator.reset();
                self.started_at = Utc::now();
                return KeyAction::Redraw;
            }
            KeyCode::Char('P') => {
                self.paused = !self.paused;
                return KeyAction::Redraw;
            }
            _ => return KeyAction::Ignore,
        };

        self.aggregator.set_sort_order(sort_order);
        KeyAction::Redraw
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    fn update_screen(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    ) -> Result<(), ViewError> {
        // Snapshot even while paused so the ranking cache keeps up
        let stats = self.aggregator.snapshot();
        if !self.paused {
            self.frozen = stats;
        }

        let screen = Screen {
            stats: &self.frozen,
            metrics: &self.metrics,
            sort_order: self.aggregator.sort_order(),
            entries: self.aggregator.len(),
            ctx: DisplayContext {
                started_at: self.started_at,
                now: Utc::now(),
                total_seen: self.aggregator.total_seen(),
                rate_unit: self.rate_unit,
            },
            paused: self.paused,
            pipe_open: self.pipe_open,
        };

        let area = terminal.size()?;
        terminal.draw(|f| render_layout(f, area, &screen))?;
        Ok(())
    }

    fn resize(&self, height: u16) {
        let rows = visible_rows(height);
        log::debug!("Terminal height {} fits {} rows", height, rows);
        self.aggregator.set_top_n(rows);
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
        events: &mut mpsc::Receiver<ViewEvent>,
    ) -> Result<(), ViewError> {
        self.resize(terminal.size()?.height);
        self.update_screen(terminal)?;

        loop {
            // Keyboard input and resize (non-blocking beyond INPUT_POLL)
            if crossterm::event::poll(INPUT_POLL)? {
                match crossterm::event::read()? {
                    Event::Key(key) => match self.handle_key(key) {
                        KeyAction::Quit => return Ok(()),
                        KeyAction::Redraw => self.update_screen(terminal)?,
                        KeyAction::Ignore => {}
                    },
                    Event::Resize(_, height) => {
                        self.resize(height);
                        self.update_screen(terminal)?;
                    }
                    _ => {}
                }
            }

            // Application events
            loop {
                match events.try_recv() {
                    Ok(ViewEvent::Tick) => self.update_screen(terminal)?,
                    Ok(ViewEvent::PipeClosed) => {
                        self.set_pipe_open(false);
                        self.update_screen(terminal)?;
                    }
                    Ok(ViewEvent::Interrupt) | Ok(ViewEvent::Shutdown) => return Ok(()),
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => return Ok(()),
                }
            }

            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl Viewer for TerminalViewer {
    /// Run the TUI event loop
    ///
    /// Handles keyboard input, terminal resize, and refresh ticks. The
    /// terminal is restored even when the loop fails.
    async fn run(&mut self, mut events: mpsc::Receiver<ViewEvent>) -> Result<(), ViewError> {
        let stdout = std::io::stdout();
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        crossterm::terminal::enable_raw_mode()?;
        crossterm::execute!(
            std::io::stdout(),
            crossterm::terminal::EnterAlternateScreen,
            crossterm::cursor::Hide
        )?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal, &mut events).await;

        // Cleanup - restore terminal state
        crossterm::execute!(
            std::io::stdout(),
            crossterm::terminal::LeaveAlternateScreen,
            crossterm::cursor::Show
        )?;
        crossterm::terminal::disable_raw_mode()?;
        result
    }

    fn set_pipe_open(&mut self, open: bool) {
        self.pipe_open = open;
    }
}
