//! Viewers drawing aggregator snapshots
//!
//! Both viewers only use `Aggregator::snapshot` and the configuration
//! setters; the aggregator knows nothing about them.

pub mod layout;
pub mod renderer;
pub mod stdout;
pub mod terminal;

use async_trait::async_trait;
use tokio::sync::mpsc;

pub use stdout::StdoutViewer;
pub use terminal::TerminalViewer;

/// Events delivered to a running viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewEvent {
    /// Refresh interval elapsed
    Tick,
    /// The process received an interrupt
    Interrupt,
    /// Input reached EOF; no more observations will arrive
    PipeClosed,
    /// Stop immediately without further output
    Shutdown,
}

#[derive(Debug)]
pub enum ViewError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
}

impl From<std::io::Error> for ViewError {
    fn from(err: std::io::Error) -> Self {
        ViewError::Io(err)
    }
}

impl From<serde_json::Error> for ViewError {
    fn from(err: serde_json::Error) -> Self {
        ViewError::Serialization(err)
    }
}

impl std::fmt::Display for ViewError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewError::Io(e) => write!(f, "IO error: {}", e),
            ViewError::Serialization(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for ViewError {}

/// A display driven by snapshots
#[async_trait]
pub trait Viewer: Send {
    /// Run until the user quits or the viewer decides it is done
    ///
    /// Returning means the process should exit.
    async fn run(&mut self, events: mpsc::Receiver<ViewEvent>) -> Result<(), ViewError>;

    /// Record whether the input pipe is still open
    fn set_pipe_open(&mut self, open: bool);
}
