//! Plain line-oriented viewer
//!
//! Prints the ranked snapshot on every tick, separated by blank lines. In
//! `once` mode nothing is printed until the input closes, which makes
//! `topstat --stdout-once` usable in shell pipelines. An interrupt switches
//! once mode off so the ticks start printing; a second interrupt quits.

use super::renderer::{format_line, DisplayContext, JsonRow};
use super::{ViewError, ViewEvent, Viewer};
use crate::config::OutputFormat;
use crate::pipeline::{Aggregator, Metric, RateUnit};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct StdoutViewer<W: Write + Send> {
    aggregator: Arc<Aggregator>,
    metrics: Vec<Metric>,
    rate_unit: RateUnit,
    format: OutputFormat,
    started_at: DateTime<Utc>,
    pipe_open: bool,
    once: bool,
    interrupted: bool,
    need_newline: bool,
    out: W,
}

impl StdoutViewer<std::io::Stdout> {
    pub fn new(
        aggregator: Arc<Aggregator>,
        metrics: Vec<Metric>,
        rate_unit: RateUnit,
        format: OutputFormat,
        once: bool,
    ) -> Self {
        Self::with_writer(aggregator, metrics, rate_unit, format, once, std::io::stdout())
    }
}

impl<W: Write + Send> StdoutViewer<W> {
    pub fn with_writer(
        aggregator: Arc<Aggregator>,
        metrics: Vec<Metric>,
        rate_unit: RateUnit,
        format: OutputFormat,
        once: bool,
        out: W,
    ) -> Self {
        Self {
            aggregator,
            metrics,
            rate_unit,
            format,
            started_at: Utc::now(),
            pipe_open: true,
            once,
            interrupted: false,
            need_newline: false,
            out,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn update_screen(&mut self) -> Result<(), ViewError> {
        if self.once {
            return Ok(());
        }

        if self.need_newline {
            writeln!(self.out)?;
        } else {
            self.need_newline = true;
        }

        let stats = self.aggregator.snapshot();
        let ctx = DisplayContext {
            started_at: self.started_at,
            now: Utc::now(),
            total_seen: self.aggregator.total_seen(),
            rate_unit: self.rate_unit,
        };

        for stat in &stats {
            match self.format {
                OutputFormat::Text => writeln!(self.out, "{}", format_line(stat, &self.metrics, &ctx))?,
                OutputFormat::Json => {
                    serde_json::to_writer(&mut self.out, &JsonRow::new(stat, &ctx))?;
                    writeln!(self.out)?;
                }
            }
        }

        self.out.flush()?;
        Ok(())
    }
}

#[async_trait]
impl<W: Write + Send> Viewer for StdoutViewer<W> {
    async fn run(&mut self, mut events: mpsc::Receiver<ViewEvent>) -> Result<(), ViewError> {
        while let Some(event) = events.recv().await {
            match event {
                ViewEvent::Tick => {
                    if self.pipe_open {
                        self.update_screen()?;
                    }
                }
                ViewEvent::Interrupt => {
                    if self.interrupted {
                        return Ok(());
                    }
                    // First interrupt leaves once mode and keeps running; a
                    // second one quits
                    self.interrupted = true;
                    self.once = false;
                    if self.need_newline {
                        self.update_screen()?;
                    }
                }
                ViewEvent::PipeClosed => {
                    self.set_pipe_open(false);
                    self.once = false;
                    self.update_screen()?;
                    return Ok(());
                }
                ViewEvent::Shutdown => return Ok(()),
            }
        }
        Ok(())
    }

    fn set_pipe_open(&mut self, open: bool) {
        self.pipe_open = open;
    }
}
