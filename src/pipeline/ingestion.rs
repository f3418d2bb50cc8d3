//! Line ingestion - channel consumer feeding the aggregator
//!
//! A reader task pushes raw lines into a bounded channel; the ingestion task
//! parses each line and records it. The channel closing means the input pipe
//! closed.

use super::engine::Aggregator;
use crate::parser::{LineParser, ParseError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

const THROUGHPUT_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Forward every line of `reader` into `tx` until EOF
///
/// Lines are read as raw bytes; invalid UTF-8 is replaced rather than ending
/// the stream. The trailing `\n` (or `\r\n`) is stripped. Returns the number
/// of lines read. Dropping `tx` on return closes the channel, which is how the
/// ingestion side learns the pipe is closed.
pub async fn read_lines<R>(mut reader: R, tx: mpsc::Sender<String>) -> std::io::Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut count = 0u64;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        count += 1;

        if buf.ends_with(b"\n") {
            buf.pop();
            if buf.ends_with(b"\r") {
                buf.pop();
            }
        }
        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.to_string(),
            Err(_) => {
                log::warn!("Line {} is not valid UTF-8, replacing invalid bytes", count);
                String::from_utf8_lossy(&buf).into_owned()
            }
        };

        if tx.send(line).await.is_err() {
            log::debug!("Line channel closed by receiver after {} lines", count);
            break;
        }
    }

    log::debug!("Input reached EOF after {} lines", count);
    Ok(count)
}

/// Consume lines from `rx` and ingest them until the channel closes
///
/// Returns the number of observations recorded. In strict mode the first
/// malformed line stops ingestion with its error.
pub async fn ingest_lines(
    mut rx: mpsc::Receiver<String>,
    aggregator: Arc<Aggregator>,
    parser: LineParser,
) -> Result<u64, ParseError> {
    log::info!(
        "📥 Ingestion started (only_element: {}, strict: {})",
        parser.only_element,
        parser.strict
    );

    let mut total = 0u64;
    let mut since_log = 0u64;
    let mut last_log_time = Instant::now();

    while let Some(line) = rx.recv().await {
        let (value, element) = parser.parse(&line)?;
        aggregator.ingest(&element, value);
        total += 1;
        since_log += 1;

        if last_log_time.elapsed() >= THROUGHPUT_LOG_INTERVAL {
            let per_sec = since_log as f64 / last_log_time.elapsed().as_secs_f64();
            log::debug!(
                "📊 Ingestion rate: {:.1} lines/sec (total: {}, entries: {})",
                per_sec,
                total,
                aggregator.len()
            );
            last_log_time = Instant::now();
            since_log = 0;
        }
    }

    log::info!("Input closed after {} observations", total);
    Ok(total)
}
