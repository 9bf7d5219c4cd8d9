//! Follow-mode log session: a lazy line sequence over the remote stream.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::gateway::LogReader;

/// A live follow-mode log stream for one container. Runs until stopped;
/// stopping drops the remote reader promptly rather than merely ceasing
/// to read.
#[derive(Debug)]
pub struct LogSession {
    lines: mpsc::Receiver<String>,
    cancel: CancellationToken,
}

impl LogSession {
    pub(crate) fn spawn(reader: LogReader) -> Self {
        let (line_tx, line_rx) = mpsc::channel::<String>(64);
        let cancel = CancellationToken::new();

        let driver_cancel = cancel.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                tokio::select! {
                    _ = driver_cancel.cancelled() => break,
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            if line_tx.send(line).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(err) => {
                            log::debug!("log stream read error: {err}");
                            break;
                        }
                    },
                }
            }
            driver_cancel.cancel();
            log::debug!("log session driver finished");
            // The reader drops here, closing the remote stream.
        });

        Self {
            lines: line_rx,
            cancel,
        }
    }

    /// Next log line, or None once the stream has ended or been stopped.
    pub async fn next_line(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    /// Stops following. Idempotent; the driver drops the remote reader on
    /// its way out.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
