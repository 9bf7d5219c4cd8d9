//! Interactive exec session: a remote shell bridged through byte channels.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::gateway::ExecStream;

/// ASCII ETX. Delivered to the remote shell as a normal input byte to signal
/// an interrupt without tearing the session down.
pub const INTERRUPT_BYTE: u8 = 0x03;

/// A live interactive shell into one container.
///
/// Input bytes pass through unmodified (local echo and line editing are a
/// presentation concern). Output is a continuous byte stream until the
/// remote process or the connection ends. The driver task exclusively owns
/// the duplex stream; its exit is the single point of teardown.
#[derive(Debug)]
pub struct ExecSession {
    input: mpsc::Sender<Vec<u8>>,
    output: mpsc::Receiver<Vec<u8>>,
    cancel: CancellationToken,
}

impl ExecSession {
    pub(crate) fn spawn(stream: ExecStream) -> Self {
        let (input_tx, mut input_rx) = mpsc::channel::<Vec<u8>>(32);
        let (output_tx, output_rx) = mpsc::channel::<Vec<u8>>(32);
        let cancel = CancellationToken::new();

        let driver_cancel = cancel.clone();
        tokio::spawn(async move {
            let (mut reader, mut writer) = tokio::io::split(stream);
            let mut buf = [0u8; 4096];
            loop {
                tokio::select! {
                    _ = driver_cancel.cancelled() => break,
                    msg = input_rx.recv() => match msg {
                        Some(bytes) => {
                            if writer.write_all(&bytes).await.is_err() {
                                break;
                            }
                            if writer.flush().await.is_err() {
                                break;
                            }
                        }
                        // Session dropped without an explicit stop.
                        None => break,
                    },
                    read = reader.read(&mut buf) => match read {
                        Ok(0) => break,
                        Ok(n) => {
                            if output_tx.send(buf[..n].to_vec()).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            log::debug!("exec stream read error: {err}");
                            break;
                        }
                    },
                }
            }
            // Marks natural termination too, so later writes fail fast.
            driver_cancel.cancel();
            log::debug!("exec session driver finished");
            // The stream halves drop here, closing the remote connection.
        });

        Self {
            input: input_tx,
            output: output_rx,
            cancel,
        }
    }

    /// Sends raw bytes to the remote shell as typed.
    pub async fn write(&self, bytes: &[u8]) -> Result<()> {
        self.input
            .send(bytes.to_vec())
            .await
            .map_err(|_| Error::SessionClosed)
    }

    /// Delivers the interrupt byte. Deliverable at any time; does not end
    /// the session.
    pub async fn interrupt(&self) -> Result<()> {
        self.write(&[INTERRUPT_BYTE]).await
    }

    /// Next chunk of remote output, or None once the stream has ended.
    pub async fn read_output(&mut self) -> Option<Vec<u8>> {
        self.output.recv().await
    }

    /// Stops the session. Idempotent and safe from any task; the driver
    /// releases the stream on its way out.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// True once the driver has released the stream (stopped or terminated
    /// naturally).
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
