use std::io;
use std::time::{Duration, Instant};

use serde::de::IgnoredAny;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::{debug, trace, warn};

use crate::{Error, Result};

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
pub const READ_TIMEOUT: Duration = Duration::from_secs(1);
pub const MAX_TIMEOUT_ATTEMPTS: u32 = 3;
pub const TIMEOUT_RETRY_PAUSE: Duration = Duration::from_millis(500);
pub const MAX_CONNECT_ATTEMPTS: u32 = 2;
pub const CONNECT_RETRY_PAUSE: Duration = Duration::from_millis(800);
pub const BUFFER_SIZE: usize = 1000;

/// Timeouts and retry bounds for one request/response exchange.
///
/// Timeouts and connection-level failures (refused, reset, empty reply) are
/// counted separately, each against its own bound and pause.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub max_timeout_attempts: u32,
    pub timeout_pause: Duration,
    pub max_connect_attempts: u32,
    pub connect_pause: Duration,
    pub buffer_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            read_timeout: READ_TIMEOUT,
            max_timeout_attempts: MAX_TIMEOUT_ATTEMPTS,
            timeout_pause: TIMEOUT_RETRY_PAUSE,
            max_connect_attempts: MAX_CONNECT_ATTEMPTS,
            connect_pause: CONNECT_RETRY_PAUSE,
            buffer_size: BUFFER_SIZE,
        }
    }
}

/// Opens a fresh TCP connection for every request. The unit does not support
/// keep-alive or multiplexed sessions.
pub struct TcpTransport {
    addr: String,
    config: TransportConfig,
}

impl TcpTransport {
    pub fn new(host: &str, port: u16, config: TransportConfig) -> Self {
        Self {
            addr: format!("{host}:{port}"),
            config,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Sends one payload and returns the raw response text, retrying the whole
    /// exchange on timeouts and connection failures.
    pub async fn send(&self, payload: &str) -> Result<String> {
        let mut timeouts = 0;
        let mut failures = 0;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let started = Instant::now();
            let err = match self.exchange(payload).await {
                Ok(bytes) => {
                    trace!(
                        addr = %self.addr,
                        attempt,
                        bytes = bytes.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "exchange complete"
                    );
                    return String::from_utf8(bytes)
                        .map_err(|e| Error::Protocol(format!("response is not UTF-8: {e}")));
                }
                Err(e) => e,
            };

            let (pause, exhausted) = if err.kind() == io::ErrorKind::TimedOut {
                timeouts += 1;
                (
                    self.config.timeout_pause,
                    timeouts >= self.config.max_timeout_attempts,
                )
            } else {
                failures += 1;
                (
                    self.config.connect_pause,
                    failures >= self.config.max_connect_attempts,
                )
            };

            if exhausted {
                warn!(addr = %self.addr, attempt, error = %err, "giving up on device exchange");
                return Err(Error::connectivity(attempt, err));
            }
            warn!(addr = %self.addr, attempt, error = %err, "device exchange failed, retrying");
            sleep(pause).await;
        }
    }

    async fn exchange(&self, payload: &str) -> io::Result<Vec<u8>> {
        debug!(addr = %self.addr, "connecting");
        let mut stream = timeout(self.config.connect_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;

        stream.write_all(payload.as_bytes()).await?;

        let mut response = Vec::new();
        let mut buf = vec![0u8; self.config.buffer_size.max(1)];
        loop {
            match timeout(self.config.read_timeout, stream.read(&mut buf)).await {
                Err(_) if response.is_empty() => {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"));
                }
                // no further bytes within the read window
                Err(_) => break,
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    response.extend_from_slice(&buf[..n]);
                    // some firmware keeps the socket open after answering
                    if n < buf.len() && is_complete_json(&response) {
                        break;
                    }
                }
                Ok(Err(e)) => return Err(e),
            }
        }

        if response.is_empty() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "empty response"));
        }
        Ok(response)
    }
}

fn is_complete_json(bytes: &[u8]) -> bool {
    serde_json::from_slice::<IgnoredAny>(bytes).is_ok()
}
