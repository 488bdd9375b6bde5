//! UDP pose sender
//!
//! One datagram per encoded pose packet, fire-and-forget toward the audio
//! engine's listener port. Transient OS-level send errors are retried a
//! bounded number of times with short backoffs; everything else surfaces
//! immediately and the caller decides whether the stream survives.

use std::io;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, info};

use crate::error::{Error, Result};

/// Kernel send timeout per attempt
const SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Retries after the initial attempt (4 attempts total)
pub const MAX_SEND_RETRIES: u32 = 3;

/// Backoff before retry 1, 2, 3
const RETRY_BACKOFF_MS: [u64; 3] = [1, 2, 5];

/// UDP sender bound to a fixed IPv4 destination.
///
/// The destination is resolved at construction; only dotted-quad IPv4
/// literals are accepted so a typo'd hostname fails fast instead of
/// silently streaming into DNS. The socket closes on drop; [`close`]
/// exists for deterministic teardown and is idempotent.
///
/// [`close`]: UdpPoseSender::close
#[derive(Debug)]
pub struct UdpPoseSender {
    socket: Option<UdpSocket>,
    dest: SocketAddrV4,
    stop: Arc<AtomicBool>,
}

impl UdpPoseSender {
    /// Bind an ephemeral local socket and connect it to `host:port`.
    ///
    /// `stop` is the shared shutdown token; a raised token aborts any
    /// in-flight retry sequence with [`Error::Interrupted`].
    pub fn new(host: &str, port: u16, stop: Arc<AtomicBool>) -> Result<Self> {
        let addr: Ipv4Addr = host
            .parse()
            .map_err(|_| Error::InvalidHostAddress(host.to_string()))?;
        let dest = SocketAddrV4::new(addr, port);

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.set_write_timeout(Some(SEND_TIMEOUT))?;
        socket.connect(dest)?;

        if let Ok(local) = socket.local_addr() {
            info!("✓ UDP pose sender bound {} → {}", local, dest);
        }

        Ok(Self {
            socket: Some(socket),
            dest,
            stop,
        })
    }

    /// Destination this sender is bound to
    pub fn dest(&self) -> SocketAddrV4 {
        self.dest
    }

    /// Send one encoded packet, retrying transient failures.
    ///
    /// Retry policy: up to [`MAX_SEND_RETRIES`] retries after the first
    /// attempt, sleeping 1 ms / 2 ms / 5 ms between attempts. The stop token
    /// is checked before the first attempt and again after every backoff
    /// sleep. Non-transient errors and short writes fail without retry.
    pub fn send(&self, payload: &[u8]) -> Result<()> {
        let socket = self.socket.as_ref().ok_or(Error::SocketClosed)?;
        send_with_retry(payload, &self.stop, |bytes| socket.send(bytes))
    }

    /// Release the socket. Safe to call repeatedly; also runs on drop.
    pub fn close(&mut self) {
        if let Some(_socket) = self.socket.take() {
            debug!("UDP pose sender to {} closed", self.dest);
        }
    }

    /// True once [`close`](UdpPoseSender::close) has run
    pub fn is_closed(&self) -> bool {
        self.socket.is_none()
    }
}

impl Drop for UdpPoseSender {
    fn drop(&mut self) {
        self.close();
    }
}

/// Retry loop over a single-attempt send function.
///
/// Split out from the socket so the attempt/backoff/cancellation contract
/// is exercisable with injected failures.
fn send_with_retry<F>(payload: &[u8], stop: &AtomicBool, mut attempt_fn: F) -> Result<()>
where
    F: FnMut(&[u8]) -> io::Result<usize>,
{
    let mut attempts = 0u32;
    loop {
        if stop.load(Ordering::Relaxed) {
            return Err(Error::Interrupted("stop requested"));
        }

        attempts += 1;
        match attempt_fn(payload) {
            Ok(written) if written == payload.len() => return Ok(()),
            Ok(written) => {
                return Err(Error::ShortSend {
                    written,
                    expected: payload.len(),
                });
            }
            Err(e) if is_transient(&e) => {
                if attempts > MAX_SEND_RETRIES {
                    return Err(Error::SendRetriesExhausted {
                        attempts,
                        source: e,
                    });
                }
                let backoff_ms = RETRY_BACKOFF_MS[(attempts - 1) as usize];
                debug!(
                    "transient send error (attempt {}/{}), backing off {} ms: {}",
                    attempts,
                    MAX_SEND_RETRIES + 1,
                    backoff_ms,
                    e
                );
                thread::sleep(Duration::from_millis(backoff_ms));
            }
            Err(e) => return Err(Error::SendFailed(e)),
        }
    }
}

/// Errors worth retrying: interrupted syscalls, would-block/timeout on the
/// bounded send buffer, and exhausted kernel buffers. ENOBUFS has no
/// `io::ErrorKind` mapping, so it is matched by raw errno.
fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
    ) || err.raw_os_error() == Some(libc::ENOBUFS)
}
