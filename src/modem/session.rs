//! # Modem Session
//!
//! Owns the live link to the modem: writes AT commands, reads response lines
//! and keeps [`ModemStatus`] in step with both.
//!
//! Status mutations happen under one lock and are broadcast while it is held,
//! so subscribers observe transitions in the order they were applied. Writes
//! are serialized by a second, async lock that is only ever *tried* by callers:
//! the modem is half-duplex, so a command arriving while another is still
//! being written is refused with [`WriteError::Busy`].
//!
//! Call ending result codes and transport closes are passed on to every
//! registered [`LinkObserver`], after the status side of the event is applied.

use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::sync::oneshot;
use tokio::time::{Duration, timeout};

use super::protocol::{self, ResponseKind};
use crate::error::{ConnectError, WriteError};
use crate::events::{Broadcaster, DialerEvent};
use crate::serial::{ModemLink, PortOpener};
use crate::sync::lock;

/// Connection state of the modem as seen by subscribers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModemStatus {
    /// The serial port is open.
    pub connected: bool,
    /// The modem answered `OK` and has not reported `ERROR` since.
    pub ready: bool,
}

impl ModemStatus {
    pub const DISCONNECTED: ModemStatus = ModemStatus {
        connected: false,
        ready: false,
    };
}

/// Longest response line kept. Longer lines are dropped whole.
pub const MAX_LINE_LEN: usize = 1024;

/// Told about link events that end calls.
///
/// Callbacks run on the task that observed the event and must not block.
pub trait LinkObserver: Send + Sync {
    /// The modem reported a result code that ends the current call.
    fn call_ended(&self, code: &str);

    /// The transport was released.
    fn link_closed(&self);
}

/// Inbound half of a connected session, driven by [`ModemSession::run_reader`].
pub struct ResponseReader {
    reader: BufReader<ReadHalf<ModemLink>>,
    stop: oneshot::Receiver<()>,
}

/// The single owner of the modem transport.
pub struct ModemSession {
    status: Mutex<ModemStatus>,
    port: Mutex<Option<String>>,
    writer: tokio::sync::Mutex<Option<WriteHalf<ModemLink>>>,
    stop: Mutex<Option<oneshot::Sender<()>>>,
    events: Broadcaster,
    observers: Mutex<Vec<Arc<dyn LinkObserver>>>,
}

impl ModemSession {
    pub fn new(events: Broadcaster) -> Self {
        ModemSession {
            status: Mutex::new(ModemStatus::DISCONNECTED),
            port: Mutex::new(None),
            writer: tokio::sync::Mutex::new(None),
            stop: Mutex::new(None),
            events,
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Registers `observer` for call ending codes and transport closes.
    pub fn observe(&self, observer: Arc<dyn LinkObserver>) {
        lock(&self.observers).push(observer);
    }

    /// Current status snapshot.
    pub fn status(&self) -> ModemStatus {
        *lock(&self.status)
    }

    pub fn is_connected(&self) -> bool {
        self.status().connected
    }

    /// Path of the port the session is attached to.
    pub fn port(&self) -> Option<String> {
        lock(&self.port).clone()
    }

    /// Opens `path` and sends the `AT` probe.
    ///
    /// Opening may take at most `open_timeout`. On success the status becomes
    /// `{connected: true, ready: false}` and the returned reader must be driven
    /// with [`run_reader`](Self::run_reader) for responses to be seen. On
    /// failure the status is reset and broadcast.
    pub async fn connect(
        &self,
        opener: &dyn PortOpener,
        path: &str,
        open_timeout: Duration,
    ) -> Result<ResponseReader, ConnectError> {
        let link = match timeout(open_timeout, opener.open(path)).await {
            Ok(Ok(link)) => link,
            Err(_) => {
                let err = ConnectError::Timeout {
                    port: path.to_string(),
                };
                error!("{err}");
                self.mark_disconnected();
                return Err(err);
            }
            Ok(Err(err)) => {
                let err = ConnectError::from_io(path, &err);
                if err.is_permission_denied() {
                    error!("SIM800 access denied on {path}: the port may be in use or need more privileges");
                    info!("  1. Close other programs using {path} (serial monitors, terminal emulators)");
                    info!("  2. Run with sufficient rights, or add the user to the dialout group");
                    info!("  3. Check the SIM800 cabling and power supply");
                    info!("  4. Try another port");
                } else {
                    error!("{err}");
                }
                self.mark_disconnected();
                return Err(err);
            }
        };

        let (read_half, write_half) = tokio::io::split(link);
        let (stop_tx, stop_rx) = oneshot::channel();
        {
            let mut writer = self.writer.lock().await;
            *writer = Some(write_half);
        }
        *lock(&self.stop) = Some(stop_tx);
        *lock(&self.port) = Some(path.to_string());
        info!("SIM800 port opened: {path}");
        self.set_status(ModemStatus {
            connected: true,
            ready: false,
        });

        let probe = {
            let mut writer = self.writer.lock().await;
            write_command(&mut writer, protocol::PROBE).await
        };
        if let Err(err) = probe {
            self.close().await;
            return Err(ConnectError::probe_write(path, err.to_string()));
        }

        Ok(ResponseReader {
            reader: BufReader::new(read_half),
            stop: stop_rx,
        })
    }

    /// Applies one response line to the status and broadcasts the result.
    ///
    /// Lines that say nothing about readiness leave the status untouched and
    /// are not broadcast. Call ending codes go to the observers instead.
    pub fn handle_line(&self, line: &str) -> ModemStatus {
        let kind = protocol::parse_response_line(line);
        if kind == ResponseKind::CallEnded {
            let code = line.trim();
            info!("SIM800 call ended: {code}");
            self.notify(|observer| observer.call_ended(code));
            return self.status();
        }

        let mut status = lock(&self.status);
        match kind {
            ResponseKind::Ok if status.connected => status.ready = true,
            ResponseKind::Ok => {
                debug!("Ignoring OK while disconnected");
                return *status;
            }
            ResponseKind::Error => status.ready = false,
            ResponseKind::CallEnded | ResponseKind::Unrecognized => return *status,
        }
        self.events.emit(DialerEvent::ModemStatus(*status));
        *status
    }

    /// Writes `command` to the modem.
    ///
    /// Returns once the bytes are flushed; it does not wait for a response.
    pub async fn write(&self, command: &str) -> Result<(), WriteError> {
        if !self.is_connected() {
            return Err(WriteError::NotConnected);
        }
        let mut writer = self.writer.try_lock().map_err(|_| WriteError::Busy)?;
        write_command(&mut writer, command).await
    }

    /// Releases the transport and resets the status.
    ///
    /// Waits for a write in flight to finish first. The reader task of the
    /// session stops, which is what tells the supervisor to reconnect.
    /// Observers hear about the close after the status reset is broadcast.
    pub async fn close(&self) {
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(e) = writer.shutdown().await {
                debug!("SIM800 shutdown failed: {e}");
            }
        }
        if let Some(stop) = lock(&self.stop).take() {
            let _ = stop.send(());
        }
        if let Some(port) = lock(&self.port).take() {
            warn!("SIM800 port closed: {port}");
        }
        self.mark_disconnected();
        self.notify(|observer| observer.link_closed());
    }

    /// Feeds response lines to [`handle_line`](Self::handle_line) until the
    /// link ends or the session is closed.
    ///
    /// A line longer than [`MAX_LINE_LEN`] is discarded up to its terminator.
    pub async fn run_reader(&self, reader: ResponseReader) {
        let ResponseReader {
            mut reader,
            mut stop,
        } = reader;
        let mut buf = Vec::new();
        let mut overlong = false;
        loop {
            let mut limited = (&mut reader).take(MAX_LINE_LEN as u64);
            tokio::select! {
                _ = &mut stop => return,
                read = limited.read_until(b'\n', &mut buf) => match read {
                    Ok(0) => {
                        warn!("SIM800 link reached end of stream");
                        break;
                    }
                    Ok(_) if buf.len() >= MAX_LINE_LEN && buf.last() != Some(&b'\n') => {
                        if !overlong {
                            warn!("Discarding SIM800 line longer than {MAX_LINE_LEN} bytes");
                        }
                        overlong = true;
                        buf.clear();
                    }
                    Ok(_) => {
                        let skip = std::mem::take(&mut overlong);
                        let line = decode_line(&buf);
                        buf.clear();
                        if !skip && !line.is_empty() {
                            debug!("SIM800 > {line}");
                            self.handle_line(&line);
                        }
                    }
                    Err(e) => {
                        error!("SIM800 error: {e}");
                        break;
                    }
                },
            }
        }
        self.close().await;
    }

    fn set_status(&self, next: ModemStatus) {
        let mut status = lock(&self.status);
        *status = next;
        info!("Modem status: connected={} ready={}", next.connected, next.ready);
        self.events.emit(DialerEvent::ModemStatus(next));
    }

    fn notify(&self, event: impl Fn(&dyn LinkObserver)) {
        let observers = lock(&self.observers).clone();
        for observer in &observers {
            event(observer.as_ref());
        }
    }

    /// Resets to `{false, false}` and broadcasts it.
    pub(crate) fn mark_disconnected(&self) {
        self.set_status(ModemStatus::DISCONNECTED);
    }
}

async fn write_command(
    writer: &mut Option<WriteHalf<ModemLink>>,
    command: &str,
) -> Result<(), WriteError> {
    let writer = writer.as_mut().ok_or(WriteError::NotConnected)?;
    writer
        .write_all(command.as_bytes())
        .await
        .map_err(|e| WriteError::Io(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| WriteError::Io(e.to_string()))?;
    debug!("SIM800 < {}", command.trim_end());
    Ok(())
}

/// Response bytes without the line terminator, invalid UTF-8 replaced.
fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}
