//! Fake modem hardware for tests.

use std::collections::HashSet;
use std::io;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::serial::{ModemLink, PortOpener};
use crate::sync::lock;

/// Modem side of an opened fake port.
pub(crate) struct FakeModem {
    pub path: String,
    stream: DuplexStream,
}

impl FakeModem {
    /// Reads one `\r` terminated command, `None` once the host closed the port.
    pub async fn read_command(&mut self) -> Option<String> {
        let mut command = Vec::new();
        loop {
            match self.stream.read_u8().await {
                Ok(b'\r') => return Some(String::from_utf8_lossy(&command).into_owned()),
                Ok(byte) => command.push(byte),
                Err(_) => return None,
            }
        }
    }

    /// Sends one response line.
    pub async fn send_line(&mut self, line: &str) {
        let _ = self.stream.write_all(format!("{line}\r\n").as_bytes()).await;
    }
}

/// A set of fake serial devices, some of which can be opened.
pub(crate) struct FakePorts {
    openable: Mutex<HashSet<String>>,
    attempts: Mutex<Vec<(String, Instant)>>,
    stalled: Mutex<HashSet<usize>>,
    buffer: usize,
    modems: mpsc::UnboundedSender<FakeModem>,
}

impl FakePorts {
    pub fn new(openable: &[&str]) -> (Self, mpsc::UnboundedReceiver<FakeModem>) {
        Self::with_buffer(openable, 1024)
    }

    /// Ports whose pipes hold at most `buffer` unread bytes.
    pub fn with_buffer(
        openable: &[&str],
        buffer: usize,
    ) -> (Self, mpsc::UnboundedReceiver<FakeModem>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let ports = FakePorts {
            openable: Mutex::new(openable.iter().map(|s| s.to_string()).collect()),
            attempts: Mutex::new(Vec::new()),
            stalled: Mutex::new(HashSet::new()),
            buffer,
            modems: tx,
        };
        (ports, rx)
    }

    pub fn set_openable(&self, path: &str, openable: bool) {
        let mut ports = lock(&self.openable);
        if openable {
            ports.insert(path.to_string());
        } else {
            ports.remove(path);
        }
    }

    /// Makes the open attempt with zero-based index `n` hang forever.
    pub fn stall_attempt(&self, n: usize) {
        lock(&self.stalled).insert(n);
    }

    /// Every open attempt so far, with the virtual time it happened.
    pub fn attempts(&self) -> Vec<(String, Instant)> {
        lock(&self.attempts).clone()
    }

    pub fn attempt_count(&self) -> usize {
        lock(&self.attempts).len()
    }
}

#[async_trait]
impl PortOpener for FakePorts {
    async fn open(&self, path: &str) -> io::Result<ModemLink> {
        let stall = {
            let mut attempts = lock(&self.attempts);
            attempts.push((path.to_string(), Instant::now()));
            lock(&self.stalled).contains(&(attempts.len() - 1))
        };
        if stall {
            std::future::pending::<()>().await;
        }
        if !lock(&self.openable).contains(path) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "No such device"));
        }
        let (host, modem) = tokio::io::duplex(self.buffer);
        let _ = self.modems.send(FakeModem {
            path: path.to_string(),
            stream: modem,
        });
        Ok(Box::new(host))
    }
}
