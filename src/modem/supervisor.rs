//! # Reconnect Supervisor
//!
//! Keeps a [`ModemSession`] attached to whichever candidate port is present.
//!
//! The supervisor is one task running a two-state loop. In `Disconnected` it
//! runs discovery and connect; on success it enters `Connected` and drives the
//! session reader until the link drops. Every failure or drop leads back to
//! `Disconnected` and exactly one retry timer, so attempts can never overlap.

use std::sync::{Arc, Mutex};

use log::{info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};

use super::session::ModemSession;
use crate::serial::{PortOpener, discover};
use crate::sync::lock;

/// Delay between a failure and the next connect attempt.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Upper bound for opening one port, during discovery and on connect.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Where the supervisor is in its connect cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connected,
}

/// Timing knobs of the supervisor.
#[derive(Clone, Debug)]
pub struct SupervisorSettings {
    pub candidates: Vec<String>,
    pub retry_delay: Duration,
    pub probe_timeout: Duration,
}

impl SupervisorSettings {
    pub fn new(candidates: Vec<String>) -> Self {
        SupervisorSettings {
            candidates,
            retry_delay: DEFAULT_RETRY_DELAY,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

/// Reconnects the modem session for the lifetime of the process.
pub struct ReconnectSupervisor {
    session: Arc<ModemSession>,
    opener: Arc<dyn PortOpener>,
    settings: SupervisorSettings,
    state: Mutex<LinkState>,
}

impl ReconnectSupervisor {
    pub fn new(
        session: Arc<ModemSession>,
        opener: Arc<dyn PortOpener>,
        settings: SupervisorSettings,
    ) -> Self {
        ReconnectSupervisor {
            session,
            opener,
            settings,
            state: Mutex::new(LinkState::Disconnected),
        }
    }

    pub fn state(&self) -> LinkState {
        *lock(&self.state)
    }

    /// Starts the connect loop on the current runtime.
    pub fn spawn(self: Arc<Self>) -> SupervisorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let supervisor = self.clone();
        let task = tokio::spawn(async move { supervisor.run(shutdown_rx).await });
        SupervisorHandle {
            supervisor: self,
            shutdown: shutdown_tx,
            task,
        }
    }

    /// Runs connect attempts until `shutdown` flips to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = self.connect_and_serve() => {}
                _ = shutdown.changed() => {
                    self.session.close().await;
                    break;
                }
            }
            self.set_state(LinkState::Disconnected);

            warn!(
                "Reconnecting to SIM800 in {}s...",
                self.settings.retry_delay.as_secs_f32()
            );
            tokio::select! {
                _ = sleep(self.settings.retry_delay) => {}
                _ = shutdown.changed() => break,
            }
        }
        self.set_state(LinkState::Disconnected);
        info!("Modem supervisor stopped");
    }

    /// One discover + connect attempt, serving the session while it lives.
    async fn connect_and_serve(&self) {
        let path = match discover(
            self.opener.as_ref(),
            &self.settings.candidates,
            self.settings.probe_timeout,
        )
        .await
        {
            Ok(path) => path,
            Err(err) => {
                warn!("{err}");
                self.session.mark_disconnected();
                return;
            }
        };

        let reader = match self
            .session
            .connect(self.opener.as_ref(), &path, self.settings.probe_timeout)
            .await
        {
            Ok(reader) => reader,
            Err(_) => return,
        };
        self.set_state(LinkState::Connected);
        self.session.run_reader(reader).await;
    }

    fn set_state(&self, next: LinkState) {
        let mut state = lock(&self.state);
        if *state != next {
            info!("Modem link {:?} -> {:?}", *state, next);
            *state = next;
        }
    }
}

/// Running supervisor task, cancellable through [`shutdown`](Self::shutdown).
pub struct SupervisorHandle {
    supervisor: Arc<ReconnectSupervisor>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SupervisorHandle {
    pub fn state(&self) -> LinkState {
        self.supervisor.state()
    }

    /// Cancels the pending retry timer or live session and waits for the task.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!("Modem supervisor task failed: {e}");
        }
    }
}
