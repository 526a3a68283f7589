//! # Modem Subsystem
//!
//! Wires the session, supervisor, coordinator, broadcaster and call log store
//! together. Build one at startup and hand it to whatever serves requests.

use std::sync::Arc;

use log::info;
use tokio::sync::broadcast;

use crate::calls::{
    CallCoordinator, CallLog, CallLogFilter, CallLogStore, CallSession, DialOutcome, DialRequest,
};
use crate::config::DialerConfig;
use crate::error::{DialError, HangupError, StoreError};
use crate::events::{Broadcaster, DialerEvent};
use crate::modem::{LinkState, ModemSession, ModemStatus, ReconnectSupervisor, SupervisorHandle};
use crate::serial::PortOpener;

pub struct ModemSubsystem {
    session: Arc<ModemSession>,
    coordinator: CallCoordinator,
    events: Broadcaster,
    store: Arc<dyn CallLogStore>,
    supervisor: SupervisorHandle,
}

impl ModemSubsystem {
    /// Builds the subsystem and starts connecting in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        config: &DialerConfig,
        opener: Arc<dyn PortOpener>,
        store: Arc<dyn CallLogStore>,
    ) -> Self {
        let events = Broadcaster::new(config.events.capacity);
        let session = Arc::new(ModemSession::new(events.clone()));
        let coordinator = CallCoordinator::new(session.clone(), events.clone(), store.clone());
        let supervisor = Arc::new(ReconnectSupervisor::new(
            session.clone(),
            opener,
            config.supervisor_settings(),
        ))
        .spawn();
        info!(
            "Modem subsystem started, candidates: {}",
            config.modem.candidates.join(", ")
        );

        ModemSubsystem {
            session,
            coordinator,
            events,
            store,
            supervisor,
        }
    }

    pub fn status(&self) -> ModemStatus {
        self.session.status()
    }

    pub fn link_state(&self) -> LinkState {
        self.supervisor.state()
    }

    /// Port the modem is attached to, if connected.
    pub fn port(&self) -> Option<String> {
        self.session.port()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DialerEvent> {
        self.events.subscribe()
    }

    pub async fn dial(&self, request: DialRequest) -> Result<DialOutcome, DialError> {
        self.coordinator.dial(request).await
    }

    pub async fn hangup(&self, call_id: &str) -> Result<(), HangupError> {
        self.coordinator.hangup(call_id).await
    }

    pub fn active_calls(&self) -> Vec<CallSession> {
        self.coordinator.active_calls()
    }

    pub async fn call_logs(&self, filter: CallLogFilter) -> Result<Vec<CallLog>, StoreError> {
        self.store.list(filter).await
    }

    /// Stops reconnecting and closes the modem port.
    pub async fn shutdown(self) {
        self.supervisor.shutdown().await;
        self.session.close().await;
        info!("Modem subsystem stopped");
    }
}
