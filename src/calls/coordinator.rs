//! # Call Coordinator
//!
//! Turns dial and hangup requests into AT commands on the modem session,
//! tracks the resulting calls and announces them to subscribers.
//!
//! A call also ends without a hangup when the modem reports a call ending
//! result code or the link goes down. Since the modem carries one voice call
//! at a time, either event ends every tracked call.

use std::sync::{Arc, LazyLock};

use log::{debug, error, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::log_store::{CallLogStore, NewCallLog};
use super::registry::{CallRegistry, CallSession};
use crate::error::{DialError, HangupError};
use crate::events::{Broadcaster, DIALING, DialerEvent};
use crate::modem::{LinkObserver, ModemSession};
use crate::modem::protocol;

/// `+` followed by 10 to 15 ASCII digits.
static PHONE_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[0-9]{10,15}$").expect("Invalid regex pattern"));

/// Checks that `number` is in international `+CCXXXXXXXXXX` form.
pub fn validate_phone_number(number: &str) -> Result<(), DialError> {
    if PHONE_FORMAT.is_match(number) {
        Ok(())
    } else {
        Err(DialError::InvalidFormat(number.to_string()))
    }
}

/// A request to call someone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialRequest {
    pub to: String,
    pub person_name: String,
    pub company_name: String,
}

/// An accepted dial.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DialOutcome {
    pub call_id: String,
}

/// Ends tracked calls on behalf of the modem session.
struct CallTerminator {
    registry: Arc<CallRegistry>,
    events: Broadcaster,
}

impl CallTerminator {
    fn end_all(&self, reason: &str) {
        for call in self.registry.drain() {
            info!(
                "Call to {} ({}) ended: {reason}",
                call.destination_number, call.call_id
            );
            self.events.emit(DialerEvent::CallEnded {
                to: call.destination_number,
            });
        }
    }
}

impl LinkObserver for CallTerminator {
    fn call_ended(&self, code: &str) {
        self.end_all(code);
    }

    fn link_closed(&self) {
        self.end_all("modem link closed");
    }
}

pub struct CallCoordinator {
    session: Arc<ModemSession>,
    registry: Arc<CallRegistry>,
    events: Broadcaster,
    store: Arc<dyn CallLogStore>,
}

impl CallCoordinator {
    pub fn new(
        session: Arc<ModemSession>,
        events: Broadcaster,
        store: Arc<dyn CallLogStore>,
    ) -> Self {
        let registry = Arc::new(CallRegistry::new());
        session.observe(Arc::new(CallTerminator {
            registry: registry.clone(),
            events: events.clone(),
        }));
        CallCoordinator {
            session,
            registry,
            events,
            store,
        }
    }

    pub fn registry(&self) -> &CallRegistry {
        &self.registry
    }

    pub fn active_calls(&self) -> Vec<CallSession> {
        self.registry.active_calls()
    }

    /// Dials `request.to`.
    ///
    /// The call counts as started once `ATD` is written; the call log is
    /// saved in the background and a failure there is only logged.
    pub async fn dial(&self, request: DialRequest) -> Result<DialOutcome, DialError> {
        let DialRequest {
            to,
            person_name,
            company_name,
        } = request;

        validate_phone_number(&to)?;
        if !self.session.is_connected() {
            return Err(DialError::ModemNotConnected);
        }

        // Reserve the number first so two dials to it cannot both reach the modem.
        let call_id = self.registry.start_call(&to)?;
        if let Err(err) = self.session.write(&protocol::dial(&to)).await {
            if let Err(e) = self.registry.end_call(&call_id) {
                warn!("Call to {to} was released before its dial failed: {e}");
            }
            let err = DialError::from(err);
            error!("Failed to dial {to}: {err}");
            return Err(err);
        }

        info!("Dialing {to} ({call_id})");
        self.events.emit(DialerEvent::CallStatus {
            to: to.clone(),
            status: DIALING.to_string(),
        });
        self.save_call_log(NewCallLog {
            phone_number: to,
            person_name,
            company_name,
        });

        Ok(DialOutcome { call_id })
    }

    /// Hangs up the call with `call_id`.
    ///
    /// Unknown ids are refused before anything is sent to the modem.
    pub async fn hangup(&self, call_id: &str) -> Result<(), HangupError> {
        if !self.session.is_connected() {
            return Err(HangupError::ModemNotConnected);
        }
        if self.registry.destination_of(call_id).is_none() {
            return Err(HangupError::CallNotFound(call_id.to_string()));
        }

        if let Err(err) = self.session.write(protocol::HANGUP).await {
            let err = HangupError::from(err);
            error!("Failed to hang up {call_id}: {err}");
            return Err(err);
        }

        // A call-ending code may have released the call while ATH was written.
        match self.registry.end_call(call_id) {
            Ok(to) => {
                info!("Hung up {to} ({call_id})");
                self.events.emit(DialerEvent::CallEnded { to });
            }
            Err(_) => debug!("Call {call_id} had already ended"),
        }
        Ok(())
    }

    fn save_call_log(&self, entry: NewCallLog) {
        let store = self.store.clone();
        tokio::spawn(async move {
            let phone = entry.phone_number.clone();
            match store.create(entry).await {
                Ok(log) => debug!("Saved call log {} for {phone}", log.id),
                Err(e) => error!("Failed to save call log for {phone}: {e}"),
            }
        });
    }
}
