//! # SIM Dialer
//!
//! Places voice calls through a SIM800 GSM modem attached over a serial port.
//!
//! ## Features
//!
//! - **Port Discovery**: probes an ordered list of candidate devices and picks
//!   the first one that opens.
//! - **Modem Session**: keeps an AT command session open and tracks whether the
//!   modem is connected and ready.
//! - **Automatic Reconnect**: retries the whole discover and connect sequence at
//!   a fixed interval for as long as the process runs.
//! - **Call Coordination**: validates, dials and hangs up calls, one per number,
//!   and keeps a call log.
//! - **Status Fan-out**: modem and call events pushed to every subscriber.
//!
//! ## Architecture
//!
//! - [`serial`]: opening serial devices and port discovery
//! - [`modem`]: AT protocol, session and reconnect supervisor
//! - [`calls`]: call registry, coordinator and call log store
//! - [`events`]: event broadcasting
//! - [`subsystem`]: everything above wired together
//! - [`config`]: TOML configuration
//! - [`console`]: operator console commands
//! - [`error`]: error types

pub mod calls;
pub mod config;
pub mod console;
pub mod error;
pub mod events;
pub mod modem;
pub mod serial;
pub mod subsystem;

mod sync;
#[cfg(test)]
mod testing;

/// Re-exports for convenience
pub mod prelude {
    pub use crate::calls::{CallLogFilter, DialRequest, MemoryCallLogStore};
    pub use crate::config::DialerConfig;
    pub use crate::error::*;
    pub use crate::events::DialerEvent;
    pub use crate::modem::{LinkState, ModemStatus};
    pub use crate::serial::SerialPortOpener;
    pub use crate::subsystem::ModemSubsystem;
}
