//! SIM800 modem: AT protocol, the live session and its reconnect supervisor.

pub mod protocol;
pub mod session;
pub mod supervisor;

pub use session::{LinkObserver, MAX_LINE_LEN, ModemSession, ModemStatus, ResponseReader};
pub use supervisor::{LinkState, ReconnectSupervisor, SupervisorHandle, SupervisorSettings};
