//! Serial transport: opening modem devices and finding which one is present.

pub mod discovery;
pub mod port;

pub use discovery::discover;
pub use port::{MODEM_BAUD_RATE, ModemLink, PortOpener, PortSettings, SerialPortOpener};
