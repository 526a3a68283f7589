use std::io;

use async_trait::async_trait;
use log::{error, info};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Duration;
use tokio_serial::SerialPortBuilderExt;
pub use tokio_serial::{DataBits, FlowControl, Parity, StopBits};

/// SIM800 modules talk at a fixed 9600 baud.
pub const MODEM_BAUD_RATE: u32 = 9600;

/// Byte stream to a modem.
pub trait AsyncLink: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> AsyncLink for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// An open connection to a modem device.
pub type ModemLink = Box<dyn AsyncLink>;

/// Opens modem links by device path.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PortOpener: Send + Sync {
    /// Open the device at `path`.
    async fn open(&self, path: &str) -> io::Result<ModemLink>;
}

/// serial port settings
#[derive(Clone, Debug)]
pub struct PortSettings {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub flow_control: FlowControl,
    pub timeout: Duration,
}

impl PortSettings {
    /// 8N1 at the modem baud rate, no flow control
    pub fn new() -> Self {
        PortSettings {
            baud_rate: MODEM_BAUD_RATE,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
            timeout: Duration::from_millis(500),
        }
    }
}

impl Default for PortSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// [`PortOpener`] backed by real serial devices.
#[derive(Clone, Debug, Default)]
pub struct SerialPortOpener {
    settings: PortSettings,
}

impl SerialPortOpener {
    pub fn new(settings: PortSettings) -> Self {
        SerialPortOpener { settings }
    }

    pub fn settings(&self) -> &PortSettings {
        &self.settings
    }
}

#[async_trait]
impl PortOpener for SerialPortOpener {
    async fn open(&self, path: &str) -> io::Result<ModemLink> {
        let builder = tokio_serial::new(path, self.settings.baud_rate)
            .data_bits(self.settings.data_bits)
            .parity(self.settings.parity)
            .stop_bits(self.settings.stop_bits)
            .flow_control(self.settings.flow_control)
            .timeout(self.settings.timeout);

        // Opening can stall on some USB adapters, keep it off the reactor threads.
        let opened = tokio::task::spawn_blocking(move || builder.open_native_async())
            .await
            .map_err(io::Error::other)?;

        match opened {
            Ok(stream) => {
                info!("Opened serial port {path} @ {} baud", self.settings.baud_rate);
                Ok(Box::new(stream))
            }
            Err(e) => {
                error!("Unable to open serial port {path}: {e}");
                Err(io::Error::from(e))
            }
        }
    }
}
