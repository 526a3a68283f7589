//! # Config Module
//!
//! TOML configuration of the dialer. Every field has a default, so an absent
//! file or an empty table is a valid configuration.
//!
//! ```toml
//! [modem]
//! candidates = ["COM4", "COM3"]
//! retry_delay_secs = 5
//! probe_timeout_ms = 2000
//!
//! [events]
//! capacity = 64
//! ```

use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};
use tokio::time::Duration;

use crate::error::ConfigError;
use crate::modem::SupervisorSettings;

/// Environment variable naming the preferred modem port.
pub const PORT_ENV: &str = "SIM800_PORT";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialerConfig {
    pub modem: ModemConfig,
    pub events: EventsConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    /// Ports to try, in order.
    pub candidates: Vec<String>,
    pub retry_delay_secs: u64,
    pub probe_timeout_ms: u64,
}

impl Default for ModemConfig {
    fn default() -> Self {
        ModemConfig {
            candidates: default_candidates(),
            retry_delay_secs: 5,
            probe_timeout_ms: 2000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// How far a subscriber may lag before it starts losing events.
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        EventsConfig { capacity: 64 }
    }
}

fn default_candidates() -> Vec<String> {
    let ports: &[&str] = if cfg!(windows) {
        &["COM4", "COM3", "COM5", "COM6", "COM7", "COM8"]
    } else {
        &[
            "/dev/ttyUSB0",
            "/dev/ttyUSB1",
            "/dev/ttyUSB2",
            "/dev/ttyACM0",
            "/dev/ttyS0",
        ]
    };
    ports.iter().map(|p| p.to_string()).collect()
}

impl DialerConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config: DialerConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                info!("Loaded configuration from {}", path.display());
                Self::from_toml(&source)?
            }
            None => Self::default(),
        };
        Ok(config)
    }

    /// Puts the port named by [`PORT_ENV`], if set, first in line.
    pub fn apply_env_port(&mut self) {
        if let Ok(port) = std::env::var(PORT_ENV) {
            info!("{PORT_ENV}={port} takes precedence");
            self.prefer_ports(&[port]);
        }
    }

    /// Moves `ports` to the front of the candidate list, in the given order.
    ///
    /// Blank entries are skipped and later duplicates dropped.
    pub fn prefer_ports(&mut self, ports: &[String]) {
        let preferred: Vec<String> = ports
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        if preferred.is_empty() {
            return;
        }
        let mut candidates = Vec::with_capacity(preferred.len() + self.modem.candidates.len());
        for port in preferred.into_iter().chain(self.modem.candidates.drain(..)) {
            if !candidates.contains(&port) {
                candidates.push(port);
            }
        }
        self.modem.candidates = candidates;
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.modem.candidates.is_empty() {
            return Err(ConfigError::invalid("modem.candidates must not be empty"));
        }
        if self.modem.retry_delay_secs == 0 {
            return Err(ConfigError::invalid("modem.retry_delay_secs must be positive"));
        }
        if self.modem.probe_timeout_ms == 0 {
            return Err(ConfigError::invalid("modem.probe_timeout_ms must be positive"));
        }
        if self.events.capacity == 0 {
            return Err(ConfigError::invalid("events.capacity must be positive"));
        }
        Ok(())
    }

    pub fn supervisor_settings(&self) -> SupervisorSettings {
        SupervisorSettings {
            candidates: self.modem.candidates.clone(),
            retry_delay: Duration::from_secs(self.modem.retry_delay_secs),
            probe_timeout: Duration::from_millis(self.modem.probe_timeout_ms),
        }
    }
}
