//! Serial transport
//!
//! Opens the telemetry radio as an async serial stream. When the configured
//! port cannot be opened, the attached devices are checked for a likely
//! replacement so the operator can fix `TELEM_PORT`.

use serialport::SerialPortType;
use std::io;
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};

use super::{Transport, READ_TIMEOUT};
use crate::config::TransportConfig;

/// A serial device attached to this machine
#[derive(Debug, Clone, PartialEq)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,
    /// USB product string, when the adapter reports one
    pub product: Option<String>,
    /// Whether the port sits behind a USB adapter
    pub usb: bool,
}

/// Split a port name into its device family and index.
///
/// "/dev/ttyUSB1" is ("ttyUSB", Some(1)), "COM3" is ("COM", Some(3)).
fn port_family(name: &str) -> (&str, Option<u32>) {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
    let family = base.trim_end_matches(|c: char| c.is_ascii_digit());
    (family, base[family.len()..].parse().ok())
}

/// Attached serial devices, USB adapters first
pub fn available_ports() -> Vec<PortInfo> {
    let found = match serialport::available_ports() {
        Ok(found) => found,
        Err(e) => {
            tracing::debug!(error = %e, "Cannot enumerate serial ports");
            return Vec::new();
        }
    };

    let mut ports: Vec<PortInfo> = found
        .into_iter()
        .map(|info| match info.port_type {
            SerialPortType::UsbPort(usb) => PortInfo {
                name: info.port_name,
                product: usb.product,
                usb: true,
            },
            _ => PortInfo {
                name: info.port_name,
                product: None,
                usb: false,
            },
        })
        .collect();
    ports.sort_by(|a, b| {
        let (fa, ia) = port_family(&a.name);
        let (fb, ib) = port_family(&b.name);
        (!a.usb, fa, ia).cmp(&(!b.usb, fb, ib))
    });
    ports
}

/// Pick the attached port most likely to be the radio when `configured` is
/// missing.
///
/// Prefers the same device family at the nearest index, then the first USB
/// adapter. Returns `None` when `configured` is attached or nothing fits.
pub fn suggest_port<'a>(configured: &str, ports: &'a [PortInfo]) -> Option<&'a PortInfo> {
    if ports.iter().any(|p| p.name == configured) {
        return None;
    }

    let (family, index) = port_family(configured);
    let distance = |p: &PortInfo| match (index, port_family(&p.name).1) {
        (Some(want), Some(have)) => want.abs_diff(have),
        _ => u32::MAX,
    };

    ports
        .iter()
        .filter(|p| port_family(&p.name).0 == family)
        .min_by_key(|p| distance(*p))
        .or_else(|| ports.iter().find(|p| p.usb))
}

/// The hardware source reached over a serial port
#[derive(Debug, Clone)]
pub struct SerialTransport {
    config: TransportConfig,
}

impl SerialTransport {
    /// Create a transport for the configured port
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl Transport for SerialTransport {
    type Stream = SerialStream;

    async fn open(&self) -> io::Result<SerialStream> {
        let port = tokio_serial::new(&self.config.port_name, self.config.baud_rate)
            .timeout(READ_TIMEOUT)
            .open_native_async()?;

        // Drop whatever queued up while nobody was listening
        port.clear(tokio_serial::ClearBuffer::Input)?;
        Ok(port)
    }

    fn describe(&self) -> String {
        format!("{} @ {}", self.config.port_name, self.config.baud_rate)
    }

    fn on_open_failure(&self) {
        let configured = &self.config.port_name;
        let ports = available_ports();

        if ports.iter().any(|p| &p.name == configured) {
            tracing::warn!(port = %configured, "Port is attached but cannot be opened, check permissions");
            return;
        }
        match suggest_port(configured, &ports) {
            Some(candidate) => tracing::warn!(
                port = %configured,
                candidate = %candidate.name,
                product = ?candidate.product,
                "Configured port not found, radio may be on candidate"
            ),
            None if ports.is_empty() => tracing::info!("No serial ports detected"),
            None => {
                let names: Vec<&str> = ports.iter().map(|p| p.name.as_str()).collect();
                tracing::info!(port = %configured, available = ?names, "Configured port not found");
            }
        }
    }
}
