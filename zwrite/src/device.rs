//! USB device classification and serial port auto-discovery.
//!
//! The EEPROM writer sketch runs on an Arduino, so discovery looks for ports
//! exposing an Arduino USB VID or one of the USB-UART bridges common on
//! clone boards. The protocol core never depends on this module; callers
//! inject the port name it produces.

use crate::error::{Error, Result};
use crate::port::{NativePortEnumerator, PortEnumerator, PortInfo};
use log::{debug, info};

/// Known USB device kinds commonly hosting the EEPROM writer sketch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Genuine Arduino (Arduino SA / Arduino.org VIDs).
    Arduino,
    /// CH340/CH341 USB-to-Serial converter (common on clone boards).
    Ch340,
    /// Silicon Labs CP210x USB-to-Serial converter.
    Cp210x,
    /// FTDI FT232/FT2232 USB-to-Serial converter.
    Ftdi,
    /// Unknown device.
    Unknown,
}

/// Known USB VID/PID pairs. An empty PID list matches any product id.
const KNOWN_USB_DEVICES: &[(u16, &[u16], DeviceKind)] = &[
    (0x2341, &[], DeviceKind::Arduino),
    (0x2A03, &[], DeviceKind::Arduino),
    (
        0x1A86,
        &[0x7523, 0x7522, 0x5523, 0x55D4],
        DeviceKind::Ch340,
    ),
    (0x10C4, &[0xEA60, 0xEA70, 0xEA71], DeviceKind::Cp210x),
    (0x0403, &[0x6001, 0x6010, 0x6014, 0x6015], DeviceKind::Ftdi),
];

impl DeviceKind {
    /// Classify a VID/PID combination.
    #[must_use]
    pub fn from_vid_pid(vid: u16, pid: u16) -> Self {
        for (known_vid, pids, device) in KNOWN_USB_DEVICES {
            if vid == *known_vid && (pids.is_empty() || pids.contains(&pid)) {
                return *device;
            }
        }
        Self::Unknown
    }

    /// Get a human-readable name for the device kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Arduino => "Arduino",
            Self::Ch340 => "CH340/CH341",
            Self::Cp210x => "CP210x",
            Self::Ftdi => "FTDI",
            Self::Unknown => "Unknown",
        }
    }

    /// Check if this is a known/expected device kind.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Discovered serial port with USB classification.
#[derive(Debug, Clone)]
pub struct DetectedPort {
    /// Port name/path (e.g., "/dev/ttyACM0" or "COM3").
    pub name: String,
    /// Classified device kind.
    pub device: DeviceKind,
    /// USB Vendor ID (if available).
    pub vid: Option<u16>,
    /// USB Product ID (if available).
    pub pid: Option<u16>,
    /// Device manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Device product string (if available).
    pub product: Option<String>,
}

impl DetectedPort {
    fn from_info(info: PortInfo) -> Self {
        let device = match (info.vid, info.pid) {
            (Some(vid), Some(pid)) => DeviceKind::from_vid_pid(vid, pid),
            _ => DeviceKind::Unknown,
        };
        Self {
            name: info.name,
            device,
            vid: info.vid,
            pid: info.pid,
            manufacturer: info.manufacturer,
            product: info.product,
        }
    }

    /// Check if this port exposes a USB vendor id at all.
    pub fn is_usb(&self) -> bool {
        self.vid.is_some()
    }
}

/// Detect all available serial ports with USB device information.
pub fn detect_ports() -> Vec<DetectedPort> {
    match NativePortEnumerator::list_ports() {
        Ok(ports) => {
            let detected: Vec<DetectedPort> =
                ports.into_iter().map(DetectedPort::from_info).collect();
            for port in &detected {
                debug!(
                    "Found port: {} ({:?}, VID {:04X?} PID {:04X?})",
                    port.name, port.device, port.vid, port.pid
                );
            }
            detected
        },
        Err(e) => {
            debug!("Failed to enumerate serial ports: {e}");
            Vec::new()
        },
    }
}

/// Auto-detect the EEPROM writer's port.
///
/// Preference order: genuine Arduino, then a known USB-UART bridge, then any
/// port exposing a USB vendor id. Non-USB ports are never auto-selected.
pub fn auto_detect_port() -> Result<DetectedPort> {
    let ports = detect_ports();

    if let Some(port) = ports.iter().find(|p| p.device == DeviceKind::Arduino) {
        info!("Auto-detected Arduino: {}", port.name);
        return Ok(port.clone());
    }

    if let Some(port) = ports.iter().find(|p| p.device.is_known()) {
        info!(
            "Auto-detected {} USB-UART bridge: {}",
            port.device.name(),
            port.name
        );
        return Ok(port.clone());
    }

    if let Some(port) = ports.into_iter().find(DetectedPort::is_usb) {
        info!("Using first USB serial port: {}", port.name);
        return Ok(port);
    }

    Err(Error::TransportUnavailable(
        "no USB serial port found, is the EEPROM writer connected?".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_kind_from_vid_pid() {
        assert_eq!(DeviceKind::from_vid_pid(0x2341, 0x0043), DeviceKind::Arduino);
        assert_eq!(DeviceKind::from_vid_pid(0x2A03, 0x0001), DeviceKind::Arduino);
        assert_eq!(DeviceKind::from_vid_pid(0x1A86, 0x7523), DeviceKind::Ch340);
        assert_eq!(DeviceKind::from_vid_pid(0x10C4, 0xEA60), DeviceKind::Cp210x);
        assert_eq!(DeviceKind::from_vid_pid(0x0403, 0x6001), DeviceKind::Ftdi);
        assert_eq!(DeviceKind::from_vid_pid(0x0000, 0x0000), DeviceKind::Unknown);
    }

    #[test]
    fn test_device_kind_pid_filter() {
        // CH340 VID with an unlisted PID is not classified
        assert_eq!(DeviceKind::from_vid_pid(0x1A86, 0x0000), DeviceKind::Unknown);
        // Arduino VIDs match any PID
        assert_eq!(DeviceKind::from_vid_pid(0x2341, 0xFFFF), DeviceKind::Arduino);
    }

    #[test]
    fn test_device_kind_is_known() {
        assert!(DeviceKind::Arduino.is_known());
        assert!(DeviceKind::Ch340.is_known());
        assert!(!DeviceKind::Unknown.is_known());
    }

    #[test]
    fn test_detected_port_is_usb() {
        let port = DetectedPort {
            name: "/dev/ttyS0".to_string(),
            device: DeviceKind::Unknown,
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
        };
        assert!(!port.is_usb());
    }

    #[test]
    fn test_detect_ports_does_not_panic() {
        let _ = detect_ports();
    }
}
