//! Host link driver for Linux single-board computers
//!
//! Implements the link primitives against the kernel's view of a wireless
//! interface: association state from sysfs `operstate`, the hardware id from
//! sysfs `address`, the IPv4 address via a connected UDP probe socket, and
//! signal strength from `/proc/net/wireless`.
//!
//! Joining itself is delegated to the host's supplicant (wpa_supplicant or
//! equivalent, configured with the same SSID); `begin` only validates that
//! the interface exists, and the poll loop in the manager observes the
//! association coming up.

use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use tracing::debug;

use super::{LinkDriver, LinkError};

/// Signal strength reported when the interface is missing from
/// `/proc/net/wireless` (wired interface, or the radio is down).
const RSSI_FLOOR_DBM: i32 = -127;

pub struct HostLinkDriver {
    interface: String,
    sys_root: PathBuf,
    wireless_path: PathBuf,
}

impl HostLinkDriver {
    pub fn new(interface: &str) -> Self {
        Self {
            interface: interface.to_string(),
            sys_root: PathBuf::from("/sys/class/net"),
            wireless_path: PathBuf::from("/proc/net/wireless"),
        }
    }

    #[cfg(test)]
    fn with_roots(interface: &str, sys_root: PathBuf, wireless_path: PathBuf) -> Self {
        Self {
            interface: interface.to_string(),
            sys_root,
            wireless_path,
        }
    }

    fn sys_attr(&self, attr: &str) -> Option<String> {
        let path = self.sys_root.join(&self.interface).join(attr);
        std::fs::read_to_string(path)
            .ok()
            .map(|s| s.trim().to_string())
    }
}

#[async_trait]
impl LinkDriver for HostLinkDriver {
    async fn begin(&mut self, ssid: &str, _password: Option<&str>) -> Result<(), LinkError> {
        // The supplicant owns the join; reaching the interface is the
        // precondition we can check from here.
        if !self.sys_root.join(&self.interface).exists() {
            return Err(LinkError::Driver(format!(
                "interface '{}' not present",
                self.interface
            )));
        }
        debug!(interface = %self.interface, %ssid, "waiting for supplicant association");
        Ok(())
    }

    fn is_up(&self) -> bool {
        self.sys_attr("operstate").as_deref() == Some("up")
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        // A connected UDP socket never sends a packet; it only asks the
        // kernel which source address the default route would use.
        let socket = std::net::UdpSocket::bind(("0.0.0.0", 0)).ok()?;
        socket.connect(("8.8.8.8", 53)).ok()?;
        match socket.local_addr().ok()? {
            std::net::SocketAddr::V4(addr) => Some(*addr.ip()),
            std::net::SocketAddr::V6(_) => None,
        }
    }

    fn hardware_id(&self) -> [u8; 6] {
        let mut id = [0u8; 6];
        if let Some(addr) = self.sys_attr("address") {
            for (slot, octet) in id.iter_mut().zip(addr.split(':')) {
                *slot = u8::from_str_radix(octet, 16).unwrap_or(0);
            }
        }
        id
    }

    fn signal_strength(&self) -> i32 {
        parse_wireless_rssi(
            &std::fs::read_to_string(&self.wireless_path).unwrap_or_default(),
            &self.interface,
        )
        .unwrap_or(RSSI_FLOOR_DBM)
    }
}

/// Pull the signal level column for `interface` out of `/proc/net/wireless`.
///
/// The file is two header lines followed by one row per wireless interface:
/// `wlan0: 0000   54.  -61.  -256        0 ...` - the third numeric column is
/// the signal level in dBm, printed with a trailing dot.
fn parse_wireless_rssi(contents: &str, interface: &str) -> Option<i32> {
    for line in contents.lines().skip(2) {
        let mut fields = line.split_whitespace();
        let name = fields.next()?.trim_end_matches(':');
        if name != interface {
            continue;
        }
        let level = fields.nth(2)?;
        return level.trim_end_matches('.').parse::<f64>().ok().map(|v| v as i32);
    }
    None
}
