//! Network interface enumeration for discovery.
//!
//! Discovery probes every IPv4 interface separately, so that a host on any
//! attached LAN segment can answer.  The list of interfaces comes from an
//! [`InterfaceProvider`]; production code uses [`SystemInterfaces`] and
//! tests use [`StaticInterfaces`] pointing at loopback.

use std::io;
use std::net::Ipv4Addr;

use if_addrs::IfAddr;
use tracing::debug;

/// One interface that discovery will probe from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeInterface {
    /// OS name, e.g. `wlan0`.  Only used for logging.
    pub name: String,
    /// Local address the probe socket binds to.
    pub address: Ipv4Addr,
    /// Destination of the probe datagrams.
    pub broadcast: Ipv4Addr,
}

impl ProbeInterface {
    /// Builds an interface entry, computing the broadcast address from
    /// `address` and `netmask` when the OS did not report one.
    pub fn new(
        name: impl Into<String>,
        address: Ipv4Addr,
        netmask: Ipv4Addr,
        broadcast: Option<Ipv4Addr>,
    ) -> Self {
        Self {
            name: name.into(),
            address,
            broadcast: broadcast.unwrap_or_else(|| broadcast_address(address, netmask)),
        }
    }
}

/// Directed broadcast address of the subnet `address/netmask`.
///
/// ```rust
/// use std::net::Ipv4Addr;
/// use phonemouse_remote::infrastructure::network::interfaces::broadcast_address;
///
/// let b = broadcast_address(Ipv4Addr::new(192, 168, 1, 37), Ipv4Addr::new(255, 255, 255, 0));
/// assert_eq!(b, Ipv4Addr::new(192, 168, 1, 255));
/// ```
pub fn broadcast_address(address: Ipv4Addr, netmask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(address) | !u32::from(netmask))
}

/// Source of the interfaces a discovery run probes.
pub trait InterfaceProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns the OS error when enumeration itself fails.  An empty list is
    /// not an error.
    fn interfaces(&self) -> io::Result<Vec<ProbeInterface>>;
}

/// Enumerates the machine's non-loopback IPv4 interfaces.
///
/// Interface flags are not available through `if-addrs`, so an interface that
/// cannot broadcast shows up here and fails at send time; the discovery
/// engine isolates that failure to the one interface.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInterfaces;

impl InterfaceProvider for SystemInterfaces {
    fn interfaces(&self) -> io::Result<Vec<ProbeInterface>> {
        let found: Vec<ProbeInterface> = if_addrs::get_if_addrs()?
            .into_iter()
            .filter(|iface| !iface.is_loopback())
            .filter_map(|iface| match iface.addr {
                IfAddr::V4(v4) => Some(ProbeInterface::new(
                    iface.name,
                    v4.ip,
                    v4.netmask,
                    v4.broadcast,
                )),
                IfAddr::V6(_) => None,
            })
            .collect();
        debug!(count = found.len(), "enumerated IPv4 interfaces");
        Ok(found)
    }
}

/// Fixed interface list.
#[derive(Debug, Clone, Default)]
pub struct StaticInterfaces(pub Vec<ProbeInterface>);

impl StaticInterfaces {
    /// A single interface on 127.0.0.1 whose "broadcast" target is also
    /// 127.0.0.1, so a responder bound to loopback receives the probes.
    pub fn loopback() -> Self {
        Self(vec![ProbeInterface {
            name: "lo".to_string(),
            address: Ipv4Addr::LOCALHOST,
            broadcast: Ipv4Addr::LOCALHOST,
        }])
    }
}

impl InterfaceProvider for StaticInterfaces {
    fn interfaces(&self) -> io::Result<Vec<ProbeInterface>> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_address_for_common_masks() {
        let cases = [
            ((10, 1, 2, 3), (255, 0, 0, 0), (10, 255, 255, 255)),
            ((172, 16, 5, 4), (255, 255, 240, 0), (172, 16, 15, 255)),
            ((192, 168, 0, 9), (255, 255, 255, 0), (192, 168, 0, 255)),
            ((192, 168, 0, 9), (255, 255, 255, 255), (192, 168, 0, 9)),
        ];
        for ((a, b, c, d), (m1, m2, m3, m4), (e1, e2, e3, e4)) in cases {
            let got = broadcast_address(Ipv4Addr::new(a, b, c, d), Ipv4Addr::new(m1, m2, m3, m4));
            assert_eq!(got, Ipv4Addr::new(e1, e2, e3, e4));
        }
    }

    #[test]
    fn test_reported_broadcast_takes_precedence() {
        let iface = ProbeInterface::new(
            "eth0",
            Ipv4Addr::new(192, 168, 1, 4),
            Ipv4Addr::new(255, 255, 255, 0),
            Some(Ipv4Addr::new(192, 168, 1, 127)),
        );
        assert_eq!(iface.broadcast, Ipv4Addr::new(192, 168, 1, 127));
    }

    #[test]
    fn test_missing_broadcast_is_computed() {
        let iface = ProbeInterface::new(
            "wlan0",
            Ipv4Addr::new(192, 168, 1, 4),
            Ipv4Addr::new(255, 255, 255, 0),
            None,
        );
        assert_eq!(iface.broadcast, Ipv4Addr::new(192, 168, 1, 255));
    }

    #[test]
    fn test_loopback_provider_lists_one_interface() {
        let list = StaticInterfaces::loopback().interfaces().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].address, Ipv4Addr::LOCALHOST);
    }

    #[test]
    fn test_system_interfaces_exclude_loopback() {
        // Enumeration may legitimately return nothing in a sandbox; whatever
        // it returns must not include 127.0.0.0/8.
        if let Ok(list) = SystemInterfaces.interfaces() {
            assert!(list.iter().all(|i| !i.address.is_loopback()));
        }
    }
}
