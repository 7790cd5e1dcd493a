//! Local network address discovery
//!
//! The address comes from the routing table, not from interface names. When
//! a full-tunnel VPN is active the default route goes through the tunnel,
//! so the reported address is the tunnel's. [`is_private_lan`] lets callers
//! warn when the address cannot be an ordinary LAN address.

use std::net::{IpAddr, UdpSocket};

/// TEST-NET-1 address, only used to select the default-route interface.
/// Connecting a UDP socket sends no packets.
const ROUTE_TARGET: &str = "192.0.2.1:9";

/// Returns the primary non-loopback IPv4 address of this host.
///
/// The address is that of the interface the OS would route outbound traffic
/// through. Returns `None` on hosts without such a route.
pub fn detect_lan_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect(ROUTE_TARGET).ok()?;
    let ip = socket.local_addr().ok()?.ip();

    if ip.is_loopback() || ip.is_unspecified() {
        tracing::debug!("No LAN address found (got {})", ip);
        None
    } else {
        Some(ip)
    }
}

/// Whether `ip` is in a private or link-local IPv4 range.
///
/// Carrier-grade NAT space (`100.64.0.0/10`), used by overlay VPNs, and
/// public addresses are not LAN addresses. Tunnels numbered from private
/// ranges are not detected.
pub fn is_private_lan(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local(),
        IpAddr::V6(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_is_private_lan() {
        for lan in [[192, 168, 1, 50], [10, 0, 0, 7], [172, 20, 1, 1], [169, 254, 3, 4]] {
            assert!(is_private_lan(IpAddr::V4(Ipv4Addr::from(lan))), "{lan:?}");
        }
        for other in [[100, 64, 0, 1], [100, 101, 2, 3], [203, 0, 113, 9]] {
            assert!(!is_private_lan(IpAddr::V4(Ipv4Addr::from(other))), "{other:?}");
        }
        assert!(!is_private_lan(IpAddr::V6(Ipv6Addr::LOCALHOST)));
    }

    #[test]
    fn test_detected_address_is_usable() {
        // Sandboxed hosts may have no route at all
        if let Some(ip) = detect_lan_ip() {
            assert!(ip.is_ipv4());
            assert!(!ip.is_loopback());
            assert!(!ip.is_unspecified());
        }
    }
}
