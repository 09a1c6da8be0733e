//! Address policy: which resolved IPs the fetcher may connect to.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnetwork::{Ipv4Network, Ipv6Network};
use once_cell::sync::Lazy;
use patchrss_core::NetworkPolicy;

/// IPv4 ranges that are not globally routable.
static BLOCKED_V4: Lazy<Vec<(Ipv4Network, &'static str)>> = Lazy::new(|| {
    [
        ("0.0.0.0/8", "\"this network\" (0.0.0.0/8)"),
        ("10.0.0.0/8", "private address (10.0.0.0/8)"),
        ("100.64.0.0/10", "carrier-grade NAT (100.64.0.0/10)"),
        ("127.0.0.0/8", "loopback address (127.0.0.0/8)"),
        ("169.254.0.0/16", "link-local address (169.254.0.0/16)"),
        ("172.16.0.0/12", "private address (172.16.0.0/12)"),
        ("192.0.0.0/24", "IETF protocol assignment (192.0.0.0/24)"),
        ("192.0.2.0/24", "documentation address (192.0.2.0/24)"),
        ("192.168.0.0/16", "private address (192.168.0.0/16)"),
        ("198.18.0.0/15", "benchmarking address (198.18.0.0/15)"),
        ("198.51.100.0/24", "documentation address (198.51.100.0/24)"),
        ("203.0.113.0/24", "documentation address (203.0.113.0/24)"),
        ("224.0.0.0/4", "multicast address (224.0.0.0/4)"),
        ("240.0.0.0/4", "reserved address (240.0.0.0/4)"),
    ]
    .into_iter()
    .map(|(cidr, reason)| (cidr.parse().expect("static IPv4 CIDR"), reason))
    .collect()
});

/// IPv6 ranges that are not globally routable. Embedded IPv4 forms are
/// handled separately so that they inherit the IPv4 table.
static BLOCKED_V6: Lazy<Vec<(Ipv6Network, &'static str)>> = Lazy::new(|| {
    [
        ("::/128", "unspecified address (::)"),
        ("::1/128", "loopback address (::1)"),
        ("100::/64", "discard-only address (100::/64)"),
        ("2001:db8::/32", "documentation address (2001:db8::/32)"),
        ("fc00::/7", "unique local address (fc00::/7)"),
        ("fe80::/10", "link-local address (fe80::/10)"),
        ("fec0::/10", "site-local address (fec0::/10)"),
        ("ff00::/8", "multicast address (ff00::/8)"),
    ]
    .into_iter()
    .map(|(cidr, reason)| (cidr.parse().expect("static IPv6 CIDR"), reason))
    .collect()
});

/// NAT64 well-known prefix; the low 32 bits carry an IPv4 address.
static NAT64: Lazy<Ipv6Network> =
    Lazy::new(|| "64:ff9b::/96".parse().expect("static IPv6 CIDR"));

/// Why `ip` may not be contacted under `policy`, or `None` if it may.
pub fn blocked_reason(ip: IpAddr, policy: NetworkPolicy) -> Option<&'static str> {
    match policy {
        NetworkPolicy::Unrestricted => None,
        NetworkPolicy::PublicOnly => non_global_reason(ip),
    }
}

fn non_global_reason(ip: IpAddr) -> Option<&'static str> {
    match ip {
        IpAddr::V4(v4) => ipv4_reason(v4),
        IpAddr::V6(v6) => ipv6_reason(v6),
    }
}

fn ipv4_reason(ip: Ipv4Addr) -> Option<&'static str> {
    if ip.is_broadcast() {
        return Some("broadcast address (255.255.255.255)");
    }
    BLOCKED_V4
        .iter()
        .find(|(net, _)| net.contains(ip))
        .map(|(_, reason)| *reason)
}

fn ipv6_reason(ip: Ipv6Addr) -> Option<&'static str> {
    // Loopback and unspecified come first: both would otherwise be read as
    // IPv4-compatible addresses below.
    if ip.is_loopback() || ip.is_unspecified() {
        return BLOCKED_V6
            .iter()
            .find(|(net, _)| net.contains(ip))
            .map(|(_, reason)| *reason);
    }

    if let Some(v4) = embedded_ipv4(ip) {
        return ipv4_reason(v4);
    }

    BLOCKED_V6
        .iter()
        .find(|(net, _)| net.contains(ip))
        .map(|(_, reason)| *reason)
}

/// The IPv4 address carried by an IPv4-mapped (`::ffff:a.b.c.d`),
/// IPv4-compatible (`::a.b.c.d`), or NAT64 (`64:ff9b::a.b.c.d`) address.
fn embedded_ipv4(ip: Ipv6Addr) -> Option<Ipv4Addr> {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return Some(v4);
    }
    let segments = ip.segments();
    let low = Ipv4Addr::new(
        (segments[6] >> 8) as u8,
        segments[6] as u8,
        (segments[7] >> 8) as u8,
        segments[7] as u8,
    );
    if segments[..6] == [0, 0, 0, 0, 0, 0] || NAT64.contains(ip) {
        return Some(low);
    }
    None
}
