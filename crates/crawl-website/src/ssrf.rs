//! SSRF guard, grounded on `dashflow-webscrape`'s `SsrfConfig`: reject
//! non-http(s) schemes and private/loopback/link-local/reserved/multicast
//! resolved addresses before a page is fetched, per spec.md §4.6.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, ToSocketAddrs};

use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum SsrfError {
    #[error("scheme '{0}' not allowed (only http/https)")]
    Scheme(String),
    #[error("URL has no host")]
    NoHost,
    #[error("hostname '{0}' did not resolve to any address")]
    NoResolution(String),
    #[error("resolved address {0} for '{1}' is private/internal and rejected")]
    PrivateAddress(IpAddr, String),
}

fn is_documentation_ipv4(ip: &Ipv4Addr) -> bool {
    let o = ip.octets();
    (o[0] == 192 && o[1] == 0 && o[2] == 2)
        || (o[0] == 198 && o[1] == 51 && o[2] == 100)
        || (o[0] == 203 && o[1] == 0 && o[2] == 113)
}

fn is_shared_address_space(ip: &Ipv4Addr) -> bool {
    let o = ip.octets();
    o[0] == 100 && (o[1] & 0xC0) == 64
}

fn is_cloud_metadata_ipv4(ip: &Ipv4Addr) -> bool {
    let o = ip.octets();
    o[0] == 169 && o[1] == 254 && o[2] == 169 && o[3] == 254
}

fn is_link_local_ipv6(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}

fn is_unique_local_ipv6(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xfe00) == 0xfc00
}

/// `true` for any address class spec.md §4.6 requires rejecting: private,
/// loopback, link-local, reserved (documentation/shared/unspecified/
/// broadcast/cloud-metadata), or multicast.
fn is_rejected_address(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_multicast()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || is_documentation_ipv4(v4)
                || is_shared_address_space(v4)
                || is_cloud_metadata_ipv4(v4)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_multicast()
                || is_link_local_ipv6(v6)
                || is_unique_local_ipv6(v6)
                || v6.to_ipv4_mapped().is_some_and(|m| is_rejected_address(&IpAddr::V4(m)))
        }
    }
}

/// Validates a URL is safe to crawl: http(s) scheme only, and every IP the
/// host resolves to must clear [`is_rejected_address`]. Resolution happens
/// synchronously (mirrors the teacher's approach) since this guard runs
/// once per page, not on a hot path.
pub fn guard_url(url: &Url) -> Result<(), SsrfError> {
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(SsrfError::Scheme(other.to_string())),
    }

    let host_str = url.host_str().ok_or(SsrfError::NoHost)?;
    let port = url.port_or_known_default().unwrap_or(80);

    let ips: Vec<IpAddr> = match url.host() {
        Some(url::Host::Ipv4(ip)) => vec![IpAddr::V4(ip)],
        Some(url::Host::Ipv6(ip)) => vec![IpAddr::V6(ip)],
        _ => (host_str, port)
            .to_socket_addrs()
            .map(|addrs| addrs.map(|a| a.ip()).collect())
            .unwrap_or_default(),
    };

    if ips.is_empty() {
        return Err(SsrfError::NoResolution(host_str.to_string()));
    }

    for ip in &ips {
        if is_rejected_address(ip) {
            return Err(SsrfError::PrivateAddress(*ip, host_str.to_string()));
        }
    }

    Ok(())
}
