//! Destination screening.
//!
//! Rejects relay targets that point back into the host's own network or use a
//! scheme other than HTTP(S). The same classification backs the relay client's
//! DNS resolver and redirect policy.

use crate::config::{NexusError, Result};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

/// Reports whether `ip` is loopback, private, link-local, shared (CGNAT),
/// unspecified or otherwise not publicly routable. IPv4-mapped IPv6 addresses
/// are classified as their IPv4 form.
#[must_use]
pub fn is_non_public_ip(ip: IpAddr) -> bool {
    match ip.to_canonical() {
        IpAddr::V4(ipv4) => is_non_public_ipv4(ipv4),
        IpAddr::V6(ipv6) => is_non_public_ipv6(ipv6),
    }
}

fn is_non_public_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_broadcast()
        || a == 0
        || (a == 100 && (b & 0xc0) == 64)
}

fn is_non_public_ipv6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || (first & 0xfe00) == 0xfc00
        || (first & 0xffc0) == 0xfe80
}

/// Guards outbound relay destinations against SSRF.
#[derive(Debug, Clone, Copy)]
pub struct TargetGuard {
    allow_private: bool,
}

impl TargetGuard {
    #[must_use]
    pub const fn new(allow_private: bool) -> Self {
        Self { allow_private }
    }

    #[must_use]
    pub const fn allows_private(&self) -> bool {
        self.allow_private
    }

    /// Parses `raw` and checks it is an acceptable destination.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when `raw` is not an absolute URL with a host and
    /// `Forbidden` for non-HTTP schemes or internal addresses.
    pub fn check(&self, raw: &str) -> Result<Url> {
        let url = Url::parse(raw)
            .map_err(|e| NexusError::Validation(format!("Invalid destination URL: {e}")))?;
        self.check_url(&url)?;
        Ok(url)
    }

    /// Screens an already parsed URL.
    ///
    /// # Errors
    ///
    /// Same as [`TargetGuard::check`].
    pub fn check_url(&self, url: &Url) -> Result<()> {
        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(NexusError::Forbidden(format!(
                "Scheme '{scheme}' is not allowed."
            )));
        }

        let Some(host) = url.host() else {
            return Err(NexusError::Validation(
                "Destination URL has no host.".to_string(),
            ));
        };

        if !self.allow_private && Self::is_internal_host(&host) {
            return Err(NexusError::Forbidden(
                "Destination is not reachable through the relay.".to_string(),
            ));
        }

        Ok(())
    }

    fn is_internal_host(host: &Host<&str>) -> bool {
        match host {
            Host::Domain(name) => {
                let name = name.trim_end_matches('.');
                name.eq_ignore_ascii_case("localhost")
                    || name.to_ascii_lowercase().ends_with(".localhost")
            }
            Host::Ipv4(ip) => is_non_public_ip(IpAddr::V4(*ip)),
            Host::Ipv6(ip) => is_non_public_ip(IpAddr::V6(*ip)),
        }
    }
}
