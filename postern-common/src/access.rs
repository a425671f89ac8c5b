//! Peer admission by address and mask.

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

/// A single trusted network, written in config as
/// `(address: "192.168.1.0", mask: "255.255.255.0")`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedHost {
    pub address: Ipv4Addr,
    pub mask: Ipv4Addr,
}

impl TrustedHost {
    #[must_use]
    pub const fn new(address: Ipv4Addr, mask: Ipv4Addr) -> Self {
        Self { address, mask }
    }

    /// `true` when `peer` agrees with this entry on every bit set in the mask.
    #[must_use]
    pub fn matches(&self, peer: Ipv4Addr) -> bool {
        let mask = u32::from(self.mask);
        u32::from(self.address) & mask == u32::from(peer) & mask
    }
}

/// Ordered list of trusted networks, built once from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrustedHosts(Vec<TrustedHost>);

impl TrustedHosts {
    #[must_use]
    pub const fn new(hosts: Vec<TrustedHost>) -> Self {
        Self(hosts)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether a peer is allowed to talk to us.
    ///
    /// IPv4-mapped IPv6 peers are judged by their IPv4 form; any other IPv6
    /// peer is never trusted.
    #[must_use]
    pub fn permits(&self, peer: IpAddr) -> bool {
        let peer = match peer {
            IpAddr::V4(v4) => v4,
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => v4,
                None => return false,
            },
        };

        self.0.iter().any(|host| host.matches(peer))
    }
}

impl FromIterator<TrustedHost> for TrustedHosts {
    fn from_iter<T: IntoIterator<Item = TrustedHost>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
