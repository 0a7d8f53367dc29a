//! CIDR blocks and containment.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use thiserror::Error;

/// CIDR parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CidrError {
    /// The address part is not an IP address.
    #[error("Invalid address in CIDR '{0}'")]
    InvalidAddress(String),

    /// The prefix length is not a number or exceeds the address width.
    #[error("Invalid prefix length in CIDR '{0}'")]
    InvalidPrefix(String),
}

/// A network block such as `10.0.0.0/24` or `2001:db8::/32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cidr {
    network: IpAddr,
    prefix: u8,
}

impl Cidr {
    /// Create a block, validating the prefix length.
    ///
    /// # Errors
    ///
    /// Returns error if the prefix exceeds the address width.
    pub fn new(network: IpAddr, prefix: u8) -> Result<Self, CidrError> {
        if prefix > max_prefix(network) {
            return Err(CidrError::InvalidPrefix(format!("{network}/{prefix}")));
        }
        Ok(Self { network, prefix })
    }

    /// Whether `ip` falls inside this block.
    ///
    /// IPv4-mapped IPv6 addresses are tested as IPv4. Addresses of the other
    /// family never match.
    #[must_use]
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, ip.to_canonical()) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = u32::MAX
                    .checked_shl(32 - u32::from(self.prefix))
                    .unwrap_or(0);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = u128::MAX
                    .checked_shl(128 - u32::from(self.prefix))
                    .unwrap_or(0);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

const fn max_prefix(ip: IpAddr) -> u8 {
    match ip {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

impl FromStr for Cidr {
    type Err = CidrError;

    /// Parses `addr/prefix`; a bare address is a host route.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (addr, prefix) = match s.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (s, None),
        };

        let network: IpAddr = addr
            .parse()
            .map_err(|_| CidrError::InvalidAddress(s.to_string()))?;

        let prefix = match prefix {
            Some(p) => p
                .parse::<u8>()
                .map_err(|_| CidrError::InvalidPrefix(s.to_string()))?,
            None => max_prefix(network),
        };

        Self::new(network, prefix).map_err(|_| CidrError::InvalidPrefix(s.to_string()))
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}
