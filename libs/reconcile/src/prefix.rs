//! IP prefix parsing and host accounting for predefined shards.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrefixError {
    #[error("invalid address in {0:?}")]
    InvalidAddress(String),

    #[error("invalid prefix length in {0:?}")]
    InvalidLength(String),

    /// Bits below the prefix length are set, e.g. `10.0.0.1/24`.
    #[error("host bits set in {0:?}")]
    HostBitsSet(String),
}

/// An IPv4 or IPv6 network in CIDR notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IpPrefix {
    network: IpAddr,
    len: u8,
}

impl IpPrefix {
    pub fn network(&self) -> IpAddr {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.len
    }

    fn width(&self) -> u8 {
        match self.network {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        }
    }

    fn host_bits(&self) -> u32 {
        u32::from(self.width() - self.len)
    }

    /// Returns true if `addr` lies inside this network.
    pub fn contains(&self, addr: &IpAddr) -> bool {
        match (self.network, addr) {
            (IpAddr::V4(_), IpAddr::V4(_)) | (IpAddr::V6(_), IpAddr::V6(_)) => {
                let mask = network_mask(self.width(), self.len);
                as_bits(addr) & mask == as_bits(&self.network)
            }
            _ => false,
        }
    }

    /// Number of usable host addresses.
    ///
    /// IPv4 networks lose their network and broadcast addresses, IPv6
    /// networks their subnet-router anycast address. Point-to-point (/31,
    /// /127) and single-host prefixes keep every address.
    pub fn host_count(&self) -> u128 {
        let bits = self.host_bits();
        if bits == 128 {
            return u128::MAX;
        }
        let total = 1u128 << bits;
        match (self.network, bits) {
            (_, 0) | (_, 1) => total,
            (IpAddr::V4(_), _) => total - 2,
            (IpAddr::V6(_), _) => total - 1,
        }
    }

    /// Returns true if `addr` is one of the usable hosts counted by
    /// [`IpPrefix::host_count`].
    pub fn is_host(&self, addr: &IpAddr) -> bool {
        if !self.contains(addr) {
            return false;
        }
        let bits = self.host_bits();
        if bits <= 1 {
            return true;
        }
        let value = as_bits(addr);
        let network = as_bits(&self.network);
        match self.network {
            IpAddr::V4(_) => {
                let broadcast = network | ((1u128 << bits) - 1);
                value != network && value != broadcast
            }
            IpAddr::V6(_) => value != network,
        }
    }
}

impl FromStr for IpPrefix {
    type Err = PrefixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = match s.trim().split_once('/') {
            Some((addr, len)) => (addr, Some(len)),
            None => (s.trim(), None),
        };

        let network: IpAddr = addr
            .parse()
            .map_err(|_| PrefixError::InvalidAddress(s.to_string()))?;
        let width = match network {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        let len = match len {
            Some(len) => len
                .parse::<u8>()
                .ok()
                .filter(|len| *len <= width)
                .ok_or_else(|| PrefixError::InvalidLength(s.to_string()))?,
            None => width,
        };

        if as_bits(&network) & !network_mask(width, len) != 0 {
            return Err(PrefixError::HostBitsSet(s.to_string()));
        }

        Ok(Self { network, len })
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.len)
    }
}

fn as_bits(addr: &IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u128::from(u32::from(*v4)),
        IpAddr::V6(v6) => u128::from(*v6),
    }
}

fn network_mask(width: u8, len: u8) -> u128 {
    let host_bits = u32::from(width - len);
    let all = if width == 128 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    };
    if host_bits >= 128 {
        0
    } else {
        all & !((1u128 << host_bits) - 1)
    }
}
