//! Trusted-network allow-list.
//!
//! Clients on campus infrastructure are recognized by source address
//! against a configured list of IPv4 CIDR blocks. An unparseable client
//! address is simply not trusted; only the configuration itself is
//! validated strictly.

use std::net::Ipv4Addr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AllowListError {
    #[error("invalid network specification: {0}")]
    Invalid(String),
}

#[derive(Clone, Copy, Debug)]
struct Cidr {
    base: u32,
    prefix: u8,
}

impl Cidr {
    fn parse(spec: &str) -> Result<Self, AllowListError> {
        let bad = || AllowListError::Invalid(spec.to_string());
        let (addr_part, prefix) = match spec.split_once('/') {
            Some((addr, prefix)) => (addr, prefix.parse::<u8>().map_err(|_| bad())?),
            None => (spec, 32),
        };
        if prefix > 32 {
            return Err(bad());
        }
        let addr: Ipv4Addr = addr_part.trim().parse().map_err(|_| bad())?;
        Ok(Self {
            base: u32::from(addr),
            prefix,
        })
    }

    fn matches(self, addr: u32) -> bool {
        if self.prefix == 0 {
            return true;
        }
        let mask = u32::MAX << (32 - self.prefix);
        (addr ^ self.base) & mask == 0
    }
}

/// The set of networks whose clients count as on trusted premises.
#[derive(Clone, Debug, Default)]
pub struct NetworkAllowList {
    networks: Vec<Cidr>,
}

impl NetworkAllowList {
    /// No trusted networks; nothing matches.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse entries like `"10.0.0.0/24"` or a bare `"192.0.2.7"`.
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Result<Self, AllowListError> {
        let networks = entries
            .iter()
            .map(|e| Cidr::parse(e.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { networks })
    }

    /// Whether the client address falls inside any trusted network.
    /// Non-IPv4 and malformed addresses are never trusted.
    pub fn contains(&self, client_ip: &str) -> bool {
        let Ok(addr) = client_ip.trim().parse::<Ipv4Addr>() else {
            return false;
        };
        let bits = u32::from(addr);
        self.networks.iter().any(|net| net.matches(bits))
    }
}
