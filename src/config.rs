//! Listen-address configuration.

use std::net::SocketAddr;

use crate::error::Error;

/// Used when `ADDR` is unset or empty.
pub const DEFAULT_ADDR: &str = ":8000";

/// Environment variable naming the listen address.
pub const ADDR_VAR: &str = "ADDR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `host:port`, or `:port` for every interface.
    pub addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self { addr: DEFAULT_ADDR.to_owned() }
    }
}

impl Config {
    /// Reads `ADDR` from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a caller-supplied lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        match lookup(ADDR_VAR) {
            Some(addr) if !addr.trim().is_empty() => Self { addr: addr.trim().to_owned() },
            _ => Self::default(),
        }
    }

    /// Parses the address. A leading `:` binds all IPv4 interfaces.
    pub fn socket_addr(&self) -> Result<SocketAddr, Error> {
        let full = match self.addr.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{port}"),
            None => self.addr.clone(),
        };
        full.parse().map_err(|source| Error::InvalidAddr { addr: self.addr.clone(), source })
    }
}
