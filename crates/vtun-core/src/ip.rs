//! IPv4 address type used as session key material
//!
//! Stored as a host-order `u32` so address ranges can be walked with plain
//! integer arithmetic when the session table builds its pool.

use core::fmt;
use core::str::FromStr;
use std::net::{AddrParseError, Ipv4Addr};

/// An IPv4 address in host byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Ip(u32);

impl Ip {
    /// The unspecified address `0.0.0.0`
    pub const UNSPECIFIED: Ip = Ip(0);

    /// Create from a host-order integer
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Ip(raw)
    }

    /// Create from four octets, most significant first
    #[inline]
    pub const fn from_octets(a: u8, b: u8, c: u8, d: u8) -> Self {
        Ip(u32::from_be_bytes([a, b, c, d]))
    }

    /// Host-order integer value
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn octets(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    #[inline]
    pub const fn is_unspecified(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for Ip {
    fn from(raw: u32) -> Self {
        Ip(raw)
    }
}

impl From<Ip> for u32 {
    fn from(ip: Ip) -> Self {
        ip.0
    }
}

impl From<Ipv4Addr> for Ip {
    fn from(addr: Ipv4Addr) -> Self {
        Ip(u32::from(addr))
    }
}

impl From<Ip> for Ipv4Addr {
    fn from(ip: Ip) -> Self {
        Ipv4Addr::from(ip.0)
    }
}

impl FromStr for Ip {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Ipv4Addr>().map(Ip::from)
    }
}

impl fmt::Display for Ip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.octets();
        write!(f, "{}.{}.{}.{}", a, b, c, d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_octet_order() {
        let ip = Ip::from_octets(10, 8, 0, 1);
        assert_eq!(ip.as_u32(), 0x0A08_0001);
        assert_eq!(ip.octets(), [10, 8, 0, 1]);
        assert_eq!(ip.to_string(), "10.8.0.1");
    }

    #[test]
    fn test_parse() {
        let ip: Ip = "192.168.1.20".parse().unwrap();
        assert_eq!(ip, Ip::from_octets(192, 168, 1, 20));
        assert!("300.1.1.1".parse::<Ip>().is_err());
    }

    #[test]
    fn test_ipv4addr_conversion() {
        let addr = Ipv4Addr::new(172, 16, 0, 9);
        let ip = Ip::from(addr);
        assert_eq!(Ipv4Addr::from(ip), addr);
        assert!(Ip::UNSPECIFIED.is_unspecified());
        assert!(!ip.is_unspecified());
    }
}
