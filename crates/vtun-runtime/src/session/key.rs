//! Forward and reverse session identities

use std::fmt;
use std::net::SocketAddrV4;
use vtun_core::Ip;

/// Client-facing identity: (client IP, client port)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ForwardKey {
    pub ip: Ip,
    pub port: u16,
}

impl ForwardKey {
    #[inline]
    pub const fn new(ip: Ip, port: u16) -> Self {
        Self { ip, port }
    }
}

impl From<SocketAddrV4> for ForwardKey {
    fn from(addr: SocketAddrV4) -> Self {
        Self::new(Ip::from(*addr.ip()), addr.port())
    }
}

impl fmt::Display for ForwardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// Tunnel-facing identity: the allocated virtual IP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReverseKey {
    pub ip: Ip,
}

impl ReverseKey {
    #[inline]
    pub const fn new(ip: Ip) -> Self {
        Self { ip }
    }
}

impl fmt::Display for ReverseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ip)
    }
}
