//! Finite virtual address pool
//!
//! FIFO of free addresses: the lowest addresses go out first and a freed
//! address rejoins at the back, so a just-released IP is the last to be
//! reused. Only ever touched under the session table's lock.

use crossbeam_queue::ArrayQueue;
use vtun_core::error::ConfigError;
use vtun_core::Ip;

pub(crate) struct AddressPool {
    free: ArrayQueue<Ip>,
}

impl AddressPool {
    /// Every address strictly between `start` and `end`, except `own`
    pub(crate) fn from_range(start: Ip, end: Ip, own: Ip) -> Result<Self, ConfigError> {
        if start > end {
            return Err(ConfigError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }

        let lo = start.as_u32().saturating_add(1);
        let hi = end.as_u32(); // exclusive
        let usable = (lo..hi).filter(|&raw| raw != own.as_u32());

        // ArrayQueue rejects a zero capacity; an empty pool still needs one slot.
        let capacity = (hi.saturating_sub(lo) as usize).max(1);
        let free = ArrayQueue::new(capacity);
        for raw in usable {
            // Cannot fail: capacity covers the whole range
            let _ = free.push(Ip::new(raw));
        }
        Ok(Self { free })
    }

    #[inline]
    pub(crate) fn alloc(&self) -> Option<Ip> {
        self.free.pop()
    }

    #[inline]
    pub(crate) fn release(&self, ip: Ip) {
        let pushed = self.free.push(ip);
        debug_assert!(pushed.is_ok(), "address {} released into a full pool", ip);
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(d: u8) -> Ip {
        Ip::from_octets(10, 8, 0, d)
    }

    #[test]
    fn test_excludes_endpoints_and_own() {
        let pool = AddressPool::from_range(ip(0), ip(5), ip(1)).unwrap();
        assert_eq!(pool.len(), 3);
        let got: Vec<_> = std::iter::from_fn(|| pool.alloc()).collect();
        assert_eq!(got, vec![ip(2), ip(3), ip(4)]);
    }

    #[test]
    fn test_own_outside_range() {
        let pool = AddressPool::from_range(ip(10), ip(14), ip(200)).unwrap();
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_degenerate_ranges() {
        assert_eq!(AddressPool::from_range(ip(3), ip(3), ip(1)).unwrap().len(), 0);
        assert_eq!(AddressPool::from_range(ip(3), ip(4), ip(1)).unwrap().len(), 0);
        assert!(AddressPool::from_range(ip(9), ip(3), ip(1)).is_err());
    }

    #[test]
    fn test_released_address_goes_to_back() {
        let pool = AddressPool::from_range(ip(0), ip(4), ip(0)).unwrap();
        let first = pool.alloc().unwrap();
        pool.release(first);
        assert_eq!(pool.alloc(), Some(ip(2)));
        assert_eq!(pool.alloc(), Some(ip(3)));
        assert_eq!(pool.alloc(), Some(first));
        assert_eq!(pool.alloc(), None);
    }
}
