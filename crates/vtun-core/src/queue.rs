//! Bounded byte queue contract and the default ring implementation
//!
//! The wake strategies in `vtun-runtime` only need [`ByteQueue`]: a
//! non-blocking, fixed-capacity byte FIFO safe for one producer and many
//! consumers. [`SpmcRing`] is the stock implementation.

use crate::error::{ConfigError, QueueError};
use crate::spinlock::SpinLock;

/// Non-blocking bounded byte FIFO
///
/// **Contract:**
/// - `enqueue` either accepts the whole slice or returns `Err(Full)`.
/// - `dequeue` returns at most `out.len()` bytes in FIFO order, or
///   `Err(Empty)` when nothing is buffered.
/// - Concurrent `dequeue` calls never receive the same bytes.
pub trait ByteQueue: Send + Sync {
    fn enqueue(&self, data: &[u8]) -> Result<usize, QueueError>;

    fn dequeue(&self, out: &mut [u8]) -> Result<usize, QueueError>;

    /// Total capacity in bytes
    fn capacity(&self) -> usize;

    /// Bytes currently buffered (hint, may be stale)
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct RingState {
    buf: Box<[u8]>,
    /// Index of the oldest buffered byte
    head: usize,
    /// Bytes currently buffered
    len: usize,
}

impl RingState {
    fn write(&mut self, data: &[u8]) {
        let cap = self.buf.len();
        let tail = (self.head + self.len) % cap;
        let first = data.len().min(cap - tail);
        self.buf[tail..tail + first].copy_from_slice(&data[..first]);
        self.buf[..data.len() - first].copy_from_slice(&data[first..]);
        self.len += data.len();
    }

    fn read(&mut self, out: &mut [u8]) -> usize {
        let cap = self.buf.len();
        let n = out.len().min(self.len);
        let first = n.min(cap - self.head);
        out[..first].copy_from_slice(&self.buf[self.head..self.head + first]);
        out[first..n].copy_from_slice(&self.buf[..n - first]);
        self.head = (self.head + n) % cap;
        self.len -= n;
        if self.len == 0 {
            self.head = 0;
        }
        n
    }
}

/// Spinlock-guarded circular byte buffer
///
/// Consumers serialize on the lock, which is what makes consumed ranges
/// exclusive. Copies are the only work done while it is held.
pub struct SpmcRing {
    state: SpinLock<RingState>,
    capacity: usize,
}

impl SpmcRing {
    /// Create a ring holding up to `capacity` bytes
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(Self {
            state: SpinLock::new(RingState {
                buf: vec![0u8; capacity].into_boxed_slice(),
                head: 0,
                len: 0,
            }),
            capacity,
        })
    }

    /// Free space in bytes (hint, may be stale)
    pub fn free(&self) -> usize {
        self.capacity - self.len()
    }
}

impl ByteQueue for SpmcRing {
    fn enqueue(&self, data: &[u8]) -> Result<usize, QueueError> {
        let mut state = self.state.lock();
        if data.len() > self.capacity - state.len {
            return Err(QueueError::Full);
        }
        state.write(data);
        Ok(data.len())
    }

    fn dequeue(&self, out: &mut [u8]) -> Result<usize, QueueError> {
        let mut state = self.state.lock();
        if state.len == 0 {
            return Err(QueueError::Empty);
        }
        Ok(state.read(out))
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.state.lock().len
    }
}

impl std::fmt::Debug for SpmcRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpmcRing")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;

    #[test]
    fn test_zero_capacity_rejected() {
        assert_eq!(SpmcRing::new(0).unwrap_err(), ConfigError::ZeroCapacity);
    }

    #[test]
    fn test_roundtrip_preserves_bytes() {
        let ring = SpmcRing::new(16).unwrap();
        assert_eq!(ring.enqueue(b"hello"), Ok(5));

        let mut out = [0u8; 32];
        assert_eq!(ring.dequeue(&mut out), Ok(5));
        assert_eq!(&out[..5], b"hello");
        assert_eq!(ring.dequeue(&mut out), Err(QueueError::Empty));
    }

    #[test]
    fn test_full_is_all_or_nothing() {
        let ring = SpmcRing::new(8).unwrap();
        assert_eq!(ring.enqueue(b"abcdef"), Ok(6));
        assert_eq!(ring.enqueue(b"xyz"), Err(QueueError::Full));
        assert_eq!(ring.len(), 6);
        assert_eq!(ring.enqueue(b"gh"), Ok(2));
        assert_eq!(ring.free(), 0);
    }

    #[test]
    fn test_partial_dequeue_and_wraparound() {
        let ring = SpmcRing::new(8).unwrap();
        ring.enqueue(b"012345").unwrap();

        let mut out = [0u8; 4];
        assert_eq!(ring.dequeue(&mut out), Ok(4));
        assert_eq!(&out, b"0123");

        // Tail wraps past the end of the buffer
        ring.enqueue(b"6789ab").unwrap();
        let mut rest = [0u8; 16];
        assert_eq!(ring.dequeue(&mut rest), Ok(8));
        assert_eq!(&rest[..8], b"456789ab");
    }

    #[test]
    fn test_empty_write_and_zero_read() {
        let ring = SpmcRing::new(4).unwrap();
        assert_eq!(ring.enqueue(&[]), Ok(0));
        assert!(ring.is_empty());

        ring.enqueue(b"z").unwrap();
        assert_eq!(ring.dequeue(&mut []), Ok(0));
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn test_consumers_never_share_bytes() {
        // One producer writes unique 4-byte ids; every id must be seen exactly once.
        let ring = Arc::new(SpmcRing::new(256).unwrap());
        let seen = Arc::new(Mutex::new(HashSet::new()));
        let done = Arc::new(AtomicBool::new(false));
        let total = 5000u32;

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let ring = Arc::clone(&ring);
                let seen = Arc::clone(&seen);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut out = [0u8; 4];
                    loop {
                        match ring.dequeue(&mut out) {
                            Ok(4) => assert!(seen.lock().unwrap().insert(u32::from_le_bytes(out))),
                            Ok(n) => panic!("torn read of {} bytes", n),
                            Err(_) if done.load(Ordering::Acquire) && ring.is_empty() => break,
                            Err(_) => thread::yield_now(),
                        }
                    }
                })
            })
            .collect();

        for id in 0..total {
            while ring.enqueue(&id.to_le_bytes()).is_err() {
                thread::yield_now();
            }
        }
        done.store(true, Ordering::Release);

        for c in consumers {
            c.join().unwrap();
        }
        assert_eq!(seen.lock().unwrap().len(), total as usize);
    }
}
