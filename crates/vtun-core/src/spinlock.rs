//! Spin-based locks for short critical sections
//!
//! Two primitives live here:
//!
//! - [`SpinLock`] - exclusive lock, used inside the byte ring.
//! - [`RwSpinLock`] - reader/writer lock guarding the session table.
//!
//! Both spin with a bounded exponential `pause` backoff and never park the
//! thread. Critical sections must stay O(1)/O(log n) and must not block.
//!
//! # Starvation
//!
//! `RwSpinLock` is writer-preferring: once a writer announces itself, new
//! readers hold off until it has acquired and released the lock. Among
//! writers there is no ordering at all, so under sustained write contention
//! a single writer can lose the race indefinitely.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Upper bound on `spin_loop` hints issued per backoff round
const MAX_SPIN: u32 = 64;

#[inline]
fn backoff(round: &mut u32) {
    *round = round.wrapping_add(1);
    for _ in 0..(*round).min(MAX_SPIN) {
        core::hint::spin_loop();
    }
}

// ============================================================================
// SpinLock
// ============================================================================

/// A simple test-and-test-and-set spinlock
pub struct SpinLock<T> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

// Safety: SpinLock provides exclusive access to T
unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    /// Create a new spinlock containing the given value
    #[inline]
    pub const fn new(value: T) -> Self {
        SpinLock {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(value),
        }
    }

    /// Acquire the lock, spinning until it's available
    #[inline]
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        loop {
            if self.locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return SpinLockGuard { lock: self };
            }

            let mut round = 0u32;
            while self.locked.load(Ordering::Relaxed) {
                backoff(&mut round);
            }
        }
    }

    /// Try to acquire the lock without spinning
    #[inline]
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| SpinLockGuard { lock: self })
    }

    /// Check if the lock is currently held
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    /// Consume the lock and return the protected value
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: Default> Default for SpinLock<T> {
    fn default() -> Self {
        SpinLock::new(T::default())
    }
}

/// Guard that releases the spinlock when dropped
pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<'a, T> Deref for SpinLockGuard<'a, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // Safety: We hold the lock
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> DerefMut for SpinLockGuard<'a, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // Safety: We hold the lock
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, T> Drop for SpinLockGuard<'a, T> {
    #[inline]
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

// ============================================================================
// RwSpinLock
// ============================================================================

/// Writer holds the lock
const WRITER: usize = 1;
/// A writer is spinning, new readers must back off
const WRITER_WAITING: usize = 1 << 1;
/// One reader; the reader count lives above the two flag bits
const READER: usize = 1 << 2;

/// Reader/writer spinlock
///
/// State word layout: bit 0 = writer held, bit 1 = writer waiting,
/// bits 2.. = number of active readers.
pub struct RwSpinLock<T> {
    state: AtomicUsize,
    data: UnsafeCell<T>,
}

// Safety: readers get &T concurrently (needs Sync), writers get &mut T (needs Send)
unsafe impl<T: Send> Send for RwSpinLock<T> {}
unsafe impl<T: Send + Sync> Sync for RwSpinLock<T> {}

impl<T> RwSpinLock<T> {
    /// Create a new unlocked reader/writer spinlock
    #[inline]
    pub const fn new(value: T) -> Self {
        RwSpinLock {
            state: AtomicUsize::new(0),
            data: UnsafeCell::new(value),
        }
    }

    /// Acquire shared access, spinning while a writer holds or awaits the lock
    pub fn read(&self) -> RwSpinReadGuard<'_, T> {
        let mut round = 0u32;
        loop {
            if let Some(guard) = self.try_read() {
                return guard;
            }
            backoff(&mut round);
        }
    }

    /// Try to acquire shared access without spinning
    #[inline]
    pub fn try_read(&self) -> Option<RwSpinReadGuard<'_, T>> {
        let state = self.state.load(Ordering::Relaxed);
        if state & (WRITER | WRITER_WAITING) != 0 {
            return None;
        }
        self.state
            .compare_exchange(state, state + READER, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| RwSpinReadGuard { lock: self })
    }

    /// Acquire exclusive access, spinning until all readers have left
    pub fn write(&self) -> RwSpinWriteGuard<'_, T> {
        let mut round = 0u32;
        loop {
            let state = self.state.load(Ordering::Relaxed);
            if state & !WRITER_WAITING == 0 {
                // Acquiring clears WRITER_WAITING; other spinning writers set it again.
                if self.state
                    .compare_exchange_weak(state, WRITER, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
                {
                    return RwSpinWriteGuard { lock: self };
                }
            } else if state & WRITER_WAITING == 0 {
                self.state.fetch_or(WRITER_WAITING, Ordering::Relaxed);
            }
            backoff(&mut round);
        }
    }

    /// Try to acquire exclusive access without spinning
    #[inline]
    pub fn try_write(&self) -> Option<RwSpinWriteGuard<'_, T>> {
        let state = self.state.load(Ordering::Relaxed);
        if state & !WRITER_WAITING != 0 {
            return None;
        }
        self.state
            .compare_exchange(state, WRITER, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| RwSpinWriteGuard { lock: self })
    }

    /// Number of readers currently holding the lock (hint)
    #[inline]
    pub fn reader_count(&self) -> usize {
        self.state.load(Ordering::Relaxed) / READER
    }

    /// Whether a writer currently holds the lock
    #[inline]
    pub fn is_write_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) & WRITER != 0
    }
}

impl<T: Default> Default for RwSpinLock<T> {
    fn default() -> Self {
        RwSpinLock::new(T::default())
    }
}

/// Shared guard for [`RwSpinLock`]
pub struct RwSpinReadGuard<'a, T> {
    lock: &'a RwSpinLock<T>,
}

impl<'a, T> Deref for RwSpinReadGuard<'a, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // Safety: no writer can hold the lock while a reader is counted
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> Drop for RwSpinReadGuard<'a, T> {
    #[inline]
    fn drop(&mut self) {
        self.lock.state.fetch_sub(READER, Ordering::Release);
    }
}

/// Exclusive guard for [`RwSpinLock`]
pub struct RwSpinWriteGuard<'a, T> {
    lock: &'a RwSpinLock<T>,
}

impl<'a, T> Deref for RwSpinWriteGuard<'a, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // Safety: We hold the lock exclusively
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> DerefMut for RwSpinWriteGuard<'a, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // Safety: We hold the lock exclusively
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, T> Drop for RwSpinWriteGuard<'a, T> {
    #[inline]
    fn drop(&mut self) {
        // Keep WRITER_WAITING if another writer raised it meanwhile
        self.lock.state.fetch_and(!WRITER, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_spinlock_basic() {
        let lock = SpinLock::new(0u32);
        {
            let mut guard = lock.lock();
            *guard = 42;
        }
        assert_eq!(*lock.lock(), 42);
        assert_eq!(lock.into_inner(), 42);
    }

    #[test]
    fn test_spinlock_try_lock() {
        let lock = SpinLock::new(0u32);

        let guard = lock.try_lock();
        assert!(guard.is_some());
        assert!(lock.is_locked());
        assert!(lock.try_lock().is_none());

        drop(guard);
        assert!(lock.try_lock().is_some());
    }

    #[test]
    fn test_spinlock_concurrent() {
        let lock = Arc::new(SpinLock::new(0u32));
        let mut handles = vec![];

        for _ in 0..4 {
            let lock = Arc::clone(&lock);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    *lock.lock() += 1;
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*lock.lock(), 4000);
    }

    #[test]
    fn test_rw_many_readers() {
        let lock = RwSpinLock::new(7u32);
        let r1 = lock.read();
        let r2 = lock.read();
        assert_eq!(lock.reader_count(), 2);
        assert_eq!(*r1 + *r2, 14);
        assert!(lock.try_write().is_none());
        drop(r1);
        drop(r2);
        assert_eq!(lock.reader_count(), 0);
        assert!(lock.try_write().is_some());
    }

    #[test]
    fn test_rw_writer_excludes_readers() {
        let lock = RwSpinLock::new(0u32);
        let mut w = lock.write();
        *w = 5;
        assert!(lock.is_write_locked());
        assert!(lock.try_read().is_none());
        assert!(lock.try_write().is_none());
        drop(w);
        assert_eq!(*lock.read(), 5);
    }

    #[test]
    fn test_rw_concurrent_pairs_stay_consistent() {
        // Writers keep both halves equal; readers must never see them differ.
        let lock = Arc::new(RwSpinLock::new((0u64, 0u64)));
        let mut handles = vec![];

        for _ in 0..2 {
            let lock = Arc::clone(&lock);
            handles.push(thread::spawn(move || {
                for _ in 0..2000 {
                    let mut g = lock.write();
                    g.0 += 1;
                    g.1 += 1;
                }
            }));
        }
        for _ in 0..4 {
            let lock = Arc::clone(&lock);
            handles.push(thread::spawn(move || {
                for _ in 0..2000 {
                    let g = lock.read();
                    assert_eq!(g.0, g.1);
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*lock.read(), (4000, 4000));
    }
}
