//! Per-session state and the non-owning handle given to callers
//!
//! The table owns every [`Session`] through an `Arc`. Callers only ever get
//! a [`SessionRef`] (a `Weak`), which resolves to `None` once the table has
//! deleted the session.

use super::clock::monotonic_secs;
use super::key::{ForwardKey, ReverseKey};
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Mutable state of one tunnel session
///
/// The two keys are fixed at creation; every other field is atomic and may
/// be read and written from any worker.
#[derive(Debug)]
pub struct Session {
    forward: ForwardKey,
    reverse: ReverseKey,
    tcp_mss: AtomicU16,
    tcp_seq: AtomicU32,
    tcp_ack: AtomicU32,
    tcp_ok: AtomicBool,
    vpn_req: AtomicBool,
    vpn_ready: AtomicBool,
    last_packet_ts: AtomicU64,
}

/// Plain-value copy of a session, for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub forward: ForwardKey,
    pub reverse: ReverseKey,
    pub tcp_mss: u16,
    pub tcp_seq: u32,
    pub tcp_ack: u32,
    pub tcp_ok: bool,
    pub vpn_req: bool,
    pub vpn_ready: bool,
    pub last_packet_ts: u64,
}

impl Session {
    pub(crate) fn new(forward: ForwardKey, reverse: ReverseKey, mss: u16, seq: u32, ack: u32) -> Self {
        Self {
            forward,
            reverse,
            tcp_mss: AtomicU16::new(mss),
            tcp_seq: AtomicU32::new(seq),
            tcp_ack: AtomicU32::new(ack),
            tcp_ok: AtomicBool::new(false),
            vpn_req: AtomicBool::new(false),
            vpn_ready: AtomicBool::new(false),
            last_packet_ts: AtomicU64::new(monotonic_secs()),
        }
    }

    #[inline]
    pub fn forward_key(&self) -> ForwardKey {
        self.forward
    }

    #[inline]
    pub fn reverse_key(&self) -> ReverseKey {
        self.reverse
    }

    // --- TCP ---

    #[inline]
    pub fn mss(&self) -> u16 {
        self.tcp_mss.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_mss(&self, mss: u16) {
        self.tcp_mss.store(mss, Ordering::Relaxed);
    }

    #[inline]
    pub fn seq(&self) -> u32 {
        self.tcp_seq.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_seq(&self, seq: u32) {
        self.tcp_seq.store(seq, Ordering::Relaxed);
    }

    /// Advance the sequence number by `len` (wrapping), returning the old value
    #[inline]
    pub fn advance_seq(&self, len: u32) -> u32 {
        self.tcp_seq.fetch_add(len, Ordering::Relaxed)
    }

    #[inline]
    pub fn ack(&self) -> u32 {
        self.tcp_ack.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_ack(&self, ack: u32) {
        self.tcp_ack.store(ack, Ordering::Relaxed);
    }

    // --- progress flags ---

    #[inline]
    pub fn tcp_ok(&self) -> bool {
        self.tcp_ok.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_tcp_ok(&self, v: bool) {
        self.tcp_ok.store(v, Ordering::Release);
    }

    #[inline]
    pub fn vpn_req(&self) -> bool {
        self.vpn_req.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_vpn_req(&self, v: bool) {
        self.vpn_req.store(v, Ordering::Release);
    }

    #[inline]
    pub fn vpn_ready(&self) -> bool {
        self.vpn_ready.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_vpn_ready(&self, v: bool) {
        self.vpn_ready.store(v, Ordering::Release);
    }

    // --- activity ---

    #[inline]
    pub fn last_packet_ts(&self) -> u64 {
        self.last_packet_ts.load(Ordering::Relaxed)
    }

    /// Record packet activity now
    #[inline]
    pub fn touch(&self) {
        self.touch_at(monotonic_secs());
    }

    /// Record packet activity at `now`; never moves the timestamp backwards
    #[inline]
    pub fn touch_at(&self, now: u64) {
        self.last_packet_ts.fetch_max(now, Ordering::Relaxed);
    }

    /// Seconds since the last packet, as seen at `now`
    #[inline]
    pub fn idle_secs(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_packet_ts())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            forward: self.forward,
            reverse: self.reverse,
            tcp_mss: self.mss(),
            tcp_seq: self.seq(),
            tcp_ack: self.ack(),
            tcp_ok: self.tcp_ok(),
            vpn_req: self.vpn_req(),
            vpn_ready: self.vpn_ready(),
            last_packet_ts: self.last_packet_ts(),
        }
    }
}

/// Non-owning handle to a session held by the table
///
/// Does not keep the session alive. Every access goes through
/// [`upgrade`](SessionRef::upgrade) or [`with`](SessionRef::with), both of
/// which report a deleted session as `None`.
#[derive(Debug, Clone)]
pub struct SessionRef {
    inner: Weak<Session>,
}

impl SessionRef {
    pub(crate) fn from_arc(session: &Arc<Session>) -> Self {
        Self { inner: Arc::downgrade(session) }
    }

    /// Temporarily promote to a strong reference, if still alive
    ///
    /// Keep the returned `Arc` short-lived: while held, a deleted session's
    /// memory stays allocated even though the table no longer lists it.
    #[inline]
    pub fn upgrade(&self) -> Option<Arc<Session>> {
        self.inner.upgrade()
    }

    /// Run `f` against the session if it has not been deleted
    #[inline]
    pub fn with<R>(&self, f: impl FnOnce(&Session) -> R) -> Option<R> {
        self.inner.upgrade().map(|s| f(&s))
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// True if both handles refer to the same session record
    #[inline]
    pub fn ptr_eq(&self, other: &SessionRef) -> bool {
        Weak::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtun_core::Ip;

    fn session() -> Session {
        Session::new(
            ForwardKey::new(Ip::from_octets(203, 0, 113, 5), 5555),
            ReverseKey::new(Ip::from_octets(10, 8, 0, 2)),
            1460,
            100,
            200,
        )
    }

    #[test]
    fn test_initial_state() {
        let s = session();
        let snap = s.snapshot();
        assert_eq!((snap.tcp_mss, snap.tcp_seq, snap.tcp_ack), (1460, 100, 200));
        assert!(!snap.tcp_ok && !snap.vpn_req && !snap.vpn_ready);
        assert!(s.last_packet_ts() <= monotonic_secs());
    }

    #[test]
    fn test_mutators() {
        let s = session();
        s.set_tcp_ok(true);
        s.set_vpn_ready(true);
        assert_eq!(s.advance_seq(10), 100);
        s.set_ack(u32::MAX);
        s.set_mss(1200);

        let snap = s.snapshot();
        assert!(snap.tcp_ok && snap.vpn_ready && !snap.vpn_req);
        assert_eq!((snap.tcp_mss, snap.tcp_seq, snap.tcp_ack), (1200, 110, u32::MAX));
    }

    #[test]
    fn test_touch_is_monotonic() {
        let s = session();
        let base = s.last_packet_ts();
        s.touch_at(base + 50);
        s.touch_at(base + 10);
        assert_eq!(s.last_packet_ts(), base + 50);
        assert_eq!(s.idle_secs(base + 80), 30);
        assert_eq!(s.idle_secs(0), 0);
    }

    #[test]
    fn test_ref_does_not_extend_lifetime() {
        let owner = Arc::new(session());
        let handle = SessionRef::from_arc(&owner);
        assert_eq!(handle.with(|s| s.mss()), Some(1460));
        assert!(handle.is_alive());

        drop(owner);
        assert!(!handle.is_alive());
        assert!(handle.upgrade().is_none());
        assert_eq!(handle.with(|s| s.mss()), None);
    }
}
