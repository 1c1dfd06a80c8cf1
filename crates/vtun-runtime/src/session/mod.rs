//! Bidirectional session table
//!
//! Sessions are reachable by two keys: the client endpoint
//! ([`ForwardKey`]) and the virtual IP allocated to it ([`ReverseKey`]).
//! Both maps and the address pool sit behind one [`RwSpinLock`] and are
//! only ever changed together, so no reader can see a session in one map
//! and not the other, and an address is always either free in the pool or
//! the reverse key of exactly one live session.
//!
//! Lookups return [`SessionRef`] handles that do not keep the session alive.
//!
//! # Locking
//!
//! Every operation holds the lock for a handful of hash-map operations and
//! never blocks inside it. Deletion is by forward key only.

mod clock;
mod key;
mod pool;
mod value;

pub use clock::monotonic_secs;
pub use key::{ForwardKey, ReverseKey};
pub use value::{Session, SessionRef, SessionSnapshot};

use pool::AddressPool;
use std::collections::HashMap;
use std::sync::Arc;
use vtun_core::error::{ConfigError, SessionError, SessionResult};
use vtun_core::{Ip, RwSpinLock};

struct Maps {
    forward: HashMap<ForwardKey, Arc<Session>>,
    reverse: HashMap<ReverseKey, Arc<Session>>,
    pool: AddressPool,
}

/// Concurrent session store keyed by client endpoint and by virtual IP
pub struct SessionTable {
    maps: RwSpinLock<Maps>,
    range: (Ip, Ip),
    own: Ip,
}

impl SessionTable {
    /// Build a table whose pool covers `(start, end)` exclusive, minus `own`
    ///
    /// `bucket_hint` pre-sizes both maps for the expected session count.
    pub fn new(start: Ip, end: Ip, own: Ip, bucket_hint: usize) -> Result<Self, ConfigError> {
        let pool = AddressPool::from_range(start, end, own)?;
        tracing::debug!(%start, %end, %own, free = pool.len(), "session table created");
        Ok(Self {
            maps: RwSpinLock::new(Maps {
                forward: HashMap::with_capacity(bucket_hint),
                reverse: HashMap::with_capacity(bucket_hint),
                pool,
            }),
            range: (start, end),
            own,
        })
    }

    /// Create a session for `key`, allocating its virtual IP
    ///
    /// Fails with `Duplicate` if `key` is live, or `PoolExhausted` if no
    /// address is free; in both cases nothing is changed.
    pub fn add_session(&self, key: ForwardKey, mss: u16, seq: u32, ack: u32) -> SessionResult<ReverseKey> {
        let mut maps = self.maps.write();
        if maps.forward.contains_key(&key) {
            return Err(SessionError::Duplicate);
        }
        let ip = maps.pool.alloc().ok_or(SessionError::PoolExhausted)?;
        let reverse = ReverseKey::new(ip);

        let session = Arc::new(Session::new(key, reverse, mss, seq, ack));
        maps.forward.insert(key, Arc::clone(&session));
        maps.reverse.insert(reverse, session);
        drop(maps);

        tracing::trace!(forward = %key, reverse = %reverse, "session added");
        Ok(reverse)
    }

    /// Remove the session for `key` and return its address to the pool
    pub fn del_session(&self, key: &ForwardKey) -> SessionResult<ReverseKey> {
        let mut maps = self.maps.write();
        let session = maps.forward.remove(key).ok_or(SessionError::NotFound)?;
        let reverse = session.reverse_key();
        let paired = maps.reverse.remove(&reverse);
        debug_assert!(
            paired.as_ref().is_some_and(|p| Arc::ptr_eq(p, &session)),
            "reverse entry for {} does not match forward entry {}",
            reverse,
            key
        );
        maps.pool.release(reverse.ip);
        drop(maps);

        // Last strong references drop here, outside the lock.
        drop(paired);
        drop(session);
        tracing::trace!(forward = %key, reverse = %reverse, "session deleted");
        Ok(reverse)
    }

    /// Look up by client endpoint
    pub fn get_session(&self, key: &ForwardKey) -> Option<SessionRef> {
        self.maps.read().forward.get(key).map(SessionRef::from_arc)
    }

    /// Look up by allocated virtual IP
    pub fn get_session_by_rev(&self, key: &ReverseKey) -> Option<SessionRef> {
        self.maps.read().reverse.get(key).map(SessionRef::from_arc)
    }

    /// Handles to every session live at the time of the call
    pub fn get_session_list(&self) -> Vec<SessionRef> {
        let maps = self.maps.read();
        let mut list = Vec::with_capacity(maps.forward.len());
        list.extend(maps.forward.values().map(SessionRef::from_arc));
        list
    }

    /// Number of live sessions
    pub fn get_session_cnt(&self) -> usize {
        self.maps.read().forward.len()
    }

    /// Number of free addresses
    pub fn get_ip_cnt(&self) -> usize {
        self.maps.read().pool.len()
    }

    /// Forward keys of sessions idle for at least `max_idle_secs` at `now`
    ///
    /// Read-only; the caller expires them with [`del_session`](Self::del_session).
    pub fn idle_sessions(&self, now: u64, max_idle_secs: u64) -> Vec<ForwardKey> {
        self.maps
            .read()
            .forward
            .values()
            .filter(|s| s.idle_secs(now) >= max_idle_secs)
            .map(|s| s.forward_key())
            .collect()
    }

    /// Delete every session idle for at least `max_idle_secs`, returning how many went
    pub fn expire_idle(&self, now: u64, max_idle_secs: u64) -> usize {
        let expired = self
            .idle_sessions(now, max_idle_secs)
            .iter()
            .filter(|key| self.del_session(key).is_ok())
            .count();
        if expired > 0 {
            tracing::debug!(expired, max_idle_secs, "idle sessions expired");
        }
        expired
    }

    /// Configured `(start, end)` address range
    pub fn address_range(&self) -> (Ip, Ip) {
        self.range
    }

    /// The table's own address, never handed out
    pub fn own_ip(&self) -> Ip {
        self.own
    }
}

impl std::fmt::Debug for SessionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let maps = self.maps.read();
        f.debug_struct("SessionTable")
            .field("range", &self.range)
            .field("own", &self.own)
            .field("sessions", &maps.forward.len())
            .field("free_ips", &maps.pool.len())
            .finish()
    }
}
