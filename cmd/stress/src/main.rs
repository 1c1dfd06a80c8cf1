//! Stress test - one producer, a pool of consumers, shared session table
//!
//! The producer pushes fixed-size frames for a set of simulated clients into
//! the wake queue. Consumer workers drain it, opening a session on a client's
//! first frame and closing it on a close frame. The main thread drives the
//! pool monitor and idle expiry on the configured interval.
//!
//! Usage: `stress [FRAMES] [FAIL_EVERY]`
//!
//! With `FAIL_EVERY > 0` each consumer reports a failure after that many
//! frames, so the monitor has dead workers to restart.

use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use vtun::session::monotonic_secs;
use vtun::{
    ForwardKey, Ip, QueueError, RuntimeConfig, SessionError, SessionTable, TaskError,
    TracingObserver, WakeStrategy, WorkerContext, WorkerPool, WorkerTask,
};

/// ip(4) | port(2) | op(1) | pad(1)
const FRAME_LEN: usize = 8;
const FRAMES_PER_READ: usize = 32;

const OP_DATA: u8 = 0;
const OP_CLOSE: u8 = 1;

const MSS: u16 = 1400;

#[derive(Default)]
struct Stats {
    frames: AtomicU64,
    opened: AtomicU64,
    closed: AtomicU64,
    dropped: AtomicU64,
    mismatched: AtomicU64,
    injected: AtomicU64,
}

fn encode(key: ForwardKey, op: u8) -> [u8; FRAME_LEN] {
    let ip = key.ip.as_u32().to_be_bytes();
    let port = key.port.to_be_bytes();
    [ip[0], ip[1], ip[2], ip[3], port[0], port[1], op, 0]
}

fn decode(frame: &[u8]) -> (ForwardKey, u8) {
    let ip = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]);
    let port = u16::from_be_bytes([frame[4], frame[5]]);
    (ForwardKey::new(Ip::new(ip), port), frame[6])
}

struct Consumer {
    queue: Arc<dyn WakeStrategy>,
    sessions: Arc<SessionTable>,
    stats: Arc<Stats>,
    fail_every: u64,
    handled: AtomicU64,
}

impl Consumer {
    fn handle(&self, key: ForwardKey, op: u8) {
        let stats = &self.stats;
        match op {
            OP_CLOSE => match self.sessions.del_session(&key) {
                Ok(_) => {
                    stats.closed.fetch_add(1, Ordering::Relaxed);
                }
                Err(SessionError::NotFound) => {}
                Err(e) => tracing::warn!(forward = %key, error = %e, "close failed"),
            },
            _ => {
                let session = match self.sessions.get_session(&key) {
                    Some(s) => s,
                    None => match self.sessions.add_session(key, MSS, 0, 0) {
                        Ok(_) => {
                            stats.opened.fetch_add(1, Ordering::Relaxed);
                            match self.sessions.get_session(&key) {
                                Some(s) => s,
                                None => return,
                            }
                        }
                        // Another consumer opened it first
                        Err(SessionError::Duplicate) => return,
                        Err(_) => {
                            stats.dropped.fetch_add(1, Ordering::Relaxed);
                            return;
                        }
                    },
                };

                let reverse = session.with(|s| {
                    s.touch();
                    s.advance_seq(FRAME_LEN as u32);
                    s.reverse_key()
                });
                if let Some(reverse) = reverse {
                    if let Some(back) = self.sessions.get_session_by_rev(&reverse) {
                        if back.is_alive() && session.is_alive() && !back.ptr_eq(&session) {
                            stats.mismatched.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            }
        }
    }
}

impl WorkerTask for Consumer {
    fn interrupt(&self) {
        self.queue.wake_all();
    }

    fn run(&self, ctx: &WorkerContext) -> Result<(), TaskError> {
        let mut buf = [0u8; FRAME_LEN * FRAMES_PER_READ];
        while !ctx.should_stop() {
            let n = match self.queue.dequeue_wait(&mut buf) {
                Ok(n) => n,
                Err(QueueError::WouldBlock) | Err(QueueError::Empty) => continue,
                Err(e) => return Err(TaskError::msg(e.to_string())),
            };

            for frame in buf[..n].chunks_exact(FRAME_LEN) {
                let (key, op) = decode(frame);
                self.handle(key, op);
            }
            let frames = (n / FRAME_LEN) as u64;
            self.stats.frames.fetch_add(frames, Ordering::Relaxed);

            let handled = self.handled.fetch_add(frames, Ordering::Relaxed) + frames;
            if self.fail_every > 0 && handled >= self.fail_every {
                self.handled.store(0, Ordering::Relaxed);
                self.stats.injected.fetch_add(1, Ordering::Relaxed);
                return Err(TaskError::msg(format!("injected failure after {} frames", handled)));
            }
        }
        Ok(())
    }
}

fn client(index: usize) -> ForwardKey {
    let c = index as u32;
    ForwardKey::new(Ip::from_octets(192, 168, (c >> 8) as u8, c as u8), 40_000 + (c % 20_000) as u16)
}

fn produce(queue: &dyn WakeStrategy, total: u64, clients: usize) {
    for i in 0..total {
        let index = (i as usize) % clients;
        let op = if i % 97 == 96 { OP_CLOSE } else { OP_DATA };
        let frame = encode(client(index), op);
        while let Err(QueueError::Full) = queue.enqueue_wake(&frame) {
            thread::yield_now();
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    vtun::init_logging();

    let mut args = std::env::args().skip(1);
    let total: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(200_000);
    let fail_every: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(0);

    let config = RuntimeConfig::from_env();
    config.validate()?;
    config.log();

    println!("=== vtun Stress Test ===\n");
    println!("frames: {}  workers: {}  wake: {}", total, config.num_workers, config.wake_kind);

    let queue: Arc<dyn WakeStrategy> = Arc::from(config.wake_strategy()?);
    let sessions = Arc::new(config.session_table()?);
    let stats = Arc::new(Stats::default());
    let addresses = sessions.get_ip_cnt();
    let clients = addresses.clamp(1, 200);

    let tasks: Vec<_> = (0..config.num_workers)
        .map(|_| Consumer {
            queue: Arc::clone(&queue),
            sessions: Arc::clone(&sessions),
            stats: Arc::clone(&stats),
            fail_every,
            handled: AtomicU64::new(0),
        })
        .collect();
    let mut pool = WorkerPool::new(tasks, Arc::new(TracingObserver));
    pool.start_pool()?;

    let start = Instant::now();
    let producer = {
        let queue = Arc::clone(&queue);
        thread::Builder::new()
            .name("vtun-producer".into())
            .spawn(move || produce(&*queue, total, clients))?
    };

    let mut restarts = 0;
    let outcome = loop {
        thread::sleep(config.monitor_interval);

        match pool.monitor_pool() {
            Ok(report) => restarts += report.recovered,
            Err(e) => break Err(e),
        }
        let expired = sessions.expire_idle(monotonic_secs(), config.session_idle.as_secs());
        let done = stats.frames.load(Ordering::Relaxed);
        tracing::info!(
            frames = done,
            sessions = sessions.get_session_cnt(),
            free_ips = sessions.get_ip_cnt(),
            expired,
            "progress"
        );

        if producer.is_finished() && done >= total {
            break Ok(());
        }
    };

    pool.stop_pool();
    if producer.join().is_err() {
        return Err("producer thread panicked".into());
    }
    outcome?;

    let elapsed = start.elapsed();
    println!("\nElapsed:    {:?}", elapsed);
    println!("Rate:       {:.0} frames/sec", total as f64 / elapsed.as_secs_f64());
    println!("Opened:     {}", stats.opened.load(Ordering::Relaxed));
    println!("Closed:     {}", stats.closed.load(Ordering::Relaxed));
    println!("Dropped:    {}", stats.dropped.load(Ordering::Relaxed));
    println!("Injected:   {}", stats.injected.load(Ordering::Relaxed));
    println!("Restarts:   {}", restarts);
    println!("Live:       {}", sessions.get_session_cnt());

    let mismatched = stats.mismatched.load(Ordering::Relaxed);
    if mismatched > 0 {
        return Err(format!("{} forward/reverse lookups disagreed", mismatched).into());
    }
    let accounted = sessions.get_session_cnt() + sessions.get_ip_cnt();
    if accounted != addresses {
        return Err(format!("{} of {} addresses accounted for", accounted, addresses).into());
    }
    println!("\n=== Test Complete ===");
    Ok(())
}
