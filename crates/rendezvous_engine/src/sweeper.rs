/* 📖 # Why sweep idle entries at all?

A waiting party that registers and then disappears leaves its entry behind forever: nobody
will ever poll it into removal. For long running deployments the idle sweeper bounds that
growth by dropping entries registered longer ago than the configured limit.

Expiry is off unless configured. The sweeper shares the server's shutdown flag so both stop
together, and it checks the flag in short ticks rather than sleeping a whole interval.
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use rendezvous_base::{RendezvousResult, err};

use crate::store::StoreHandle;

const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for the idle sweeper.
#[derive(Clone, Debug)]
pub struct IdleSweeperConfig {
    store: StoreHandle,
    interval: Duration,
    max_idle: Duration,
    shutdown: Arc<AtomicBool>,
}

impl IdleSweeperConfig {
    pub fn new(
        store: StoreHandle,
        interval: Duration,
        max_idle: Duration,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            store,
            interval,
            max_idle,
            shutdown,
        }
    }
}

/// Handle to a running idle sweeper thread.
pub struct IdleSweeper {
    worker: JoinHandle<()>,
}

impl IdleSweeper {
    /// Spawn the sweeper thread. It runs until the shutdown flag is set.
    pub fn start(config: IdleSweeperConfig) -> RendezvousResult<Self> {
        info!(
            interval_secs = config.interval.as_secs(),
            max_idle_secs = config.max_idle.as_secs(),
            "Starting idle sweeper"
        );
        let worker = std::thread::Builder::new()
            .name("idle-sweeper".to_string())
            .spawn(move || run_sweeper(config))
            .map_err(|e| err!("Failed to spawn idle sweeper: {}", e))?;
        Ok(Self { worker })
    }

    /// Wait for the sweeper thread to exit.
    pub fn join(self) -> RendezvousResult<()> {
        self.worker
            .join()
            .map_err(|_| err!("Idle sweeper thread panicked"))
    }
}

fn run_sweeper(config: IdleSweeperConfig) {
    let mut next_sweep = Instant::now() + config.interval;
    while !config.shutdown.load(Ordering::Relaxed) {
        if Instant::now() >= next_sweep {
            sweep_once(&config.store, config.max_idle);
            next_sweep = Instant::now() + config.interval;
        }
        std::thread::sleep(SHUTDOWN_POLL_INTERVAL.min(config.interval));
    }
    debug!("Idle sweeper stopped");
}

/// Run a single sweep, returning the number of entries removed.
pub fn sweep_once(store: &StoreHandle, max_idle: Duration) -> usize {
    match store.sweep_idle(Instant::now(), max_idle) {
        Ok(0) => 0,
        Ok(removed) => {
            info!(count = removed, "Removed idle waiting entries");
            removed
        }
        Err(e) => {
            warn!(error = %e, "Idle sweep failed");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    #[test]
    fn test_sweep_once_keeps_fresh_entries() {
        let store = StoreHandle::new(InMemoryStore::new());
        store.register("alice").unwrap();

        assert_eq!(sweep_once(&store, Duration::from_secs(3600)), 0);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_sweep_once_removes_old_entries() {
        let store = StoreHandle::new(InMemoryStore::new());
        store.register("alice").unwrap();
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(sweep_once(&store, Duration::from_millis(1)), 1);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_sweeper_thread_stops_on_shutdown() {
        let store = StoreHandle::new(InMemoryStore::new());
        store.register("alice").unwrap();
        let shutdown = Arc::new(AtomicBool::new(false));

        let sweeper = IdleSweeper::start(IdleSweeperConfig::new(
            store.clone(),
            Duration::from_millis(10),
            Duration::from_millis(1),
            shutdown.clone(),
        ))
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !store.is_empty().unwrap() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(store.is_empty().unwrap());

        shutdown.store(true, Ordering::Relaxed);
        sweeper.join().unwrap();
    }
}
