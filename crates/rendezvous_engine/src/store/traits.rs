/* 📖 # Why create a RendezvousStore trait?

The HTTP service only needs the five rendezvous operations. Putting them behind a trait:

1. keeps the service ignorant of how entries and indices are laid out
2. lets tests drive the service against a store with a scripted id source
3. leaves room for a different backend without touching the endpoint code

The trait methods take `&mut self` where they mutate; the StoreHandle decides how
callers are serialized.
*/

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use rendezvous_base::RendezvousResult;

use crate::waiting::{EntrySnapshot, WaitingId, WaitingInfo};

/// Trait for rendezvous storage implementations.
pub trait RendezvousStore: Send + Sync + 'static {
    /// Register a waiting description and return its id.
    ///
    /// Registering a description that is already live returns the existing id and leaves
    /// the entry untouched.
    ///
    /// # Errors
    /// * `InvalidInput` if `description` is empty
    fn register(&mut self, description: &str) -> RendezvousResult<WaitingId>;

    /// Look up a waiting entry that has not been answered yet.
    ///
    /// # Errors
    /// * `NotFound` if no live entry has this id
    /// * `AlreadyCalled` if a calling description is already attached
    fn get_waiting(&self, id: &WaitingId) -> RendezvousResult<WaitingInfo>;

    /// Attach a calling description to a waiting entry, replacing any previous one.
    ///
    /// # Errors
    /// * `InvalidInput` if `id` or `calling_description` is empty
    /// * `NotFound` if no live entry has this id
    fn attach_calling(&mut self, id: &WaitingId, calling_description: &str)
    -> RendezvousResult<()>;

    /// Return the calling description for `id`, empty if nobody has called yet.
    ///
    /// A non-empty answer is delivered once: the entry is removed as it is returned.
    ///
    /// # Errors
    /// * `NotFound` if no live entry has this id
    fn poll_calling(&mut self, id: &WaitingId) -> RendezvousResult<String>;

    /// Copy of every live entry, keyed by id.
    fn debug_dump(&self) -> RendezvousResult<BTreeMap<WaitingId, EntrySnapshot>>;

    /// Remove every entry registered more than `max_idle` before `now`.
    ///
    /// Returns the number of entries removed.
    fn sweep_idle(&mut self, now: Instant, max_idle: Duration) -> RendezvousResult<usize>;

    /// Number of live entries.
    fn len(&self) -> RendezvousResult<usize>;

    /// Returns true if the store holds no live entries.
    fn is_empty(&self) -> RendezvousResult<bool> {
        Ok(self.len()? == 0)
    }
}

/* 📖 # Why a single Mutex instead of a RwLock?

Both indices must change together, and the most frequent reader (`poll_calling`) can turn
into a delete. One mutex held for the whole operation makes every operation atomic with
respect to every other. No operation does I/O while holding it.
*/

/// A thread-safe handle to a rendezvous store.
///
/// StoreHandle provides cheap cloning (via Arc) and serializes all operations through one lock.
#[derive(Clone)]
pub struct StoreHandle(Arc<Mutex<dyn RendezvousStore>>);

impl StoreHandle {
    /// Create a new StoreHandle wrapping the given store implementation.
    pub fn new<S: RendezvousStore>(store: S) -> Self {
        Self(Arc::new(Mutex::new(store)))
    }

    /// See [`RendezvousStore::register`].
    pub fn register(&self, description: &str) -> RendezvousResult<WaitingId> {
        self.0.lock().register(description)
    }

    /// See [`RendezvousStore::get_waiting`].
    pub fn get_waiting(&self, id: &WaitingId) -> RendezvousResult<WaitingInfo> {
        self.0.lock().get_waiting(id)
    }

    /// See [`RendezvousStore::attach_calling`].
    pub fn attach_calling(
        &self,
        id: &WaitingId,
        calling_description: &str,
    ) -> RendezvousResult<()> {
        self.0.lock().attach_calling(id, calling_description)
    }

    /// See [`RendezvousStore::poll_calling`].
    pub fn poll_calling(&self, id: &WaitingId) -> RendezvousResult<String> {
        self.0.lock().poll_calling(id)
    }

    /// See [`RendezvousStore::debug_dump`].
    pub fn debug_dump(&self) -> RendezvousResult<BTreeMap<WaitingId, EntrySnapshot>> {
        self.0.lock().debug_dump()
    }

    /// See [`RendezvousStore::sweep_idle`].
    pub fn sweep_idle(&self, now: Instant, max_idle: Duration) -> RendezvousResult<usize> {
        self.0.lock().sweep_idle(now, max_idle)
    }

    pub fn len(&self) -> RendezvousResult<usize> {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> RendezvousResult<bool> {
        self.0.lock().is_empty()
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle").finish_non_exhaustive()
    }
}
