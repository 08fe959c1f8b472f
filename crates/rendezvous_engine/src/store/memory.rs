/* 📖 # Why two HashMaps?

`by_id` is the source of truth and serves every id lookup in O(1).
`by_description` exists only so that registering the same description twice hands back
the same id. Every removal (delivery or idle sweep) clears both maps, so a description
that was delivered can be registered again and gets a fresh, live id.
*/

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use tracing::debug;

use rendezvous_base::{RendezvousError, RendezvousResult};

use crate::store::traits::RendezvousStore;
use crate::waiting::{EntrySnapshot, WAITING_ID_LEN, WaitingEntry, WaitingId, WaitingInfo};

const HEX_ALPHABET: [char; 16] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f',
];

/// Source of candidate waiting ids.
pub type IdSource = Box<dyn FnMut() -> WaitingId + Send + Sync>;

/// Draws a random 16 hex character id from the OS-seeded CSPRNG behind nanoid.
pub fn random_waiting_id() -> WaitingId {
    WaitingId::from_string(nanoid::nanoid!(WAITING_ID_LEN, &HEX_ALPHABET))
}

/// An in-memory rendezvous store.
///
/// ```
/// use rendezvous_engine::store::{InMemoryStore, RendezvousStore};
///
/// let mut store = InMemoryStore::new();
/// let id = store.register("alice").unwrap();
/// store.attach_calling(&id, "bob-offer").unwrap();
/// assert_eq!(store.poll_calling(&id).unwrap(), "bob-offer");
/// assert!(store.poll_calling(&id).is_err());
/// ```
pub struct InMemoryStore {
    by_id: HashMap<WaitingId, WaitingEntry>,
    by_description: HashMap<String, WaitingId>,
    id_source: IdSource,
}

impl InMemoryStore {
    /// Create a new, empty store drawing random ids.
    pub fn new() -> Self {
        Self::with_id_source(Box::new(random_waiting_id))
    }

    /// Create a store that takes candidate ids from `id_source`.
    ///
    /// Candidates that collide with a live id are discarded and another one is drawn.
    pub fn with_id_source(id_source: IdSource) -> Self {
        Self {
            by_id: HashMap::new(),
            by_description: HashMap::new(),
            id_source,
        }
    }

    fn next_free_id(&mut self) -> WaitingId {
        loop {
            let candidate = (self.id_source)();
            if !self.by_id.contains_key(&candidate) {
                return candidate;
            }
            debug!(id = %candidate, "Waiting id collision, drawing again");
        }
    }

    /// Drop an entry from both indices.
    fn remove_entry(&mut self, id: &WaitingId) -> Option<WaitingEntry> {
        let entry = self.by_id.remove(id)?;
        if self.by_description.get(entry.description()) == Some(id) {
            self.by_description.remove(entry.description());
        }
        Some(entry)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("by_id", &self.by_id)
            .field("by_description", &self.by_description)
            .finish_non_exhaustive()
    }
}

impl RendezvousStore for InMemoryStore {
    fn register(&mut self, description: &str) -> RendezvousResult<WaitingId> {
        if description.is_empty() {
            return Err(Box::new(RendezvousError::invalid_input("empty description")));
        }

        if let Some(id) = self.by_description.get(description)
            && self.by_id.contains_key(id)
        {
            debug!(%id, "Description already registered");
            return Ok(id.clone());
        }

        let id = self.next_free_id();
        self.by_id.insert(
            id.clone(),
            WaitingEntry::new(id.clone(), description.to_string(), Instant::now()),
        );
        self.by_description
            .insert(description.to_string(), id.clone());
        debug!(%id, live = self.by_id.len(), "Registered waiting entry");
        Ok(id)
    }

    fn get_waiting(&self, id: &WaitingId) -> RendezvousResult<WaitingInfo> {
        let entry = self
            .by_id
            .get(id)
            .ok_or_else(|| Box::new(RendezvousError::not_found(id.as_str())))?;
        if entry.is_answered() {
            return Err(Box::new(RendezvousError::already_called(id.as_str())));
        }
        Ok(WaitingInfo {
            id: entry.id().clone(),
            description: entry.description().to_string(),
        })
    }

    fn attach_calling(
        &mut self,
        id: &WaitingId,
        calling_description: &str,
    ) -> RendezvousResult<()> {
        if id.is_empty() {
            return Err(Box::new(RendezvousError::invalid_input("empty waitingId")));
        }
        if calling_description.is_empty() {
            return Err(Box::new(RendezvousError::invalid_input(
                "empty callingDescription",
            )));
        }
        let entry = self
            .by_id
            .get_mut(id)
            .ok_or_else(|| Box::new(RendezvousError::not_found(id.as_str())))?;
        if entry.is_answered() {
            debug!(%id, "Replacing existing calling description");
        }
        entry.set_calling_description(calling_description.to_string());
        Ok(())
    }

    fn poll_calling(&mut self, id: &WaitingId) -> RendezvousResult<String> {
        let entry = self
            .by_id
            .get(id)
            .ok_or_else(|| Box::new(RendezvousError::not_found(id.as_str())))?;
        if !entry.is_answered() {
            return Ok(String::new());
        }
        let calling_description = entry.calling_description().to_string();
        self.remove_entry(id);
        debug!(%id, live = self.by_id.len(), "Delivered calling description");
        Ok(calling_description)
    }

    fn debug_dump(&self) -> RendezvousResult<BTreeMap<WaitingId, EntrySnapshot>> {
        Ok(self
            .by_id
            .iter()
            .map(|(id, entry)| (id.clone(), EntrySnapshot::from(entry)))
            .collect())
    }

    fn sweep_idle(&mut self, now: Instant, max_idle: Duration) -> RendezvousResult<usize> {
        let expired: Vec<WaitingId> = self
            .by_id
            .values()
            .filter(|entry| now.saturating_duration_since(entry.registered_at()) > max_idle)
            .map(|entry| entry.id().clone())
            .collect();
        for id in &expired {
            self.remove_entry(id);
        }
        Ok(expired.len())
    }

    fn len(&self) -> RendezvousResult<usize> {
        Ok(self.by_id.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreHandle;
    use rendezvous_base::ErrorKind;
    use std::collections::VecDeque;

    fn scripted_ids(ids: &[&str]) -> IdSource {
        let mut queue: VecDeque<WaitingId> =
            ids.iter().map(|id| WaitingId::from_string(*id)).collect();
        Box::new(move || queue.pop_front().expect("id script exhausted"))
    }

    fn id(s: &str) -> WaitingId {
        WaitingId::from_string(s)
    }

    #[test]
    fn test_register_empty_description_is_invalid() {
        let mut store = InMemoryStore::new();
        let err = store.register("").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidInput { .. }));
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_random_ids_are_sixteen_hex_chars() {
        let mut store = InMemoryStore::new();
        let id = store.register("alice").unwrap();
        assert_eq!(id.as_str().len(), WAITING_ID_LEN);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_register_same_description_is_idempotent() {
        let mut store = InMemoryStore::new();
        let first = store.register("alice").unwrap();
        store.attach_calling(&first, "bob-offer").unwrap();

        let second = store.register("alice").unwrap();
        assert_eq!(first, second);
        assert_eq!(store.len().unwrap(), 1);
        // The existing answer is not reset
        assert_eq!(store.poll_calling(&first).unwrap(), "bob-offer");
    }

    #[test]
    fn test_register_different_descriptions_get_different_ids() {
        let mut store = InMemoryStore::new();
        let alice = store.register("alice").unwrap();
        let carol = store.register("carol").unwrap();
        assert_ne!(alice, carol);
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_register_retries_on_id_collision() {
        let mut store =
            InMemoryStore::with_id_source(scripted_ids(&["aaaa", "aaaa", "aaaa", "bbbb"]));
        assert_eq!(store.register("alice").unwrap(), id("aaaa"));
        assert_eq!(store.register("carol").unwrap(), id("bbbb"));
    }

    #[test]
    fn test_get_waiting_fresh_entry() {
        let mut store = InMemoryStore::new();
        let waiting = store.register("alice").unwrap();

        let info = store.get_waiting(&waiting).unwrap();
        assert_eq!(info.id, waiting);
        assert_eq!(info.description, "alice");
    }

    #[test]
    fn test_get_waiting_unknown_id() {
        let store = InMemoryStore::new();
        let err = store.get_waiting(&id("unknown")).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::NotFound { .. }));
    }

    #[test]
    fn test_get_waiting_after_attach_is_already_called() {
        let mut store = InMemoryStore::new();
        let waiting = store.register("alice").unwrap();
        store.attach_calling(&waiting, "bob-offer").unwrap();

        let err = store.get_waiting(&waiting).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::AlreadyCalled { .. }));
    }

    #[test]
    fn test_attach_calling_validation() {
        let mut store = InMemoryStore::new();
        let waiting = store.register("alice").unwrap();

        let err = store.attach_calling(&id(""), "bob-offer").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidInput { .. }));

        let err = store.attach_calling(&waiting, "").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidInput { .. }));

        let err = store.attach_calling(&id("unknown"), "bob-offer").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::NotFound { .. }));

        // Nothing changed on the live entry
        assert!(store.get_waiting(&waiting).is_ok());
    }

    #[test]
    fn test_attach_calling_twice_overwrites() {
        let mut store = InMemoryStore::new();
        let waiting = store.register("alice").unwrap();
        store.attach_calling(&waiting, "bob-offer").unwrap();
        store.attach_calling(&waiting, "dave-offer").unwrap();

        assert_eq!(store.poll_calling(&waiting).unwrap(), "dave-offer");
    }

    #[test]
    fn test_poll_before_attach_keeps_entry() {
        let mut store = InMemoryStore::new();
        let waiting = store.register("alice").unwrap();

        assert_eq!(store.poll_calling(&waiting).unwrap(), "");
        assert_eq!(store.poll_calling(&waiting).unwrap(), "");
        assert!(store.get_waiting(&waiting).is_ok());
    }

    #[test]
    fn test_poll_after_attach_delivers_once() {
        let mut store = InMemoryStore::new();
        let waiting = store.register("alice").unwrap();
        store.attach_calling(&waiting, "bob-offer").unwrap();

        assert_eq!(store.poll_calling(&waiting).unwrap(), "bob-offer");
        let err = store.poll_calling(&waiting).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::NotFound { .. }));
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_poll_unknown_id() {
        let mut store = InMemoryStore::new();
        let err = store.poll_calling(&id("unknown")).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::NotFound { .. }));
    }

    #[test]
    fn test_register_after_delivery_gets_live_id() {
        let mut store =
            InMemoryStore::with_id_source(scripted_ids(&["aaaa", "bbbb"]));
        let first = store.register("alice").unwrap();
        store.attach_calling(&first, "bob-offer").unwrap();
        store.poll_calling(&first).unwrap();

        let second = store.register("alice").unwrap();
        assert_eq!(second, id("bbbb"));
        assert_eq!(store.get_waiting(&second).unwrap().description, "alice");
    }

    #[test]
    fn test_debug_dump() {
        let mut store = InMemoryStore::with_id_source(scripted_ids(&["aaaa", "bbbb"]));
        store.register("alice").unwrap();
        let carol = store.register("carol").unwrap();
        store.attach_calling(&carol, "bob-offer").unwrap();

        let dump = store.debug_dump().unwrap();
        assert_eq!(dump.len(), 2);
        assert_eq!(dump[&id("aaaa")].description, "alice");
        assert_eq!(dump[&id("aaaa")].calling_description, "");
        assert_eq!(dump[&id("bbbb")].calling_description, "bob-offer");
    }

    #[test]
    fn test_sweep_idle_removes_old_entries_from_both_indices() {
        let mut store = InMemoryStore::with_id_source(scripted_ids(&["aaaa", "bbbb"]));
        let first = store.register("alice").unwrap();

        // Nothing is older than an hour yet
        assert_eq!(
            store
                .sweep_idle(Instant::now(), Duration::from_secs(3600))
                .unwrap(),
            0
        );

        let later = Instant::now() + Duration::from_secs(7200);
        assert_eq!(
            store.sweep_idle(later, Duration::from_secs(3600)).unwrap(),
            1
        );
        assert!(store.is_empty().unwrap());
        assert!(store.get_waiting(&first).is_err());

        // The description is free again
        assert_eq!(store.register("alice").unwrap(), id("bbbb"));
    }

    #[test]
    fn test_store_handle_shared_between_clones() {
        let handle = StoreHandle::new(InMemoryStore::new());
        let other = handle.clone();

        let waiting = handle.register("alice").unwrap();
        other.attach_calling(&waiting, "bob-offer").unwrap();
        assert_eq!(handle.len().unwrap(), 1);
        assert_eq!(other.poll_calling(&waiting).unwrap(), "bob-offer");
        assert!(handle.is_empty().unwrap());
    }

    #[test]
    fn test_store_handle_concurrent_registration() {
        let handle = StoreHandle::new(InMemoryStore::new());
        let threads: Vec<_> = (0..8)
            .map(|n| {
                let handle = handle.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .map(|i| handle.register(&format!("party-{}-{}", n, i)).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let ids: std::collections::HashSet<WaitingId> = threads
            .into_iter()
            .flat_map(|t| t.join().unwrap())
            .collect();

        assert_eq!(ids.len(), 400);
        assert_eq!(handle.len().unwrap(), 400);
    }
}
