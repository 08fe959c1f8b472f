/* 📖 # Why have a dedicated waiting-entry model?

A waiting entry is the whole state of one rendezvous: the description the waiting party
registered and, once a caller shows up, the calling description. It moves through
`Created("") -> Answered(X) -> Removed`, and the removal happens when the waiting party
polls and sees X. Keeping the model apart from the store lets the store focus on the two
indices and the locking.
*/

use std::fmt;
use std::time::Instant;

use serde::Serialize;

/// Length of a generated waiting id, in hex characters (64 bits of entropy).
pub const WAITING_ID_LEN: usize = 16;

/// Opaque identifier handed to the waiting party on registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct WaitingId(String);

impl WaitingId {
    /// Wrap an id received from a client. No validation: unknown ids simply miss in the store.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for WaitingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One registered rendezvous.
#[derive(Debug, Clone)]
pub struct WaitingEntry {
    id: WaitingId,
    description: String,
    calling_description: String,
    registered_at: Instant,
}

impl WaitingEntry {
    pub(crate) fn new(id: WaitingId, description: String, registered_at: Instant) -> Self {
        Self {
            id,
            description,
            calling_description: String::new(),
            registered_at,
        }
    }

    pub fn id(&self) -> &WaitingId {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// The calling description, empty until a caller attaches one.
    pub fn calling_description(&self) -> &str {
        &self.calling_description
    }

    /// True once a calling description has been attached.
    pub fn is_answered(&self) -> bool {
        !self.calling_description.is_empty()
    }

    pub fn registered_at(&self) -> Instant {
        self.registered_at
    }

    pub(crate) fn set_calling_description(&mut self, calling_description: String) {
        self.calling_description = calling_description;
    }
}

/// What a calling party sees when looking up a waiting id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WaitingInfo {
    pub id: WaitingId,
    pub description: String,
}

/// Read-only copy of an entry for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySnapshot {
    pub description: String,
    pub calling_description: String,
}

impl From<&WaitingEntry> for EntrySnapshot {
    fn from(entry: &WaitingEntry) -> Self {
        Self {
            description: entry.description.clone(),
            calling_description: entry.calling_description.clone(),
        }
    }
}
