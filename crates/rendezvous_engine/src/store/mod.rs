pub mod memory;
pub mod traits;

pub use memory::{IdSource, InMemoryStore, random_waiting_id};
pub use traits::{RendezvousStore, StoreHandle};
