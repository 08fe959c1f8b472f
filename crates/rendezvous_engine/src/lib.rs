pub mod api;
pub mod config;
pub mod store;
pub mod sweeper;
pub mod waiting;

pub use api::RendezvousService;
pub use config::{RendezvousConfig, load_config};
pub use store::{InMemoryStore, RendezvousStore, StoreHandle};
pub use sweeper::{IdleSweeper, IdleSweeperConfig};
pub use waiting::{EntrySnapshot, WaitingId, WaitingInfo};
