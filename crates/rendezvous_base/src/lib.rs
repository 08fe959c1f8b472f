/* 📖 # Why have rendezvous_base as a core library?
rendezvous_base provides the error type, tracing setup and the platform abstraction
(file access and the HTTP server) used by the engine and the CLI.
Keeping them here lets the engine be tested entirely against MockPal.
*/

pub mod error;
pub mod pal;
pub mod tracing;

// Re-export commonly used types for convenience
pub use error::{ErrorKind, RendezvousError, RendezvousResult, ResultExt};
pub use pal::{MockPal, Pal, PalHandle, RealPal};
