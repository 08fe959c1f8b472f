use std::path::Path;
use std::sync::Arc;

use crate::RendezvousResult;

use super::http::{HttpServerConfig, HttpServerHandle, HttpService};

/* 📖 # Why is Pal a trait instead of a struct?

The service touches the outside world in exactly two places: reading its config file and
listening on a socket. Putting both behind a trait means:
1. **Testability**: MockPal serves files from memory and dispatches requests in-process
2. **Flexibility**: Code depends on the abstraction, not the concrete implementation
*/

/// Platform Abstraction Layer (PAL) trait.
///
/// Two implementations are provided:
/// - `RealPal`: real filesystem and a tiny_http server
/// - `MockPal`: in-memory implementation for testing
pub trait Pal: std::fmt::Debug + Send + Sync + 'static {
    /// Read entire file contents as a UTF-8 string.
    fn read_file_to_string(&self, path: &Path) -> RendezvousResult<String>;

    /// Start an HTTP server with the given service.
    ///
    /// Returns once the server is listening. The server keeps running until
    /// [`HttpServerHandle::shutdown`] is called.
    fn start_http_server(
        &self,
        service: Arc<dyn HttpService>,
        config: HttpServerConfig,
    ) -> RendezvousResult<HttpServerHandle>;
}

/// Handle to a PAL implementation, enabling shared ownership.
///
/// Internally wraps `Arc<dyn Pal>` for cheap cloning and thread-safe sharing.
///
/// ```
/// use rendezvous_base::{MockPal, PalHandle};
///
/// let pal = PalHandle::new(MockPal::new());
/// let pal_clone = pal.clone(); // Cheap clone, shares the same implementation
/// ```
#[derive(Debug, Clone)]
pub struct PalHandle(Arc<dyn Pal>);

impl PalHandle {
    /// Create a new PalHandle from a Pal implementation.
    pub fn new(pal: impl Pal + 'static) -> Self {
        Self(Arc::new(pal))
    }
}

impl std::ops::Deref for PalHandle {
    type Target = dyn Pal;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}
