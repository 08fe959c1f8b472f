use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::ErrorKind;
use crate::{RendezvousError, RendezvousResult};

use super::http::{HttpRequest, HttpResponse, HttpServerConfig, HttpServerHandle, HttpService};
use super::traits::Pal;

/* 📖 # Why use HashMaps for MockPal storage?

MockPal keeps files and registered services in memory:
1. **Speed**: No filesystem or socket I/O, deterministic and fast for unit tests
2. **Isolation**: Tests can run in parallel without fighting over ports
3. **Control**: Tests drive requests directly through `simulate_request`
*/

/// In-memory PAL implementation for testing.
///
/// ```
/// use rendezvous_base::{MockPal, Pal};
/// use std::path::Path;
///
/// let mock = MockPal::new();
/// mock.add_file("rendezvous.toml", "port = 3001");
/// let content = mock.read_file_to_string(Path::new("rendezvous.toml")).unwrap();
/// assert_eq!(content, "port = 3001");
/// ```
#[derive(Debug, Clone)]
pub struct MockPal {
    files: Arc<Mutex<HashMap<PathBuf, String>>>,
    http_servers: Arc<Mutex<HashMap<u16, HttpServerInfo>>>,
    next_port: Arc<AtomicU16>,
}

/// Information about a registered HTTP server.
#[derive(Debug)]
struct HttpServerInfo {
    service: Arc<dyn HttpService>,
    handle: HttpServerHandle,
}

impl MockPal {
    /// Create a new empty MockPal.
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(HashMap::new())),
            http_servers: Arc::new(Mutex::new(HashMap::new())),
            next_port: Arc::new(AtomicU16::new(10000)),
        }
    }

    /// Add a file to the mock storage.
    pub fn add_file(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.files
            .lock()
            .unwrap()
            .insert(path.into(), content.into());
    }

    /// Simulate an HTTP request to a running server.
    ///
    /// Looks up the registered service for the given port and invokes it directly.
    /// Fails if no server is registered on the port or it has been shut down.
    pub fn simulate_request(
        &self,
        port: u16,
        request: HttpRequest,
    ) -> RendezvousResult<HttpResponse> {
        let service = {
            let servers = self.http_servers.lock().unwrap();
            let server_info = servers
                .get(&port)
                .filter(|info| !info.handle.is_shutdown())
                .ok_or_else(|| crate::err!("No HTTP server registered on port {}", port))?;
            Arc::clone(&server_info.service)
        };

        service.handle_request(request)
    }

    /// Get the number of registered HTTP servers.
    pub fn http_server_count(&self) -> usize {
        self.http_servers.lock().unwrap().len()
    }
}

impl Default for MockPal {
    fn default() -> Self {
        Self::new()
    }
}

impl Pal for MockPal {
    fn read_file_to_string(&self, path: &Path) -> RendezvousResult<String> {
        self.files.lock().unwrap().get(path).cloned().ok_or_else(|| {
            Box::new(RendezvousError::new(ErrorKind::FileError {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            }))
        })
    }

    fn start_http_server(
        &self,
        service: Arc<dyn HttpService>,
        config: HttpServerConfig,
    ) -> RendezvousResult<HttpServerHandle> {
        // Use the configured port if provided, otherwise auto-assign
        let port = match config.port {
            Some(p) => p,
            None => self.next_port.fetch_add(1, Ordering::SeqCst),
        };

        let mut servers = self.http_servers.lock().unwrap();
        if servers
            .get(&port)
            .is_some_and(|info| !info.handle.is_shutdown())
        {
            return Err(crate::err!("Port {} is already in use", port));
        }

        let handle = HttpServerHandle::new(port);
        servers.insert(
            port,
            HttpServerInfo {
                service,
                handle: handle.clone(),
            },
        );
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pal::http::HttpMethod;

    #[derive(Debug)]
    struct TestHttpService;

    impl HttpService for TestHttpService {
        fn handle_request(&self, request: HttpRequest) -> RendezvousResult<HttpResponse> {
            match request.path_without_query() {
                "/debug" => Ok(HttpResponse::json(r#"{}"#)),
                "/echo" => Ok(HttpResponse::json(
                    request.body().as_string().unwrap_or_default(),
                )),
                _ => Ok(HttpResponse::not_found()),
            }
        }
    }

    #[test]
    fn test_read_file() {
        let pal = MockPal::new();
        pal.add_file("config/rendezvous.toml", "host = \"0.0.0.0\"");

        let content = pal
            .read_file_to_string(Path::new("config/rendezvous.toml"))
            .unwrap();
        assert_eq!(content, "host = \"0.0.0.0\"");
    }

    #[test]
    fn test_read_missing_file() {
        let pal = MockPal::new();
        let err = pal.read_file_to_string(Path::new("nope.toml")).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::FileError { .. }));
    }

    #[test]
    fn test_start_http_server() {
        let pal = MockPal::new();
        let handle = pal
            .start_http_server(Arc::new(TestHttpService), HttpServerConfig::new("127.0.0.1"))
            .unwrap();
        assert!(handle.port() >= 10000); // Auto-assigned port
        assert_eq!(pal.http_server_count(), 1);
    }

    #[test]
    fn test_start_http_server_port_in_use() {
        let pal = MockPal::new();
        let config = HttpServerConfig::new("127.0.0.1").with_port(3000);

        let handle = pal
            .start_http_server(Arc::new(TestHttpService), config.clone())
            .unwrap();
        assert_eq!(handle.port(), 3000);
        assert!(
            pal.start_http_server(Arc::new(TestHttpService), config.clone())
                .is_err()
        );

        handle.shutdown();
        assert!(pal.start_http_server(Arc::new(TestHttpService), config).is_ok());
    }

    #[test]
    fn test_simulate_request() {
        let pal = MockPal::new();
        let config = HttpServerConfig::new("127.0.0.1").with_port(3000);
        pal.start_http_server(Arc::new(TestHttpService), config)
            .unwrap();

        let response = pal
            .simulate_request(3000, HttpRequest::new(HttpMethod::Get, "/debug?x=1"))
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);

        let request = HttpRequest::new(HttpMethod::Post, "/echo").with_body("hello");
        let response = pal.simulate_request(3000, request).unwrap();
        assert_eq!(response.body().as_string(), Some("hello".to_string()));

        let response = pal
            .simulate_request(3000, HttpRequest::new(HttpMethod::Get, "/unknown"))
            .unwrap();
        assert_eq!(response.status().as_u16(), 404);
    }

    #[test]
    fn test_simulate_request_after_shutdown() {
        let pal = MockPal::new();
        let handle = pal
            .start_http_server(Arc::new(TestHttpService), HttpServerConfig::default())
            .unwrap();
        handle.shutdown();

        let result = pal.simulate_request(handle.port(), HttpRequest::new(HttpMethod::Get, "/debug"));
        assert!(result.is_err());
    }

    #[test]
    fn test_simulate_request_invalid_port() {
        let pal = MockPal::new();
        let result = pal.simulate_request(9999, HttpRequest::new(HttpMethod::Get, "/debug"));
        assert!(result.is_err());
    }
}
