use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use crate::{ErrorKind, RendezvousError, RendezvousResult};

use super::http::{
    HttpMethod, HttpRequest, HttpResponse, HttpServerConfig, HttpServerHandle, HttpService,
};
use super::traits::Pal;

/* 📖 # Why tiny_http with a thread per request?

The service is synchronous: store operations hold a lock for a few map operations and never
block on I/O. tiny_http gives us a blocking accept loop without pulling in an async runtime.
Each request gets its own thread so a client that never finishes sending its body only
stalls its own connection, not the accept loop.
*/

/// How often the accept loop wakes up to check the shutdown flag.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Concrete PAL implementation using the real filesystem and a tiny_http server.
#[derive(Debug, Default)]
pub struct RealPal;

impl RealPal {
    pub fn new() -> Self {
        Self
    }
}

impl Pal for RealPal {
    #[instrument(skip(self, path), fields(path = %path.display()))]
    fn read_file_to_string(&self, path: &Path) -> RendezvousResult<String> {
        debug!("reading file");
        std::fs::read_to_string(path).map_err(|source| {
            Box::new(RendezvousError::new(ErrorKind::FileError {
                path: path.to_path_buf(),
                source,
            }))
        })
    }

    #[instrument(skip(self, service), fields(address = %config.address()))]
    fn start_http_server(
        &self,
        service: Arc<dyn HttpService>,
        config: HttpServerConfig,
    ) -> RendezvousResult<HttpServerHandle> {
        let server = tiny_http::Server::http(config.address())
            .map_err(|e| crate::err!("Failed to bind HTTP server to {}: {}", config.address(), e))?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .ok_or_else(|| crate::err!("HTTP server is not listening on an IP address"))?;

        info!(
            server_name = %config.server_name,
            "Server running at http://{}:{}/",
            config.host,
            port
        );

        let handle = HttpServerHandle::new(port);
        let shutdown = handle.shutdown_flag().clone();
        let worker = std::thread::Builder::new()
            .name(format!("{}-accept", config.server_name))
            .spawn(move || {
                while !shutdown.load(Ordering::SeqCst) {
                    match server.recv_timeout(ACCEPT_POLL_INTERVAL) {
                        Ok(Some(request)) => {
                            let service = Arc::clone(&service);
                            let spawned = std::thread::Builder::new()
                                .name("http-request".to_string())
                                .spawn(move || serve_request(service.as_ref(), request));
                            if let Err(e) = spawned {
                                error!(error = %e, "Failed to spawn request thread");
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            error!(error = %e, "Failed to accept HTTP request");
                        }
                    }
                }
                info!(port, "HTTP server stopped");
            })
            .map_err(|e| crate::err!("Failed to spawn HTTP server thread: {}", e))?;
        handle.attach_worker(worker);
        Ok(handle)
    }
}

/// Read one request off the wire, hand it to the service and write the response back.
fn serve_request(service: &dyn HttpService, mut raw: tiny_http::Request) {
    let method = HttpMethod::parse(raw.method().as_str());
    let url = raw.url().to_string();

    let mut body = Vec::new();
    if let Err(e) = raw.as_reader().read_to_end(&mut body) {
        warn!(%method, %url, error = %e, "Failed to read request body");
        respond(raw, HttpResponse::internal_error());
        return;
    }

    let mut request = HttpRequest::new(method, url).with_body(body);
    for header in raw.headers() {
        request = request.with_header(header.field.as_str().as_str(), header.value.as_str());
    }

    let response = match service.handle_request(request) {
        Ok(response) => response,
        Err(e) => {
            error!(error = ?e, "HTTP service failed");
            HttpResponse::internal_error()
        }
    };
    respond(raw, response);
}

fn respond(raw: tiny_http::Request, response: HttpResponse) {
    let status = tiny_http::StatusCode(response.status().as_u16());
    let headers = response.headers().clone();
    let mut reply =
        tiny_http::Response::from_data(response.into_body().into_bytes()).with_status_code(status);
    for (key, value) in headers.all() {
        match tiny_http::Header::from_bytes(key.as_bytes(), value.as_bytes()) {
            Ok(header) => reply.add_header(header),
            Err(()) => warn!(header = %key, "Dropping invalid response header"),
        }
    }
    if let Err(e) = raw.respond(reply) {
        debug!(error = %e, "Client went away before the response was written");
    }
}
