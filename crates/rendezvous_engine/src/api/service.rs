/* 📖 # Why route on the last path segment?

Clients of the rendezvous service sit behind reverse proxies that mount it under arbitrary
prefixes (`/rtc/waiting`, `/api/v2/calling`, ...). Routing on the last non-empty segment
plus the method lets the same binary serve all of them without configuration.

| tail      | method | operation                     |
|-----------|--------|-------------------------------|
| `waiting` | POST   | register a description        |
| `waiting` | GET    | look up an unanswered id      |
| `calling` | POST   | attach a calling description  |
| `calling` | GET    | poll (one-shot delivery)      |
| `debug`   | any    | dump live entries             |
*/

/* 📖 # Why does every failure look the same on the wire?

Clients only need to know "that did not work, try again or give up". Every error kind
(empty field, unknown id, already answered, bad JSON, unknown route) becomes the same
404 with the same body. The distinction is kept in the logs, together with the request
method, path and headers, which is where an operator needs it.
*/

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use rendezvous_base::pal::http::{
    HttpMethod, HttpRequest, HttpResponse, HttpService, HttpStatusCode,
};
use rendezvous_base::{RendezvousError, RendezvousResult};

use crate::store::StoreHandle;
use crate::waiting::WaitingId;

/// Body of every failed request.
pub const ERROR_BODY: &str = r#"{"error":"that's an error"}"#;

#[derive(Deserialize)]
struct RegisterRequest {
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttachCallingRequest {
    #[serde(default)]
    waiting_id: Option<String>,
    #[serde(default)]
    calling_description: Option<String>,
}

#[derive(Serialize)]
struct RegisterResponse {
    id: WaitingId,
}

#[derive(Serialize)]
struct WaitingResponse {
    id: WaitingId,
    description: String,
}

#[derive(Serialize)]
struct AttachCallingResponse {}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PollCallingResponse {
    calling_description: String,
}

/// HTTP service exposing the rendezvous store.
///
/// Always answers with `application/json`: 200 on success and 404 with
/// [`ERROR_BODY`] on any failure.
#[derive(Clone)]
pub struct RendezvousService {
    store: StoreHandle,
}

impl RendezvousService {
    /// Create a service backed by `store`.
    ///
    /// ```
    /// use rendezvous_engine::{InMemoryStore, RendezvousService, StoreHandle};
    ///
    /// let store = StoreHandle::new(InMemoryStore::new());
    /// let service = RendezvousService::new(store);
    /// ```
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// Serialize data to JSON and wrap it in an HTTP 200 response.
    fn serialize_json_response<T: Serialize>(data: &T) -> RendezvousResult<HttpResponse> {
        serde_json::to_string(data)
            .map(HttpResponse::json)
            .map_err(|e| rendezvous_base::err!("JSON serialization error: {}", e))
    }

    /// The uniform failure response.
    pub fn error_response() -> HttpResponse {
        HttpResponse::json(ERROR_BODY).with_status(HttpStatusCode::NotFound)
    }

    /// Parse a JSON object body. Arrays and scalars are rejected even where serde
    /// would map them onto the struct positionally.
    fn parse_body<T: DeserializeOwned>(request: &HttpRequest) -> RendezvousResult<T> {
        let malformed = |message: String| Box::new(RendezvousError::malformed_request(message));
        let value: serde_json::Value = serde_json::from_slice(request.body().as_bytes())
            .map_err(|e| malformed(format!("invalid JSON body: {}", e)))?;
        if !value.is_object() {
            return Err(malformed("JSON body is not an object".to_string()));
        }
        serde_json::from_value(value).map_err(|e| malformed(format!("invalid JSON body: {}", e)))
    }

    fn id_param(request: &HttpRequest) -> RendezvousResult<WaitingId> {
        Ok(WaitingId::from_string(
            request.query_param("id")?.unwrap_or_default(),
        ))
    }

    fn route(&self, request: &HttpRequest) -> RendezvousResult<HttpResponse> {
        let endpoint = request.last_path_segment()?;
        match (endpoint.as_str(), request.method()) {
            ("waiting", HttpMethod::Post) => self.handle_register(request),
            ("waiting", HttpMethod::Get) => self.handle_get_waiting(request),
            ("calling", HttpMethod::Post) => self.handle_attach_calling(request),
            ("calling", HttpMethod::Get) => self.handle_poll_calling(request),
            ("debug", _) => self.handle_debug(),
            _ => Err(Box::new(RendezvousError::unknown_route(
                request.method().as_str(),
                request.path_without_query(),
            ))),
        }
    }

    /// POST waiting `{"description": ...}` -> `{"id": ...}`
    fn handle_register(&self, request: &HttpRequest) -> RendezvousResult<HttpResponse> {
        let body: RegisterRequest = Self::parse_body(request)?;
        let id = self
            .store
            .register(&body.description.unwrap_or_default())?;
        Self::serialize_json_response(&RegisterResponse { id })
    }

    /// GET waiting?id= -> `{"id": ..., "description": ...}`
    fn handle_get_waiting(&self, request: &HttpRequest) -> RendezvousResult<HttpResponse> {
        let id = Self::id_param(request)?;
        let info = self.store.get_waiting(&id)?;
        Self::serialize_json_response(&WaitingResponse {
            id: info.id,
            description: info.description,
        })
    }

    /// POST calling `{"waitingId": ..., "callingDescription": ...}` -> `{}`
    fn handle_attach_calling(&self, request: &HttpRequest) -> RendezvousResult<HttpResponse> {
        let body: AttachCallingRequest = Self::parse_body(request)?;
        let id = WaitingId::from_string(body.waiting_id.unwrap_or_default());
        self.store
            .attach_calling(&id, &body.calling_description.unwrap_or_default())?;
        Self::serialize_json_response(&AttachCallingResponse {})
    }

    /// GET calling?id= -> `{"callingDescription": ...}`, removing the entry once answered
    fn handle_poll_calling(&self, request: &HttpRequest) -> RendezvousResult<HttpResponse> {
        let id = Self::id_param(request)?;
        let calling_description = self.store.poll_calling(&id)?;
        Self::serialize_json_response(&PollCallingResponse {
            calling_description,
        })
    }

    fn handle_debug(&self) -> RendezvousResult<HttpResponse> {
        Self::serialize_json_response(&self.store.debug_dump()?)
    }
}

impl std::fmt::Debug for RendezvousService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendezvousService").finish_non_exhaustive()
    }
}

impl HttpService for RendezvousService {
    #[instrument(name = "request", skip_all, fields(method = %request.method(), path = %request.path()))]
    fn handle_request(&self, request: HttpRequest) -> RendezvousResult<HttpResponse> {
        match self.route(&request) {
            Ok(response) => {
                debug!("Request handled");
                Ok(response)
            }
            Err(e) => {
                warn!(
                    headers = ?request.headers().all(),
                    body_len = request.body().len(),
                    error = %e,
                    "Request failed"
                );
                debug!(error = ?e, "Request failure trace");
                Ok(Self::error_response())
            }
        }
    }
}
