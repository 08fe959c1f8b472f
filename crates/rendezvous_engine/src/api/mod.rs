/* 📖 # Why an API module in rendezvous_engine?

The api module exposes the store over HTTP. RendezvousService implements the HttpService
trait from rendezvous_base, so it runs unchanged on RealPal in production and on MockPal
in tests.
*/

mod service;

pub use service::{ERROR_BODY, RendezvousService};
