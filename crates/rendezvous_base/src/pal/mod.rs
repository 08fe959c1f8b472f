/* 📖 # What is the Platform Abstraction Layer?

The PAL is the seam between the rendezvous engine and the operating system:
reading the config file and serving HTTP. RealPal does the real work with std::fs
and tiny_http, MockPal does it in memory so the whole HTTP surface can be tested
without binding a socket.
*/

pub mod http;
pub mod mock;
pub mod real_pal;
mod traits;

pub use mock::MockPal;
pub use real_pal::RealPal;
pub use traits::{Pal, PalHandle};
