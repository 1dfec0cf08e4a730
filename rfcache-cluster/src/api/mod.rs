//! HTTP control surface.
//!
//! Pure Hyper 1.x, one task per connection.
//!
//! ```text
//! GET  /get?key=<k>                  read from local state
//! POST /set   {"key", "value"}       replicate a write
//! POST /join  {"peer_address"}       add a voter
//! GET  /status                       engine view
//! ```

mod error;
mod gateway;
pub mod handlers;
pub(crate) mod response;
mod router;
pub(crate) mod server;

pub use error::ApiError;
pub use gateway::RequestGateway;
pub use response::{CODE_ERR, CODE_OK, Empty, Envelope};
pub use router::{read_body, route};
pub use server::ServerHandle;
