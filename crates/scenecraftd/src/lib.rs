//! Scenecraft daemon library.
//!
//! The binary in `main.rs` only parses configuration and serves [`http::router`];
//! everything routable lives here so integration tests can mount it on an
//! ephemeral port.

pub mod error;
pub mod http;

pub use error::ApiError;
pub use http::{router, AppState};
