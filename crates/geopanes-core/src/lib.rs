//! Shared, UI-free types for the geopanes panel layer.
//!
//! Everything here is plain data: ids, panel kinds and their typed state,
//! domain events exchanged between panels, and the request/response
//! contract of the remote content source. The optional `client` feature
//! adds the HTTP client that speaks that contract.

pub mod api;
pub mod events;
pub mod ids;
pub mod panel;

#[cfg(feature = "client")]
pub mod client;
