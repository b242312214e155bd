//! REST transport for a live engine.

mod api;
mod client;

pub use api::RestApi;
pub use client::RestClient;
