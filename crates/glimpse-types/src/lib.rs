//! Types shared between the Glimpse store, API and server crates.

pub mod api;
pub mod models;
