//! Google Books integration.
//!
//! Layout mirrors the other provider clients: `client` speaks HTTP, `dto`
//! holds the wire shapes, `adapter` converts them into domain snapshots.

pub mod adapter;
pub mod client;
pub mod dto;

pub use client::GoogleBooksClient;
