//! Lemcache daemon - Redis-compatible RESP server over a [`MemoryStore`]
//!
//! Speaks enough RESP2 for `redis-cli` and the `redis` crate to store and
//! fetch keys. Data lives in memory only and never expires.
//!
//! [`MemoryStore`]: lemcache::MemoryStore

#![warn(missing_docs)]

pub mod handler;
pub mod resp;
pub mod server;

pub use handler::CommandHandler;
pub use resp::{Frame, ProtocolError};
pub use server::{handle_client, ping, serve};
