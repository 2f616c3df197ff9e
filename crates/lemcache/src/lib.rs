//! # lemcache
//!
//! Typed cache for [`Lemming`] values on top of a Redis-compatible
//! key-value store.
//!
//! ## Architecture
//! - **LemmingCache**: JSON encodes lemmings and keys them as `lemming:<name>`
//! - **KvStore**: two-operation store capability (`set` / `get`)
//! - **RedisStore**: networked backend, connects lazily on first use
//! - **MemoryStore**: in-process backend for tests and the `lemd` daemon
//!
//! Every store call takes an explicit [`Deadline`]; nothing is retried and
//! values never expire.

#![warn(missing_docs)]

mod cache;
mod deadline;
mod error;
mod memory;
mod model;
mod redis_store;
mod stats;
mod store;

pub use cache::{lemming_key, LemmingCache, KEY_PREFIX};
pub use deadline::Deadline;
pub use error::{Error, Result, StoreError};
pub use memory::MemoryStore;
pub use model::{Lemming, Mood};
pub use redis_store::RedisStore;
pub use stats::StoreStats;
pub use store::KvStore;
