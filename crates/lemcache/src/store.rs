//! Key-value store capability

use std::sync::Arc;

use crate::deadline::Deadline;
use crate::error::StoreError;

/// Minimal key-value store used by [`LemmingCache`](crate::LemmingCache)
///
/// Implementations must give `set` overwrite semantics with no expiry and
/// report a missing key from `get` as `Ok(None)`, not as an error.
pub trait KvStore: Send + Sync {
    /// Write `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &[u8], deadline: Deadline) -> Result<(), StoreError>;

    /// Read the raw value stored under `key`
    fn get(&self, key: &str, deadline: Deadline) -> Result<Option<Vec<u8>>, StoreError>;
}

impl<S: KvStore + ?Sized> KvStore for &S {
    fn set(&self, key: &str, value: &[u8], deadline: Deadline) -> Result<(), StoreError> {
        (**self).set(key, value, deadline)
    }

    fn get(&self, key: &str, deadline: Deadline) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key, deadline)
    }
}

impl<S: KvStore + ?Sized> KvStore for Arc<S> {
    fn set(&self, key: &str, value: &[u8], deadline: Deadline) -> Result<(), StoreError> {
        (**self).set(key, value, deadline)
    }

    fn get(&self, key: &str, deadline: Deadline) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key, deadline)
    }
}

impl<S: KvStore + ?Sized> KvStore for Box<S> {
    fn set(&self, key: &str, value: &[u8], deadline: Deadline) -> Result<(), StoreError> {
        (**self).set(key, value, deadline)
    }

    fn get(&self, key: &str, deadline: Deadline) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key, deadline)
    }
}
