//! Redis-backed store
//!
//! Talks RESP to any Redis-compatible server (Redis itself or `lemd`).
//! The address is only parsed and the connection only opened on first use,
//! so constructing a store never fails.

use std::fmt;
use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use redis::{Connection, RedisResult};
use tracing::{debug, warn};

use crate::deadline::Deadline;
use crate::error::StoreError;
use crate::store::KvStore;

/// Smallest socket timeout handed to the client; zero means "invalid" to std
const MIN_SOCKET_TIMEOUT: Duration = Duration::from_millis(1);

/// Key-value store backed by a single lazily-opened Redis connection
pub struct RedisStore {
    /// Address as given by the caller
    address: String,

    /// Connection URL, `redis://` prepended when no scheme was given
    url: String,

    /// Bound on connection setup when the call's deadline is unbounded
    connect_timeout: Option<Duration>,

    /// Open connection, `None` until first use or after a broken call
    conn: Mutex<Option<Connection>>,
}

impl RedisStore {
    /// Create a store for `address` (`host:port` or a `redis://` URL)
    ///
    /// No authentication, database 0. Nothing is validated here.
    pub fn new(address: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            url: normalize_address(&address),
            address,
            connect_timeout: None,
            conn: Mutex::new(None),
        }
    }

    /// Bound connection setup for calls made with [`Deadline::none`]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Address this store was created with
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Check whether a connection is currently open
    ///
    /// Waits for any call in flight to finish.
    pub fn is_connected(&self) -> bool {
        self.conn.lock().is_some()
    }

    /// Open a connection, bounding the TCP connect and the client handshake
    ///
    /// The handshake runs on a helper thread because the client applies no
    /// read timeout to it. A helper that outlives its wait exits once the
    /// server answers or closes the socket.
    fn connect(&self, op: &'static str, deadline: Deadline) -> Result<Connection, StoreError> {
        let client = redis::Client::open(self.url.as_str()).map_err(|source| {
            StoreError::InvalidAddress {
                address: self.address.clone(),
                source,
            }
        })?;

        let limit = match deadline.remaining() {
            Some(left) => Some((left.max(MIN_SOCKET_TIMEOUT), true)),
            None => self.connect_timeout.map(|timeout| (timeout, false)),
        };
        let Some((limit, from_deadline)) = limit else {
            let conn = client.get_connection()?;
            debug!(address = %self.address, "connected to store");
            return Ok(conn);
        };

        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("lemcache-connect".to_string())
            .spawn(move || {
                let _ = tx.send(client.get_connection_with_timeout(limit));
            })
            .map_err(|e| StoreError::Redis(e.into()))?;

        match rx.recv_timeout(limit) {
            Ok(conn) => {
                let conn = conn?;
                debug!(address = %self.address, "connected to store");
                Ok(conn)
            }
            Err(RecvTimeoutError::Timeout) if from_deadline => {
                warn!(address = %self.address, op, "store handshake outlived the deadline");
                Err(StoreError::DeadlineExceeded { op })
            }
            Err(RecvTimeoutError::Timeout) => Err(StoreError::Redis(
                io::Error::new(io::ErrorKind::TimedOut, "store connect timed out").into(),
            )),
            Err(RecvTimeoutError::Disconnected) => Err(StoreError::Redis(
                io::Error::new(io::ErrorKind::Other, "store connect thread exited").into(),
            )),
        }
    }

    /// Run one command on the shared connection within `deadline`
    fn execute<T>(
        &self,
        op: &'static str,
        deadline: Deadline,
        command: impl FnOnce(&mut Connection) -> RedisResult<T>,
    ) -> Result<T, StoreError> {
        let mut slot = match deadline.instant() {
            Some(at) => self
                .conn
                .try_lock_until(at)
                .ok_or(StoreError::DeadlineExceeded { op })?,
            None => self.conn.lock(),
        };
        socket_timeout(op, deadline)?;

        let mut conn = match slot.take() {
            Some(conn) => conn,
            None => self.connect(op, deadline)?,
        };

        // Connecting may have used up part of the budget.
        let timeout = match socket_timeout(op, deadline) {
            Ok(timeout) => timeout,
            Err(e) => {
                *slot = Some(conn);
                return Err(e);
            }
        };

        let result = conn
            .set_read_timeout(timeout)
            .and_then(|()| conn.set_write_timeout(timeout))
            .and_then(|()| command(&mut conn));

        match &result {
            Err(e) if e.is_io_error() || e.is_timeout() || e.is_connection_dropped() => {
                warn!(address = %self.address, op, error = %e, "discarding broken store connection");
            }
            _ => *slot = Some(conn),
        }

        result.map_err(StoreError::from)
    }
}

/// Socket timeout for what is left of `deadline`; `None` when unbounded
fn socket_timeout(op: &'static str, deadline: Deadline) -> Result<Option<Duration>, StoreError> {
    match deadline.remaining() {
        Some(left) if left.is_zero() => Err(StoreError::DeadlineExceeded { op }),
        Some(left) => Ok(Some(left.max(MIN_SOCKET_TIMEOUT))),
        None => Ok(None),
    }
}

impl KvStore for RedisStore {
    fn set(&self, key: &str, value: &[u8], deadline: Deadline) -> Result<(), StoreError> {
        self.execute("SET", deadline, |conn| {
            redis::cmd("SET").arg(key).arg(value).query::<()>(conn)
        })
    }

    fn get(&self, key: &str, deadline: Deadline) -> Result<Option<Vec<u8>>, StoreError> {
        self.execute("GET", deadline, |conn| {
            redis::cmd("GET").arg(key).query::<Option<Vec<u8>>>(conn)
        })
    }
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("address", &self.address)
            .field("connect_timeout", &self.connect_timeout)
            .field("connected", &self.conn.try_lock().map(|conn| conn.is_some()))
            .finish()
    }
}

fn normalize_address(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("redis://{}", address)
    }
}
