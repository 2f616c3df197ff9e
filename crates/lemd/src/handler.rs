//! Command dispatch for the RESP server

use lemcache::MemoryStore;

use crate::resp::Frame;

/// Executes client commands against a shared [`MemoryStore`]
#[derive(Debug, Clone)]
pub struct CommandHandler {
    store: MemoryStore,
}

impl CommandHandler {
    /// Create a handler; clones of `store` share its data
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    /// Run one command frame and build its reply
    pub fn handle(&self, frame: Frame) -> Frame {
        let args = match command_args(frame) {
            Ok(args) => args,
            Err(reply) => return reply,
        };

        let name = String::from_utf8_lossy(&args[0]).to_uppercase();
        let args = &args[1..];

        match name.as_str() {
            "PING" => self.ping(args),
            "ECHO" => self.echo(args),
            "GET" => self.get(args),
            "SET" => self.set(args),
            "DEL" => self.del(args),
            "EXISTS" => self.exists(args),
            "DBSIZE" => Frame::Integer(self.store.len() as i64),
            "FLUSHDB" => self.flushdb(),
            "INFO" => self.info(),
            // redis-cli and client handshakes
            "COMMAND" => Frame::Array(Some(vec![])),
            "CLIENT" => Frame::ok(),
            _ => Frame::error(format!("ERR unknown command '{}'", name.to_lowercase())),
        }
    }

    fn ping(&self, args: &[Vec<u8>]) -> Frame {
        match args {
            [] => Frame::Simple("PONG".to_string()),
            [msg] => Frame::bulk(msg.clone()),
            _ => wrong_arity("ping"),
        }
    }

    fn echo(&self, args: &[Vec<u8>]) -> Frame {
        match args {
            [msg] => Frame::bulk(msg.clone()),
            _ => wrong_arity("echo"),
        }
    }

    fn get(&self, args: &[Vec<u8>]) -> Frame {
        let [key] = args else {
            return wrong_arity("get");
        };
        let key = match key_str(key) {
            Ok(key) => key,
            Err(reply) => return reply,
        };

        match self.store.lookup(key) {
            Some(value) => Frame::bulk(value),
            None => Frame::null(),
        }
    }

    fn set(&self, args: &[Vec<u8>]) -> Frame {
        let (key, value) = match args {
            [key, value] => (key, value),
            // EX/PX/NX/XX and friends are not supported; values never expire
            [_, _, ..] => return Frame::error("ERR syntax error"),
            _ => return wrong_arity("set"),
        };
        let key = match key_str(key) {
            Ok(key) => key,
            Err(reply) => return reply,
        };

        self.store.insert(key, value.clone());
        Frame::ok()
    }

    fn del(&self, args: &[Vec<u8>]) -> Frame {
        if args.is_empty() {
            return wrong_arity("del");
        }

        let removed = args
            .iter()
            .filter_map(|k| std::str::from_utf8(k).ok())
            .filter(|k| self.store.remove(k))
            .count();
        Frame::Integer(removed as i64)
    }

    fn exists(&self, args: &[Vec<u8>]) -> Frame {
        if args.is_empty() {
            return wrong_arity("exists");
        }

        let found = args
            .iter()
            .filter_map(|k| std::str::from_utf8(k).ok())
            .filter(|k| self.store.contains_key(k))
            .count();
        Frame::Integer(found as i64)
    }

    fn flushdb(&self) -> Frame {
        self.store.clear();
        self.store.stats().reset();
        Frame::ok()
    }

    fn info(&self) -> Frame {
        let stats = self.store.stats();
        let info = format!(
            "# Server\r\n\
             lemd_version:{}\r\n\
             \r\n\
             # Keyspace\r\n\
             keys:{}\r\n\
             \r\n\
             # Stats\r\n\
             keyspace_hits:{}\r\n\
             keyspace_misses:{}\r\n\
             keyspace_writes:{}\r\n\
             keyspace_deletes:{}\r\n\
             hit_ratio:{:.2}\r\n",
            env!("CARGO_PKG_VERSION"),
            self.store.len(),
            stats.hits(),
            stats.misses(),
            stats.writes(),
            stats.deletes(),
            stats.hit_ratio(),
        );
        Frame::bulk(info)
    }
}

/// Flatten a command array into its raw arguments
fn command_args(frame: Frame) -> Result<Vec<Vec<u8>>, Frame> {
    let items = match frame {
        Frame::Array(Some(items)) if !items.is_empty() => items,
        _ => return Err(Frame::error("ERR invalid command format")),
    };

    items
        .into_iter()
        .map(|item| match item {
            Frame::Bulk(Some(data)) => Ok(data),
            Frame::Simple(s) => Ok(s.into_bytes()),
            _ => Err(Frame::error("ERR invalid argument type")),
        })
        .collect()
}

fn key_str(key: &[u8]) -> Result<&str, Frame> {
    std::str::from_utf8(key).map_err(|_| Frame::error("ERR key must be valid UTF-8"))
}

fn wrong_arity(command: &str) -> Frame {
    Frame::error(format!(
        "ERR wrong number of arguments for '{}' command",
        command
    ))
}
