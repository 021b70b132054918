//! Redis-backed queue transport

use anyhow::{Context, Result};
use drift_core::{Queue, QueueError};
use redis::Commands;

/// Synchronous Redis connection popping from a notification list
pub struct RedisQueue {
    conn: redis::Connection,
}

impl RedisQueue {
    /// Connect to the queue service
    ///
    /// Connection failures surface here, before any listening starts, so a
    /// misconfigured queue is a startup error rather than a silent stall.
    pub fn connect(host: &str, port: u16, password: Option<&str>) -> Result<Self> {
        let url = match password {
            Some(password) => format!("redis://:{password}@{host}:{port}/"),
            None => format!("redis://{host}:{port}/"),
        };
        let client = redis::Client::open(url).context("Invalid redis connection parameters")?;
        let conn = client
            .get_connection()
            .context("Failed to get redis connection")?;
        Ok(Self { conn })
    }

    /// Current backlog length of `list`
    pub fn len(&mut self, list: &str) -> Result<u64> {
        self.conn
            .llen(list)
            .context("Failed to query queue length")
    }
}

impl Queue for RedisQueue {
    fn pop(&mut self, list: &str) -> Result<Option<String>, QueueError> {
        self.conn
            .rpop(list, None)
            .map_err(|err| QueueError::new(err.to_string()))
    }
}
