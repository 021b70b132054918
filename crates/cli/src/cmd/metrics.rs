//! Queue backlog metrics

use crate::config::Settings;
use crate::queue::RedisQueue;
use crate::ConnectionArgs;
use anyhow::Result;
use owo_colors::OwoColorize;

pub fn run(list: &str, connection: &ConnectionArgs, settings: &Settings) -> Result<()> {
    let host = connection.host.as_deref().unwrap_or(&settings.redis.host);
    let port = connection.port.unwrap_or(settings.redis.port);
    let password = connection
        .password
        .as_deref()
        .or(settings.redis.password.as_deref());

    let mut queue = RedisQueue::connect(host, port, password)?;
    let backlog = queue.len(list)?;

    println!("Queue:          {}", list.cyan());
    println!("Pending events: {}", backlog.to_string().bold());
    Ok(())
}
