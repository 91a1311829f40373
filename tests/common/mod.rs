//! Shared utilities for integration tests.
//!
//! `MockRedis` speaks just enough RESP for the queue: PING, SELECT, RPUSH,
//! BLPOP, LLEN and DEL. It can be taken "down", which makes it drop every
//! connection, and brought back up on the same port.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;

use redis_multiqueue::config::{BackendConfig, QueueConfig};

#[derive(Default)]
struct MockState {
    lists: Mutex<HashMap<String, VecDeque<String>>>,
    pushed: Notify,
    down: AtomicBool,
}

/// In-process Redis stand-in bound to an ephemeral localhost port.
#[derive(Clone)]
pub struct MockRedis {
    address: String,
    state: Arc<MockState>,
}

impl MockRedis {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let state = Arc::new(MockState::default());

        let accept_state = state.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((socket, _)) => {
                        if accept_state.down.load(Ordering::SeqCst) {
                            drop(socket);
                            continue;
                        }
                        let state = accept_state.clone();
                        tokio::spawn(async move {
                            let _ = serve(socket, state).await;
                        });
                    }
                    Err(_) => break,
                }
            }
        });

        Self { address, state }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Drop all current and future connections until brought back up.
    #[allow(dead_code)]
    pub fn set_down(&self, down: bool) {
        self.state.down.store(down, Ordering::SeqCst);
    }

    /// Contents of the list at `key`, head first.
    #[allow(dead_code)]
    pub fn list(&self, key: &str) -> Vec<String> {
        self.state
            .lists
            .lock()
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// An address nothing is listening on.
#[allow(dead_code)]
pub async fn dead_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);
    address
}

/// A queue configuration over `addresses` with short timeouts.
#[allow(dead_code)]
pub fn config_for(addresses: &[&str]) -> QueueConfig {
    let mut config = QueueConfig::default();
    config.queue_key = "jobs".to_string();
    config.backends = addresses.iter().map(|a| BackendConfig::new(*a)).collect();
    config.health.probe_timeout_ms = 500;
    config.pool.connect_timeout_ms = 500;
    config.pool.io_timeout_ms = 1000;
    config
}

async fn serve(socket: TcpStream, state: Arc<MockState>) -> std::io::Result<()> {
    let mut stream = BufReader::new(socket);
    loop {
        let Some(args) = read_command(&mut stream).await? else {
            return Ok(());
        };
        if state.down.load(Ordering::SeqCst) {
            return Ok(());
        }

        let reply = execute(&args, &state).await;
        stream.get_mut().write_all(reply.as_bytes()).await?;
    }
}

async fn read_command(stream: &mut BufReader<TcpStream>) -> std::io::Result<Option<Vec<String>>> {
    let mut line = String::new();
    if stream.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    let count: usize = line.trim_end().trim_start_matches('*').parse().unwrap_or(0);

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        line.clear();
        stream.read_line(&mut line).await?;
        let len: usize = line.trim_end().trim_start_matches('$').parse().unwrap_or(0);
        let mut buf = vec![0u8; len + 2];
        stream.read_exact(&mut buf).await?;
        buf.truncate(len);
        args.push(String::from_utf8_lossy(&buf).into_owned());
    }
    Ok(Some(args))
}

fn bulk(value: &str) -> String {
    format!("${}\r\n{}\r\n", value.len(), value)
}

async fn execute(args: &[String], state: &MockState) -> String {
    let command = args.first().map(|c| c.to_ascii_uppercase()).unwrap_or_default();
    match (command.as_str(), args.len()) {
        ("PING", _) => "+PONG\r\n".to_string(),
        ("SELECT", 2) => "+OK\r\n".to_string(),
        ("RPUSH", n) if n >= 3 => {
            let len = {
                let mut lists = state.lists.lock();
                let list = lists.entry(args[1].clone()).or_default();
                list.extend(args[2..].iter().cloned());
                list.len()
            };
            state.pushed.notify_waiters();
            format!(":{}\r\n", len)
        }
        ("BLPOP", 3) => {
            let timeout_secs: u64 = args[2].parse().unwrap_or(0);
            blpop(&args[1], timeout_secs, state).await
        }
        ("LLEN", 2) => {
            let len = state.lists.lock().get(&args[1]).map_or(0, |l| l.len());
            format!(":{}\r\n", len)
        }
        ("DEL", 2) => {
            let removed = state.lists.lock().remove(&args[1]).is_some();
            format!(":{}\r\n", removed as u8)
        }
        _ => format!("-ERR unknown command '{}'\r\n", command),
    }
}

async fn blpop(key: &str, timeout_secs: u64, state: &MockState) -> String {
    let deadline = (timeout_secs > 0)
        .then(|| tokio::time::Instant::now() + Duration::from_secs(timeout_secs));

    loop {
        let notified = state.pushed.notified();
        if let Some(value) = state.lists.lock().get_mut(key).and_then(|l| l.pop_front()) {
            return format!("*2\r\n{}{}", bulk(key), bulk(&value));
        }
        match deadline {
            Some(deadline) => {
                if tokio::time::timeout_at(deadline, notified).await.is_err() {
                    return "*-1\r\n".to_string();
                }
            }
            None => notified.await,
        }
    }
}
