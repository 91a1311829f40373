//! Minimal RESP2 client for the list commands the queue uses.
//!
//! ```text
//! Client → Server:  *3\r\n$5\r\nRPUSH\r\n$4\r\njobs\r\n$1\r\na\r\n
//! Server → Client:  :1\r\n
//! ```
//!
//! Only one level of array nesting is decoded, which covers every reply to
//! PING, SELECT, RPUSH, BLPOP and LLEN.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::store::{BackendAddress, StoreError};

/// Largest bulk string accepted, matching the server's own limit.
const MAX_BULK_LEN: usize = 512 * 1024 * 1024;
/// Replies used here carry at most two elements.
const MAX_ARRAY_LEN: usize = 64;
/// Longest header or simple-string line accepted, CRLF included.
const MAX_LINE_LEN: u64 = 64 * 1024;

/// A decoded server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Option<Vec<u8>>),
    Array(Option<Vec<Reply>>),
}

/// Encode a command as an array of bulk strings.
pub fn encode_command(args: &[&[u8]]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(16 + args.iter().map(|a| a.len() + 16).sum::<usize>());
    frame.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        frame.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        frame.extend_from_slice(arg);
        frame.extend_from_slice(b"\r\n");
    }
    frame
}

/// One TCP connection speaking RESP.
#[derive(Debug)]
pub struct RespConnection {
    stream: BufReader<TcpStream>,
    io_timeout: Duration,
}

impl RespConnection {
    /// Dial `address` and select its database, if one is configured.
    pub async fn connect(
        address: &BackendAddress,
        connect_timeout: Duration,
        io_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let stream = timeout(
            connect_timeout,
            TcpStream::connect((address.host(), address.port())),
        )
        .await
        .map_err(|_| StoreError::Timeout(connect_timeout))??;
        stream.set_nodelay(true)?;

        let mut conn = Self {
            stream: BufReader::new(stream),
            io_timeout,
        };

        if let Some(db) = address.db() {
            let db = db.to_string();
            match conn.command(&[b"SELECT", db.as_bytes()]).await? {
                Reply::Simple(_) => {}
                other => {
                    return Err(StoreError::Protocol(format!(
                        "unexpected SELECT reply: {:?}",
                        other
                    )))
                }
            }
        }

        Ok(conn)
    }

    /// PING and expect PONG.
    pub async fn ping(&mut self) -> Result<(), StoreError> {
        match self.command(&[b"PING"]).await? {
            Reply::Simple(s) if s == "PONG" => Ok(()),
            other => Err(StoreError::Protocol(format!("unexpected PING reply: {:?}", other))),
        }
    }

    /// RPUSH a single value.
    pub async fn rpush(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        match self
            .command(&[b"RPUSH", key.as_bytes(), value.as_bytes()])
            .await?
        {
            Reply::Integer(_) => Ok(()),
            other => Err(StoreError::Protocol(format!("unexpected RPUSH reply: {:?}", other))),
        }
    }

    /// BLPOP a single key. `Ok(None)` when the server-side wait elapsed.
    pub async fn blpop(&mut self, key: &str, timeout_secs: u64) -> Result<Option<String>, StoreError> {
        let wait = timeout_secs.to_string();
        // Give the server its full wait plus the usual I/O allowance.
        let deadline = match timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs) + self.io_timeout),
        };

        let reply = self
            .command_with_deadline(&[b"BLPOP", key.as_bytes(), wait.as_bytes()], deadline)
            .await?;

        match reply {
            Reply::Array(None) | Reply::Bulk(None) => Ok(None),
            Reply::Array(Some(mut items)) if items.len() == 2 => match items.pop() {
                Some(Reply::Bulk(Some(bytes))) => String::from_utf8(bytes)
                    .map(Some)
                    .map_err(|_| StoreError::Protocol("BLPOP value is not UTF-8".to_string())),
                other => Err(StoreError::Protocol(format!("unexpected BLPOP value: {:?}", other))),
            },
            other => Err(StoreError::Protocol(format!("unexpected BLPOP reply: {:?}", other))),
        }
    }

    /// LLEN.
    pub async fn llen(&mut self, key: &str) -> Result<usize, StoreError> {
        match self.command(&[b"LLEN", key.as_bytes()]).await? {
            Reply::Integer(n) if n >= 0 => Ok(n as usize),
            other => Err(StoreError::Protocol(format!("unexpected LLEN reply: {:?}", other))),
        }
    }

    /// Close the write half; the server sees EOF.
    pub async fn shutdown(mut self) -> Result<(), StoreError> {
        self.stream.get_mut().shutdown().await?;
        Ok(())
    }

    /// Send one command and read its reply within the I/O timeout.
    pub async fn command(&mut self, args: &[&[u8]]) -> Result<Reply, StoreError> {
        let deadline = Some(self.io_timeout);
        self.command_with_deadline(args, deadline).await
    }

    async fn command_with_deadline(
        &mut self,
        args: &[&[u8]],
        deadline: Option<Duration>,
    ) -> Result<Reply, StoreError> {
        let reply = match deadline {
            Some(limit) => timeout(limit, self.roundtrip(args))
                .await
                .map_err(|_| StoreError::Timeout(limit))??,
            None => self.roundtrip(args).await?,
        };

        match reply {
            Reply::Error(message) => Err(StoreError::Server(message)),
            other => Ok(other),
        }
    }

    async fn roundtrip(&mut self, args: &[&[u8]]) -> Result<Reply, StoreError> {
        let frame = encode_command(args);
        self.stream.get_mut().write_all(&frame).await?;

        let line = self.read_line().await?;
        if let Some(rest) = line.strip_prefix('*') {
            return match parse_length(rest, MAX_ARRAY_LEN)? {
                None => Ok(Reply::Array(None)),
                Some(len) => {
                    let mut items = Vec::new();
                    for _ in 0..len {
                        let line = self.read_line().await?;
                        items.push(self.read_scalar(&line).await?);
                    }
                    Ok(Reply::Array(Some(items)))
                }
            };
        }
        self.read_scalar(&line).await
    }

    async fn read_scalar(&mut self, line: &str) -> Result<Reply, StoreError> {
        let mut chars = line.chars();
        let kind = chars.next();
        let rest = chars.as_str();

        match kind {
            Some('+') => Ok(Reply::Simple(rest.to_string())),
            Some('-') => Ok(Reply::Error(rest.to_string())),
            Some(':') => rest
                .parse()
                .map(Reply::Integer)
                .map_err(|_| StoreError::Protocol(format!("invalid integer reply '{}'", rest))),
            Some('$') => match parse_length(rest, MAX_BULK_LEN)? {
                None => Ok(Reply::Bulk(None)),
                Some(len) => {
                    let expected = len + 2;
                    let mut payload = Vec::new();
                    (&mut self.stream)
                        .take(expected as u64)
                        .read_to_end(&mut payload)
                        .await?;
                    if payload.len() < expected {
                        return Err(StoreError::Io(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "connection closed mid bulk string",
                        )));
                    }
                    if !payload.ends_with(b"\r\n") {
                        return Err(StoreError::Protocol("bulk string not terminated".to_string()));
                    }
                    payload.truncate(len);
                    Ok(Reply::Bulk(Some(payload)))
                }
            },
            Some('*') => Err(StoreError::Protocol("nested arrays are not supported".to_string())),
            _ => Err(StoreError::Protocol(format!("unknown reply type in '{}'", line))),
        }
    }

    async fn read_line(&mut self) -> Result<String, StoreError> {
        let mut buf = Vec::new();
        let read = (&mut self.stream)
            .take(MAX_LINE_LEN)
            .read_until(b'\n', &mut buf)
            .await?;
        if read == 0 {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by backend",
            )));
        }
        if read as u64 == MAX_LINE_LEN && !buf.ends_with(b"\n") {
            return Err(StoreError::Protocol("reply line too long".to_string()));
        }
        if !buf.ends_with(b"\r\n") {
            return Err(StoreError::Protocol("reply line not terminated".to_string()));
        }
        buf.truncate(buf.len() - 2);
        String::from_utf8(buf).map_err(|_| StoreError::Protocol("reply line is not UTF-8".to_string()))
    }
}

/// `-1` is the null marker; any other negative length, or one above `max`,
/// is malformed.
fn parse_length(raw: &str, max: usize) -> Result<Option<usize>, StoreError> {
    let len: i64 = raw
        .parse()
        .map_err(|_| StoreError::Protocol(format!("invalid length '{}'", raw)))?;
    match len {
        -1 => Ok(None),
        n if n >= 0 && n as u64 <= max as u64 => Ok(Some(n as usize)),
        n => Err(StoreError::Protocol(format!("invalid length {}", n))),
    }
}
