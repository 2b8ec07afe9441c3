// Line framing over a raw byte stream.
//
// The firmware's Telnet channel has no length prefixes: records end at
// `\n`, and the JSON reply to a command is whichever line first contains a
// brace. Everything received is appended to one buffer; records are cut
// from its front only once their delimiter has arrived.

use std::time::Duration;

use bytes::{Buf, BytesMut};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::error::Error;

const READ_CHUNK: usize = 1024;

/// A decoded structured record plus the free-form lines that preceded it.
#[derive(Debug, Clone)]
pub struct Structured<T> {
    /// The decoded JSON payload.
    pub record: T,
    /// Lines received before the payload line, in receipt order.
    pub auxiliary: Vec<String>,
}

/// Buffered, newline-framed view of a byte stream.
///
/// Generic over the stream so tests can drive it with scripted I/O; in
/// production it wraps a [`TcpStream`] from [`connect`](FramedConnection::connect).
pub struct FramedConnection<S> {
    stream: S,
    buffer: BytesMut,
    read_timeout: Option<Duration>,
}

impl FramedConnection<TcpStream> {
    /// Open a TCP connection to `host:port`, bounded by `connect_timeout`.
    pub async fn connect(host: &str, port: u16, connect_timeout: Duration) -> Result<Self, Error> {
        let addr = format!("{host}:{port}");
        debug!(%addr, "opening firmware connection");

        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::Timeout {
                timeout_ms: millis(connect_timeout),
            })?
            .map_err(|e| Error::ConnectionFailed {
                addr: addr.clone(),
                reason: e.to_string(),
            })?;
        stream.set_nodelay(true)?;

        Ok(Self::new(stream))
    }
}

impl<S> FramedConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            read_timeout: None,
        }
    }

    /// Bound every socket read by `timeout`.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Send one command token, newline-terminated.
    pub async fn send_command(&mut self, command: &str) -> Result<(), Error> {
        let command = command.trim();
        trace!(command, "sending command");

        let mut frame = Vec::with_capacity(command.len() + 1);
        frame.extend_from_slice(command.as_bytes());
        frame.push(b'\n');

        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read one newline-delimited record.
    ///
    /// The delimiter (`\n` or `\r\n`) is stripped. Whitespace in front of a
    /// record, including blank lines, is skipped, so the returned lines do
    /// not depend on how the bytes were split across reads.
    pub async fn read_line(&mut self) -> Result<String, Error> {
        loop {
            if let Some(line) = self.take_line() {
                trace!(%line, "line received");
                return Ok(line);
            }
            self.fill_buffer().await?;
        }
    }

    /// Read lines until one contains a brace, then decode it as JSON.
    ///
    /// Decoding starts at the first `{`. Lines read before the JSON line are
    /// returned as [`Structured::auxiliary`]. A decode failure is reported
    /// as [`Error::MalformedRecord`]; there is no resync on this channel.
    pub async fn read_structured_record<T>(&mut self) -> Result<Structured<T>, Error>
    where
        T: DeserializeOwned,
    {
        let mut auxiliary = Vec::new();
        loop {
            let line = self.read_line().await?;
            if line.contains(['{', '}']) {
                let record = decode_record(&line)?;
                return Ok(Structured { record, auxiliary });
            }
            auxiliary.push(line);
        }
    }

    /// Bytes received but not yet returned as a record.
    #[cfg(test)]
    fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Cut the next complete record off the front of the buffer.
    fn take_line(&mut self) -> Option<String> {
        match self.buffer.iter().position(|b| !b.is_ascii_whitespace()) {
            Some(start) => self.buffer.advance(start),
            None => {
                self.buffer.clear();
                return None;
            }
        }

        let end = self.buffer.iter().position(|&b| b == b'\n')?;
        let mut record = self.buffer.split_to(end + 1);
        record.truncate(end);
        if record.last() == Some(&b'\r') {
            record.truncate(end - 1);
        }

        Some(String::from_utf8_lossy(&record).into_owned())
    }

    async fn fill_buffer(&mut self) -> Result<(), Error> {
        self.buffer.reserve(READ_CHUNK);

        let read = self.stream.read_buf(&mut self.buffer);
        let n = match self.read_timeout {
            Some(timeout) => tokio::time::timeout(timeout, read)
                .await
                .map_err(|_| Error::Timeout {
                    timeout_ms: millis(timeout),
                })??,
            None => read.await?,
        };

        if n == 0 {
            return Err(Error::ConnectionClosed);
        }
        Ok(())
    }
}

fn decode_record<T: DeserializeOwned>(line: &str) -> Result<T, Error> {
    let Some(start) = line.find('{') else {
        return Err(Error::MalformedRecord {
            message: "closing brace without an opening brace".into(),
            line: line.to_owned(),
        });
    };

    serde_json::from_str(&line[start..]).map_err(|e| Error::MalformedRecord {
        message: e.to_string(),
        line: line.to_owned(),
    })
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
