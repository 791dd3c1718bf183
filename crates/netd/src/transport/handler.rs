//! Accepted connections and the bounded line reader used on them.

use std::io::{self, Read, Write};
use std::net::TcpStream;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

use super::LineError;

/// Longest command line accepted from a client, newline excluded.
pub(crate) const MAX_LINE_BYTES: usize = 4096;

/// Stream types accepted by the daemon listener.
pub(crate) enum ConnectionStream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl ConnectionStream {
    /// Printable peer identity for logs.
    pub(crate) fn peer_label(&self) -> String {
        match self {
            Self::Tcp(stream) => stream
                .peer_addr()
                .map_or_else(|_| "tcp:unknown".to_owned(), |addr| format!("tcp:{addr}")),
            #[cfg(unix)]
            Self::Unix(_) => "unix".to_owned(),
        }
    }
}

impl Read for ConnectionStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for ConnectionStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
        }
    }
}

/// Handles accepted socket connections.
pub(crate) trait ConnectionHandler: Send + Sync + 'static {
    /// Serves a single connection until the peer disconnects.
    /// Implementations should avoid panicking.
    fn handle(&self, stream: ConnectionStream);
}

/// Splits a byte stream into newline-terminated lines of bounded length.
///
/// Bytes past a newline are kept for the next call, so pipelined commands
/// are returned one at a time and in order.
#[derive(Debug, Default)]
pub(crate) struct LineReader {
    pending: Vec<u8>,
}

impl LineReader {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the next line without its terminator.
    ///
    /// `Ok(None)` means the peer closed the stream with nothing pending. A
    /// final unterminated line is returned as is.
    pub(crate) fn next_line<R: Read>(&mut self, source: &mut R) -> Result<Option<Vec<u8>>, LineError> {
        let mut chunk = [0_u8; 1024];
        loop {
            if let Some(position) = self.pending.iter().position(|byte| *byte == b'\n') {
                enforce_limit(position)?;
                let mut line: Vec<u8> = self.pending.drain(..=position).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(Some(line));
            }
            enforce_limit(self.pending.len())?;

            let read = read_chunk_with_retry(source, &mut chunk)?;
            if read == 0 {
                return Ok(if self.pending.is_empty() {
                    None
                } else {
                    Some(std::mem::take(&mut self.pending))
                });
            }
            self.pending.extend_from_slice(&chunk[..read]);
        }
    }
}

fn read_chunk_with_retry<R: Read>(source: &mut R, chunk: &mut [u8]) -> io::Result<usize> {
    loop {
        match source.read(chunk) {
            Ok(read) => return Ok(read),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        }
    }
}

fn enforce_limit(size: usize) -> Result<(), LineError> {
    if size > MAX_LINE_BYTES {
        return Err(LineError::TooLong {
            max_size: MAX_LINE_BYTES,
        });
    }
    Ok(())
}
