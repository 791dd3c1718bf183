//! Test helpers for the transport module.

use std::io::Write;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use super::{ConnectionHandler, ConnectionStream, LineReader};

/// Counts accepted connections without reading from them.
pub(crate) struct CountingHandler {
    count: Arc<AtomicUsize>,
}

impl CountingHandler {
    pub(crate) fn new() -> (Arc<AtomicUsize>, Arc<Self>) {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(Self {
            count: Arc::clone(&count),
        });
        (count, handler)
    }
}

impl ConnectionHandler for CountingHandler {
    fn handle(&self, _stream: ConnectionStream) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Answers every line with `200 <line>`.
pub(crate) struct EchoHandler;

impl ConnectionHandler for EchoHandler {
    fn handle(&self, mut stream: ConnectionStream) {
        let mut reader = LineReader::new();
        while let Ok(Some(line)) = reader.next_line(&mut stream) {
            let text = String::from_utf8_lossy(&line);
            if writeln!(stream, "200 {text}").is_err() {
                return;
            }
        }
    }
}
