//! Serves control-socket connections through the [`Dispatcher`].

use std::io;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::transport::{ConnectionHandler, ConnectionStream, LineError, LineReader};

use super::errors::CommandError;
use super::registry::{ClientInfo, Dispatcher};
use super::response::ResponseWriter;
use super::DISPATCH_TARGET;

/// Reads command lines from a connection and writes one reply per line.
#[derive(Debug)]
pub(crate) struct DispatchConnectionHandler {
    dispatcher: Arc<Dispatcher>,
}

impl DispatchConnectionHandler {
    pub(crate) fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    fn serve(&self, stream: &mut ConnectionStream, client: &ClientInfo) -> io::Result<()> {
        let mut reader = LineReader::new();
        loop {
            let line = match reader.next_line(stream) {
                Ok(Some(line)) => line,
                Ok(None) => return Ok(()),
                Err(LineError::TooLong { max_size }) => {
                    warn!(
                        target: DISPATCH_TARGET,
                        peer = client.peer(),
                        max_size,
                        "command line too long; closing connection"
                    );
                    let error =
                        CommandError::syntax(format!("Command exceeds {max_size} bytes"));
                    return ResponseWriter::new(&mut *stream).write_error(&error);
                }
                Err(LineError::Io(error)) => return Err(error),
            };

            let mut writer = ResponseWriter::new(&mut *stream);
            match String::from_utf8(line) {
                Ok(text) => writer.write_reply(&self.dispatcher.dispatch(client, &text))?,
                Err(_) => {
                    debug!(target: DISPATCH_TARGET, peer = client.peer(), "non-UTF-8 command");
                    writer.write_error(&CommandError::syntax("Command is not valid UTF-8"))?;
                }
            }
        }
    }
}

impl ConnectionHandler for DispatchConnectionHandler {
    fn handle(&self, mut stream: ConnectionStream) {
        let client = ClientInfo::new(stream.peer_label());
        debug!(target: DISPATCH_TARGET, peer = client.peer(), "session opened");
        if let Err(error) = self.serve(&mut stream, &client) {
            debug!(
                target: DISPATCH_TARGET,
                peer = client.peer(),
                %error,
                "session ended with I/O error"
            );
        }
        debug!(target: DISPATCH_TARGET, peer = client.peer(), "session closed");
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::{Shutdown, TcpListener, TcpStream};
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::tests::support::TestDaemon;
    use crate::transport::MAX_LINE_BYTES;

    fn session(input: &[u8]) -> Vec<String> {
        let daemon = TestDaemon::new();
        let handler = DispatchConnectionHandler::new(daemon.dispatcher());
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            handler.handle(ConnectionStream::Tcp(stream));
        });

        let mut client = TcpStream::connect(addr).expect("connect");
        client
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("timeout");
        client.write_all(input).expect("write");
        client.shutdown(Shutdown::Write).expect("half close");
        let lines = BufReader::new(client)
            .lines()
            .map(|line| line.expect("read reply"))
            .collect();
        server.join().expect("server thread");
        lines
    }

    #[test]
    fn answers_pipelined_commands_in_order() {
        let replies = session(b"ipfwd status\r\nnat enable wlan0 rmnet0\nipfwd status\n");
        assert_eq!(
            replies,
            vec![
                "211 Forwarding disabled",
                "200 Nat operation succeeded",
                "211 Forwarding disabled",
            ]
        );
    }

    #[test]
    fn list_replies_end_with_a_terminal_line() {
        let replies = session(b"list_ttys\n");
        assert_eq!(
            replies,
            vec!["113 ttyGS0", "113 ttyGS1", "200 Ttys listed"]
        );
    }

    #[test]
    fn rejects_non_utf8_and_keeps_serving() {
        let replies = session(b"\xff\xfe\nipfwd status\n");
        assert_eq!(
            replies,
            vec!["500 Command is not valid UTF-8", "211 Forwarding disabled"]
        );
    }

    #[test]
    fn oversized_line_closes_the_session() {
        let replies = session(&vec![b'x'; MAX_LINE_BYTES + 1]);
        assert_eq!(replies, vec![format!("500 Command exceeds {MAX_LINE_BYTES} bytes")]);
    }

    #[test]
    fn unknown_commands_get_a_syntax_error() {
        assert_eq!(session(b"frobnicate now\n"), vec!["500 Command not recognized"]);
    }
}
