//! Behavioural tests for the line protocol served over the control socket.

use std::cell::RefCell;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use netd_config::SocketEndpoint;

use crate::dispatch::DispatchConnectionHandler;
use crate::transport::{ListenerHandle, SocketListener};

use super::support::{TestDaemon, strip_quotes};

type StepResult = Result<(), String>;

/// One persistent client session against a live listener.
struct DispatchWorld {
    daemon: TestDaemon,
    listener: Option<ListenerHandle>,
    session: Option<(TcpStream, BufReader<TcpStream>)>,
    replies: Vec<Vec<String>>,
}

impl DispatchWorld {
    fn new() -> Self {
        Self {
            daemon: TestDaemon::new(),
            listener: None,
            session: None,
            replies: Vec::new(),
        }
    }

    fn connect(&mut self) {
        let listener =
            SocketListener::bind(&SocketEndpoint::tcp("127.0.0.1", 0)).expect("bind listener");
        let addr = listener.local_addr().expect("listener address");
        let handler = Arc::new(DispatchConnectionHandler::new(self.daemon.dispatcher()));
        self.listener = Some(listener.start(handler).expect("start listener"));

        let stream = TcpStream::connect(addr).expect("connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("set read timeout");
        let reader = BufReader::new(stream.try_clone().expect("clone stream"));
        self.session = Some((stream, reader));
    }

    /// Sends one line and reads its complete reply.
    fn send(&mut self, line: &str) {
        let (stream, reader) = self.session.as_mut().expect("session established");
        stream.write_all(line.as_bytes()).expect("write command");
        stream.write_all(b"\n").expect("write newline");
        stream.flush().expect("flush");

        let mut lines = Vec::new();
        loop {
            let mut buffer = String::new();
            let read = reader.read_line(&mut buffer).expect("read reply");
            assert!(read > 0, "connection closed mid-reply: {lines:?}");
            let reply = buffer.trim_end().to_owned();
            let item = reply.starts_with('1');
            lines.push(reply);
            if !item {
                break;
            }
        }
        self.replies.push(lines);
    }

    fn last(&self) -> Result<&[String], String> {
        self.replies
            .last()
            .map(Vec::as_slice)
            .ok_or_else(|| "no reply received".to_owned())
    }

    fn terminal(&self) -> Result<&str, String> {
        self.last()?
            .last()
            .map(String::as_str)
            .ok_or_else(|| "empty reply".to_owned())
    }
}

impl Drop for DispatchWorld {
    fn drop(&mut self) {
        self.session.take();
        if let Some(handle) = self.listener.take() {
            handle.shutdown();
            let _ = handle.join();
        }
    }
}

#[fixture]
fn world() -> RefCell<DispatchWorld> {
    RefCell::new(DispatchWorld::new())
}

#[given("a client connected to the daemon")]
fn given_connected(world: &RefCell<DispatchWorld>) {
    world.borrow_mut().connect();
}

#[given("the kernel reports interface {name}")]
fn given_interface(world: &RefCell<DispatchWorld>, name: String) {
    world.borrow().daemon.add_interface(&name);
}

#[when("the client sends {line}")]
fn when_client_sends(world: &RefCell<DispatchWorld>, line: String) {
    world.borrow_mut().send(strip_quotes(&line));
}

#[then("the reply is {expected}")]
fn then_reply_is(world: &RefCell<DispatchWorld>, expected: String) -> StepResult {
    let world = world.borrow();
    let terminal = world.terminal()?;
    let expected = strip_quotes(&expected);
    if terminal == expected {
        Ok(())
    } else {
        Err(format!("expected '{expected}', got '{terminal}'"))
    }
}

#[then("the reply code is {code}")]
fn then_reply_code(world: &RefCell<DispatchWorld>, code: u16) -> StepResult {
    let world = world.borrow();
    let terminal = world.terminal()?;
    if terminal.starts_with(&format!("{code} ")) {
        Ok(())
    } else {
        Err(format!("expected code {code}, got '{terminal}'"))
    }
}

#[then("the reply lists {item}")]
fn then_reply_lists(world: &RefCell<DispatchWorld>, item: String) -> StepResult {
    let world = world.borrow();
    let lines = world.last()?;
    let item = strip_quotes(&item);
    if lines.iter().any(|line| line == item) {
        Ok(())
    } else {
        Err(format!("'{item}' missing from {lines:?}"))
    }
}

#[scenario(path = "tests/features/command_dispatch.feature")]
fn command_dispatch(world: RefCell<DispatchWorld>) {
    let _ = world;
}
