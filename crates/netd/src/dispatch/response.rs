//! Reply model and line writer for the control protocol.
//!
//! Each reply line is `<code> <message>\n`. A reply may carry any number of
//! `1xx` item lines before its single terminal line.

use std::io::{self, Write};

use strum::Display;

use super::errors::CommandError;

/// Protocol status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ResponseCode {
    /// One interface name.
    InterfaceListResult,
    /// One tethered interface.
    TetherInterfaceListResult,
    /// One DNS forwarder target.
    TetherDnsFwdTgtListResult,
    /// One tty usable for PPP.
    TtyListResult,
    /// Generic success.
    CommandOkay,
    /// Tethering service state.
    TetherStatusResult,
    /// IP forwarding state.
    IpFwdStatusResult,
    /// Interface configuration.
    InterfaceGetCfgResult,
    /// Soft AP state.
    SoftapStatusResult,
    /// Rate limit value.
    ThrottleResult,
    /// Quota value.
    QuotaCounterResult,
    /// Resolver settings.
    ResolverResult,
    /// Clatd state.
    ClatdStatusResult,
    /// Throughput monitor state.
    ThroughputStatusResult,
    /// Dual uplink state.
    DualOnStatusResult,
    /// The operation was attempted and failed.
    OperationFailed,
    /// The command line was malformed.
    CommandSyntaxError,
    /// An argument value was rejected.
    CommandParameterError,
}

impl ResponseCode {
    /// Numeric wire value.
    #[must_use]
    pub const fn value(self) -> u16 {
        match self {
            Self::InterfaceListResult => 110,
            Self::TetherInterfaceListResult => 111,
            Self::TetherDnsFwdTgtListResult => 112,
            Self::TtyListResult => 113,
            Self::CommandOkay => 200,
            Self::TetherStatusResult => 210,
            Self::IpFwdStatusResult => 211,
            Self::InterfaceGetCfgResult => 213,
            Self::SoftapStatusResult => 214,
            Self::ThrottleResult => 218,
            Self::QuotaCounterResult => 220,
            Self::ResolverResult => 222,
            Self::ClatdStatusResult => 223,
            Self::ThroughputStatusResult => 224,
            Self::DualOnStatusResult => 225,
            Self::OperationFailed => 400,
            Self::CommandSyntaxError => 500,
            Self::CommandParameterError => 501,
        }
    }

    /// Whether the code is a list item rather than a terminal line.
    #[must_use]
    pub const fn is_item(self) -> bool {
        self.value() < 200
    }
}

/// One `<code> <message>` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyLine {
    /// Status code.
    pub code: ResponseCode,
    /// Message text.
    pub message: String,
}

/// Everything written back for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    items: Vec<ReplyLine>,
    terminal: ReplyLine,
}

impl Reply {
    /// Reply consisting of a single terminal line.
    pub fn new(code: ResponseCode, message: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            terminal: ReplyLine {
                code,
                message: message.into(),
            },
        }
    }

    /// `200` reply.
    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(ResponseCode::CommandOkay, message)
    }

    /// Terminal `200` reply preceded by one `code` item per entry.
    pub fn list<I, S>(code: ResponseCode, entries: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            items: entries
                .into_iter()
                .map(|entry| ReplyLine {
                    code,
                    message: entry.into(),
                })
                .collect(),
            terminal: ReplyLine {
                code: ResponseCode::CommandOkay,
                message: message.into(),
            },
        }
    }

    /// Reply reporting `error`.
    #[must_use]
    pub fn from_error(error: &CommandError) -> Self {
        Self::new(error.code(), error.to_string())
    }

    /// Item lines.
    #[must_use]
    pub fn items(&self) -> &[ReplyLine] {
        &self.items
    }

    /// Terminal line.
    #[must_use]
    pub fn terminal(&self) -> &ReplyLine {
        &self.terminal
    }
}

/// Writes protocol lines to a stream.
pub struct ResponseWriter<W> {
    writer: W,
}

impl<W: Write> ResponseWriter<W> {
    /// Wraps the given output stream.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes one line. Embedded line breaks are flattened to spaces.
    pub fn write_line(&mut self, code: ResponseCode, message: &str) -> io::Result<()> {
        let flattened = message.replace(['\r', '\n'], " ");
        writeln!(self.writer, "{} {flattened}", code.value())
    }

    /// Writes every line of `reply` and flushes.
    pub fn write_reply(&mut self, reply: &Reply) -> io::Result<()> {
        for item in reply.items() {
            self.write_line(item.code, &item.message)?;
        }
        let terminal = reply.terminal();
        self.write_line(terminal.code, &terminal.message)?;
        self.writer.flush()
    }

    /// Writes `error` as a terminal line and flushes.
    pub fn write_error(&mut self, error: &CommandError) -> io::Result<()> {
        self.write_reply(&Reply::from_error(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(reply: &Reply) -> String {
        let mut output = Vec::new();
        ResponseWriter::new(&mut output)
            .write_reply(reply)
            .expect("write reply");
        String::from_utf8(output).expect("valid utf8")
    }

    #[test]
    fn writes_terminal_line() {
        assert_eq!(render(&Reply::ok("Nat operation succeeded")), "200 Nat operation succeeded\n");
    }

    #[test]
    fn writes_items_before_terminal() {
        let reply = Reply::list(
            ResponseCode::InterfaceListResult,
            ["lo", "wlan0"],
            "Interface list completed",
        );

        assert_eq!(
            render(&reply),
            "110 lo\n110 wlan0\n200 Interface list completed\n"
        );
    }

    #[test]
    fn flattens_embedded_newlines() {
        let reply = Reply::new(ResponseCode::OperationFailed, "first\nsecond");
        assert_eq!(render(&reply), "400 first second\n");
    }

    #[test]
    fn write_error_uses_error_code() {
        let mut output = Vec::new();
        ResponseWriter::new(&mut output)
            .write_error(&CommandError::syntax("Command not recognized"))
            .expect("write error");
        assert_eq!(
            String::from_utf8(output).expect("valid utf8"),
            "500 Command not recognized\n"
        );
    }

    #[test]
    fn only_1xx_codes_are_items() {
        assert!(ResponseCode::TtyListResult.is_item());
        assert!(!ResponseCode::CommandOkay.is_item());
        assert!(!ResponseCode::CommandParameterError.is_item());
    }
}
