//! Argument validation shared by the command handlers.

use std::str::FromStr;

use crate::dispatch::errors::CommandError;

/// Longest interface name the kernel accepts.
const MAX_INTERFACE_NAME: usize = 15;

/// Positional arguments of one command, with its usage text for errors.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Args<'a> {
    usage: &'static str,
    tokens: &'a [String],
}

impl<'a> Args<'a> {
    pub(crate) fn new(usage: &'static str, tokens: &'a [String]) -> Self {
        Self { usage, tokens }
    }

    /// Syntax error carrying the usage text.
    pub(crate) fn usage(&self) -> CommandError {
        CommandError::syntax(self.usage)
    }

    /// First token, naming the sub-command.
    pub(crate) fn subcommand(&self) -> Result<&'a str, CommandError> {
        self.tokens
            .first()
            .map(String::as_str)
            .ok_or_else(|| self.usage())
    }

    /// Requires exactly `count` tokens.
    pub(crate) fn exact(&self, count: usize) -> Result<(), CommandError> {
        if self.tokens.len() == count {
            Ok(())
        } else {
            Err(self.usage())
        }
    }

    /// Requires at least `count` tokens.
    pub(crate) fn at_least(&self, count: usize) -> Result<(), CommandError> {
        if self.tokens.len() >= count {
            Ok(())
        } else {
            Err(self.usage())
        }
    }

    /// Token at `index`.
    pub(crate) fn get(&self, index: usize) -> Result<&'a str, CommandError> {
        self.tokens
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| self.usage())
    }

    /// Tokens from `index` on.
    pub(crate) fn rest(&self, index: usize) -> &'a [String] {
        self.tokens.get(index..).unwrap_or_default()
    }

    /// Interface name at `index`.
    pub(crate) fn interface(&self, index: usize) -> Result<&'a str, CommandError> {
        interface_name(self.get(index)?)
    }

    /// Parses the token at `index` as `what`.
    pub(crate) fn parse<T: FromStr>(&self, index: usize, what: &str) -> Result<T, CommandError> {
        parse_value(self.get(index)?, what)
    }

    /// Parses every token from `index` on as `what`.
    pub(crate) fn parse_rest<T: FromStr>(
        &self,
        index: usize,
        what: &str,
    ) -> Result<Vec<T>, CommandError> {
        self.rest(index)
            .iter()
            .map(|token| parse_value(token, what))
            .collect()
    }
}

/// Validates an interface name: 1 to 15 of `[A-Za-z0-9_.:-]`, other than the
/// `.` and `..` directory entries.
pub(crate) fn interface_name(name: &str) -> Result<&str, CommandError> {
    let valid = !matches!(name, "" | "." | "..")
        && name.len() <= MAX_INTERFACE_NAME
        && name
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'.' | b':' | b'-'));
    if valid {
        Ok(name)
    } else {
        Err(CommandError::parameter(format!(
            "Invalid interface name '{name}'"
        )))
    }
}

/// Parses `token`, reporting failures as parameter errors naming `what`.
pub(crate) fn parse_value<T: FromStr>(token: &str, what: &str) -> Result<T, CommandError> {
    token
        .parse()
        .map_err(|_| CommandError::parameter(format!("Invalid {what} '{token}'")))
}

/// Parses an `enable`/`disable` keyword.
pub(crate) fn parse_switch(token: &str) -> Result<bool, CommandError> {
    match token {
        "enable" => Ok(true),
        "disable" => Ok(false),
        other => Err(CommandError::parameter(format!(
            "Expected enable or disable, got '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::dispatch::response::ResponseCode;

    #[rstest]
    #[case("wlan0")]
    #[case("rmnet_data0")]
    #[case("eth0.100")]
    #[case("v4-rmnet0:1")]
    #[case("abcdefghijklmno")]
    fn accepts_kernel_interface_names(#[case] name: &str) {
        assert_eq!(interface_name(name).expect("valid"), name);
    }

    #[rstest]
    #[case("")]
    #[case("abcdefghijklmnop")]
    #[case("wlan 0")]
    #[case("wlan0;reboot")]
    #[case("../etc")]
    #[case(".")]
    #[case("..")]
    fn rejects_invalid_interface_names(#[case] name: &str) {
        let error = interface_name(name).expect_err("invalid");
        assert_eq!(error.code(), ResponseCode::CommandParameterError);
    }

    #[test]
    fn count_checks_report_usage() {
        let tokens = vec!["enable".to_owned()];
        let args = Args::new("Usage: nat <enable|disable> <int> <ext>", &tokens);

        let error = args.exact(3).expect_err("too few");

        assert_eq!(error.code(), ResponseCode::CommandSyntaxError);
        assert_eq!(error.to_string(), "Usage: nat <enable|disable> <int> <ext>");
        assert!(args.at_least(1).is_ok());
    }

    #[test]
    fn numeric_parse_failures_are_parameter_errors() {
        let tokens = vec!["setmtu".to_owned(), "wlan0".to_owned(), "big".to_owned()];
        let args = Args::new("Usage: interface setmtu <if> <mtu>", &tokens);

        let error = args.parse::<u32>(2, "mtu").expect_err("not a number");

        assert_eq!(error.code(), ResponseCode::CommandParameterError);
        assert_eq!(error.to_string(), "Invalid mtu 'big'");
    }
}
