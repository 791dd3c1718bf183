//! Command line tokenization.
//!
//! Tokens are separated by runs of ASCII whitespace. A double quote toggles
//! quoted mode, in which whitespace is literal, and a backslash escapes the
//! next character both inside and outside quotes. Quotes never appear in the
//! resulting token, so `""` yields an empty token.

use thiserror::Error;

/// Failures tokenizing a command line.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum TokenizeError {
    /// A quoted section was never closed.
    #[error("Unclosed quotes error")]
    UnterminatedQuote,
    /// The line ended with a lone backslash.
    #[error("Trailing escape character")]
    TrailingEscape,
}

/// A tokenized command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    name: String,
    args: Vec<String>,
}

impl CommandLine {
    /// Tokenizes `line`. Returns `Ok(None)` for empty or blank lines.
    pub fn parse(line: &str) -> Result<Option<Self>, TokenizeError> {
        let mut tokens = tokenize(line)?.into_iter();
        Ok(tokens.next().map(|name| Self {
            name,
            args: tokens.collect(),
        }))
    }

    /// Command name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Arguments after the command name.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// Splits `line` into tokens.
pub fn tokenize(line: &str) -> Result<Vec<String>, TokenizeError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    // A token has started even when it is still empty, as with `""`.
    let mut in_token = false;
    let mut quoted = false;
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                let escaped = chars.next().ok_or(TokenizeError::TrailingEscape)?;
                current.push(escaped);
                in_token = true;
            }
            '"' => {
                quoted = !quoted;
                in_token = true;
            }
            ch if ch.is_ascii_whitespace() && !quoted => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            ch => {
                current.push(ch);
                in_token = true;
            }
        }
    }

    if quoted {
        return Err(TokenizeError::UnterminatedQuote);
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}
