use std::collections::VecDeque;
use std::fmt::Display;
use std::str::FromStr;

/// Why a command line could not become a request.
#[derive(Debug, PartialEq, Eq)]
pub enum InputError {
    /// A token no rule of the command accepts.
    Unknown(String),
    /// A keyword was the last token.
    MissingValue(&'static str),
    /// A keyword's value did not parse.
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    /// Every token parsed but the combination is refused.
    Rejected(String),
}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputError::Unknown(token) => write!(f, "unknown input '{token}'"),
            InputError::MissingValue(key) => write!(f, "missing value for '{key}'"),
            InputError::InvalidValue { key, value, reason } => {
                write!(f, "invalid {key} '{value}': {reason}")
            }
            InputError::Rejected(reason) => f.write_str(reason),
        }
    }
}

impl std::error::Error for InputError {}

/// Command tokens in order.
///
/// A `key=value` argument is split when it is read as a keyword, so
/// handlers only ever see the `key value` form. Values are taken verbatim:
/// a filename or secret may itself contain `=`.
#[derive(Debug, Default)]
pub struct TokenInput {
    tokens: VecDeque<String>,
}

impl TokenInput {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tokens: args.into_iter().map(|arg| arg.as_ref().to_string()).collect(),
        }
    }

    pub fn next_token(&mut self) -> Option<String> {
        let token = self.tokens.pop_front()?;
        match token.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                self.tokens.push_front(value.to_string());
                Some(key.to_string())
            }
            _ => Some(token),
        }
    }

    /// Consume the value following `key`.
    pub fn value<T>(&mut self, key: &'static str) -> Result<T, InputError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = self
            .tokens
            .pop_front()
            .ok_or(InputError::MissingValue(key))?;
        raw.parse().map_err(|err: T::Err| InputError::InvalidValue {
            key,
            reason: err.to_string(),
            value: raw,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
