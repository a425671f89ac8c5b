use core::fmt::{self, Display, Formatter};
use std::borrow::Cow;

use postern_common::status::Status;

pub(super) const OK: &str = "OK";
pub(super) const BAD_ARGUMENTS: &str = "Syntax error in parameters or arguments";
pub(super) const BAD_SEQUENCE: &str = "Bad sequence of commands";
pub(super) const NOT_IMPLEMENTED: &str = "Command not implemented";
pub(super) const NOT_RECOGNISED: &str = "Syntax error, command not recognized";
pub(super) const LINE_TOO_LONG: &str = "Line too long";
pub(super) const NO_STORAGE: &str = "Requested action not taken: insufficient system storage";
pub(super) const START_INPUT: &str = "Start mail input; end with <CRLF>.<CRLF>";

/// One reply line, without its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    status: Status,
    text: Cow<'static, str>,
    continued: bool,
}

impl Reply {
    pub fn new(status: Status, text: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status,
            text: text.into(),
            continued: false,
        }
    }

    /// A line of a multi-line reply that is followed by more lines.
    pub fn continued(status: Status, text: impl Into<Cow<'static, str>>) -> Self {
        Self {
            continued: true,
            ..Self::new(status, text)
        }
    }
}

impl Display for Reply {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        let separator = if self.continued { '-' } else { ' ' };
        write!(fmt, "{}{separator}{}", self.status, self.text)
    }
}
