use core::fmt::{self, Display, Formatter};

/// Phase of the SMTP dialogue, gating which commands are currently legal.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No greeting accepted yet.
    #[default]
    Connect,
    /// Greeted, no transaction in progress.
    Ready,
    /// Sender accepted; a spool message is open.
    Mail,
    /// At least one recipient accepted.
    Rcpt,
    /// Collecting message content.
    Data,
}

impl Display for State {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        fmt.write_str(match self {
            Self::Connect => "CONNECT",
            Self::Ready => "READY",
            Self::Mail => "MAIL",
            Self::Rcpt => "RCPT",
            Self::Data => "DATA",
        })
    }
}
