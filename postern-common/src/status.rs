use core::fmt::{self, Display, Formatter};

/// SMTP reply codes emitted by the receiver.
#[repr(u32)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Debug)]
pub enum Status {
    HelpMessage = 214,
    ServiceReady = 220,
    GoodBye = 221,
    Ok = 250,
    StartMailInput = 354,
    Unavailable = 421,
    InsufficientStorage = 452,
    SyntaxError = 500,
    InvalidParameters = 501,
    NotImplemented = 502,
    InvalidCommandSequence = 503,
    Unknown(u32),
}

impl From<u32> for Status {
    fn from(value: u32) -> Self {
        match value {
            214 => Self::HelpMessage,
            220 => Self::ServiceReady,
            221 => Self::GoodBye,
            250 => Self::Ok,
            354 => Self::StartMailInput,
            421 => Self::Unavailable,
            452 => Self::InsufficientStorage,
            500 => Self::SyntaxError,
            501 => Self::InvalidParameters,
            502 => Self::NotImplemented,
            503 => Self::InvalidCommandSequence,
            _ => Self::Unknown(value),
        }
    }
}

impl From<Status> for u32 {
    fn from(value: Status) -> Self {
        match value {
            Status::HelpMessage => 214,
            Status::ServiceReady => 220,
            Status::GoodBye => 221,
            Status::Ok => 250,
            Status::StartMailInput => 354,
            Status::Unavailable => 421,
            Status::InsufficientStorage => 452,
            Status::SyntaxError => 500,
            Status::InvalidParameters => 501,
            Status::NotImplemented => 502,
            Status::InvalidCommandSequence => 503,
            Status::Unknown(v) => v,
        }
    }
}

impl Display for Status {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(fmt, "{}", u32::from(*self))
    }
}
