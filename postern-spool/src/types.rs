use core::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Identifier of a spooled message: creation time in unix seconds plus a
/// disambiguating letter `'a'..='z'`.
///
/// Displays as eight (or more) lower-case hex digits followed by the letter,
/// e.g. `5f3a1b2ca`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId {
    timestamp: u64,
    suffix: char,
}

impl MessageId {
    pub const FIRST_SUFFIX: char = 'a';
    pub const LAST_SUFFIX: char = 'z';

    /// Build an id, rejecting suffixes outside `'a'..='z'`.
    #[must_use]
    pub const fn new(timestamp: u64, suffix: char) -> Option<Self> {
        if suffix.is_ascii_lowercase() {
            Some(Self { timestamp, suffix })
        } else {
            None
        }
    }

    /// First id tried for a given second.
    #[must_use]
    pub const fn first(timestamp: u64) -> Self {
        Self {
            timestamp,
            suffix: Self::FIRST_SUFFIX,
        }
    }

    /// The id with the following letter, or `None` after `'z'`.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        if self.suffix >= Self::LAST_SUFFIX {
            return None;
        }

        char::from_u32(u32::from(self.suffix) + 1).and_then(|suffix| Self::new(self.timestamp, suffix))
    }

    #[must_use]
    pub const fn timestamp(&self) -> u64 {
        self.timestamp
    }

    #[must_use]
    pub const fn suffix(&self) -> char {
        self.suffix
    }

    /// Name of the spool file holding this message.
    ///
    /// Long form is `<id>.mail`; short form keeps the timestamp as the stem
    /// and folds the letter into a three-character extension, `<hex>.<letter>ml`.
    #[must_use]
    pub fn filename(&self, long_names: bool) -> String {
        if long_names {
            format!("{self}.mail")
        } else {
            format!("{:08x}.{}ml", self.timestamp, self.suffix)
        }
    }

    /// Recover the id from either filename form.
    ///
    /// Returns `None` for anything that is not exactly a spool filename.
    #[must_use]
    pub fn from_filename(filename: &str) -> Option<Self> {
        if let Some(id) = filename.strip_suffix(".mail") {
            return id.parse().ok();
        }

        let (stem, extension) = filename.split_once('.')?;
        let mut letters = extension.chars();
        let suffix = letters.next()?;

        if letters.as_str() != "ml" {
            return None;
        }

        Self::new(parse_timestamp(stem)?, suffix)
    }
}

fn parse_timestamp(hex: &str) -> Option<u64> {
    if hex.len() < 8 || !hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
        return None;
    }

    u64::from_str_radix(hex, 16).ok()
}

impl Display for MessageId {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        write!(fmt, "{:08x}{}", self.timestamp, self.suffix)
    }
}

impl FromStr for MessageId {
    type Err = InvalidMessageId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let suffix = s.chars().next_back().ok_or(InvalidMessageId)?;
        let stem = &s[..s.len() - suffix.len_utf8()];

        Self::new(parse_timestamp(stem).ok_or(InvalidMessageId)?, suffix).ok_or(InvalidMessageId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Invalid message id")]
pub struct InvalidMessageId;
