use core::fmt::{self, Display, Formatter};

/// Every verb is exactly this many bytes.
pub const COMMAND_WIDTH: usize = 4;

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum Verb {
    Data,
    Ehlo,
    Expn,
    Helo,
    Help,
    Mail,
    Noop,
    Quit,
    Rcpt,
    Rset,
    Saml,
    Send,
    Soml,
    Turn,
    Vrfy,
}

#[derive(Debug)]
pub struct CommandSpec {
    pub name: &'static str,
    pub verb: Verb,
    pub supported: bool,
}

const fn spec(name: &'static str, verb: Verb, supported: bool) -> CommandSpec {
    CommandSpec {
        name,
        verb,
        supported,
    }
}

/// The command table, in alphabetical order.
pub static COMMANDS: [CommandSpec; 15] = [
    spec("DATA", Verb::Data, true),
    spec("EHLO", Verb::Ehlo, true),
    spec("EXPN", Verb::Expn, false),
    spec("HELO", Verb::Helo, true),
    spec("HELP", Verb::Help, true),
    spec("MAIL", Verb::Mail, true),
    spec("NOOP", Verb::Noop, true),
    spec("QUIT", Verb::Quit, true),
    spec("RCPT", Verb::Rcpt, true),
    spec("RSET", Verb::Rset, true),
    spec("SAML", Verb::Saml, false),
    spec("SEND", Verb::Send, false),
    spec("SOML", Verb::Soml, false),
    spec("TURN", Verb::Turn, false),
    spec("VRFY", Verb::Vrfy, false),
];

impl Verb {
    /// Match the first four bytes of a line, ignoring case.
    ///
    /// Shorter lines and unknown verbs are unrecognised.
    #[must_use]
    pub fn classify(line: &[u8]) -> Option<Self> {
        let head = line.get(..COMMAND_WIDTH)?;

        COMMANDS
            .iter()
            .find(|command| command.name.as_bytes().eq_ignore_ascii_case(head))
            .map(|command| command.verb)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        COMMANDS
            .iter()
            .find(|command| command.verb == self)
            .map_or("", |command| command.name)
    }

    #[must_use]
    pub fn is_supported(self) -> bool {
        COMMANDS
            .iter()
            .any(|command| command.verb == self && command.supported)
    }

    /// Supported verbs joined with commas, for HELP.
    #[must_use]
    pub fn supported_list() -> String {
        COMMANDS
            .iter()
            .filter(|command| command.supported)
            .map(|command| command.name)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Display for Verb {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.name())
    }
}

/// A recognised command line.
///
/// The verb is upper-cased and trailing spaces are removed; the terminator is
/// not kept. This is the form that gets stored in the spool.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Command {
    verb: Verb,
    line: Vec<u8>,
}

impl Command {
    /// Classify and normalise a line with its terminator already removed.
    #[must_use]
    pub fn parse(mut line: Vec<u8>) -> Option<Self> {
        let verb = Verb::classify(&line)?;

        line[..COMMAND_WIDTH].make_ascii_uppercase();

        let end = line
            .iter()
            .rposition(|&b| b != b' ')
            .map_or(0, |last| last + 1);
        line.truncate(end);

        Some(Self { verb, line })
    }

    #[must_use]
    pub const fn verb(&self) -> Verb {
        self.verb
    }

    /// Everything after the verb and any spaces following it.
    #[must_use]
    pub fn arguments(&self) -> &[u8] {
        let rest = &self.line[COMMAND_WIDTH.min(self.line.len())..];
        let start = rest.iter().position(|&b| b != b' ').unwrap_or(rest.len());

        &rest[start..]
    }

    #[must_use]
    pub fn has_arguments(&self) -> bool {
        !self.arguments().is_empty()
    }

    /// The path following `prefix` (e.g. `FROM:`), matched case-insensitively.
    ///
    /// `None` if the prefix is missing or nothing follows it.
    #[must_use]
    pub fn path_argument(&self, prefix: &str) -> Option<&[u8]> {
        let arguments = self.arguments();
        let (head, path) = arguments.split_at_checked(prefix.len())?;

        (head.eq_ignore_ascii_case(prefix.as_bytes()) && !path.is_empty()).then_some(path)
    }

    /// The normalised line with a CRLF terminator.
    #[must_use]
    pub fn stored(&self) -> Vec<u8> {
        let mut stored = Vec::with_capacity(self.line.len() + 2);
        stored.extend_from_slice(&self.line);
        stored.extend_from_slice(b"\r\n");
        stored
    }
}

impl Display for Command {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", String::from_utf8_lossy(&self.line))
    }
}
