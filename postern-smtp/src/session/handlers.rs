use postern_common::{incoming, internal, status::Status};
use tokio::io::{AsyncRead, AsyncWrite};

use super::{
    Event, Session,
    response::{
        BAD_ARGUMENTS, BAD_SEQUENCE, LINE_TOO_LONG, NOT_IMPLEMENTED, NOT_RECOGNISED, NO_STORAGE,
        OK, Reply,
    },
};
use crate::{
    MAX_COMMAND_LINE, State,
    command::{Command, Verb},
    connection::Line,
    error::SessionError,
};

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> Session<Stream> {
    /// Read and act on one command line.
    pub(super) async fn next_command(&mut self) -> Result<Event, SessionError> {
        let line = self
            .connection
            .read_line(MAX_COMMAND_LINE, self.timeouts.command_timeout())
            .await
            .map_err(SessionError::from_read)?;

        let Line::Complete(line) = line else {
            incoming!("<line too long>");
            self.reply_with(Status::SyntaxError, LINE_TOO_LONG).await?;
            return Ok(Event::ConnectionKeepAlive);
        };

        let Some(command) = Command::parse(line) else {
            incoming!("<unrecognised command>");
            self.reply_with(Status::SyntaxError, NOT_RECOGNISED).await?;
            return Ok(Event::ConnectionKeepAlive);
        };

        incoming!("{command}");

        if !command.verb().is_supported() {
            self.reply_with(Status::NotImplemented, NOT_IMPLEMENTED)
                .await?;
            return Ok(Event::ConnectionKeepAlive);
        }

        match command.verb() {
            Verb::Helo => self.greet(&command, false).await?,
            Verb::Ehlo => self.greet(&command, true).await?,
            Verb::Noop => self.noop(&command).await?,
            Verb::Rset => self.rset(&command).await?,
            Verb::Mail => self.mail(&command).await?,
            Verb::Rcpt => self.rcpt(&command).await?,
            Verb::Data => self.data(&command).await?,
            Verb::Help => self.help().await?,
            Verb::Quit => return self.quit(&command).await,
            Verb::Expn | Verb::Saml | Verb::Send | Verb::Soml | Verb::Turn | Verb::Vrfy => {
                return Err(self.invariant("unsupported command dispatched"));
            }
        }

        Ok(Event::ConnectionKeepAlive)
    }

    async fn greet(&mut self, command: &Command, extended: bool) -> Result<(), SessionError> {
        if !command.has_arguments() {
            return self.reply_with(Status::InvalidParameters, BAD_ARGUMENTS).await;
        }

        self.reset().await;
        self.extended = extended;

        let ready = format!("{} service ready", self.server);
        self.reply_with(Status::Ok, ready).await
    }

    async fn noop(&mut self, command: &Command) -> Result<(), SessionError> {
        if command.has_arguments() {
            return self.reply_with(Status::InvalidParameters, BAD_ARGUMENTS).await;
        }

        self.reply_with(Status::Ok, OK).await
    }

    async fn rset(&mut self, command: &Command) -> Result<(), SessionError> {
        if command.has_arguments() {
            return self.reply_with(Status::InvalidParameters, BAD_ARGUMENTS).await;
        }

        self.reset().await;
        self.reply_with(Status::Ok, OK).await
    }

    async fn mail(&mut self, command: &Command) -> Result<(), SessionError> {
        if self.state != State::Ready {
            return self.reply_with(Status::InvalidCommandSequence, BAD_SEQUENCE).await;
        }

        let Some(sender) = command.path_argument("FROM:") else {
            return self.reply_with(Status::InvalidParameters, BAD_ARGUMENTS).await;
        };
        let sender = String::from_utf8_lossy(sender).trim_start().to_owned();

        if let Err(err) = self.open_transaction(command).await {
            internal!(level = WARN, "Unable to start message: {err}");
            self.spool.discard().await;
            return self.reply_with(Status::InsufficientStorage, NO_STORAGE).await;
        }

        self.summary.clear();
        self.summary.push("mail from ");
        self.summary.push(&sender);
        self.recipients = 0;
        self.state = State::Mail;

        self.reply_with(Status::Ok, OK).await
    }

    async fn open_transaction(&mut self, command: &Command) -> postern_spool::Result<()> {
        let id = self.spool.open().await?;
        internal!(level = DEBUG, "Opened message {id}");

        self.spool.store_line(&command.stored()).await
    }

    async fn rcpt(&mut self, command: &Command) -> Result<(), SessionError> {
        if !matches!(self.state, State::Mail | State::Rcpt) {
            return self.reply_with(Status::InvalidCommandSequence, BAD_SEQUENCE).await;
        }

        let Some(recipient) = command.path_argument("TO:") else {
            return self.reply_with(Status::InvalidParameters, BAD_ARGUMENTS).await;
        };
        let recipient = String::from_utf8_lossy(recipient).trim_start().to_owned();

        if self.spool.current().is_none() {
            return Err(self.invariant("no open message"));
        }

        if let Err(err) = self.spool.store_line(&command.stored()).await {
            internal!(level = WARN, "Unable to store recipient: {err}");
            return self.reply_with(Status::InsufficientStorage, NO_STORAGE).await;
        }

        self.recipients += 1;
        match self.recipients {
            1 => {
                self.summary.push(" to ");
                self.summary.push(&recipient);
            }
            2 => self.summary.push("..."),
            _ => {}
        }
        self.state = State::Rcpt;

        self.reply_with(Status::Ok, OK).await
    }

    async fn help(&mut self) -> Result<(), SessionError> {
        self.reply(Reply::continued(Status::HelpMessage, "Commands supported:"))
            .await?;
        self.reply_with(Status::HelpMessage, Verb::supported_list())
            .await
    }

    async fn quit(&mut self, command: &Command) -> Result<Event, SessionError> {
        if command.has_arguments() {
            self.reply_with(Status::InvalidParameters, BAD_ARGUMENTS).await?;
            return Ok(Event::ConnectionKeepAlive);
        }

        // An unfinished transaction dies with the session.
        self.spool.discard().await;

        let closing = self.closing_reply(Status::GoodBye);
        self.reply(closing).await?;

        Ok(Event::ConnectionClose)
    }
}
