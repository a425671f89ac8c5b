use chrono::{DateTime, Local};
use postern_common::{internal, record::Severity, status::Status};
use postern_spool::{MessageId, SpoolError};
use tokio::io::{AsyncRead, AsyncWrite};

use super::{
    Session,
    response::{BAD_ARGUMENTS, BAD_SEQUENCE, LINE_TOO_LONG, NO_STORAGE, OK, START_INPUT},
};
use crate::{MAX_DATA_LINE, State, command::Command, connection::Line, error::SessionError};

/// Undo dot-stuffing. `None` for the terminating lone dot.
fn unstuff(line: &[u8]) -> Option<&[u8]> {
    match line.strip_prefix(b".") {
        Some([]) => None,
        Some(rest) => Some(rest),
        None => Some(line),
    }
}

fn terminated(line: &[u8]) -> Vec<u8> {
    let mut stored = Vec::with_capacity(line.len() + 2);
    stored.extend_from_slice(line);
    stored.extend_from_slice(b"\r\n");
    stored
}

/// The two-line trace header prepended to every message.
pub(super) fn received_header(
    client_name: &str,
    client_ip: &str,
    server: &str,
    extended: bool,
    id: MessageId,
    at: &DateTime<Local>,
) -> [String; 2] {
    [
        format!("Received: from {client_name} ({client_ip}) by {server}\r\n"),
        format!(
            "          with {} id {id}; {}\r\n",
            if extended { "ESMTP" } else { "SMTP" },
            at.format("%a, %d %b %Y %H:%M:%S %z")
        ),
    ]
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> Session<Stream> {
    pub(super) async fn data(&mut self, command: &Command) -> Result<(), SessionError> {
        if self.state != State::Rcpt {
            return self
                .reply_with(Status::InvalidCommandSequence, BAD_SEQUENCE)
                .await;
        }

        if command.has_arguments() {
            return self.reply_with(Status::InvalidParameters, BAD_ARGUMENTS).await;
        }

        let Some(id) = self.spool.current() else {
            return Err(self.invariant("no open message"));
        };

        if let Err(err) = self.store_preamble(id).await {
            internal!(level = WARN, "Unable to store trace header: {err}");
            return self.give_up().await;
        }

        self.reply_with(Status::StartMailInput, START_INPUT).await?;
        self.state = State::Data;

        // After a storage failure the remaining lines up to the terminator are
        // still read and dropped; the 452 follows the terminator.
        let mut failure = None;

        loop {
            let line = self
                .connection
                .read_line(MAX_DATA_LINE, self.timeouts.data_timeout())
                .await
                .map_err(SessionError::from_read)?;

            let Line::Complete(line) = line else {
                self.reply_with(Status::SyntaxError, LINE_TOO_LONG).await?;
                continue;
            };

            let Some(content) = unstuff(&line) else {
                break;
            };

            if failure.is_some() {
                continue;
            }

            if let Err(err) = self.spool.store_line(&terminated(content)).await {
                internal!(level = WARN, "Unable to store message content: {err}");
                self.spool.abandon().await;
                failure = Some(err);
            }
        }

        if failure.is_some() {
            return self.give_up().await;
        }

        self.finish().await
    }

    async fn store_preamble(&mut self, id: MessageId) -> Result<(), SpoolError> {
        let header = received_header(
            &self.client_name,
            &self.peer.to_string(),
            &self.server,
            self.extended,
            id,
            &Local::now(),
        );

        self.spool.store_line(b"DATA\r\n").await?;
        for line in header {
            self.spool.store_line(line.as_bytes()).await?;
        }

        Ok(())
    }

    async fn finish(&mut self) -> Result<(), SessionError> {
        if let Err(err) = self.spool.commit().await {
            internal!(level = ERROR, "Unable to commit message: {err}");
            return self.give_up().await;
        }

        self.record(Severity::Info, self.summary.as_str());
        self.reset().await;

        self.reply_with(Status::Ok, OK).await
    }

    /// Leave the message inert and report a storage failure.
    async fn give_up(&mut self) -> Result<(), SessionError> {
        self.spool.abandon().await;
        self.reset().await;

        self.reply_with(Status::InsufficientStorage, NO_STORAGE).await
    }
}
