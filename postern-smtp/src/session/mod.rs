use std::{borrow::Cow, net::IpAddr, sync::Arc};

use arrayvec::ArrayString;
use postern_common::{
    config::SessionTimeouts,
    internal, outgoing,
    record::{Recorder, Severity, TracingRecorder},
    status::Status,
    tracing,
};
use postern_spool::MessageStore;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{State, connection::Connection, error::SessionError};

mod data;
mod handlers;
mod response;

pub use response::Reply;

/// Greeting version, taken from this crate's major and minor version.
const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION_MAJOR"),
    ".",
    env!("CARGO_PKG_VERSION_MINOR")
);

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum Event {
    ConnectionClose,
    ConnectionKeepAlive,
}

/// Running description of the current transaction, e.g.
/// `mail from <a@b> to <c@d>...`. Bounded; excess text is dropped on a
/// character boundary.
#[derive(Debug, Default, Clone)]
pub struct Summary(ArrayString<512>);

impl Summary {
    pub fn push(&mut self, text: &str) {
        let mut end = text.len().min(self.0.remaining_capacity());
        while !text.is_char_boundary(end) {
            end -= 1;
        }

        self.0.push_str(&text[..end]);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

#[derive(Debug)]
pub struct SessionConfig {
    pub server_name: String,
    pub client_name: Option<String>,
    pub timeouts: SessionTimeouts,
    pub recorder: Arc<dyn Recorder>,
}

impl SessionConfig {
    /// Create a new `SessionConfig` builder
    #[must_use]
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }
}

/// Builder for `SessionConfig`
#[derive(Debug)]
pub struct SessionConfigBuilder {
    server_name: String,
    client_name: Option<String>,
    timeouts: SessionTimeouts,
    recorder: Arc<dyn Recorder>,
}

impl Default for SessionConfigBuilder {
    fn default() -> Self {
        Self {
            server_name: String::new(),
            client_name: None,
            timeouts: SessionTimeouts::default(),
            recorder: Arc::new(TracingRecorder),
        }
    }
}

impl SessionConfigBuilder {
    /// Set the name this server announces itself as
    #[must_use]
    pub fn with_server_name(mut self, server_name: String) -> Self {
        self.server_name = server_name;
        self
    }

    /// Set the name recorded for the client in the `Received:` header
    #[must_use]
    pub fn with_client_name(mut self, client_name: String) -> Self {
        self.client_name = Some(client_name);
        self
    }

    /// Set the timeout configuration for this session
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: SessionTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set where operational records go
    #[must_use]
    pub fn with_recorder(mut self, recorder: Arc<dyn Recorder>) -> Self {
        self.recorder = recorder;
        self
    }

    /// Build the final `SessionConfig`
    #[must_use]
    pub fn build(self) -> SessionConfig {
        SessionConfig {
            server_name: self.server_name,
            client_name: self.client_name,
            timeouts: self.timeouts,
            recorder: self.recorder,
        }
    }
}

/// One SMTP dialogue over one connection.
pub struct Session<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> {
    peer: IpAddr,
    client_name: String,
    server: Arc<str>,
    connection: Connection<Stream>,
    spool: Box<dyn MessageStore>,
    recorder: Arc<dyn Recorder>,
    timeouts: SessionTimeouts,
    state: State,
    /// Protocol label for `Received:`; set by the last accepted greeting.
    extended: bool,
    recipients: usize,
    summary: Summary,
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> Session<Stream> {
    pub fn new(
        stream: Stream,
        peer: IpAddr,
        spool: Box<dyn MessageStore>,
        config: SessionConfig,
    ) -> Self {
        tracing::debug!("Config: {:?}", config);

        Self {
            peer,
            client_name: config.client_name.unwrap_or_else(|| format!("[{peer}]")),
            server: if config.server_name.is_empty() {
                std::env::var("HOSTNAME")
                    .unwrap_or_else(|_| "localhost".to_string())
                    .into()
            } else {
                config.server_name.into()
            },
            connection: Connection::new(stream),
            spool,
            recorder: config.recorder,
            timeouts: config.timeouts,
            state: State::default(),
            extended: false,
            recipients: 0,
            summary: Summary::default(),
        }
    }

    /// Conduct the dialogue until QUIT or a fatal condition.
    ///
    /// On any error the open message is discarded, and for transport
    /// failures a best-effort `421` is sent before the event is recorded.
    ///
    /// # Errors
    /// Returns why the session ended if it did not end with QUIT.
    #[tracing::instrument(level = tracing::Level::TRACE, skip_all, fields(peer = %self.peer), ret)]
    pub async fn run(mut self) -> Result<(), SessionError> {
        internal!("Connected");

        let result = self.run_inner().await;

        if let Err(err) = &result {
            self.abort(err).await;
        }

        internal!("Connection closed");
        result
    }

    async fn run_inner(&mut self) -> Result<(), SessionError> {
        self.reply(Reply::new(
            Status::ServiceReady,
            format!("{} SMTP server version {VERSION} ready", self.server),
        ))
        .await?;

        loop {
            if self.next_command().await? == Event::ConnectionClose {
                return Ok(());
            }
        }
    }

    async fn abort(&mut self, err: &SessionError) {
        if err.is_transport() {
            let closing = self.closing_reply(Status::Unavailable);
            outgoing!("{closing}");

            if let Err(err) = self
                .connection
                .send(&closing, self.timeouts.fatal_reply_timeout())
                .await
            {
                internal!(level = DEBUG, "Unable to send {closing}: {err}");
            }
        }

        self.spool.discard().await;

        match err {
            SessionError::ReadTimeout => self.record(Severity::Error, "network read timeout"),
            SessionError::Read(_) => self.record(Severity::Error, "network read error"),
            SessionError::Write(_) => self.record(Severity::Error, "network write error"),
            SessionError::Internal(_) => {}
        }
    }

    fn closing_reply(&self, status: Status) -> Reply {
        Reply::new(
            status,
            format!("{} Service closing transmission channel", self.server),
        )
    }

    pub(super) fn record(&self, severity: Severity, message: &str) {
        self.recorder.record(severity, message);
    }

    /// Record an impossible state and produce the error that ends the session.
    pub(super) fn invariant(&self, what: &'static str) -> SessionError {
        self.record(
            Severity::Critical,
            &format!("internal error in state {}: {what}", self.state),
        );
        SessionError::Internal(what)
    }

    pub(super) async fn reply(&mut self, reply: Reply) -> Result<(), SessionError> {
        outgoing!("{reply}");

        self.connection
            .send(&reply, self.timeouts.command_timeout())
            .await
            .map(|_| ())
            .map_err(SessionError::Write)
    }

    pub(super) async fn reply_with(
        &mut self,
        status: Status,
        text: impl Into<Cow<'static, str>> + Send,
    ) -> Result<(), SessionError> {
        self.reply(Reply::new(status, text)).await
    }

    /// Return to READY, dropping any transaction in progress.
    pub(super) async fn reset(&mut self) {
        self.spool.discard().await;
        self.summary.clear();
        self.recipients = 0;
        self.state = State::Ready;
    }
}

#[cfg(test)]
mod tests {
    use super::Summary;

    #[test]
    fn summary_truncates_on_char_boundary() {
        let mut summary = Summary::default();
        summary.push(&"a".repeat(510));
        summary.push("é!");

        assert_eq!(summary.as_str().len(), 512);
        assert!(summary.as_str().ends_with('é'));

        summary.push("more");
        assert_eq!(summary.as_str().len(), 512);
    }

    #[test]
    fn summary_drops_partial_character() {
        let mut summary = Summary::default();
        summary.push(&"a".repeat(511));
        summary.push("é");

        assert_eq!(summary.as_str().len(), 511);
    }
}
