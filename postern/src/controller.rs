use std::{
    io,
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use postern_common::{
    access::TrustedHosts,
    config::{LoggingConfig, SessionTimeouts},
    internal,
    record::{Recorder, Severity},
};
use postern_smtp::{Session, SessionConfig, error::SessionError};
use postern_spool::{FileSpool, SpoolConfig, SpoolError};
use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config from {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("At least one trusted host must be configured")]
    NoTrustedHosts,
}

/// Reasons a connection is not served to completion.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("attempted connection from non-trusted host: {0}")]
    Untrusted(IpAddr),

    #[error("Spool unavailable: {0}")]
    Spool(#[from] SpoolError),

    #[error("Session failed: {0}")]
    Session(#[from] SessionError),
}

/// A second spool for mail arriving on a different port.
///
/// ```ron
/// hold: Some((port: 2526, spool: (path: "/var/spool/postern-hold"))),
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct HoldConfig {
    pub port: u16,
    pub spool: SpoolConfig,
}

/// Process-wide configuration, read once before the session starts.
#[derive(Debug, Deserialize)]
pub struct Postern {
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    pub trusted_hosts: TrustedHosts,
    #[serde(default)]
    pub spool: SpoolConfig,
    #[serde(default)]
    pub hold: Option<HoldConfig>,
    #[serde(default)]
    pub timeouts: SessionTimeouts,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl FromStr for Postern {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let postern: Self = ron::from_str(s)?;

        if postern.trusted_hosts.is_empty() {
            return Err(ConfigError::NoTrustedHosts);
        }

        Ok(postern)
    }
}

/// Append `.domain` to a bare host name.
fn qualify(name: String, domain: Option<&str>) -> String {
    match domain {
        Some(domain) if !name.contains('.') && !domain.is_empty() => {
            format!("{name}.{}", domain.trim_start_matches('.'))
        }
        _ => name,
    }
}

impl Postern {
    /// Read and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?
            .parse()
    }

    /// The name announced in replies and trace headers.
    ///
    /// Configured hostname, else `$HOSTNAME`, else `localhost`; qualified
    /// with the configured domain when it has no dot.
    #[must_use]
    pub fn server_name(&self) -> String {
        let name = self.hostname.clone().unwrap_or_else(|| {
            std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
        });

        qualify(name, self.domain.as_deref())
    }

    /// The spool for a connection accepted on `local_port`.
    #[must_use]
    pub fn spool_for(&self, local_port: Option<u16>) -> &SpoolConfig {
        match (&self.hold, local_port) {
            (Some(hold), Some(port)) if hold.port == port => &hold.spool,
            _ => &self.spool,
        }
    }

    /// Serve one connection to completion.
    ///
    /// # Errors
    /// - [`ServeError::Untrusted`] if the peer is not in the trusted list;
    ///   nothing is sent to it
    /// - [`ServeError::Spool`] if the spool directory is unusable
    /// - [`ServeError::Session`] if the session ended other than by QUIT
    pub async fn serve<Stream>(
        &self,
        stream: Stream,
        peer: SocketAddr,
        local: Option<SocketAddr>,
        recorder: Arc<dyn Recorder>,
    ) -> Result<(), ServeError>
    where
        Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync,
    {
        let ip = peer.ip().to_canonical();
        recorder.record(Severity::Info, &format!("connection from {ip}"));

        if !self.trusted_hosts.permits(ip) {
            let err = ServeError::Untrusted(ip);
            recorder.record(Severity::Error, &err.to_string());
            return Err(err);
        }

        let spool = FileSpool::new(self.spool_for(local.map(|addr| addr.port())).clone());
        spool.init()?;
        internal!(level = DEBUG, "Spooling to {}", spool.config().path().display());

        let config = SessionConfig::builder()
            .with_server_name(self.server_name())
            .with_timeouts(self.timeouts)
            .with_recorder(recorder)
            .build();

        Session::new(stream, ip, Box::new(spool), config)
            .run()
            .await
            .map_err(ServeError::from)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    const MINIMAL: &str = r#"Postern (
        trusted_hosts: [(address: "127.0.0.1", mask: "255.255.255.255")],
        spool: (path: "/var/spool/postern"),
    )"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let postern: Postern = MINIMAL.parse().unwrap();

        assert!(postern.trusted_hosts.permits("127.0.0.1".parse().unwrap()));
        assert!(!postern.trusted_hosts.permits("127.0.0.2".parse().unwrap()));
        assert_eq!(postern.timeouts, SessionTimeouts::default());
        assert_eq!(postern.logging, LoggingConfig::default());
        assert!(postern.hold.is_none());
    }

    #[test]
    fn trusted_hosts_are_required() {
        let result = "Postern (trusted_hosts: [])".parse::<Postern>();
        assert!(matches!(result, Err(ConfigError::NoTrustedHosts)));

        assert!(matches!(
            "Postern ()".parse::<Postern>(),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn invalid_spool_path_is_rejected() {
        let result = r#"Postern (
            trusted_hosts: [(address: "127.0.0.1", mask: "255.255.255.255")],
            spool: (path: "/etc/postern"),
        )"#
        .parse::<Postern>();

        assert!(result.unwrap_err().to_string().contains("system directory"));
    }

    #[test]
    fn bare_hostname_is_qualified() {
        assert_eq!(
            qualify("mail".to_owned(), Some("example.org")),
            "mail.example.org"
        );
        assert_eq!(
            qualify("mail".to_owned(), Some(".example.org")),
            "mail.example.org"
        );
        assert_eq!(
            qualify("mail.other.net".to_owned(), Some("example.org")),
            "mail.other.net"
        );
        assert_eq!(qualify("mail".to_owned(), None), "mail");
    }

    #[test]
    fn configured_hostname_wins() {
        let mut postern: Postern = MINIMAL.parse().unwrap();
        postern.hostname = Some("relay".to_owned());
        postern.domain = Some("example.org".to_owned());

        assert_eq!(postern.server_name(), "relay.example.org");
    }

    #[test]
    fn hold_port_selects_hold_spool() {
        let postern: Postern = r#"Postern (
            trusted_hosts: [(address: "127.0.0.1", mask: "255.255.255.255")],
            spool: (path: "/var/spool/postern"),
            hold: Some((port: 2526, spool: (path: "/var/spool/postern-hold", long_names: false))),
        )"#
        .parse()
        .unwrap();

        assert_eq!(
            postern.spool_for(Some(2526)).path(),
            Path::new("/var/spool/postern-hold")
        );
        assert_eq!(
            postern.spool_for(Some(25)).path(),
            Path::new("/var/spool/postern")
        );
        assert_eq!(postern.spool_for(None).path(), Path::new("/var/spool/postern"));
    }
}
