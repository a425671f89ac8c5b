//! Crash-safe message spooling.
//!
//! A consumer scanning the spool directory must never mistake a partially
//! written message for a finished one. While a message is open, the first
//! [`PATCH_SIZE`] bytes of its file hold [`SENTINEL`] instead of the real
//! content; commit restores the saved bytes only after everything else has
//! been written, then syncs. A file still starting with `TEMP` is inert, and
//! one left behind by a crash simply stays that way.

use std::{
    io::{ErrorKind, SeekFrom},
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use postern_common::internal;
use tokio::{
    fs::{self, File, OpenOptions},
    io::{AsyncSeekExt, AsyncWriteExt, BufWriter},
};

use crate::{
    Result, SpoolError,
    config::SpoolConfig,
    error::ValidationError,
    types::MessageId,
};

/// Bytes of the first line held back until commit.
pub const PATCH_SIZE: usize = 4;

/// Marker occupying the held-back bytes of an uncommitted message.
pub const SENTINEL: [u8; PATCH_SIZE] = *b"TEMP";

/// Seconds since the unix epoch, used to name new messages.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

/// Storage for at most one open message at a time.
#[async_trait]
pub trait MessageStore: Send + Sync + std::fmt::Debug {
    /// Create a new, uniquely named message for the given second.
    ///
    /// # Errors
    /// [`SpoolError::Exhausted`] when `'a'..='z'` are all taken, and
    /// [`SpoolError::AlreadyOpen`] if a message is still open.
    async fn open_at(&mut self, timestamp: u64) -> Result<MessageId>;

    /// Create a new, uniquely named message stamped with the current time.
    async fn open(&mut self) -> Result<MessageId> {
        self.open_at(unix_now()).await
    }

    /// Append one line. `line` must already carry its terminator.
    ///
    /// The line has reached the file by the time this returns.
    async fn store_line(&mut self, line: &[u8]) -> Result<()>;

    /// Make the open message visible to consumers and close it.
    ///
    /// The message is closed whether or not this succeeds; on failure it is
    /// left inert.
    async fn commit(&mut self) -> Result<()>;

    /// Close the open message without committing, leaving it inert.
    async fn abandon(&mut self);

    /// Close and delete the open message, if any.
    async fn discard(&mut self);

    /// Id of the open message.
    fn current(&self) -> Option<MessageId>;
}

#[derive(Debug)]
struct OpenMessage {
    id: MessageId,
    path: PathBuf,
    file: BufWriter<File>,
    patch: Option<[u8; PATCH_SIZE]>,
}

/// Directory-backed spool.
#[derive(Debug)]
pub struct FileSpool {
    config: SpoolConfig,
    open: Option<OpenMessage>,
}

impl FileSpool {
    #[must_use]
    pub const fn new(config: SpoolConfig) -> Self {
        Self { config, open: None }
    }

    #[must_use]
    pub const fn config(&self) -> &SpoolConfig {
        &self.config
    }

    /// Initialise the spool
    ///
    /// Creates the spool (and audit) directory if missing.
    ///
    /// # Errors
    /// - If a directory cannot be created
    /// - If a path exists but is not a directory
    pub fn init(&self) -> Result<()> {
        internal!("Initialising Spool ...");

        for path in std::iter::once(self.config.path()).chain(self.config.audit()) {
            if !path.try_exists()? {
                internal!("{} does not exist, creating...", path.display());
                std::fs::create_dir_all(path)?;
            } else if !path.is_dir() {
                return Err(ValidationError::NotDirectory(path.to_path_buf()).into());
            }
        }

        Ok(())
    }

    async fn create(&self, id: MessageId) -> std::io::Result<(PathBuf, File)> {
        let path = self.config.path().join(id.filename(self.config.long_names()));

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);

        let file = options.open(&path).await?;
        Ok((path, file))
    }

    async fn finish(message: &mut OpenMessage) -> Result<()> {
        let patch = message.patch.ok_or(SpoolError::NothingStored(message.id))?;

        message.file.flush().await?;
        message.file.seek(SeekFrom::Start(0)).await?;
        message.file.write_all(&patch).await?;
        message.file.flush().await?;
        message.file.get_ref().sync_all().await?;

        Ok(())
    }

    async fn audit_copy(&self, message: &OpenMessage) {
        let Some(audit) = self.config.audit() else {
            return;
        };

        let Some(name) = message.path.file_name() else {
            return;
        };

        let mut target = std::ffi::OsString::from("S_");
        target.push(name);
        let target = audit.join(target);

        if let Err(err) = fs::copy(&message.path, &target).await {
            internal!(
                level = WARN,
                "Unable to copy {} to {}: {err}",
                message.path.display(),
                target.display()
            );
        }
    }
}

#[async_trait]
impl MessageStore for FileSpool {
    async fn open_at(&mut self, timestamp: u64) -> Result<MessageId> {
        if let Some(open) = &self.open {
            return Err(SpoolError::AlreadyOpen(open.id));
        }

        let mut candidate = Some(MessageId::first(timestamp));

        while let Some(id) = candidate {
            match self.create(id).await {
                Ok((path, file)) => {
                    internal!(level = DEBUG, "Opened {}", path.display());

                    self.open = Some(OpenMessage {
                        id,
                        path,
                        file: BufWriter::new(file),
                        patch: None,
                    });

                    return Ok(id);
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => candidate = id.next(),
                Err(err) => return Err(err.into()),
            }
        }

        Err(SpoolError::Exhausted { timestamp })
    }

    async fn store_line(&mut self, line: &[u8]) -> Result<()> {
        let message = self.open.as_mut().ok_or(SpoolError::NotOpen)?;

        if message.patch.is_none() {
            let (head, rest) = line
                .split_first_chunk::<PATCH_SIZE>()
                .ok_or(SpoolError::FirstLineTooShort {
                    len: line.len(),
                    required: PATCH_SIZE,
                })?;

            message.file.write_all(&SENTINEL).await?;
            message.file.write_all(rest).await?;
            message.patch = Some(*head);
        } else {
            message.file.write_all(line).await?;
        }

        message.file.flush().await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let mut message = self.open.take().ok_or(SpoolError::NotOpen)?;

        match Self::finish(&mut message).await {
            Ok(()) => {
                internal!(level = DEBUG, "Committed {}", message.path.display());
                self.audit_copy(&message).await;
                Ok(())
            }
            Err(err @ SpoolError::NothingStored(_)) => {
                drop(message.file);
                let _ = fs::remove_file(&message.path).await;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    async fn abandon(&mut self) {
        if let Some(mut message) = self.open.take() {
            let _ = message.file.flush().await;
            internal!(level = DEBUG, "Abandoned {}", message.path.display());
        }
    }

    async fn discard(&mut self) {
        if let Some(message) = self.open.take() {
            drop(message.file);

            if let Err(err) = fs::remove_file(&message.path).await {
                internal!(
                    level = DEBUG,
                    "Unable to remove {}: {err}",
                    message.path.display()
                );
            }
        }
    }

    fn current(&self) -> Option<MessageId> {
        self.open.as_ref().map(|message| message.id)
    }
}
