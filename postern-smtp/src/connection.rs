use std::{fmt::Write, time::Duration};

use postern_common::tracing;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ConnectionError, ConnectionResult};

const BUFFER_SIZE: usize = 8192;

/// Outcome of reading one line.
#[derive(Debug, PartialEq, Eq)]
pub enum Line {
    /// The line without its terminator. A trailing CR is removed; a bare LF
    /// is accepted as a terminator.
    Complete(Vec<u8>),
    /// The line exceeded the limit. It has been consumed and dropped.
    TooLong,
}

/// Buffered, deadline-bounded line transport over a single stream.
pub struct Connection<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> {
    stream: Stream,
    /// Internal read buffer to reduce syscalls (8KB)
    read_buf: Vec<u8>,
    /// Current position in read buffer
    read_pos: usize,
    /// Amount of valid data in read buffer
    read_len: usize,
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> Connection<Stream> {
    pub fn new(stream: Stream) -> Self {
        Self {
            stream,
            read_buf: vec![0; BUFFER_SIZE],
            read_pos: 0,
            read_len: 0,
        }
    }

    /// Write one reply line, appending CRLF.
    ///
    /// # Errors
    /// [`ConnectionError::Timeout`] if the write does not finish within
    /// `deadline`, or the underlying I/O error.
    #[tracing::instrument(level = tracing::Level::TRACE, skip_all)]
    pub async fn send<S: core::fmt::Display + Send + Sync>(
        &mut self,
        response: &S,
        deadline: Duration,
    ) -> ConnectionResult<usize> {
        let mut buffer = arrayvec::ArrayString::<512>::new();
        write!(&mut buffer, "{response}\r\n")?;

        tokio::time::timeout(deadline, async {
            self.stream.write_all(buffer.as_bytes()).await?;
            self.stream.flush().await
        })
        .await
        .map_err(|_| ConnectionError::Timeout)??;

        Ok(buffer.len())
    }

    /// Read one line of at most `limit` bytes including its CRLF.
    ///
    /// The whole line must arrive within `deadline`.
    ///
    /// # Errors
    /// [`ConnectionError::Timeout`] on deadline expiry,
    /// [`ConnectionError::Closed`] if the peer closes before a full line, or
    /// the underlying I/O error.
    #[tracing::instrument(level = tracing::Level::TRACE, skip(self))]
    pub async fn read_line(&mut self, limit: usize, deadline: Duration) -> ConnectionResult<Line> {
        tokio::time::timeout(deadline, self.next_line(limit))
            .await
            .map_err(|_| ConnectionError::Timeout)?
    }

    async fn next_line(&mut self, limit: usize) -> ConnectionResult<Line> {
        let mut line = Vec::new();
        let mut overflow = false;

        loop {
            if self.read_pos == self.read_len {
                self.fill().await?;
            }

            let available = &self.read_buf[self.read_pos..self.read_len];
            let newline = available.iter().position(|&b| b == b'\n');
            let taken = newline.unwrap_or(available.len());

            if !overflow {
                line.extend_from_slice(&available[..taken]);
                if line.len() > limit {
                    overflow = true;
                    line = Vec::new();
                }
            }

            if let Some(index) = newline {
                self.read_pos += index + 1;
                break;
            }

            self.read_pos = self.read_len;
        }

        if line.last() == Some(&b'\r') {
            line.pop();
        }

        if overflow || line.len() + 2 > limit {
            Ok(Line::TooLong)
        } else {
            Ok(Line::Complete(line))
        }
    }

    async fn fill(&mut self) -> ConnectionResult<()> {
        let read = self.stream.read(&mut self.read_buf).await?;

        if read == 0 {
            return Err(ConnectionError::Closed);
        }

        self.read_pos = 0;
        self.read_len = read;
        Ok(())
    }
}
