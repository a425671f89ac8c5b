//! Adoption of the connection handed over by the supervisor.

use std::{
    io,
    os::fd::{FromRawFd, RawFd},
};

use postern_common::internal;
use tokio::net::TcpStream;

/// Take ownership of an accepted TCP connection on `fd`.
///
/// Must be called from within the runtime.
///
/// # Safety
/// `fd` must be an open, connected stream socket owned by nothing else in
/// this process. inetd-style supervisors guarantee this for descriptor 0.
pub unsafe fn adopt(fd: RawFd) -> io::Result<TcpStream> {
    // SAFETY: ownership of `fd` is transferred by the caller's contract.
    let stream = unsafe { std::net::TcpStream::from_raw_fd(fd) };
    stream.set_nonblocking(true)?;

    internal!("Adopted connection on descriptor {fd}");

    TcpStream::from_std(stream)
}
