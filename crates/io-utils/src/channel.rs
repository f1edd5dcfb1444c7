//! Message channels
//!
//! A `MessageChannel` moves whole, length-prefixed messages over a pair of
//! byte streams.  Channels perform no internal locking: a channel is owned by
//! one caller at a time and every operation takes `&mut self`.
//!
//! A hosted program learns how to reach its host from a channel
//! specification string of the form `tao::FDMessageChannel(r, w)`, naming the
//! file descriptors it should read from and write to.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use crate::{
    error::SocketError,
    fd::{receive_buffer, send_buffer},
};
use std::{
    fs::File,
    io::{Read, Write},
    os::unix::{
        io::{FromRawFd, RawFd},
        net::UnixStream,
    },
};

const CHANNEL_SPEC_PREFIX: &str = "tao::FDMessageChannel(";

/// Read descriptor a hosted program inherits from its host by default.
pub const DEFAULT_READ_FD: RawFd = 3;
/// Write descriptor a hosted program inherits from its host by default.
pub const DEFAULT_WRITE_FD: RawFd = 4;

/// A bidirectional channel carrying whole messages.
pub trait MessageChannel {
    /// Sends one message as a single frame.
    fn send_message(&mut self, message: &[u8]) -> Result<(), SocketError>;

    /// Blocks until one complete message arrives or the stream ends.
    fn receive_message(&mut self) -> Result<Vec<u8>, SocketError>;
}

////////////////////////////////////////////////////////////////////////////////
// File-descriptor channels.
////////////////////////////////////////////////////////////////////////////////

/// A message channel over a reader and a writer, typically the two ends of a
/// pipe pair or the two halves of a socket.
#[derive(Debug)]
pub struct FdMessageChannel<R, W> {
    reader: R,
    writer: W,
}

impl<R: Read, W: Write> FdMessageChannel<R, W> {
    #[inline]
    pub fn new(reader: R, writer: W) -> Self {
        FdMessageChannel { reader, writer }
    }

    #[inline]
    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl FdMessageChannel<File, File> {
    /// Wraps two already-open descriptors.
    ///
    /// # Safety
    ///
    /// Both descriptors must be open, distinct, and not owned by anything
    /// else: the channel closes them when dropped.
    pub unsafe fn from_raw_fds(read_fd: RawFd, write_fd: RawFd) -> Self {
        FdMessageChannel {
            reader: File::from_raw_fd(read_fd),
            writer: File::from_raw_fd(write_fd),
        }
    }

    /// Opens the channel named by a `tao::FDMessageChannel(r, w)`
    /// specification.
    ///
    /// # Safety
    ///
    /// As for `from_raw_fds`.
    pub unsafe fn from_spec(spec: &str) -> Result<Self, SocketError> {
        let (read_fd, write_fd) = parse_channel_spec(spec)?;
        Ok(Self::from_raw_fds(read_fd, write_fd))
    }
}

impl FdMessageChannel<UnixStream, UnixStream> {
    /// Uses one connected Unix socket for both directions.
    pub fn from_unix_stream(stream: UnixStream) -> Result<Self, SocketError> {
        let writer = stream.try_clone()?;
        Ok(FdMessageChannel {
            reader: stream,
            writer,
        })
    }
}

impl<R: Read, W: Write> MessageChannel for FdMessageChannel<R, W> {
    fn send_message(&mut self, message: &[u8]) -> Result<(), SocketError> {
        send_buffer(&mut self.writer, message)
    }

    fn receive_message(&mut self) -> Result<Vec<u8>, SocketError> {
        receive_buffer(&mut self.reader)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Channel specifications.
////////////////////////////////////////////////////////////////////////////////

/// Renders the specification a child uses to reopen a channel on `read_fd`
/// and `write_fd`.
pub fn channel_spec(read_fd: RawFd, write_fd: RawFd) -> String {
    format!("{}{}, {})", CHANNEL_SPEC_PREFIX, read_fd, write_fd)
}

/// Parses a `tao::FDMessageChannel(r, w)` specification.
pub fn parse_channel_spec(spec: &str) -> Result<(RawFd, RawFd), SocketError> {
    let invalid = || SocketError::InvalidChannelSpec(spec.to_string());

    let args = spec
        .trim()
        .strip_prefix(CHANNEL_SPEC_PREFIX)
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(invalid)?;

    let mut fds = args.split(',').map(|fd| fd.trim().parse::<RawFd>());
    match (fds.next(), fds.next(), fds.next()) {
        (Some(Ok(read_fd)), Some(Ok(write_fd)), None) if read_fd >= 0 && write_fd >= 0 => {
            Ok((read_fd, write_fd))
        }
        _ => Err(invalid()),
    }
}
