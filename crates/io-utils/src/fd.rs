//! Length-prefixed framing over byte streams
//!
//! Every message is preceded by its length as a little-endian `u64`.  A frame
//! is written with a single `write_all`, so a reader either sees the whole
//! frame or a short stream; there is no partial-message recovery.
//!
//! ## Authors
//!
//! The CloudProxy Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the CloudProxy root directory for
//! information on licensing and copyright.

use crate::error::SocketError;
use byteorder::{ByteOrder, LittleEndian};
use std::io::{ErrorKind, Read, Write};

/// Size of the encoded length that precedes every frame.
pub const LENGTH_PREFIX_SIZE: usize = 8;
/// Largest message body a peer may announce.
pub const MAX_MESSAGE_SIZE: u64 = 20 * 1024 * 1024;

/// Sends a `buffer` of data (by first transmitting an encoded length followed by
/// the data proper) to the file descriptor `fd`.
pub fn send_buffer<T>(mut fd: T, buffer: &[u8]) -> Result<(), SocketError>
where
    T: Write,
{
    let len = buffer.len() as u64;
    if len > MAX_MESSAGE_SIZE {
        return Err(SocketError::MessageTooLarge(len));
    }

    let mut frame = vec![0u8; LENGTH_PREFIX_SIZE];
    LittleEndian::write_u64(&mut frame, len);
    frame.extend_from_slice(buffer);

    fd.write_all(&frame)?;
    fd.flush()?;

    Ok(())
}

/// Reads a buffer of data from a file descriptor `fd` by first reading a length
/// of data, followed by the data proper.
///
/// A stream that ends before the length prefix is `ChannelClosed`; one that
/// ends inside the body is `TruncatedMessage`.
pub fn receive_buffer<T>(mut fd: T) -> Result<Vec<u8>, SocketError>
where
    T: Read,
{
    // 1. First read and decode the length of the data proper.
    let length = {
        let mut buff = [0u8; LENGTH_PREFIX_SIZE];
        fd.read_exact(&mut buff).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => SocketError::ChannelClosed,
            _ => SocketError::IOError(e),
        })?;
        LittleEndian::read_u64(&buff)
    };
    if length > MAX_MESSAGE_SIZE {
        return Err(SocketError::MessageTooLarge(length));
    }

    // 2. Next, read the data proper.
    let mut buffer = vec![0u8; length as usize];
    fd.read_exact(&mut buffer).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => SocketError::TruncatedMessage,
        _ => SocketError::IOError(e),
    })?;

    Ok(buffer)
}
