//! Whole-message socket helpers
//!
//! Serializes a value with `bincode` and sends it as one frame, or receives a
//! frame and deserializes it.
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
use log::error;
use serde::{de::DeserializeOwned, Serialize};
use std::io::{Read, Write};

/// Transmits a serialized message, `data`, via a socket.
pub fn send_message<T, M>(socket: T, data: &M) -> Result<(), SocketError>
where
    T: Write,
    M: Serialize,
{
    let message = bincode::serialize(data).map_err(|e| {
        error!("Failed to serialize message.  Error produced: {}.", e);
        SocketError::BincodeError(e)
    })?;

    send_buffer(socket, &message)
}

/// Receives and deserializes a message via a socket.
pub fn receive_message<T, M>(socket: T) -> Result<M, SocketError>
where
    T: Read,
    M: DeserializeOwned,
{
    let buffer = receive_buffer(socket)?;
    let message = bincode::deserialize(&buffer).map_err(|e| {
        error!("Failed to deserialize received message.  Error produced: {}.", e);
        SocketError::BincodeError(e)
    })?;

    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Cursor;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Greeting {
        from: String,
        count: u32,
    }

    #[test]
    fn structured_message_crosses_the_wire() {
        let mut wire = Vec::new();
        let greeting = Greeting {
            from: "alice".to_string(),
            count: 3,
        };
        send_message(&mut wire, &greeting).unwrap();
        let received: Greeting = receive_message(Cursor::new(wire)).unwrap();
        assert_eq!(received, greeting);
    }

    #[test]
    fn garbage_body_is_a_parse_error() {
        let mut wire = Vec::new();
        send_buffer(&mut wire, &[0xff]).unwrap();
        let received: Result<Greeting, _> = receive_message(Cursor::new(wire));
        match received {
            Err(SocketError::BincodeError(_)) => (),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
