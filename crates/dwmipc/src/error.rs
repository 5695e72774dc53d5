//! Error types for dwm IPC operations
//!
//! Every fallible operation in this crate returns exactly one [`IpcError`]
//! kind. Callers match on the variant rather than inspecting messages.

use nix::errno::Errno;
use thiserror::Error;

use crate::header::{MessageType, HEADER_SIZE, MAGIC, MAGIC_LEN};

/// Convenience alias used throughout the crate
pub type Result<T, E = IpcError> = std::result::Result<T, E>;

/// Errors that can occur when talking to dwm over its IPC socket
#[derive(Debug, Error)]
pub enum IpcError {
    /// A packet header failed validation
    #[error(transparent)]
    Header(#[from] HeaderError),

    /// The peer closed the socket part-way through a header or payload
    #[error("Unexpected EOF ({read} bytes read, {expected} bytes expected)")]
    Eof { read: usize, expected: usize },

    /// A non-blocking poll found no message waiting on the socket
    #[error("No message available on the dwm socket")]
    NoMsg,

    /// The reply could not be matched to the outstanding request
    #[error(transparent)]
    Reply(#[from] ReplyError),

    /// dwm understood the request but reported that it failed
    #[error("dwm returned an error: {reason}")]
    ResultFailure { reason: String },

    /// An underlying system call failed
    #[error("errno {code}: {context} ({source})")]
    Errno {
        context: &'static str,
        code: i32,
        #[source]
        source: std::io::Error,
    },

    /// The peer closed the connection cleanly between messages
    #[error("Connection to dwm closed")]
    SocketClosed,

    /// The API was used in a way the connection does not allow
    #[error("Cannot {operation}: {reason}")]
    InvalidOperation {
        operation: &'static str,
        reason: String,
    },
}

impl IpcError {
    /// Wrap an I/O error from a system call, keeping its numeric code
    pub(crate) fn errno(context: &'static str, source: std::io::Error) -> Self {
        let code = source.raw_os_error().unwrap_or(0);
        IpcError::Errno {
            context,
            code,
            source,
        }
    }

    pub(crate) fn invalid(operation: &'static str, reason: impl Into<String>) -> Self {
        IpcError::InvalidOperation {
            operation,
            reason: reason.into(),
        }
    }

    /// The system error code carried by an [`IpcError::Errno`]
    pub fn errno_code(&self) -> Option<Errno> {
        match self {
            IpcError::Errno { code, .. } => Some(Errno::from_raw(*code)),
            _ => None,
        }
    }

    /// Whether this error leaves the connection unusable
    ///
    /// Framing failures, truncation, closure and system call failures are
    /// fatal. Reply mismatches, command failures, misuse and empty polls are
    /// not.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IpcError::Header(_)
                | IpcError::Eof { .. }
                | IpcError::Errno { .. }
                | IpcError::SocketClosed
        )
    }
}

/// Reasons a packet header is rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("Header too short ({read} bytes, {} expected)", HEADER_SIZE)]
    Truncated { read: usize },

    #[error(
        "Invalid magic string: expected {:?}, got {:?}",
        String::from_utf8_lossy(&MAGIC),
        String::from_utf8_lossy(.actual)
    )]
    BadMagic { actual: [u8; MAGIC_LEN] },

    #[error("Unknown message type {0}")]
    UnknownType(u8),

    #[error("Declared payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { len: u32, max: u32 },

    #[error("More than {limit} events arrived before the reply")]
    TooManyPendingEvents { limit: usize },

    #[error("Unexpected {actual} packet, expected {expected}")]
    UnexpectedType {
        expected: MessageType,
        actual: MessageType,
    },
}

/// Reasons a well-framed reply is still rejected
#[derive(Debug, Error)]
pub enum ReplyError {
    /// The reply type does not match the request that is outstanding
    #[error("Reply type mismatch: sent {expected}, received {actual}")]
    TypeMismatch {
        expected: MessageType,
        actual: MessageType,
    },

    /// The payload is not the JSON shape this message type carries
    #[error("Malformed {message_type} payload: {source}")]
    Malformed {
        message_type: MessageType,
        #[source]
        source: serde_json::Error,
    },

    /// An event payload names an event this protocol revision does not have
    #[error("Unknown event {0:?}")]
    UnknownEvent(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_keeps_os_code() {
        let io = std::io::Error::from_raw_os_error(nix::libc::EPIPE);
        let err = IpcError::errno("Error writing to dwm socket", io);

        match &err {
            IpcError::Errno { code, .. } => assert_eq!(*code, nix::libc::EPIPE),
            other => panic!("Expected Errno, got: {:?}", other),
        }
        assert_eq!(err.errno_code(), Some(Errno::EPIPE));

        let message = err.to_string();
        assert!(
            message.contains("Error writing to dwm socket"),
            "Message should carry context: {}",
            message
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(IpcError::SocketClosed.is_fatal());
        assert!(IpcError::Eof { read: 1, expected: 4 }.is_fatal());
        assert!(IpcError::from(HeaderError::UnknownType(9)).is_fatal());

        assert!(!IpcError::NoMsg.is_fatal());
        assert!(!IpcError::ResultFailure {
            reason: "nope".into()
        }
        .is_fatal());
        assert!(!IpcError::from(ReplyError::UnknownEvent("x".into())).is_fatal());
    }

    #[test]
    fn test_bad_magic_message_shows_both_strings() {
        let err = HeaderError::BadMagic {
            actual: *b"i3-ipc!",
        };
        let message = err.to_string();
        assert!(message.contains("DWM-IPC"), "{}", message);
        assert!(message.contains("i3-ipc!"), "{}", message);
    }
}
