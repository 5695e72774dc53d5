//! Packet header codec
//!
//! Every dwm IPC packet starts with a fixed 12-byte header:
//!
//! ```text
//! +-------------------+----------------+--------+
//! | magic "DWM-IPC"   | payload length | type   |
//! | 7 bytes           | u32 LE         | u8     |
//! +-------------------+----------------+--------+
//! ```
//!
//! The fields are packed with no padding. dwm writes the length in host byte
//! order; every platform dwm runs on is little-endian, so the codec fixes the
//! length to little-endian.

use std::fmt;

use crate::error::HeaderError;

/// Length of the magic string
pub const MAGIC_LEN: usize = 7;

/// The magic string that every packet header starts with
pub const MAGIC: [u8; MAGIC_LEN] = *b"DWM-IPC";

/// Size of an encoded header in bytes
pub const HEADER_SIZE: usize = MAGIC_LEN + 4 + 1;

/// IPC message types understood by dwm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    RunCommand = 0,
    GetMonitors = 1,
    GetTags = 2,
    GetLayouts = 3,
    GetDwmClient = 4,
    Subscribe = 5,
    /// Only sent by dwm, and only to subscribed connections
    Event = 6,
}

impl MessageType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MessageType {
    type Error = HeaderError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MessageType::RunCommand),
            1 => Ok(MessageType::GetMonitors),
            2 => Ok(MessageType::GetTags),
            3 => Ok(MessageType::GetLayouts),
            4 => Ok(MessageType::GetDwmClient),
            5 => Ok(MessageType::Subscribe),
            6 => Ok(MessageType::Event),
            other => Err(HeaderError::UnknownType(other)),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageType::RunCommand => "RUN_COMMAND",
            MessageType::GetMonitors => "GET_MONITORS",
            MessageType::GetTags => "GET_TAGS",
            MessageType::GetLayouts => "GET_LAYOUTS",
            MessageType::GetDwmClient => "GET_DWM_CLIENT",
            MessageType::Subscribe => "SUBSCRIBE",
            MessageType::Event => "EVENT",
        };
        f.write_str(name)
    }
}

/// A decoded packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub message_type: MessageType,
    /// Byte count of the JSON payload that follows the header
    pub payload_len: u32,
}

impl Header {
    pub fn new(message_type: MessageType, payload_len: u32) -> Self {
        Self {
            message_type,
            payload_len,
        }
    }

    /// Encode into the wire layout
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[..MAGIC_LEN].copy_from_slice(&MAGIC);
        buf[MAGIC_LEN..MAGIC_LEN + 4].copy_from_slice(&self.payload_len.to_le_bytes());
        buf[HEADER_SIZE - 1] = self.message_type.as_u8();
        buf
    }

    /// Decode and validate a header
    ///
    /// Only the first [`HEADER_SIZE`] bytes are examined. The magic is checked
    /// before any other field is trusted.
    ///
    /// # Errors
    ///
    /// Returns `HeaderError::Truncated` if fewer than `HEADER_SIZE` bytes are given.
    /// Returns `HeaderError::BadMagic` if the magic string does not match exactly.
    /// Returns `HeaderError::UnknownType` if the type byte is not a known message type.
    pub fn decode(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.len() < HEADER_SIZE {
            return Err(HeaderError::Truncated { read: bytes.len() });
        }

        let mut magic = [0u8; MAGIC_LEN];
        magic.copy_from_slice(&bytes[..MAGIC_LEN]);
        if magic != MAGIC {
            return Err(HeaderError::BadMagic { actual: magic });
        }

        let mut len = [0u8; 4];
        len.copy_from_slice(&bytes[MAGIC_LEN..MAGIC_LEN + 4]);
        let payload_len = u32::from_le_bytes(len);

        let message_type = MessageType::try_from(bytes[HEADER_SIZE - 1])?;

        Ok(Self {
            message_type,
            payload_len,
        })
    }

    /// Reject a declared payload length above `max`
    pub fn check_len(&self, max: u32) -> Result<(), HeaderError> {
        if self.payload_len > max {
            return Err(HeaderError::PayloadTooLarge {
                len: self.payload_len,
                max,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_TYPES: [MessageType; 7] = [
        MessageType::RunCommand,
        MessageType::GetMonitors,
        MessageType::GetTags,
        MessageType::GetLayouts,
        MessageType::GetDwmClient,
        MessageType::Subscribe,
        MessageType::Event,
    ];

    #[test]
    fn test_encode_layout_matches_wire_format() {
        let bytes = Header::new(MessageType::GetTags, 0x0102_0304).encode();

        assert_eq!(
            bytes,
            [b'D', b'W', b'M', b'-', b'I', b'P', b'C', 0x04, 0x03, 0x02, 0x01, 2]
        );
    }

    #[test]
    fn test_round_trip_every_type() {
        for ty in ALL_TYPES {
            for len in [0u32, 1, 42, 8 * 1024 * 1024] {
                let decoded = Header::decode(&Header::new(ty, len).encode()).unwrap();
                assert_eq!(decoded.message_type, ty);
                assert_eq!(decoded.payload_len, len);
            }
        }
    }

    #[test]
    fn test_short_input_is_truncated() {
        let full = Header::new(MessageType::Subscribe, 10).encode();

        for n in 0..HEADER_SIZE {
            let err = Header::decode(&full[..n]).unwrap_err();
            assert_eq!(err, HeaderError::Truncated { read: n });
        }
    }

    #[test]
    fn test_bad_magic_rejected_regardless_of_rest() {
        let mut bytes = Header::new(MessageType::GetMonitors, 5).encode();
        bytes[3] = b'_';

        match Header::decode(&bytes) {
            Err(HeaderError::BadMagic { actual }) => assert_eq!(&actual, b"DWM_IPC"),
            other => panic!("Expected BadMagic, got: {:?}", other),
        }

        // A bad magic wins over an invalid type byte
        bytes[HEADER_SIZE - 1] = 200;
        assert!(matches!(
            Header::decode(&bytes),
            Err(HeaderError::BadMagic { .. })
        ));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let mut bytes = Header::new(MessageType::RunCommand, 0).encode();
        bytes[HEADER_SIZE - 1] = 7;

        assert_eq!(Header::decode(&bytes), Err(HeaderError::UnknownType(7)));
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut bytes = Header::new(MessageType::Event, 3).encode().to_vec();
        bytes.extend_from_slice(b"{}x");

        let header = Header::decode(&bytes).unwrap();
        assert_eq!(header, Header::new(MessageType::Event, 3));
    }

    #[test]
    fn test_check_len() {
        let header = Header::new(MessageType::GetTags, 1024);

        assert!(header.check_len(1024).is_ok());
        assert_eq!(
            header.check_len(1023),
            Err(HeaderError::PayloadTooLarge {
                len: 1024,
                max: 1023
            })
        );
    }
}
