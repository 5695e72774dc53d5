//! Framed packets and request/reply payloads
//!
//! A packet is a [`Header`] followed by exactly `payload_len` bytes of JSON.
//! Requests are built here; replies are checked against the request type and
//! for dwm's `{"result": "error", "reason": ...}` failure object before being
//! decoded into the caller's type.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{IpcError, ReplyError, Result};
use crate::event::Event;
use crate::header::{Header, MessageType, HEADER_SIZE};
use crate::types::WindowId;

/// Arguments of a `RUN_COMMAND` request
#[derive(Debug, Clone, Serialize)]
pub struct RunCommandArgs<'a> {
    pub command: &'a str,
    /// Each argument must be a number, string, bool or null
    pub args: &'a [Value],
}

/// Arguments of a `GET_DWM_CLIENT` request
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GetClientArgs {
    pub client_window_id: WindowId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscribeAction {
    Subscribe,
    Unsubscribe,
}

/// Arguments of a `SUBSCRIBE` request
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SubscribeArgs {
    pub event: Event,
    pub action: SubscribeAction,
}

/// One framed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Frame a payload under the given message type
    ///
    /// # Errors
    ///
    /// Returns `IpcError::InvalidOperation` if the payload does not fit the
    /// 32-bit length field.
    pub fn new(message_type: MessageType, payload: Vec<u8>) -> Result<Self> {
        let payload_len = u32::try_from(payload.len()).map_err(|_| {
            IpcError::invalid(
                "build packet",
                format!("payload of {} bytes does not fit in a header", payload.len()),
            )
        })?;

        Ok(Self {
            header: Header::new(message_type, payload_len),
            payload,
        })
    }

    /// Encode a request ready to be written to the socket
    ///
    /// `args` is JSON-encoded as the payload. `None` produces an empty
    /// payload, which is what the argument-less `GET_*` requests carry.
    pub fn build_request<A>(message_type: MessageType, args: Option<&A>) -> Result<Vec<u8>>
    where
        A: Serialize + ?Sized,
    {
        let payload = match args {
            Some(args) => serde_json::to_vec(args).map_err(|e| {
                IpcError::invalid("encode request arguments", e.to_string())
            })?,
            None => Vec::new(),
        };

        Ok(Self::new(message_type, payload)?.to_bytes())
    }

    /// Header and payload as one contiguous buffer
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        bytes.extend_from_slice(&self.header.encode());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Decode a reply to a request of type `expected`
    ///
    /// # Errors
    ///
    /// Returns `ReplyError::TypeMismatch` if the reply is for another message type.
    /// Returns `IpcError::ResultFailure` if dwm reports that the request failed.
    /// Returns `ReplyError::Malformed` if the payload does not decode into `T`.
    pub fn parse_reply<T: DeserializeOwned>(&self, expected: MessageType) -> Result<T> {
        let actual = self.header.message_type;
        if actual != expected {
            return Err(ReplyError::TypeMismatch { expected, actual }.into());
        }

        let malformed = |source| ReplyError::Malformed {
            message_type: actual,
            source,
        };

        let value: Value = if self.payload.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&self.payload).map_err(malformed)?
        };

        if let Some(reason) = failure_reason(&value) {
            return Err(IpcError::ResultFailure { reason });
        }

        Ok(serde_json::from_value(value).map_err(malformed)?)
    }
}

/// Extract the reason from dwm's failure object, if this is one
fn failure_reason(value: &Value) -> Option<String> {
    let object = value.as_object()?;
    if object.get("result").and_then(Value::as_str) != Some("error") {
        return None;
    }

    let reason = object
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or("no reason given");
    Some(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Tag;
    use serde_json::json;

    fn reply(message_type: MessageType, payload: &str) -> Packet {
        Packet::new(message_type, payload.as_bytes().to_vec()).unwrap()
    }

    #[test]
    fn test_build_request_without_args_is_header_only() {
        let bytes = Packet::build_request::<()>(MessageType::GetMonitors, None).unwrap();

        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(
            Header::decode(&bytes).unwrap(),
            Header::new(MessageType::GetMonitors, 0)
        );
    }

    #[test]
    fn test_build_run_command_request() {
        let args = [json!(1), json!("two"), json!(true)];
        let bytes = Packet::build_request(
            MessageType::RunCommand,
            Some(&RunCommandArgs {
                command: "view",
                args: &args,
            }),
        )
        .unwrap();

        let header = Header::decode(&bytes).unwrap();
        let payload = &bytes[HEADER_SIZE..];
        assert_eq!(header.message_type, MessageType::RunCommand);
        assert_eq!(header.payload_len as usize, payload.len());

        let value: Value = serde_json::from_slice(payload).unwrap();
        assert_eq!(value, json!({"command": "view", "args": [1, "two", true]}));
    }

    #[test]
    fn test_build_subscribe_request() {
        let bytes = Packet::build_request(
            MessageType::Subscribe,
            Some(&SubscribeArgs {
                event: Event::ClientFocusChange,
                action: SubscribeAction::Unsubscribe,
            }),
        )
        .unwrap();

        let value: Value = serde_json::from_slice(&bytes[HEADER_SIZE..]).unwrap();
        assert_eq!(
            value,
            json!({"event": "client_focus_change_event", "action": "unsubscribe"})
        );
    }

    #[test]
    fn test_parse_tags_reply() {
        let packet = reply(
            MessageType::GetTags,
            r#"[{"bit_mask":1,"name":"1"},{"bit_mask":2,"name":"www"}]"#,
        );

        let tags: Vec<Tag> = packet.parse_reply(MessageType::GetTags).unwrap();

        assert_eq!(tags.len(), 2);
        assert_eq!(tags[1].name, "www");
        assert_eq!(tags[1].bit_mask, 2);
    }

    #[test]
    fn test_parse_reply_type_mismatch() {
        let packet = reply(MessageType::GetLayouts, "[]");

        match packet.parse_reply::<Value>(MessageType::GetTags) {
            Err(IpcError::Reply(ReplyError::TypeMismatch { expected, actual })) => {
                assert_eq!(expected, MessageType::GetTags);
                assert_eq!(actual, MessageType::GetLayouts);
            }
            other => panic!("Expected TypeMismatch, got: {:?}", other),
        }
    }

    #[test]
    fn test_parse_reply_result_failure() {
        let packet = reply(
            MessageType::RunCommand,
            r#"{"result":"error","reason":"Command focusstak not found"}"#,
        );

        match packet.parse_reply::<Value>(MessageType::RunCommand) {
            Err(IpcError::ResultFailure { reason }) => {
                assert_eq!(reason, "Command focusstak not found")
            }
            other => panic!("Expected ResultFailure, got: {:?}", other),
        }
    }

    #[test]
    fn test_parse_reply_success_object() {
        let packet = reply(MessageType::RunCommand, r#"{"result":"success"}"#);

        let value: Value = packet.parse_reply(MessageType::RunCommand).unwrap();
        assert_eq!(value, json!({"result": "success"}));
    }

    #[test]
    fn test_parse_reply_malformed_json() {
        let packet = reply(MessageType::GetTags, "[{\"bit_mask\":");

        assert!(matches!(
            packet.parse_reply::<Vec<Tag>>(MessageType::GetTags),
            Err(IpcError::Reply(ReplyError::Malformed {
                message_type: MessageType::GetTags,
                ..
            }))
        ));
    }

    #[test]
    fn test_parse_reply_wrong_shape() {
        let packet = reply(MessageType::GetTags, r#"{"bit_mask":1}"#);

        assert!(matches!(
            packet.parse_reply::<Vec<Tag>>(MessageType::GetTags),
            Err(IpcError::Reply(ReplyError::Malformed { .. }))
        ));
    }

    #[test]
    fn test_empty_payload_decodes_as_null() {
        let packet = reply(MessageType::Subscribe, "");

        let value: Value = packet.parse_reply(MessageType::Subscribe).unwrap();
        assert_eq!(value, Value::Null);
    }
}
