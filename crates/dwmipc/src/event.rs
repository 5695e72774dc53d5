//! Subscribable dwm events and their payloads
//!
//! An EVENT packet carries a JSON object with a single key, the event name,
//! whose value is the event-specific record:
//!
//! ```json
//! {"tag_change_event": {"monitor_number": 0, "old_state": {...}, "new_state": {...}}}
//! ```
//!
//! [`Event::decode_payload`] maps each event kind to its record type with an
//! exhaustive `match`, so a new kind cannot be added without a decode path.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ReplyError;
use crate::header::MessageType;
use crate::types::{
    ClientFocusChangeEvent, FocusedStateChangeEvent, FocusedTitleChangeEvent, LayoutChangeEvent,
    MonitorFocusChangeEvent, TagChangeEvent,
};

/// Events a connection can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Event {
    #[serde(rename = "tag_change_event")]
    TagChange,
    #[serde(rename = "client_focus_change_event")]
    ClientFocusChange,
    #[serde(rename = "layout_change_event")]
    LayoutChange,
    #[serde(rename = "monitor_focus_change_event")]
    MonitorFocusChange,
    #[serde(rename = "focused_title_change_event")]
    FocusedTitleChange,
    #[serde(rename = "focused_state_change_event")]
    FocusedStateChange,
}

impl Event {
    pub const ALL: [Event; 6] = [
        Event::TagChange,
        Event::ClientFocusChange,
        Event::LayoutChange,
        Event::MonitorFocusChange,
        Event::FocusedTitleChange,
        Event::FocusedStateChange,
    ];

    /// The name dwm uses for this event on the wire
    pub fn as_str(self) -> &'static str {
        match self {
            Event::TagChange => "tag_change_event",
            Event::ClientFocusChange => "client_focus_change_event",
            Event::LayoutChange => "layout_change_event",
            Event::MonitorFocusChange => "monitor_focus_change_event",
            Event::FocusedTitleChange => "focused_title_change_event",
            Event::FocusedStateChange => "focused_state_change_event",
        }
    }

    /// Decode the record that belongs to this event kind
    pub fn decode_payload(self, value: Value) -> Result<EventPayload, ReplyError> {
        let malformed = |source| ReplyError::Malformed {
            message_type: MessageType::Event,
            source,
        };

        let payload = match self {
            Event::TagChange => {
                EventPayload::TagChange(serde_json::from_value(value).map_err(malformed)?)
            }
            Event::ClientFocusChange => {
                EventPayload::ClientFocusChange(serde_json::from_value(value).map_err(malformed)?)
            }
            Event::LayoutChange => {
                EventPayload::LayoutChange(serde_json::from_value(value).map_err(malformed)?)
            }
            Event::MonitorFocusChange => {
                EventPayload::MonitorFocusChange(serde_json::from_value(value).map_err(malformed)?)
            }
            Event::FocusedTitleChange => {
                EventPayload::FocusedTitleChange(serde_json::from_value(value).map_err(malformed)?)
            }
            Event::FocusedStateChange => {
                EventPayload::FocusedStateChange(serde_json::from_value(value).map_err(malformed)?)
            }
        };

        Ok(payload)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Event {
    type Err = ReplyError;

    /// Accepts the wire name, with or without the `_event` suffix
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_suffix("_event").unwrap_or(s);
        Event::ALL
            .into_iter()
            .find(|event| event.as_str().strip_suffix("_event") == Some(name))
            .ok_or_else(|| ReplyError::UnknownEvent(s.to_string()))
    }
}

/// A decoded event, one variant per [`Event`] kind
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EventPayload {
    #[serde(rename = "tag_change_event")]
    TagChange(TagChangeEvent),
    #[serde(rename = "client_focus_change_event")]
    ClientFocusChange(ClientFocusChangeEvent),
    #[serde(rename = "layout_change_event")]
    LayoutChange(LayoutChangeEvent),
    #[serde(rename = "monitor_focus_change_event")]
    MonitorFocusChange(MonitorFocusChangeEvent),
    #[serde(rename = "focused_title_change_event")]
    FocusedTitleChange(FocusedTitleChangeEvent),
    #[serde(rename = "focused_state_change_event")]
    FocusedStateChange(FocusedStateChangeEvent),
}

impl EventPayload {
    /// Decode the payload bytes of an EVENT packet
    ///
    /// # Errors
    ///
    /// Returns `ReplyError::Malformed` if the payload is not a JSON object
    /// with exactly one key, or the record does not match the event kind.
    /// Returns `ReplyError::UnknownEvent` if the key names no known event.
    pub fn decode(payload: &[u8]) -> Result<Self, ReplyError> {
        let object: serde_json::Map<String, Value> =
            serde_json::from_slice(payload).map_err(|source| ReplyError::Malformed {
                message_type: MessageType::Event,
                source,
            })?;

        let mut entries = object.into_iter();
        let (name, value) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => {
                return Err(ReplyError::Malformed {
                    message_type: MessageType::Event,
                    source: serde::de::Error::custom("expected an object with exactly one event key"),
                })
            }
        };

        let event = Event::ALL
            .into_iter()
            .find(|event| event.as_str() == name)
            .ok_or(ReplyError::UnknownEvent(name))?;

        event.decode_payload(value)
    }

    /// The kind of this event
    pub fn event(&self) -> Event {
        match self {
            EventPayload::TagChange(_) => Event::TagChange,
            EventPayload::ClientFocusChange(_) => Event::ClientFocusChange,
            EventPayload::LayoutChange(_) => Event::LayoutChange,
            EventPayload::MonitorFocusChange(_) => Event::MonitorFocusChange,
            EventPayload::FocusedTitleChange(_) => Event::FocusedTitleChange,
            EventPayload::FocusedStateChange(_) => Event::FocusedStateChange,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TagState;

    #[test]
    fn test_event_names_round_trip_through_from_str() {
        for event in Event::ALL {
            assert_eq!(event.as_str().parse::<Event>().unwrap(), event);
        }
    }

    #[test]
    fn test_from_str_accepts_short_names() {
        assert_eq!("tag_change".parse::<Event>().unwrap(), Event::TagChange);
        assert_eq!(
            "focused_title_change".parse::<Event>().unwrap(),
            Event::FocusedTitleChange
        );
    }

    #[test]
    fn test_from_str_rejects_selected_naming() {
        // The selected_* names belong to an older protocol revision
        let err = "selected_client_change_event".parse::<Event>().unwrap_err();
        assert!(matches!(err, ReplyError::UnknownEvent(name) if name == "selected_client_change_event"));
    }

    #[test]
    fn test_event_serializes_to_wire_name() {
        let json = serde_json::to_string(&Event::MonitorFocusChange).unwrap();
        assert_eq!(json, "\"monitor_focus_change_event\"");
    }

    #[test]
    fn test_decode_tag_change() {
        let payload = br#"{"tag_change_event":{"monitor_number":1,
            "old_state":{"selected":1,"occupied":1,"urgent":0},
            "new_state":{"selected":2,"occupied":3,"urgent":0}}}"#;

        let decoded = EventPayload::decode(payload).unwrap();

        assert_eq!(decoded.event(), Event::TagChange);
        assert_eq!(
            decoded,
            EventPayload::TagChange(TagChangeEvent {
                monitor_number: 1,
                old_state: TagState {
                    selected: 1,
                    occupied: 1,
                    urgent: 0
                },
                new_state: TagState {
                    selected: 2,
                    occupied: 3,
                    urgent: 0
                },
            })
        );
    }

    #[test]
    fn test_decode_layout_change() {
        let payload = br#"{"layout_change_event":{"monitor_number":0,
            "old_symbol":"[]=","old_address":10,"new_symbol":"[M]","new_address":20}}"#;

        match EventPayload::decode(payload).unwrap() {
            EventPayload::LayoutChange(ev) => {
                assert_eq!(ev.old_symbol, "[]=");
                assert_eq!(ev.new_symbol, "[M]");
                assert_eq!(ev.new_address, 20);
            }
            other => panic!("Expected LayoutChange, got: {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_event() {
        let payload = br#"{"bar_event":{}}"#;

        match EventPayload::decode(payload) {
            Err(ReplyError::UnknownEvent(name)) => assert_eq!(name, "bar_event"),
            other => panic!("Expected UnknownEvent, got: {:?}", other),
        }
    }

    #[test]
    fn test_decode_wrong_shape_for_kind() {
        // A monitor focus payload under the tag change key
        let payload = br#"{"tag_change_event":{"old_monitor_number":0,"new_monitor_number":1}}"#;

        assert!(matches!(
            EventPayload::decode(payload),
            Err(ReplyError::Malformed {
                message_type: MessageType::Event,
                ..
            })
        ));
    }

    #[test]
    fn test_decode_rejects_multiple_keys_and_non_objects() {
        let two_keys = br#"{"tag_change_event":{},"layout_change_event":{}}"#;
        assert!(matches!(
            EventPayload::decode(two_keys),
            Err(ReplyError::Malformed { .. })
        ));

        assert!(matches!(
            EventPayload::decode(b"[1,2,3]"),
            Err(ReplyError::Malformed { .. })
        ));
        assert!(matches!(
            EventPayload::decode(b""),
            Err(ReplyError::Malformed { .. })
        ));
    }
}
