//! Messages exchanged between the background broadcaster and open clients.
//!
//! All messages are JSON objects tagged by `type`. Shapes that do not match a
//! known variant are rejected with [`Error::UnknownMessage`] rather than
//! silently ignored.

use crate::{error::Result, Error, Timestamp};
use serde::{Deserialize, Serialize};

/// A broadcaster/client message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectivityMessage {
    /// Status push (broadcaster to clients), or a client mirroring its own
    /// native event back to the broadcaster.
    ConnectivityStatus {
        #[serde(rename = "isOnline")]
        is_online: bool,
        #[serde(default)]
        timestamp: Timestamp,
    },

    /// Ask the broadcaster to probe now and announce the result.
    CheckConnectivity,
}

impl ConnectivityMessage {
    /// Create a status message.
    pub fn status(is_online: bool, timestamp: Timestamp) -> Self {
        ConnectivityMessage::ConnectivityStatus {
            is_online,
            timestamp,
        }
    }

    /// Decode a message from JSON text.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::UnknownMessage(format!("{e}: {text}")))
    }

    /// Encode as JSON text.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_format() {
        let json = ConnectivityMessage::status(false, 1700).to_json().unwrap();
        assert_eq!(
            json,
            r#"{"type":"CONNECTIVITY_STATUS","isOnline":false,"timestamp":1700}"#
        );
    }

    #[test]
    fn check_wire_format() {
        let json = ConnectivityMessage::CheckConnectivity.to_json().unwrap();
        assert_eq!(json, r#"{"type":"CHECK_CONNECTIVITY"}"#);
        assert_eq!(
            ConnectivityMessage::parse(&json).unwrap(),
            ConnectivityMessage::CheckConnectivity
        );
    }

    #[test]
    fn status_without_timestamp_is_accepted() {
        let msg = ConnectivityMessage::parse(r#"{"type":"CONNECTIVITY_STATUS","isOnline":true}"#)
            .unwrap();
        assert_eq!(msg, ConnectivityMessage::status(true, 0));
    }

    #[test]
    fn unknown_shapes_are_rejected() {
        for raw in [
            r#"{"type":"NOTIFICATION","title":"x"}"#,
            r#"{"isOnline":true}"#,
            r#"{"type":"CONNECTIVITY_STATUS"}"#,
            "null",
            "garbage",
        ] {
            let err = ConnectivityMessage::parse(raw).unwrap_err();
            assert!(matches!(err, Error::UnknownMessage(_)), "accepted {raw}");
        }
    }
}
