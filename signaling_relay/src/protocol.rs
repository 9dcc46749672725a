//! Wire protocol for the signaling relay
//!
//! Clients exchange JSON text frames shaped like
//! `{"type": "OFFER", "callId": "c1", "from": "alice", "to": "bob", "payload": ...}`.
//! The relay never looks inside `payload`. An explicit `"payload": null` is
//! kept as-is and an absent payload stays absent.

use crate::error::ClientRequestError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Identity a user declared when connecting
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(pub String);

impl Identity {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Call room identifier
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(pub String);

impl CallId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CallId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Kinds of signal a client may send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalType {
    /// Enter a call room
    Join,
    /// Session description offer
    Offer,
    /// Session description answer
    Answer,
    /// Connectivity candidate
    Ice,
    /// Leave a call room
    Leave,
}

impl SignalType {
    /// Directed signals are unicast to the identity named in `to`.
    pub fn is_directed(self) -> bool {
        matches!(self, Self::Offer | Self::Answer | Self::Ice)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Join => "JOIN",
            Self::Offer => "OFFER",
            Self::Answer => "ANSWER",
            Self::Ice => "ICE",
            Self::Leave => "LEAVE",
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalType {
    type Err = ClientRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "JOIN" => Ok(Self::Join),
            "OFFER" => Ok(Self::Offer),
            "ANSWER" => Ok(Self::Answer),
            "ICE" => Ok(Self::Ice),
            "LEAVE" => Ok(Self::Leave),
            other => Err(ClientRequestError::UnsupportedType(other.to_string())),
        }
    }
}

/// A decoded signal message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalMessage {
    #[serde(rename = "type")]
    pub kind: SignalType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<CallId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Identity>,
    /// Opaque application data, forwarded verbatim
    ///
    /// `None` when the frame had no `payload` key, `Some(Value::Null)` when it
    /// carried an explicit null.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

/// Frame shape before the type name is checked against [`SignalType`]
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSignal {
    #[serde(rename = "type")]
    kind: String,
    call_id: Option<CallId>,
    from: Option<Identity>,
    to: Option<Identity>,
    #[serde(default, deserialize_with = "present")]
    payload: Option<Value>,
}

/// Any value that is present, `null` included, becomes `Some`.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl SignalMessage {
    pub fn new(kind: SignalType) -> Self {
        Self {
            kind,
            call_id: None,
            from: None,
            to: None,
            payload: None,
        }
    }

    pub fn with_call_id(mut self, call_id: impl Into<CallId>) -> Self {
        self.call_id = Some(call_id.into());
        self
    }

    pub fn with_from(mut self, from: impl Into<Identity>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_to(mut self, to: impl Into<Identity>) -> Self {
        self.to = Some(to.into());
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// The call id, or an error if it is absent or empty
    pub fn require_call_id(&self) -> Result<&CallId, ClientRequestError> {
        self.call_id
            .as_ref()
            .filter(|id| !id.is_empty())
            .ok_or(ClientRequestError::MissingField("callId"))
    }

    /// The recipient, or an error if it is absent or empty
    pub fn require_to(&self) -> Result<&Identity, ClientRequestError> {
        self.to
            .as_ref()
            .filter(|id| !id.is_empty())
            .ok_or(ClientRequestError::MissingField("to"))
    }

    /// Encode as an outbound text frame
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl FromStr for SignalMessage {
    type Err = ClientRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: RawSignal = serde_json::from_str(s)?;
        Ok(Self {
            kind: raw.kind.parse()?,
            call_id: raw.call_id,
            from: raw.from,
            to: raw.to,
            payload: raw.payload,
        })
    }
}

/// Notifications synthesized by the relay itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum ServerEvent {
    /// The call has enough participants to start negotiating
    Ready {
        #[serde(rename = "callId")]
        call_id: CallId,
    },
}

impl ServerEvent {
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl FromStr for ServerEvent {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}
