//! Relay wire protocol — `{type, data}` envelopes
//!
//! Wire format (both directions, camelCase on the wire):
//!
//! Subject → relay → observers:
//!   { "type": "gazeData",   "data": { "x": 412.0, "y": 230.5, "timestamp": 1724666400123,
//!                                     "sectionId": "risk-warning", "currentPage": "productJoin" } }
//!   { "type": "pageChange", "data": { "currentPage": "productDetail", "timestamp": 1724666401000 } }
//!
//! Relay → everyone:
//!   { "type": "clientCount", "data": { "count": 2, "timestamp": 1724666400 } }
//!   { "type": "error",       "data": { "message": "..." } }
//!
//! Delivery is best-effort broadcast: no acks, no retry, no persistence.
//! Messages sent while a peer is disconnected are lost for that peer, so
//! consumers must never assume exactly-once or ordered-across-reconnect
//! delivery. Unrecognized `type` values decode to [`Inbound::Unknown`] and
//! are ignored, keeping the protocol forward-compatible.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// One gaze sample, roughly 10 per second while the subject is reading.
/// `section_id` is null when the gaze rests on whitespace; `current_page`
/// tags the page the subject had open when the sample was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GazeData {
    pub x: f64,
    pub y: f64,
    /// Epoch milliseconds at the producing client.
    pub timestamp: i64,
    #[serde(rename = "sectionId", default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    #[serde(rename = "currentPage", default, skip_serializing_if = "Option::is_none")]
    pub current_page: Option<String>,
}

/// Explicit navigation event, authoritative for the observer's current page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageChangeData {
    #[serde(rename = "currentPage")]
    pub current_page: String,
    pub timestamp: i64,
}

/// Informational peer count pushed by the relay on join/leave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientCountData {
    pub count: u32,
    pub timestamp: i64,
}

/// Relay-side error surfaced to the UI; never fatal to the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorData {
    pub message: String,
}

/// A typed message envelope. One variant per recognized message kind,
/// decoded exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Envelope {
    #[serde(rename = "gazeData")]
    GazeData(GazeData),
    #[serde(rename = "pageChange")]
    PageChange(PageChangeData),
    #[serde(rename = "clientCount")]
    ClientCount(ClientCountData),
    #[serde(rename = "error")]
    Error(ErrorData),
}

/// Decoded inbound frame: either a recognized envelope or an unknown
/// `type` the caller should log and drop.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Known(Envelope),
    Unknown { kind: String },
}

/// Raw first-stage frame: the `type` tag plus an opaque payload.
#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl Envelope {
    /// Gaze sample envelope.
    pub fn gaze(
        x: f64,
        y: f64,
        timestamp: i64,
        section_id: Option<String>,
        current_page: Option<String>,
    ) -> Self {
        Self::GazeData(GazeData {
            x,
            y,
            timestamp,
            section_id,
            current_page,
        })
    }

    /// Page navigation envelope.
    pub fn page_change(current_page: impl Into<String>, timestamp: i64) -> Self {
        Self::PageChange(PageChangeData {
            current_page: current_page.into(),
            timestamp,
        })
    }

    /// Peer count envelope, relay → clients.
    pub fn client_count(count: u32, timestamp: i64) -> Self {
        Self::ClientCount(ClientCountData { count, timestamp })
    }

    /// Error envelope, relay → clients.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorData {
            message: message.into(),
        })
    }

    /// Wire name of this envelope's `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::GazeData(_) => "gazeData",
            Envelope::PageChange(_) => "pageChange",
            Envelope::ClientCount(_) => "clientCount",
            Envelope::Error(_) => "error",
        }
    }

    /// Serialize to the wire's JSON text form.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a text frame. Unknown `type` values come back as
    /// [`Inbound::Unknown`]; an unparseable frame or a payload with an
    /// unexpected shape is [`Error::MalformedMessage`].
    pub fn decode(text: &str) -> Result<Inbound> {
        let raw: RawEnvelope =
            serde_json::from_str(text).map_err(|e| Error::malformed(e.to_string()))?;

        let envelope = match raw.kind.as_str() {
            // "gaze" is a historical alias for "gazeData"
            "gazeData" | "gaze" => Envelope::GazeData(payload(raw.data)?),
            "pageChange" => Envelope::PageChange(payload(raw.data)?),
            "clientCount" => Envelope::ClientCount(payload(raw.data)?),
            "error" => Envelope::Error(error_payload(raw.data)?),
            _ => return Ok(Inbound::Unknown { kind: raw.kind }),
        };
        Ok(Inbound::Known(envelope))
    }
}

fn payload<T: DeserializeOwned>(data: serde_json::Value) -> Result<T> {
    serde_json::from_value(data).map_err(|e| Error::malformed(e.to_string()))
}

/// Error payloads arrive as either `{ "message": "..." }` or a bare string.
fn error_payload(data: serde_json::Value) -> Result<ErrorData> {
    match data {
        serde_json::Value::String(message) => Ok(ErrorData { message }),
        other => payload(other),
    }
}
