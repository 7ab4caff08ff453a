// Wire types for the portrait inference server. Outgoing edits are JSON
// text frames correlated by id; the initial image upload is a raw binary
// frame. Responses are either JSON (framing metadata, errors, optionally
// an inline data-URI frame) or raw binary rendered frames.

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::params::ControlParams;

/// One incremental edit: `{ id, sessionId?, params }`. The session identity
/// is omitted until the server has issued one, which makes the first edit
/// after an upload self-describing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRequest {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub params: ControlParams,
}

/// Face framing metadata reported with a load response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FramingMetadata {
    pub center: Option<[f64; 2]>,
    pub size: Option<f64>,
    pub bbox: Option<[[f64; 2]; 4]>,
    pub angle: Option<f64>,
}

impl FramingMetadata {
    pub fn is_empty(&self) -> bool {
        self.center.is_none() && self.size.is_none() && self.bbox.is_none() && self.angle.is_none()
    }
}

/// A structured server message. All fields are optional; what is present
/// decides how it is handled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerMessage {
    pub id: Option<Uuid>,
    pub session_id: Option<String>,
    pub success: Option<bool>,
    pub error: Option<String>,
    pub center: Option<[f64; 2]>,
    pub size: Option<f64>,
    pub bbox: Option<[[f64; 2]; 4]>,
    pub angle: Option<f64>,
    /// Rendered frame delivered inline as a base64 data URI instead of a
    /// separate binary frame.
    pub image: Option<String>,
}

impl ServerMessage {
    pub fn is_error(&self) -> bool {
        self.error.is_some() || self.success == Some(false)
    }

    pub fn framing(&self) -> Option<FramingMetadata> {
        let framing = FramingMetadata {
            center: self.center,
            size: self.size,
            bbox: self.bbox,
            angle: self.angle,
        };
        if framing.is_empty() {
            None
        } else {
            Some(framing)
        }
    }
}

/// Decode a `data:<mime>;base64,<payload>` URI (or a bare base64 string)
/// into raw image bytes. Returns None on malformed input.
pub fn decode_data_uri(uri: &str) -> Option<Vec<u8>> {
    let payload = match uri.split_once(',') {
        Some((_, payload)) => payload,
        None => uri,
    };
    general_purpose::STANDARD.decode(payload.trim()).ok()
}
