use serde::{Deserialize, Serialize};
use serde_json::Value;

const STATUS_SUCCESS: &str = "Success";
const STATUS_FAILED: &str = "Failed";
const DATA_ENVELOPE: &str = "data";

/// One row of remote sync progress for a context path.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextStatusItem {
    pub context_id: String,
    pub path: String,
    /// `upload`, `download`, `delete`, or whatever else the backend reports.
    pub task_type: String,
    /// `Success`, `Failed`, `InProgress`, or whatever else the backend reports.
    pub status: String,
    pub start_time: i64,
    pub finish_time: i64,
    pub error_message: String,
}

impl ContextStatusItem {
    pub fn is_terminal(&self) -> bool {
        self.status == STATUS_SUCCESS || self.status == STATUS_FAILED
    }

    pub fn is_failed(&self) -> bool {
        self.status == STATUS_FAILED
    }
}

/// Result of decoding a context status payload.
///
/// `Empty` covers both "the backend sent nothing" and "the backend sent
/// something unreadable"; neither is an error for a caller that is polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusPayload {
    Decoded(Vec<ContextStatusItem>),
    Empty,
}

impl StatusPayload {
    pub fn into_items(self) -> Vec<ContextStatusItem> {
        match self {
            StatusPayload::Decoded(items) => items,
            StatusPayload::Empty => Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatusEnvelope {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// Decodes the double-encoded `contextStatus` field: a JSON array of
/// `{type, data}` envelopes whose `data` is itself a JSON array of status
/// items, usually shipped as a string.
pub fn decode_context_status(raw: Option<&str>) -> StatusPayload {
    let Some(raw) = raw.filter(|raw| !raw.trim().is_empty()) else {
        return StatusPayload::Empty;
    };
    let envelopes: Vec<StatusEnvelope> = match serde_json::from_str(raw) {
        Ok(envelopes) => envelopes,
        Err(err) => {
            tracing::warn!(%err, "discarding malformed context status payload");
            return StatusPayload::Empty;
        }
    };

    let mut items = Vec::new();
    for envelope in envelopes {
        if envelope.kind != DATA_ENVELOPE {
            tracing::debug!(kind = %envelope.kind, "skipping context status envelope");
            continue;
        }
        match decode_items(envelope.data) {
            Ok(decoded) => items.extend(decoded),
            Err(err) => {
                tracing::warn!(%err, "discarding malformed context status items");
                return StatusPayload::Empty;
            }
        }
    }
    StatusPayload::Decoded(items)
}

fn decode_items(data: Value) -> Result<Vec<ContextStatusItem>, serde_json::Error> {
    match data {
        Value::String(encoded) => serde_json::from_str(&encoded),
        Value::Null => Ok(Vec::new()),
        other => serde_json::from_value(other),
    }
}
