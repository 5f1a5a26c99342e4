use crate::state::{Record, World};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Why an inbound frame was rejected
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame must be a JSON object of entity records")]
    NotAnObject,

    #[error("record for entity '{0}' is not a JSON object")]
    InvalidRecord(String),
}

/// Server → Client: one change, `{"<entity>": {...record}}`
pub fn encode_change(entity: &str, record: &Record) -> Result<Arc<str>, serde_json::Error> {
    let frame = BTreeMap::from([(entity, record)]);
    Ok(Arc::from(serde_json::to_string(&frame)?))
}

/// Server → Client: full world, sent once on connect
pub fn encode_world(world: &World) -> Result<Arc<str>, serde_json::Error> {
    Ok(Arc::from(serde_json::to_string(world)?))
}

/// Client → Server: entity id to full replacement record
///
/// The frame is accepted or rejected as a whole: if any entry is not an
/// object nothing in the frame is applied.
pub fn decode_frame(text: &str) -> Result<Vec<(String, Record)>, DecodeError> {
    let frame = match serde_json::from_str::<Value>(text)? {
        Value::Object(frame) => frame,
        _ => return Err(DecodeError::NotAnObject),
    };

    frame
        .into_iter()
        .map(|(entity, record)| match record {
            Value::Object(record) => Ok((entity, record)),
            _ => Err(DecodeError::InvalidRecord(entity)),
        })
        .collect()
}
