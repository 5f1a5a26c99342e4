use serde_json::{Map, Value};
use std::collections::HashMap;

/// Attribute record of a single entity (e.g. `{"x": 1, "colour": "blue"}`).
///
/// Values are arbitrary JSON; partial updates merge into the record key by key.
pub type Record = Map<String, Value>;

/// The whole world: entity id to record.
pub type World = HashMap<String, Record>;
