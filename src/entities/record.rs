//! Schemaless JSON record

use crate::core::entity::Entity;
use crate::core::error::CollectionError;
use crate::core::field::FieldValue;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An entity whose payload is an arbitrary JSON object
///
/// Serializes flat: `{"id": "1", "name": "Maria", "address": {"city": "Natal"}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Record {
    /// Build a record from an id and a JSON object; non-objects give an empty payload
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        let data = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: id.into(),
            data,
        }
    }

    /// A record without id, ready to be created
    pub fn draft(data: Value) -> Self {
        Self::new(String::new(), data)
    }

    fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.data.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}

impl Entity for Record {
    fn resource_name() -> &'static str {
        "records"
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn assign_id(&mut self, id: String) {
        self.id = id;
    }

    fn field_value(&self, path: &str) -> Option<FieldValue> {
        if path == "id" {
            return Some(FieldValue::String(self.id.clone()));
        }
        self.lookup(path).and_then(FieldValue::from_json)
    }

    fn set_field_value(&mut self, path: &str, value: FieldValue) -> Result<(), CollectionError> {
        if path == "id" {
            return Err(CollectionError::field("id", "id is immutable"));
        }

        let segments: Vec<&str> = path.split('.').collect();
        let Some((last, parents)) = segments.split_last() else {
            return Err(CollectionError::field(path, "empty field path"));
        };
        if last.is_empty() {
            return Err(CollectionError::field(path, "empty field path"));
        }

        let mut current = &mut self.data;
        for segment in parents {
            let slot = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            current = match slot {
                Value::Object(map) => map,
                _ => {
                    return Err(CollectionError::field(
                        path,
                        format!("'{}' is not an object", segment),
                    ));
                }
            };
        }
        current.insert(last.to_string(), value.to_json());
        Ok(())
    }
}
