use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Result;

/// Payload of a `data` message.
#[non_exhaustive]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DataPayload {
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
    #[serde(default)]
    pub errors: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
}

impl DataPayload {
    #[must_use]
    pub fn new(data: Map<String, Value>, errors: Option<Vec<Value>>) -> Self {
        Self {
            data: Some(data),
            errors,
            extensions: None,
        }
    }
}

/// One decoded result of an operation.
#[non_exhaustive]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphQLResponse {
    pub data: Map<String, Value>,
    pub errors: Vec<Value>,
    pub extensions: Map<String, Value>,
}

impl GraphQLResponse {
    /// Top-level field of `data`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// Whether the server reported field errors alongside the data.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Deserialize the whole `data` object into `T`.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.data.clone()))?)
    }
}

impl From<DataPayload> for GraphQLResponse {
    fn from(payload: DataPayload) -> Self {
        Self {
            data: payload.data.unwrap_or_default(),
            errors: payload.errors.unwrap_or_default(),
            extensions: payload.extensions.unwrap_or_default(),
        }
    }
}
