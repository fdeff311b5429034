use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Payload of a `start` message.
///
/// # Example
///
/// ```
/// use graphql_subscriptions_client::graphql::QueryPayload;
///
/// let payload = QueryPayload::builder()
///     .query("subscription { ticks { value } }")
///     .operation_name("Ticks")
///     .build();
///
/// assert_eq!(payload.operation_name.as_deref(), Some("Ticks"));
/// ```
#[non_exhaustive]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Builder)]
pub struct QueryPayload {
    #[serde(default)]
    #[builder(default)]
    pub variables: Map<String, Value>,
    #[serde(default)]
    #[builder(default)]
    pub extensions: Map<String, Value>,
    #[serde(rename = "operationName", default)]
    #[builder(into)]
    pub operation_name: Option<String>,
    #[builder(into)]
    pub query: String,
}

impl QueryPayload {
    /// Payload for a bare query string and its variables.
    #[must_use]
    pub fn new<Q: Into<String>>(query: Q, variables: Map<String, Value>) -> Self {
        Self {
            variables,
            extensions: Map::new(),
            operation_name: None,
            query: query.into(),
        }
    }
}
