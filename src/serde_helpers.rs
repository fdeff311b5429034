//! Decoding of operation payloads.
//!
//! With the `tracing` feature, fields the client does not know about are logged together
//! with the id of the operation they arrived for, and a failed decode logs the path that
//! broke. Neither changes the result.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Decode the payload of a message addressed to `operation_id`.
///
/// A missing payload decodes as JSON `null`. Unknown fields are tolerated.
#[cfg(feature = "tracing")]
pub fn decode_payload<T: DeserializeOwned>(
    operation_id: Option<&str>,
    payload: Option<&Value>,
) -> crate::Result<T> {
    use std::any::type_name;

    let payload = payload.unwrap_or(&Value::Null);
    tracing::trace!(
        operation_id,
        target_type = %type_name::<T>(),
        %payload,
        "Decoding operation payload"
    );

    let mut unknown_fields: Vec<String> = Vec::new();
    let deserializer = serde_ignored::Deserializer::new(payload, |path| {
        unknown_fields.push(path.to_string());
    });

    let decoded: T = serde_path_to_error::deserialize(deserializer).map_err(|e| {
        tracing::warn!(
            operation_id,
            target_type = %type_name::<T>(),
            path = %e.path(),
            error = %e.inner(),
            "Operation payload does not match the expected shape"
        );
        e.into_inner()
    })?;

    for field in unknown_fields {
        tracing::debug!(
            operation_id,
            target_type = %type_name::<T>(),
            %field,
            "Ignoring unknown field in operation payload"
        );
    }

    Ok(decoded)
}

#[cfg(not(feature = "tracing"))]
pub fn decode_payload<T: DeserializeOwned>(
    operation_id: Option<&str>,
    payload: Option<&Value>,
) -> crate::Result<T> {
    let _ = operation_id;
    Ok(T::deserialize(payload.unwrap_or(&Value::Null))?)
}
