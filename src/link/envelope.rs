use serde::Deserialize;
use serde_json::Value;

use crate::error::LinkError;

const FALLBACK_REJECTION: &str = "The server rejected the request.";

/// Uniform wire response shape used by every remote call:
/// `{ success: bool, data: any, errors: [string] }`.
///
/// Every field tolerates absence so a malformed body still deserializes and
/// surfaces as a rejection rather than a parse error.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl RemoteEnvelope {
    /// Unwrap the payload, mapping `success: false` to the first server
    /// error. The envelope contract says `errors` is non-empty on failure;
    /// a fixed message covers servers that break it.
    pub fn into_data(self) -> Result<Value, LinkError> {
        if self.success {
            Ok(self.data)
        } else {
            let message = self
                .errors
                .into_iter()
                .next()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| FALLBACK_REJECTION.to_string());
            Err(LinkError::ServerRejected(message))
        }
    }
}

/// Read `data` itself as a string payload.
pub fn data_as_string(data: &Value) -> Result<String, LinkError> {
    data.as_str()
        .map(str::to_string)
        .ok_or_else(|| LinkError::InvalidResponse("envelope data is not a string".to_string()))
}

/// Read a string field out of an object-shaped `data` payload. Missing or
/// non-string fields come back as an empty string, matching the lenient
/// lookup the API's clients have always done.
pub fn data_field(data: &Value, field: &str) -> String {
    data.get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
