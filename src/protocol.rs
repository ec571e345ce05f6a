//! Payload framing for the MIoT RPC methods.
//! Request and response bodies are plain JSON structures carried by an
//! opaque transport; response entries are decoded individually so one
//! malformed element never poisons a whole batch.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Method name for batched property reads.
pub const METHOD_GET_PROPERTIES: &str = "get_properties";
/// Method name for property writes.
pub const METHOD_SET_PROPERTIES: &str = "set_properties";
/// Method name for action invocation.
pub const METHOD_ACTION: &str = "action";

/// One entry of a `get_properties` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyRequest {
    /// Correlation id echoed back by the device.
    pub did: String,
    pub siid: u32,
    pub piid: u32,
}

/// One entry of a `get_properties` response.
///
/// Deserialization fails when any of the required keys (`did`, `siid`,
/// `piid`, `value`) is missing; a missing `code` defaults to success.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PropertyResponse {
    pub did: String,
    pub siid: u32,
    pub piid: u32,
    #[serde(default)]
    pub code: i64,
    pub value: Value,
}

impl PropertyResponse {
    /// Decodes a single raw response entry.
    pub fn from_entry(entry: &Value) -> serde_json::Result<Self> {
        serde_json::from_value(entry.clone())
    }
}

/// One entry of a `set_properties` request.
#[derive(Debug, Clone, Serialize)]
pub struct SetRequest {
    pub did: String,
    pub siid: u32,
    pub piid: u32,
    pub value: Value,
}

/// One entry of a `set_properties` response.
#[derive(Debug, Clone, Deserialize)]
pub struct SetResponse {
    #[serde(default)]
    pub did: Option<String>,
    #[serde(default)]
    pub code: i64,
}

/// Parameters of an `action` call.
#[derive(Debug, Clone, Serialize)]
pub struct ActionRequest {
    pub did: String,
    pub siid: u32,
    pub aiid: u32,
    #[serde(rename = "in")]
    pub inputs: Vec<Value>,
}

/// Result of an `action` call.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionResult {
    #[serde(default)]
    pub code: i64,
    #[serde(rename = "out", default)]
    pub outputs: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn property_request_serializes_to_the_wire_shape() {
        let request = PropertyRequest {
            did: "fan:on".to_string(),
            siid: 2,
            piid: 1,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"did": "fan:on", "siid": 2, "piid": 1})
        );
    }

    #[test]
    fn property_response_defaults_code_to_success() {
        let entry = json!({"did": "fan:on", "siid": 2, "piid": 1, "value": true});
        let response = PropertyResponse::from_entry(&entry).unwrap();
        assert_eq!(response.code, 0);
        assert_eq!(response.value, json!(true));
    }

    #[test]
    fn property_response_requires_value_key() {
        let entry = json!({"did": "fan:on", "siid": 2, "piid": 1});
        assert!(PropertyResponse::from_entry(&entry).is_err());
    }

    #[test]
    fn property_response_requires_ids() {
        let entry = json!({"did": "fan:on", "value": true});
        assert!(PropertyResponse::from_entry(&entry).is_err());
    }

    #[test]
    fn action_request_renames_inputs() {
        let request = ActionRequest {
            did: "fan:toggle".to_string(),
            siid: 2,
            aiid: 1,
            inputs: vec![json!(30)],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"did": "fan:toggle", "siid": 2, "aiid": 1, "in": [30]})
        );
    }

    #[test]
    fn action_result_tolerates_missing_out() {
        let result: ActionResult = serde_json::from_value(json!({"code": 0})).unwrap();
        assert!(result.outputs.is_empty());
    }
}
