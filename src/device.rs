//! The transport seam and the typed RPC surface built on top of it.
//! The encrypted miIO transport itself lives outside this crate; anything
//! that can run a `method(params)` round trip can back a [`MiotDevice`].

use crate::error::{MiotError, Result};
use crate::protocol::{
    ActionRequest, ActionResult, METHOD_ACTION, METHOD_GET_PROPERTIES, METHOD_SET_PROPERTIES,
    PropertyRequest, SetRequest, SetResponse,
};
use async_trait::async_trait;
use log::debug;
use serde_json::Value;

/// Maximum `get_properties` entries per RPC, bounded by the transport's
/// datagram size.
pub const MAX_PROPERTIES_PER_REQUEST: usize = 15;

/// An opaque RPC round trip to a device.
///
/// Implementations wrap whatever carries the call: the encrypted miIO UDP
/// protocol, a cloud relay, or an in-memory fake in tests.
#[async_trait]
pub trait MiotTransport: Send + Sync {
    /// Sends one RPC and returns the raw `result` payload.
    async fn send(&self, method: &str, params: Value) -> Result<Value>;
}

/// Typed RPC surface over a [`MiotTransport`].
pub struct MiotDevice<T: MiotTransport> {
    transport: T,
    max_properties: usize,
}

impl<T: MiotTransport> MiotDevice<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            max_properties: MAX_PROPERTIES_PER_REQUEST,
        }
    }

    /// Overrides the batching limit for `get_properties`.
    pub fn with_max_properties(mut self, max_properties: usize) -> Self {
        self.max_properties = max_properties.max(1);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Reads properties in batches, concatenating the raw response entries.
    ///
    /// Entries are returned undecoded; per-entry errors are the status
    /// projection's concern, not a failure of the read.
    pub async fn get_properties(&self, requests: &[PropertyRequest]) -> Result<Vec<Value>> {
        let mut entries = Vec::with_capacity(requests.len());
        for chunk in requests.chunks(self.max_properties) {
            debug!("get_properties batch of {}", chunk.len());
            let params = serde_json::to_value(chunk)?;
            let response = self.transport.send(METHOD_GET_PROPERTIES, params).await?;
            match response {
                Value::Array(batch) => entries.extend(batch),
                other => {
                    return Err(MiotError::UnexpectedResponse(format!(
                        "get_properties returned {other}"
                    )));
                }
            }
        }
        Ok(entries)
    }

    /// Writes a single property, surfacing the device status code.
    pub async fn set_property(&self, did: &str, siid: u32, piid: u32, value: Value) -> Result<()> {
        debug!("set_property {} ({}:{}) = {}", did, siid, piid, value);
        let request = SetRequest {
            did: did.to_string(),
            siid,
            piid,
            value,
        };
        let params = serde_json::to_value([request])?;
        let response = self.transport.send(METHOD_SET_PROPERTIES, params).await?;
        let results: Vec<SetResponse> = serde_json::from_value(response)?;
        let result = results.into_iter().next().ok_or_else(|| {
            MiotError::UnexpectedResponse("empty set_properties response".to_string())
        })?;
        MiotError::check_code(result.code)
    }

    /// Invokes an action, surfacing the device status code.
    pub async fn call_action(
        &self,
        did: &str,
        siid: u32,
        aiid: u32,
        inputs: Vec<Value>,
    ) -> Result<ActionResult> {
        debug!("call_action {} ({}:{}) with {} inputs", did, siid, aiid, inputs.len());
        let request = ActionRequest {
            did: did.to_string(),
            siid,
            aiid,
            inputs,
        };
        let params = serde_json::to_value(&request)?;
        let response = self.transport.send(METHOD_ACTION, params).await?;
        let result: ActionResult = serde_json::from_value(response)?;
        MiotError::check_code(result.code)?;
        Ok(result)
    }
}
