//! Schema-driven control of arbitrary MIoT devices.
//! `GenericMiot` loads a device model once, builds descriptor tables and
//! drives property reads, writes and action calls without per-device
//! accessor code.

use crate::cloud::MiotCloud;
use crate::descriptors::{ActionDescriptor, PropertyDescriptor};
use crate::device::{MiotDevice, MiotTransport};
use crate::error::{MiotError, Result, STATUS_OK, status_message};
use crate::protocol::{ActionResult, PropertyRequest, PropertyResponse};
use crate::schema::{DeviceModel, normalize_name};
use log::{debug, warn};
use serde_json::Value;
use std::collections::BTreeMap;

/// A device handle that works for any model with a published schema.
///
/// The handle starts uninitialized; the first operation (or an explicit
/// [`initialize_model`](Self::initialize_model)) fetches the schema and
/// builds the descriptor tables, after which it is ready.
pub struct GenericMiot<T: MiotTransport> {
    device: MiotDevice<T>,
    cloud: MiotCloud,
    model_name: String,
    model: Option<DeviceModel>,
    properties: BTreeMap<String, PropertyDescriptor>,
    actions: BTreeMap<String, ActionDescriptor>,
    plain_names: BTreeMap<String, String>,
}

impl<T: MiotTransport> GenericMiot<T> {
    pub fn new<S: Into<String>>(device: MiotDevice<T>, cloud: MiotCloud, model_name: S) -> Self {
        Self {
            device,
            cloud,
            model_name: model_name.into(),
            model: None,
            properties: BTreeMap::new(),
            actions: BTreeMap::new(),
            plain_names: BTreeMap::new(),
        }
    }

    /// Loads the device model and builds the descriptor tables.
    /// A second call is a no-op.
    pub async fn initialize_model(&mut self) -> Result<()> {
        if self.model.is_some() {
            return Ok(());
        }
        let model = self.cloud.get_device_model(&self.model_name).await?;
        self.preload_model(model);
        Ok(())
    }

    /// Installs an already-parsed model, e.g. one shipped with the
    /// application instead of fetched from the schema endpoint.
    pub fn preload_model(&mut self, model: DeviceModel) {
        self.build_descriptors(&model);
        self.model = Some(model);
    }

    fn build_descriptors(&mut self, model: &DeviceModel) {
        self.properties.clear();
        self.actions.clear();
        self.plain_names.clear();

        for service in &model.services {
            for property in &service.properties {
                if property.access.is_empty() {
                    debug!("Skipping {} without access metadata", property.name());
                    continue;
                }
                if !property.readable() && !property.writable() {
                    debug!("Skipping notify-only property {}", property.name());
                    continue;
                }
                let Some(descriptor) = PropertyDescriptor::for_property(service, property) else {
                    warn!("Skipping property {} without an id", property.name());
                    continue;
                };
                let key = normalize_name(&descriptor.name);
                // First service wins when two services share a property name.
                self.plain_names
                    .entry(normalize_name(property.plain_name()))
                    .or_insert_with(|| key.clone());
                self.properties.insert(key, descriptor);
            }

            for action in &service.actions {
                let descriptor = ActionDescriptor::for_action(service, action);
                self.actions.insert(normalize_name(&descriptor.name), descriptor);
            }
        }

        debug!(
            "Built {} property and {} action descriptors for {}",
            self.properties.len(),
            self.actions.len(),
            self.model_name
        );
    }

    /// Reads every readable property and projects the result.
    ///
    /// Reads are batched below the datagram limit; per-property device
    /// errors are dropped from the projection, not raised.
    pub async fn status(&mut self) -> Result<GenericMiotStatus> {
        self.initialize_model().await?;

        let requests: Vec<PropertyRequest> = self
            .properties
            .values()
            .filter(|descriptor| descriptor.readable())
            .map(|descriptor| PropertyRequest {
                did: descriptor.name.clone(),
                siid: descriptor.siid,
                piid: descriptor.piid,
            })
            .collect();

        let entries = self.device.get_properties(&requests).await?;
        let status = GenericMiotStatus::new(entries, &self.properties);
        if let Some(model) = self.model.as_mut() {
            model.attach_values(status.responses());
        }
        Ok(status)
    }

    /// Writes a property by qualified or plain name after local
    /// validation against the schema.
    pub async fn set_property(&mut self, name: &str, value: Value) -> Result<()> {
        self.initialize_model().await?;

        let descriptor = self.property_descriptor(name)?;
        if !descriptor.writable() {
            return Err(MiotError::NotWritable(descriptor.name.clone()));
        }
        descriptor.validate(&value)?;

        self.device
            .set_property(&descriptor.name, descriptor.siid, descriptor.piid, value)
            .await
    }

    /// Invokes an action by qualified or plain name.
    pub async fn call_action(&mut self, name: &str, inputs: Vec<Value>) -> Result<ActionResult> {
        self.initialize_model().await?;

        let descriptor = self.action_descriptor(name)?;
        if descriptor.inputs.len() != inputs.len() {
            return Err(MiotError::InvalidValue {
                target: descriptor.name.clone(),
                reason: format!(
                    "action takes {} inputs, got {}",
                    descriptor.inputs.len(),
                    inputs.len()
                ),
            });
        }

        self.device
            .call_action(&descriptor.name, descriptor.siid, descriptor.aiid, inputs)
            .await
    }

    /// Property descriptors keyed by normalized qualified name.
    pub fn properties(&self) -> &BTreeMap<String, PropertyDescriptor> {
        &self.properties
    }

    /// Action descriptors keyed by normalized qualified name.
    pub fn actions(&self) -> &BTreeMap<String, ActionDescriptor> {
        &self.actions
    }

    /// The loaded device model, if initialized.
    pub fn model(&self) -> Option<&DeviceModel> {
        self.model.as_ref()
    }

    pub fn device(&self) -> &MiotDevice<T> {
        &self.device
    }

    fn property_descriptor(&self, name: &str) -> Result<&PropertyDescriptor> {
        let key = normalize_name(name);
        if let Some(descriptor) = self.properties.get(&key) {
            return Ok(descriptor);
        }
        if let Some(full) = self.plain_names.get(&key) {
            if let Some(descriptor) = self.properties.get(full) {
                return Ok(descriptor);
            }
        }
        Err(MiotError::UnknownProperty(name.to_string()))
    }

    fn action_descriptor(&self, name: &str) -> Result<&ActionDescriptor> {
        let key = normalize_name(name);
        if let Some(descriptor) = self.actions.get(&key) {
            return Ok(descriptor);
        }
        let suffix = format!(":{key}");
        self.actions
            .values()
            .find(|descriptor| normalize_name(&descriptor.name).ends_with(&suffix))
            .ok_or_else(|| MiotError::UnknownAction(name.to_string()))
    }
}

/// Projection of one `get_properties` sweep into a name → value map.
///
/// Entries missing a required key or carrying a nonzero status code are
/// dropped with a log record; a partial failure never fails the read.
pub struct GenericMiotStatus {
    values: BTreeMap<String, PropertyResponse>,
    descriptors: BTreeMap<String, PropertyDescriptor>,
}

impl GenericMiotStatus {
    pub(crate) fn new(
        entries: Vec<Value>,
        descriptors: &BTreeMap<String, PropertyDescriptor>,
    ) -> Self {
        let mut values = BTreeMap::new();
        for entry in &entries {
            let response = match PropertyResponse::from_entry(entry) {
                Ok(response) => response,
                Err(e) => {
                    warn!("Dropping malformed property response {entry}: {e}");
                    continue;
                }
            };
            if response.code != STATUS_OK {
                warn!(
                    "Dropping {}: device reported {} ({})",
                    response.did,
                    response.code,
                    status_message(response.code)
                );
                continue;
            }
            values.insert(normalize_name(&response.did), response);
        }

        Self {
            values,
            descriptors: descriptors.clone(),
        }
    }

    /// Map of qualified property name to value for all surviving entries.
    pub fn data(&self) -> BTreeMap<String, Value> {
        self.values
            .iter()
            .map(|(name, response)| (name.clone(), response.value.clone()))
            .collect()
    }

    /// Looks a value up by plain property name, falling back to the
    /// explicit `service:property` form.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let key = normalize_name(name);
        if let Some(response) = self.values.get(&key) {
            return Some(&response.value);
        }
        let suffix = format!(":{key}");
        self.values
            .iter()
            .find(|(full, _)| full.ends_with(&suffix))
            .map(|(_, response)| &response.value)
    }

    /// Value for the explicit `service:property` form, translating choice
    /// values to their descriptions when the property declares choices.
    /// An undeclared choice value is logged and returned raw.
    pub fn get_described(&self, name: &str) -> Option<Value> {
        let key = normalize_name(name);
        let response = self.values.get(&key)?;

        if let Some(descriptor) = self.descriptors.get(&key) {
            if !descriptor.choices.is_empty() {
                if let Some(raw) = response.value.as_i64() {
                    if let Some(description) = descriptor.describe_choice(raw) {
                        return Some(Value::String(description.to_string()));
                    }
                    warn!("Value {} of {} is not a declared choice", raw, descriptor.name);
                }
            }
        }
        Some(response.value.clone())
    }

    /// The surviving per-property responses.
    pub fn responses(&self) -> impl Iterator<Item = &PropertyResponse> {
        self.values.values()
    }

    /// Number of surviving entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
