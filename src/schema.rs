//! Typed models for MIoT device schemas ("instance" documents).
//! A schema is parsed once into an immutable tree of services, properties,
//! actions and events; a link pass stamps back-references and builds the
//! id and name indices used for generic lookup.

use crate::error::Result;
use crate::protocol::PropertyResponse;
use crate::urn::URN;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Semantic value type of a property, resolved from the schema's textual
/// format name once at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiotFormat {
    Bool,
    Int,
    Float,
    Str,
}

impl MiotFormat {
    /// Whether a JSON value is representable in this format.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            MiotFormat::Bool => value.is_boolean(),
            MiotFormat::Int => value.is_i64() || value.is_u64(),
            MiotFormat::Float => value.is_number(),
            MiotFormat::Str => value.is_string(),
        }
    }
}

impl fmt::Display for MiotFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MiotFormat::Bool => "bool",
            MiotFormat::Int => "int",
            MiotFormat::Float => "float",
            MiotFormat::Str => "string",
        };
        write!(f, "{name}")
    }
}

impl<'de> Deserialize<'de> for MiotFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "bool" => Ok(MiotFormat::Bool),
            "string" => Ok(MiotFormat::Str),
            "float" => Ok(MiotFormat::Float),
            "uint8" | "uint16" | "uint32" | "uint64" | "int8" | "int16" | "int32" | "int64" => {
                Ok(MiotFormat::Int)
            }
            other => Err(serde::de::Error::custom(format!(
                "unknown property format '{other}'"
            ))),
        }
    }
}

/// Access rights declared for a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MiotAccess {
    Read,
    Write,
    Notify,
}

/// Numeric bounds declared as the schema's 3-element `value-range` array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl ValueRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl<'de> Deserialize<'de> for ValueRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let parts = <[f64; 3]>::deserialize(deserializer)?;
        Ok(ValueRange {
            min: parts[0],
            max: parts[1],
            step: parts[2],
        })
    }
}

/// One entry of an enum-style `value-list`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MiotChoice {
    pub value: i64,
    pub description: String,
}

/// Normalizes schema names for map lookups.
pub fn normalize_name(name: &str) -> String {
    name.replace('-', "_")
}

/// One device property as declared by the schema.
///
/// Immutable after the model link pass, except for the transient [`value`]
/// field used to attach the last-read value for display.
///
/// [`value`]: MiotProperty::value
#[derive(Debug, Clone, Deserialize)]
pub struct MiotProperty {
    /// Property id within the owning service. Absent when a property is
    /// parsed outside a service context.
    #[serde(rename = "iid", default)]
    pub piid: Option<u32>,
    #[serde(rename = "type")]
    pub urn: URN,
    #[serde(default)]
    pub description: String,
    pub format: MiotFormat,
    #[serde(default)]
    pub access: Vec<MiotAccess>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(rename = "value-range", default)]
    pub range: Option<ValueRange>,
    #[serde(rename = "value-list", default)]
    pub choices: Vec<MiotChoice>,
    /// Id of the owning service, stamped during the link pass.
    #[serde(skip)]
    pub siid: Option<u32>,
    /// Name of the owning service, stamped during the link pass.
    #[serde(skip)]
    pub service_name: Option<String>,
    /// Last value read from the device, attached for display only.
    #[serde(skip)]
    pub value: Option<Value>,
}

impl MiotProperty {
    /// Property name as declared by the URN.
    pub fn plain_name(&self) -> &str {
        &self.urn.name
    }

    /// Qualified `service:property` name; falls back to the plain name
    /// when the property is not linked to a service.
    pub fn name(&self) -> String {
        match &self.service_name {
            Some(service) => format!("{}:{}", service, self.plain_name()),
            None => self.plain_name().to_string(),
        }
    }

    /// Lookup key form of [`name`](Self::name), dashes normalized.
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name())
    }

    pub fn readable(&self) -> bool {
        self.access.contains(&MiotAccess::Read)
    }

    pub fn writable(&self) -> bool {
        self.access.contains(&MiotAccess::Write)
    }

    /// Description for a raw choice value, if declared.
    pub fn describe_choice(&self, value: i64) -> Option<&str> {
        self.choices
            .iter()
            .find(|choice| choice.value == value)
            .map(|choice| choice.description.as_str())
    }
}

/// One invocable action as declared by the schema.
#[derive(Debug, Clone, Deserialize)]
pub struct MiotAction {
    #[serde(rename = "iid")]
    pub aiid: u32,
    #[serde(rename = "type")]
    pub urn: URN,
    #[serde(default)]
    pub description: String,
    /// Ordered input property ids, resolved against the owning service.
    #[serde(rename = "in", default)]
    pub inputs: Vec<u32>,
    /// Ordered output property ids.
    #[serde(rename = "out", default)]
    pub outputs: Vec<u32>,
    #[serde(skip)]
    pub siid: Option<u32>,
    #[serde(skip)]
    pub service_name: Option<String>,
}

impl MiotAction {
    pub fn plain_name(&self) -> &str {
        &self.urn.name
    }

    /// Qualified `service:action` name.
    pub fn name(&self) -> String {
        match &self.service_name {
            Some(service) => format!("{}:{}", service, self.plain_name()),
            None => self.plain_name().to_string(),
        }
    }
}

/// One event as declared by the schema. Events are notify-only and carry
/// references to the properties reported with them.
#[derive(Debug, Clone, Deserialize)]
pub struct MiotEvent {
    #[serde(rename = "iid")]
    pub eiid: u32,
    #[serde(rename = "type")]
    pub urn: URN,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub arguments: Vec<u32>,
    #[serde(skip)]
    pub siid: Option<u32>,
}

/// A named group of properties, actions and events sharing a service id.
#[derive(Debug, Clone, Deserialize)]
pub struct MiotService {
    #[serde(rename = "iid")]
    pub siid: u32,
    #[serde(rename = "type")]
    pub urn: URN,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub properties: Vec<MiotProperty>,
    #[serde(default)]
    pub actions: Vec<MiotAction>,
    #[serde(default)]
    pub events: Vec<MiotEvent>,
    #[serde(skip)]
    property_index: HashMap<u32, usize>,
    #[serde(skip)]
    action_index: HashMap<u32, usize>,
}

impl MiotService {
    /// Service name as declared by the URN.
    pub fn name(&self) -> &str {
        &self.urn.name
    }

    fn link(&mut self) {
        let siid = self.siid;
        let service_name = self.urn.name.clone();

        self.property_index.clear();
        for (idx, property) in self.properties.iter_mut().enumerate() {
            property.siid = Some(siid);
            property.service_name = Some(service_name.clone());
            if let Some(piid) = property.piid {
                self.property_index.insert(piid, idx);
            }
        }

        self.action_index.clear();
        for (idx, action) in self.actions.iter_mut().enumerate() {
            action.siid = Some(siid);
            action.service_name = Some(service_name.clone());
            self.action_index.insert(action.aiid, idx);
        }

        for event in self.events.iter_mut() {
            event.siid = Some(siid);
        }
    }

    /// O(1) property lookup by piid.
    pub fn property(&self, piid: u32) -> Option<&MiotProperty> {
        self.property_index.get(&piid).map(|&idx| &self.properties[idx])
    }

    /// O(1) action lookup by aiid.
    pub fn action(&self, aiid: u32) -> Option<&MiotAction> {
        self.action_index.get(&aiid).map(|&idx| &self.actions[idx])
    }

    /// Input properties of an action, resolved against this service's
    /// property table in declaration order. Unresolvable ids are dropped.
    pub fn action_inputs(&self, action: &MiotAction) -> Vec<&MiotProperty> {
        action
            .inputs
            .iter()
            .filter_map(|&piid| self.property(piid))
            .collect()
    }
}

/// The root of a parsed schema: device URN, description and services.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceModel {
    #[serde(rename = "type")]
    pub urn: URN,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub services: Vec<MiotService>,
    #[serde(skip)]
    service_index: HashMap<u32, usize>,
    #[serde(skip)]
    name_index: HashMap<String, (u32, u32)>,
}

impl DeviceModel {
    /// Parses a schema JSON document and links the resulting tree.
    pub fn parse(json: &str) -> Result<Self> {
        let mut model: DeviceModel = serde_json::from_str(json)?;
        model.link();
        Ok(model)
    }

    /// Same as [`parse`](Self::parse) for an already-decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        let mut model: DeviceModel = serde_json::from_value(value)?;
        model.link();
        Ok(model)
    }

    fn link(&mut self) {
        self.service_index.clear();
        self.name_index.clear();

        for (idx, service) in self.services.iter_mut().enumerate() {
            service.link();
            self.service_index.insert(service.siid, idx);
        }

        for service in &self.services {
            for property in &service.properties {
                if let Some(piid) = property.piid {
                    self.name_index
                        .insert(property.normalized_name(), (service.siid, piid));
                }
            }
        }
    }

    /// O(1) service lookup by siid.
    pub fn service(&self, siid: u32) -> Option<&MiotService> {
        self.service_index.get(&siid).map(|&idx| &self.services[idx])
    }

    /// O(1) property lookup by (siid, piid).
    pub fn property(&self, siid: u32, piid: u32) -> Option<&MiotProperty> {
        self.service(siid)?.property(piid)
    }

    /// Property lookup by qualified `service:property` name. Dashes and
    /// underscores are interchangeable.
    pub fn property_by_name(&self, name: &str) -> Option<&MiotProperty> {
        let &(siid, piid) = self.name_index.get(&normalize_name(name))?;
        self.property(siid, piid)
    }

    /// All properties across all services, in declaration order.
    pub fn properties(&self) -> impl Iterator<Item = &MiotProperty> {
        self.services.iter().flat_map(|service| service.properties.iter())
    }

    /// All actions across all services, in declaration order.
    pub fn actions(&self) -> impl Iterator<Item = &MiotAction> {
        self.services.iter().flat_map(|service| service.actions.iter())
    }

    /// Attaches last-read values to the matching properties for display.
    pub fn attach_values<'a>(&mut self, responses: impl IntoIterator<Item = &'a PropertyResponse>) {
        for response in responses {
            if let Some(property) = self.property_mut(response.siid, response.piid) {
                property.value = Some(response.value.clone());
            }
        }
    }

    fn property_mut(&mut self, siid: u32, piid: u32) -> Option<&mut MiotProperty> {
        let &service_idx = self.service_index.get(&siid)?;
        let service = &mut self.services[service_idx];
        let &property_idx = service.property_index.get(&piid)?;
        Some(&mut service.properties[property_idx])
    }
}
