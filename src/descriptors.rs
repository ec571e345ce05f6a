//! Introspectable descriptors binding schema entries to the generic
//! get/set/call surface. The tables are built once when a model is
//! loaded, in place of the runtime reflection the schema format was
//! designed around.

use crate::error::{MiotError, Result};
use crate::schema::{MiotAccess, MiotAction, MiotChoice, MiotFormat, MiotProperty, MiotService, ValueRange};
use serde_json::Value;

/// A property bound to its service, with everything needed to read,
/// write and validate it generically.
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    /// Qualified `service:property` name; doubles as the RPC `did`.
    pub name: String,
    pub siid: u32,
    pub piid: u32,
    pub description: String,
    pub format: MiotFormat,
    pub access: Vec<MiotAccess>,
    pub unit: Option<String>,
    pub range: Option<ValueRange>,
    pub choices: Vec<MiotChoice>,
}

impl PropertyDescriptor {
    /// Builds a descriptor for a linked property. Returns `None` when the
    /// property carries no id.
    pub(crate) fn for_property(service: &MiotService, property: &MiotProperty) -> Option<Self> {
        Some(Self {
            name: property.name(),
            siid: service.siid,
            piid: property.piid?,
            description: property.description.clone(),
            format: property.format,
            access: property.access.clone(),
            unit: property.unit.clone(),
            range: property.range,
            choices: property.choices.clone(),
        })
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

    /// Validates a candidate value against format, choices and range
    /// before it ever reaches the network.
    pub fn validate(&self, value: &Value) -> Result<()> {
        if !self.format.matches(value) {
            return Err(MiotError::InvalidValue {
                target: self.name.clone(),
                reason: format!("expected a {} value, got {}", self.format, value),
            });
        }

        if !self.choices.is_empty() {
            let matches_choice = value
                .as_i64()
                .is_some_and(|v| self.choices.iter().any(|choice| choice.value == v));
            if !matches_choice {
                return Err(MiotError::InvalidValue {
                    target: self.name.clone(),
                    reason: format!("{value} is not one of the declared choices"),
                });
            }
        }

        if let Some(range) = &self.range {
            if let Some(v) = value.as_f64() {
                if !range.contains(v) {
                    return Err(MiotError::InvalidValue {
                        target: self.name.clone(),
                        reason: format!("{v} is outside the range {}..={}", range.min, range.max),
                    });
                }
            }
        }

        Ok(())
    }
}

/// An action bound to its service, with resolved input descriptors.
#[derive(Debug, Clone)]
pub struct ActionDescriptor {
    /// Qualified `service:action` name; doubles as the RPC `did`.
    pub name: String,
    pub siid: u32,
    pub aiid: u32,
    pub description: String,
    pub inputs: Vec<PropertyDescriptor>,
}

impl ActionDescriptor {
    pub(crate) fn for_action(service: &MiotService, action: &MiotAction) -> Self {
        let inputs = service
            .action_inputs(action)
            .into_iter()
            .filter_map(|property| PropertyDescriptor::for_property(service, property))
            .collect();

        Self {
            name: action.name(),
            siid: service.siid,
            aiid: action.aiid,
            description: action.description.clone(),
            inputs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(format: MiotFormat, range: Option<ValueRange>, choices: Vec<MiotChoice>) -> PropertyDescriptor {
        PropertyDescriptor {
            name: "fan:speed-level".to_string(),
            siid: 2,
            piid: 10,
            description: "Speed Level".to_string(),
            format,
            access: vec![MiotAccess::Read, MiotAccess::Write],
            unit: None,
            range,
            choices,
        }
    }

    #[test]
    fn validate_rejects_format_mismatches() {
        let speed = descriptor(MiotFormat::Int, None, vec![]);
        assert!(speed.validate(&json!(30)).is_ok());
        let err = speed.validate(&json!("fast")).unwrap_err();
        assert!(err.to_string().contains("expected a int value"));
    }

    #[test]
    fn validate_enforces_the_range() {
        let range = ValueRange { min: 1.0, max: 100.0, step: 1.0 };
        let speed = descriptor(MiotFormat::Int, Some(range), vec![]);
        assert!(speed.validate(&json!(100)).is_ok());
        assert!(speed.validate(&json!(101)).is_err());
    }

    #[test]
    fn validate_enforces_the_choice_list() {
        let choices = vec![
            MiotChoice { value: 1, description: "Level1".to_string() },
            MiotChoice { value: 2, description: "Level2".to_string() },
        ];
        let level = descriptor(MiotFormat::Int, None, choices);
        assert!(level.validate(&json!(2)).is_ok());
        assert!(level.validate(&json!(5)).is_err());
    }
}
