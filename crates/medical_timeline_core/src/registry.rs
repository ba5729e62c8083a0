//! crates/medical_timeline_core/src/registry.rs
//!
//! Field-widget registry. The application's composition root registers the widgets
//! it ships; widget modules only describe themselves.

use serde::Serialize;
use std::collections::BTreeMap;

/// Registry key of the medical timeline widget.
pub const MEDICAL_TIMELINE_KEY: &str = "medical_timeline";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("A field widget is already registered under '{0}'")]
    Duplicate(String),
}

/// Field kinds a widget can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    One2many,
    Many2many,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldWidgetDescriptor {
    pub display_name: String,
    pub supported_types: Vec<FieldType>,
}

impl FieldWidgetDescriptor {
    pub fn supports(&self, field_type: FieldType) -> bool {
        self.supported_types.contains(&field_type)
    }
}

/// Describes the medical timeline widget for registration.
pub fn medical_timeline_descriptor() -> FieldWidgetDescriptor {
    FieldWidgetDescriptor {
        display_name: "Medical Timeline".to_string(),
        supported_types: vec![FieldType::One2many],
    }
}

#[derive(Debug, Default)]
pub struct FieldWidgetRegistry {
    widgets: BTreeMap<String, FieldWidgetDescriptor>,
}

impl FieldWidgetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        key: impl Into<String>,
        descriptor: FieldWidgetDescriptor,
    ) -> Result<(), RegistryError> {
        let key = key.into();
        if self.widgets.contains_key(&key) {
            return Err(RegistryError::Duplicate(key));
        }
        self.widgets.insert(key, descriptor);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&FieldWidgetDescriptor> {
        self.widgets.get(key)
    }

    /// Registered widgets ordered by key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldWidgetDescriptor)> {
        self.widgets.iter().map(|(key, d)| (key.as_str(), d))
    }
}
