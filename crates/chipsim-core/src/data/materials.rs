//! Material definitions
//!
//! A material is an ordered list of named properties. The order is kept
//! because the solver's material manager consumes properties positionally;
//! the two properties this crate interprets itself are `permittivity` and
//! `conductivity`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the built-in perfect electric conductor
pub const PEC: &str = "pec";

/// Value of a single material property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Numeric value
    Number(f64),
    /// Expression or textual value
    Text(String),
}

impl PropertyValue {
    /// Numeric value, if any
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(v) => Some(*v),
            PropertyValue::Text(_) => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Number(v) => write!(f, "{}", v),
            PropertyValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Number(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

/// Ordered property list of one material
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialProperties(IndexMap<String, PropertyValue>);

impl MaterialProperties {
    /// Create an empty property list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append or replace a property, keeping its original position on replace
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Look up a property by name
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.0.get(key)
    }

    /// Relative permittivity, if given numerically
    pub fn permittivity(&self) -> Option<f64> {
        self.get("permittivity").and_then(PropertyValue::as_f64)
    }

    /// Conductivity in S/m, if given numerically
    pub fn conductivity(&self) -> Option<f64> {
        self.get("conductivity").and_then(PropertyValue::as_f64)
    }

    /// Properties in definition order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no property is defined
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Named materials, in definition order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialTable {
    materials: IndexMap<String, MaterialProperties>,
}

impl MaterialTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a material
    pub fn insert(&mut self, name: impl Into<String>, properties: MaterialProperties) {
        self.materials.insert(name.into(), properties);
    }

    /// Look up a material by name
    pub fn get(&self, name: &str) -> Option<&MaterialProperties> {
        self.materials.get(name)
    }

    /// Relative permittivity of `name`, defaulting to vacuum
    pub fn permittivity(&self, name: &str) -> f64 {
        self.get(name)
            .and_then(MaterialProperties::permittivity)
            .unwrap_or(1.0)
    }

    /// True for `pec` and for materials with positive conductivity
    pub fn is_conductor(&self, name: &str) -> bool {
        name == PEC
            || self
                .get(name)
                .and_then(MaterialProperties::conductivity)
                .is_some_and(|sigma| sigma > 0.0)
    }

    /// Materials in definition order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MaterialProperties)> {
        self.materials.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of materials
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// True if the table is empty
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties_keep_order() {
        let props = MaterialProperties::new()
            .with("permittivity", 11.45)
            .with("dielectric_loss_tangent", 1e-6)
            .with("conductivity", 0.0);
        let keys: Vec<&str> = props.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["permittivity", "dielectric_loss_tangent", "conductivity"]);
    }

    #[test]
    fn test_conductor_detection() {
        let mut table = MaterialTable::new();
        table.insert("si", MaterialProperties::new().with("permittivity", 11.45));
        table.insert("al", MaterialProperties::new().with("conductivity", 3.7e7));

        assert!(table.is_conductor(PEC));
        assert!(table.is_conductor("al"));
        assert!(!table.is_conductor("si"));
        assert!(!table.is_conductor("unknown"));
    }

    #[test]
    fn test_permittivity_default() {
        let table = MaterialTable::new();
        assert_eq!(table.permittivity("vacuum"), 1.0);
    }

    #[test]
    fn test_json_roundtrip() {
        let json = r#"{"si": {"permittivity": 11.45, "dielectric_loss_tangent": 1e-06}, "pec": {}}"#;
        let table: MaterialTable = serde_json::from_str(json).expect("valid table");
        assert_eq!(table.len(), 2);
        assert_eq!(table.permittivity("si"), 11.45);

        let back = serde_json::to_string(&table).expect("serializable");
        let again: MaterialTable = serde_json::from_str(&back).expect("valid table");
        assert_eq!(table, again);
    }
}
