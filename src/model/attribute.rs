//! Entity attributes
//!
//! Each entity kind has a fixed set of recognized attribute keys plus a
//! free-form `additional` map. Attributes are add-if-absent: once a name is
//! present on an entity it is never overwritten.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{CdbError, CdbResult};

/// A named, typed value attached to a flat entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    /// Kind of the stored value (`str`, `int`, `float`, `bool`, `list`, `dict`)
    #[serde(rename = "type")]
    pub value_type: String,
    pub values: Value,
}

impl Attribute {
    pub fn new(name: impl Into<String>, values: Value) -> Self {
        Self {
            name: name.into(),
            value_type: value_kind(&values).to_string(),
            values,
        }
    }
}

/// Short type tag for a dynamic value
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "none",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "int",
        Value::Number(_) => "float",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// A per-kind set of optional attributes
pub trait AttributeSet:
    Default + Clone + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync
{
    /// Recognized attribute keys for this kind
    const KEYS: &'static [&'static str];

    /// All present `(name, value)` pairs, recognized keys first
    fn into_pairs(self) -> Vec<(String, Value)>;

    /// Parse from a JSON object; unknown keys are rejected
    fn from_json(value: Value) -> CdbResult<Self> {
        serde_json::from_value(value).map_err(|e| CdbError::InvalidAttribute(e.to_string()))
    }

    /// Validate and convert into attributes, skipping null values
    fn into_attributes(self) -> CdbResult<Vec<Attribute>> {
        let mut attributes = Vec::new();
        for (name, value) in self.into_pairs() {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(CdbError::InvalidAttribute(
                    "attribute name must not be empty".to_string(),
                ));
            }
            if value.is_null() {
                continue;
            }
            if attributes.iter().any(|a: &Attribute| a.name == name) {
                return Err(CdbError::InvalidAttribute(format!(
                    "attribute '{}' is given twice",
                    name
                )));
            }
            attributes.push(Attribute::new(name, value));
        }
        Ok(attributes)
    }
}

macro_rules! attribute_set {
    (
        $(#[$meta:meta])*
        $name:ident { $($field:ident => $key:literal),* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(deny_unknown_fields)]
        pub struct $name {
            $(
                #[serde(rename = $key, default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<Value>,
            )*
            /// Free-form attributes outside the recognized set
            #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
            pub additional: BTreeMap<String, Value>,
        }

        impl $name {
            $(
                pub fn $field(mut self, value: impl Into<Value>) -> Self {
                    self.$field = Some(value.into());
                    self
                }
            )*

            /// Add a free-form attribute
            pub fn extra(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
                self.additional.insert(name.into(), value.into());
                self
            }
        }

        impl AttributeSet for $name {
            const KEYS: &'static [&'static str] = &[$($key),*];

            fn into_pairs(self) -> Vec<(String, Value)> {
                let mut pairs = Vec::new();
                $(
                    if let Some(value) = self.$field {
                        pairs.push(($key.to_string(), value));
                    }
                )*
                pairs.extend(self.additional);
                pairs
            }
        }
    };
}

attribute_set! {
    /// Fill attributes
    FillAttributes {
        luminosity => "luminosity",
        filling_scheme => "filling_scheme",
        energy => "energy",
        colliding_bunches => "colliding_bunches",
        b1 => "B1",
        b2 => "B2",
    }
}

attribute_set! {
    /// Run attributes
    RunAttributes {
        luminosity => "luminosity",
        nb_events => "nb_events",
        runtype => "runtype",
        beam_status => "beam_status",
        status => "status",
        hv => "HV",
        eor_status => "eor_status",
    }
}

attribute_set! {
    /// File attributes
    FileAttributes {
        path => "path",
        luminosity => "luminosity",
        nb_events => "nb_events",
        size => "size",
        dq => "DQ",
    }
}

attribute_set! {
    /// Emulsion attributes
    EmulsionAttributes {
        target_configuration => "target_configuration",
    }
}

attribute_set! {
    /// Brick attributes
    BrickAttributes {
        producer_id => "producer_id",
        batch_id => "batch_id",
        production_date => "production_date",
        scanning_lab => "scanning_lab",
    }
}
