use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde_json::Value;

use super::state::FormState;
use super::value::FieldValue;

static NULL_FIELD_VALUE: FieldValue = FieldValue::Null;
static NULL_DATA: Value = Value::Null;

/// Derived, read-only view handed to every dynamic property, data-source parameter
/// function and submit handler. Rebuilt at the start of every digest and never stored.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bindings {
    values: IndexMap<String, FieldValue>,
    data: BTreeMap<String, Value>,
}

impl Bindings {
    pub fn new(values: IndexMap<String, FieldValue>, data: BTreeMap<String, Value>) -> Self {
        Self { values, data }
    }

    pub fn values(&self) -> &IndexMap<String, FieldValue> {
        &self.values
    }

    /// Current value of a field, `Null` when the field does not exist (yet).
    pub fn value(&self, name: &str) -> &FieldValue {
        self.values.get(name).unwrap_or(&NULL_FIELD_VALUE)
    }

    /// Resolved payload of a data source, `Null` until it resolves.
    pub fn data(&self, name: &str) -> &Value {
        self.data.get(name).unwrap_or(&NULL_DATA)
    }

    pub fn data_sources(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.data.iter().map(|(name, value)| (name.as_str(), value))
    }
}

pub(super) fn build_bindings(state: &FormState) -> Bindings {
    let values = state
        .fields
        .as_ref()
        .map(|fields| {
            fields
                .iter()
                .map(|(name, field)| (name.clone(), field.value.clone()))
                .collect()
        })
        .unwrap_or_default();
    let data = state
        .data_sources
        .iter()
        .map(|(name, source)| (name.clone(), source.data.clone()))
        .collect();
    Bindings::new(values, data)
}
