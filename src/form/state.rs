use indexmap::IndexMap;

use super::config::{FieldErrors, FormOptions};
use super::data_source::DataSourceState;
use super::field::FieldState;
use crate::id::FormKey;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FormLifecycle {
    Unmounted,
    Unconfigured,
    /// Configured, but the field definition function is still waiting on a dependency.
    Configuring,
    Ready,
    Submitting,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FormState {
    pub form_key: FormKey,
    /// `None` until the field definition function produces a field list.
    pub fields: Option<IndexMap<String, FieldState>>,
    pub data_sources: IndexMap<String, DataSourceState>,
    pub submitting: bool,
    pub submit_count: u32,
    pub error: Option<String>,
    pub options: FormOptions,
}

impl FormState {
    pub(super) fn new(form_key: FormKey, options: FormOptions) -> Self {
        Self {
            form_key,
            fields: None,
            data_sources: IndexMap::new(),
            submitting: false,
            submit_count: 0,
            error: None,
            options,
        }
    }

    pub fn lifecycle(&self) -> FormLifecycle {
        match (&self.fields, self.submitting) {
            (None, _) => FormLifecycle::Configuring,
            (Some(_), true) => FormLifecycle::Submitting,
            (Some(_), false) => FormLifecycle::Ready,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldState> {
        self.fields.as_ref().and_then(|fields| fields.get(name))
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields
            .as_ref()
            .map(|fields| fields.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_valid(&self) -> bool {
        self.fields
            .as_ref()
            .is_none_or(|fields| fields.values().all(FieldState::is_valid))
    }

    pub fn is_dirty(&self) -> bool {
        self.fields
            .as_ref()
            .is_some_and(|fields| fields.values().any(|field| field.dirty))
    }

    pub fn first_invalid_field(&self) -> Option<&str> {
        self.fields.as_ref().and_then(|fields| {
            fields
                .values()
                .find_map(|field| (!field.is_valid()).then_some(field.name.as_str()))
        })
    }

    pub fn field_errors(&self) -> FieldErrors {
        self.fields
            .as_ref()
            .map(|fields| {
                fields
                    .values()
                    .filter(|field| !field.is_valid())
                    .map(|field| (field.name.clone(), field.errors.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}
