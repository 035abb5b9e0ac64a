use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::binding::Bindings;
use super::controller::{FormError, FormResult};
use super::data_source::DataSourceDefinition;
use super::field::FieldDefinition;
use crate::id::FormKey;

pub type SerializedValues = IndexMap<String, Value>;
pub type FieldErrors = IndexMap<String, Vec<String>>;

pub type FieldsFn =
    Arc<dyn Fn(&FormOptions, &Bindings) -> Option<Vec<FieldDefinition>> + Send + Sync>;
pub type DataSourceFactory = Arc<dyn Fn(&FormOptions) -> DataSourceDefinition + Send + Sync>;
pub type SubmitFuture = BoxFuture<'static, Result<Value, SubmitRejection>>;
pub type SubmitFn =
    Arc<dyn Fn(&FormOptions, SerializedValues, &Bindings) -> SubmitFuture + Send + Sync>;
pub type OnSaveFn = Arc<dyn Fn(&FormOptions, &Value) + Send + Sync>;
pub type OnErrorFn = Arc<dyn Fn(&FormOptions, &SubmitRejection) + Send + Sync>;
pub type OnInvalidFn = Arc<dyn Fn(&FieldErrors) + Send + Sync>;
pub type AlterFieldFn = Arc<dyn Fn(FieldDefinition) -> FieldDefinition + Send + Sync>;
pub type DeriveFieldSetFn = Arc<dyn Fn(Vec<String>) -> Vec<String> + Send + Sync>;

static NULL_OPTION: Value = Value::Null;

/// Immutable external context a form instance is configured with.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FormOptions(Arc<BTreeMap<String, Value>>);

impl FormOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps exactly `keys` from the caller configuration; absent keys are `null`.
    pub fn select(source: &serde_json::Map<String, Value>, keys: &[&str]) -> Self {
        Self(Arc::new(
            keys.iter()
                .map(|key| {
                    let value = source.get(*key).cloned().unwrap_or(Value::Null);
                    (key.to_string(), value)
                })
                .collect(),
        ))
    }

    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self(Arc::new(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        ))
    }

    pub fn get(&self, key: &str) -> &Value {
        self.0.get(key).unwrap_or(&NULL_OPTION)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Rejection reason of a submit handler.
#[derive(Clone, Debug, Error)]
pub enum SubmitRejection {
    /// User-facing message, shown as the form error as is.
    #[error("{0}")]
    Message(String),
    #[error("unexpected submission failure: {0}")]
    Unexpected(Arc<dyn std::error::Error + Send + Sync>),
}

impl SubmitRejection {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    pub fn unexpected(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unexpected(Arc::new(error))
    }
}

/// Active subset and order of fields for a submission or serialization.
#[derive(Clone, Default)]
pub enum FieldSet {
    #[default]
    All,
    Names(Vec<String>),
    Derived(DeriveFieldSetFn),
}

impl FieldSet {
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Names(names.into_iter().map(Into::into).collect())
    }

    pub fn derived(f: impl Fn(Vec<String>) -> Vec<String> + Send + Sync + 'static) -> Self {
        Self::Derived(Arc::new(f))
    }

    pub(super) fn resolve(&self, default: Vec<String>) -> Vec<String> {
        match self {
            FieldSet::All => default,
            FieldSet::Names(names) => names.clone(),
            FieldSet::Derived(f) => f(default),
        }
    }
}

impl Debug for FieldSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldSet::All => f.write_str("All"),
            FieldSet::Names(names) => f.debug_tuple("Names").field(names).finish(),
            FieldSet::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

#[derive(Clone, Default)]
pub struct SubmitOptions {
    pub field_set: FieldSet,
    pub on_invalid: Option<OnInvalidFn>,
}

impl SubmitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field_set(mut self, field_set: FieldSet) -> Self {
        self.field_set = field_set;
        self
    }

    pub fn on_invalid(mut self, f: impl Fn(&FieldErrors) + Send + Sync + 'static) -> Self {
        self.on_invalid = Some(Arc::new(f));
        self
    }
}

impl Debug for SubmitOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmitOptions")
            .field("field_set", &self.field_set)
            .field("has_on_invalid", &self.on_invalid.is_some())
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub required_message: String,
    pub pattern_message: String,
    pub constraint_message: String,
    pub invalid_fields_message: String,
    pub unexpected_error_message: String,
    pub max_change_cascade: usize,
    pub discard_stale_fetches: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            required_message: "This field is required".to_string(),
            pattern_message: "Invalid format".to_string(),
            constraint_message: "Invalid value".to_string(),
            invalid_fields_message: "There are invalid fields".to_string(),
            unexpected_error_message: "An unexpected error occurred".to_string(),
            max_change_cascade: 64,
            discard_stale_fetches: true,
        }
    }
}

impl EngineOptions {
    pub fn from_json_str(source: &str) -> FormResult<Self> {
        serde_json::from_str(source).map_err(FormError::InvalidOptions)
    }
}

/// Author-supplied description of one form: its fields, data sources and submit hooks.
///
/// The field definition function, dynamic properties, `on_change`, data-source parameter
/// functions, data-source factories and fetch functions run while the engine holds its
/// registry lock, and must not call back into the [`FormEngine`](super::FormEngine).
/// Submit handlers, fetch futures, transforms and the `on_save`/`on_error`/`on_invalid`
/// hooks run after the lock is released and may read the engine freely.
#[derive(Clone)]
pub struct FormConfig {
    pub(super) form_key: FormKey,
    pub(super) ephemeral: bool,
    pub(super) options: FormOptions,
    pub(super) fields: FieldsFn,
    pub(super) data_sources: Vec<(String, DataSourceFactory)>,
    pub(super) submit: Option<SubmitFn>,
    pub(super) on_save: Option<OnSaveFn>,
    pub(super) on_error: Option<OnErrorFn>,
    pub(super) additional_fields: Vec<FieldDefinition>,
    pub(super) altered_fields: Vec<(String, AlterFieldFn)>,
}

impl FormConfig {
    pub fn new(
        form_key: impl Into<FormKey>,
        fields: impl Fn(&FormOptions, &Bindings) -> Option<Vec<FieldDefinition>>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            form_key: form_key.into(),
            ephemeral: false,
            options: FormOptions::default(),
            fields: Arc::new(fields),
            data_sources: Vec::new(),
            submit: None,
            on_save: None,
            on_error: None,
            additional_fields: Vec::new(),
            altered_fields: Vec::new(),
        }
    }

    /// Ephemeral form under a generated key; its slot is dropped on reset.
    pub fn auto(
        fields: impl Fn(&FormOptions, &Bindings) -> Option<Vec<FieldDefinition>>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        let mut config = Self::new(FormKey::auto(), fields);
        config.ephemeral = true;
        config
    }

    pub fn form_key(&self) -> &FormKey {
        &self.form_key
    }

    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    pub fn options(mut self, options: FormOptions) -> Self {
        self.options = options;
        self
    }

    pub fn data_source(
        mut self,
        name: impl Into<String>,
        factory: impl Fn(&FormOptions) -> DataSourceDefinition + Send + Sync + 'static,
    ) -> Self {
        self.data_sources.push((name.into(), Arc::new(factory)));
        self
    }

    pub fn on_submit<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(&FormOptions, SerializedValues, &Bindings) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, SubmitRejection>> + Send + 'static,
    {
        self.submit = Some(Arc::new(move |options, values, bindings| {
            handler(options, values, bindings).boxed()
        }));
        self
    }

    pub fn on_save(mut self, f: impl Fn(&FormOptions, &Value) + Send + Sync + 'static) -> Self {
        self.on_save = Some(Arc::new(f));
        self
    }

    pub fn on_error(
        mut self,
        f: impl Fn(&FormOptions, &SubmitRejection) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Extra field merged after the author's fields; transient unless declared otherwise.
    /// An extra field replacing an author field of the same name keeps that field's
    /// transient flag unless it declares its own.
    pub fn additional_field(mut self, field: FieldDefinition) -> Self {
        self.additional_fields.push(field);
        self
    }

    pub fn alter_field(
        mut self,
        name: impl Into<String>,
        f: impl Fn(FieldDefinition) -> FieldDefinition + Send + Sync + 'static,
    ) -> Self {
        self.altered_fields.push((name.into(), Arc::new(f)));
        self
    }

    pub(super) fn resolve_fields(&self, bindings: &Bindings) -> Option<Vec<FieldDefinition>> {
        let mut fields = (self.fields)(&self.options, bindings)?;
        for (name, alter) in &self.altered_fields {
            if let Some(index) = fields.iter().position(|field| &field.name == name) {
                let field = fields.remove(index);
                fields.insert(index, alter(field));
            }
        }
        for extra in &self.additional_fields {
            let mut extra = extra.clone();
            match fields.iter().position(|field| field.name == extra.name) {
                Some(index) => {
                    if extra.transient.is_none() {
                        extra.transient = fields[index].transient.clone();
                    }
                    fields[index] = extra;
                }
                None => fields.push(extra.default_transient(true)),
            }
        }
        Some(fields)
    }

    pub(super) fn data_source_definitions(&self) -> IndexMap<String, DataSourceDefinition> {
        self.data_sources
            .iter()
            .map(|(name, factory)| (name.clone(), factory(&self.options)))
            .collect()
    }
}

impl Debug for FormConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormConfig")
            .field("form_key", &self.form_key)
            .field("ephemeral", &self.ephemeral)
            .field("options", &self.options)
            .field(
                "data_sources",
                &self
                    .data_sources
                    .iter()
                    .map(|(name, _)| name.as_str())
                    .collect::<Vec<_>>(),
            )
            .field("has_submit", &self.submit.is_some())
            .finish_non_exhaustive()
    }
}
