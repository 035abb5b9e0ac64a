use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use super::binding::Bindings;
use super::config::EngineOptions;
use super::controller::{FormError, FormResult};
use super::value::{FieldKind, FieldValue};
use crate::id::{FormKey, field_id};

pub type ComputedFn<T> = Arc<dyn Fn(&Bindings) -> Option<T> + Send + Sync>;
pub type OnChangeFn = Arc<dyn Fn(&Bindings, &mut ChangeContext) + Send + Sync>;
pub type SerializeFn = Arc<dyn Fn(&Bindings) -> Value + Send + Sync>;

/// A field property that is either fixed or derived from the current bindings.
/// A computed function returning `None` falls back to the property's default.
#[derive(Clone)]
pub enum Dynamic<T> {
    Static(T),
    Computed(ComputedFn<T>),
}

impl<T> Dynamic<T>
where
    T: Clone + 'static,
{
    pub fn computed(f: impl Fn(&Bindings) -> T + Send + Sync + 'static) -> Self {
        Self::Computed(Arc::new(move |bindings| Some(f(bindings))))
    }

    pub fn partial(f: impl Fn(&Bindings) -> Option<T> + Send + Sync + 'static) -> Self {
        Self::Computed(Arc::new(f))
    }

    pub fn evaluate(&self, bindings: &Bindings) -> Option<T> {
        match self {
            Dynamic::Static(value) => Some(value.clone()),
            Dynamic::Computed(f) => f(bindings),
        }
    }

    pub fn evaluate_or(&self, bindings: &Bindings, default: T) -> T {
        self.evaluate(bindings).unwrap_or(default)
    }
}

impl<T: Debug> Debug for Dynamic<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Dynamic::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Dynamic::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl<T> From<T> for Dynamic<T> {
    fn from(value: T) -> Self {
        Dynamic::Static(value)
    }
}

impl From<&str> for Dynamic<String> {
    fn from(value: &str) -> Self {
        Dynamic::Static(value.to_string())
    }
}

#[derive(Clone, Debug)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(source: &str) -> FormResult<Self> {
        Regex::new(source)
            .map(Self)
            .map_err(|error| FormError::InvalidPattern {
                pattern: source.to_string(),
                source: error,
            })
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SelectOption {
    pub value: FieldValue,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<FieldValue>) -> Self {
        let value = value.into();
        let label = match &value {
            FieldValue::Text(text) => text.clone(),
            other => other.to_json().to_string(),
        };
        Self { value, label }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// Handed to `on_change` so a field can update other fields. Every queued update is
/// dispatched as its own `SetValue` after the triggering change has been digested.
#[derive(Debug, Default)]
pub struct ChangeContext {
    updates: Vec<(String, FieldValue)>,
}

impl ChangeContext {
    pub fn set_value(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.updates.push((name.into(), value.into()));
    }

    pub(super) fn into_updates(self) -> Vec<(String, FieldValue)> {
        self.updates
    }
}

#[derive(Clone)]
pub struct FieldDefinition {
    pub(super) name: String,
    pub(super) kind: FieldKind,
    pub(super) label: Option<Dynamic<String>>,
    pub(super) initial_value: Option<Dynamic<FieldValue>>,
    pub(super) enabled: Dynamic<bool>,
    pub(super) required: Dynamic<bool>,
    pub(super) required_message: Option<Dynamic<String>>,
    pub(super) pattern: Option<Dynamic<Pattern>>,
    pub(super) pattern_message: Option<Dynamic<String>>,
    pub(super) constraint: Dynamic<bool>,
    pub(super) constraint_message: Option<Dynamic<String>>,
    pub(super) placeholder: Dynamic<String>,
    pub(super) options: Dynamic<Vec<SelectOption>>,
    pub(super) search: Dynamic<bool>,
    pub(super) visible: Dynamic<bool>,
    pub(super) transient: Option<Dynamic<bool>>,
    pub(super) serialize: Option<SerializeFn>,
    pub(super) on_change: Option<OnChangeFn>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            label: None,
            initial_value: None,
            enabled: Dynamic::Static(true),
            required: Dynamic::Static(false),
            required_message: None,
            pattern: None,
            pattern_message: None,
            constraint: Dynamic::Static(true),
            constraint_message: None,
            placeholder: Dynamic::Static(String::new()),
            options: Dynamic::Static(Vec::new()),
            search: Dynamic::Static(false),
            visible: Dynamic::Static(true),
            transient: None,
            serialize: None,
            on_change: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn label(mut self, label: impl Into<Dynamic<String>>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn initial_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.initial_value = Some(Dynamic::Static(value.into()));
        self
    }

    pub fn initial_value_with(
        mut self,
        f: impl Fn(&Bindings) -> Option<FieldValue> + Send + Sync + 'static,
    ) -> Self {
        self.initial_value = Some(Dynamic::partial(f));
        self
    }

    pub fn enabled(mut self, enabled: impl Into<Dynamic<bool>>) -> Self {
        self.enabled = enabled.into();
        self
    }

    pub fn required(mut self, required: impl Into<Dynamic<bool>>) -> Self {
        self.required = required.into();
        self
    }

    pub fn required_message(mut self, message: impl Into<Dynamic<String>>) -> Self {
        self.required_message = Some(message.into());
        self
    }

    pub fn pattern(mut self, pattern: impl Into<Dynamic<Pattern>>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn pattern_message(mut self, message: impl Into<Dynamic<String>>) -> Self {
        self.pattern_message = Some(message.into());
        self
    }

    /// Predicate over the bindings; `false` adds the constraint message to the field errors.
    pub fn constraint(mut self, f: impl Fn(&Bindings) -> bool + Send + Sync + 'static) -> Self {
        self.constraint = Dynamic::computed(f);
        self
    }

    pub fn constraint_message(mut self, message: impl Into<Dynamic<String>>) -> Self {
        self.constraint_message = Some(message.into());
        self
    }

    pub fn placeholder(mut self, placeholder: impl Into<Dynamic<String>>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    pub fn options(mut self, options: impl Into<Dynamic<Vec<SelectOption>>>) -> Self {
        self.options = options.into();
        self
    }

    pub fn search(mut self, search: impl Into<Dynamic<bool>>) -> Self {
        self.search = search.into();
        self
    }

    pub fn visible(mut self, visible: impl Into<Dynamic<bool>>) -> Self {
        self.visible = visible.into();
        self
    }

    pub fn transient(mut self, transient: impl Into<Dynamic<bool>>) -> Self {
        self.transient = Some(transient.into());
        self
    }

    pub fn serialize_with(
        mut self,
        f: impl Fn(&Bindings) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.serialize = Some(Arc::new(f));
        self
    }

    pub fn on_change(
        mut self,
        f: impl Fn(&Bindings, &mut ChangeContext) + Send + Sync + 'static,
    ) -> Self {
        self.on_change = Some(Arc::new(f));
        self
    }

    pub(super) fn default_transient(mut self, transient: bool) -> Self {
        if self.transient.is_none() {
            self.transient = Some(Dynamic::Static(transient));
        }
        self
    }

    pub(super) fn evaluate_initial_value(&self, bindings: &Bindings) -> Option<FieldValue> {
        self.initial_value
            .as_ref()
            .and_then(|value| value.evaluate(bindings))
    }

    pub(super) fn evaluate(&self, bindings: &Bindings, options: &EngineOptions) -> FieldProps {
        let message = |property: &Option<Dynamic<String>>, default: &str| {
            property
                .as_ref()
                .and_then(|message| message.evaluate(bindings))
                .unwrap_or_else(|| default.to_string())
        };

        FieldProps {
            label: message(&self.label, self.name.as_str()),
            enabled: self.enabled.evaluate_or(bindings, true),
            required: self.required.evaluate_or(bindings, false),
            required_message: message(
                &self.required_message,
                options.required_message.as_str(),
            ),
            pattern: self
                .pattern
                .as_ref()
                .and_then(|pattern| pattern.evaluate(bindings)),
            pattern_message: message(
                &self.pattern_message,
                options.pattern_message.as_str(),
            ),
            constraint: self.constraint.evaluate_or(bindings, true),
            constraint_message: message(
                &self.constraint_message,
                options.constraint_message.as_str(),
            ),
            placeholder: self.placeholder.evaluate_or(bindings, String::new()),
            options: self.options.evaluate_or(bindings, Vec::new()),
            search: self.search.evaluate_or(bindings, false),
            visible: self.visible.evaluate_or(bindings, true),
            transient: self
                .transient
                .as_ref()
                .map_or(false, |transient| transient.evaluate_or(bindings, false)),
        }
    }
}

impl Debug for FieldDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDefinition")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("has_serializer", &self.serialize.is_some())
            .field("has_on_change", &self.on_change.is_some())
            .finish_non_exhaustive()
    }
}

/// Dynamic properties of a field resolved against the bindings of the last digest.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldProps {
    pub label: String,
    pub enabled: bool,
    pub required: bool,
    pub required_message: String,
    pub pattern: Option<Pattern>,
    pub pattern_message: String,
    pub constraint: bool,
    pub constraint_message: String,
    pub placeholder: String,
    pub options: Vec<SelectOption>,
    pub search: bool,
    pub visible: bool,
    pub transient: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldState {
    pub id: String,
    pub name: String,
    pub kind: FieldKind,
    pub value: FieldValue,
    pub initial_value: FieldValue,
    pub dirty: bool,
    pub touched: bool,
    pub focused: bool,
    pub errors: Vec<String>,
    pub props: FieldProps,
}

impl FieldState {
    pub(super) fn new(form_key: &FormKey, definition: &FieldDefinition, value: FieldValue) -> Self {
        Self {
            id: field_id(form_key, &definition.name),
            name: definition.name.clone(),
            kind: definition.kind,
            initial_value: value.clone(),
            value,
            dirty: false,
            touched: false,
            focused: false,
            errors: Vec::new(),
            props: FieldProps {
                label: definition.name.clone(),
                enabled: true,
                required: false,
                required_message: String::new(),
                pattern: None,
                pattern_message: String::new(),
                constraint: true,
                constraint_message: String::new(),
                placeholder: String::new(),
                options: Vec::new(),
                search: false,
                visible: true,
                transient: false,
            },
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub(super) fn commit(&mut self) {
        self.initial_value = self.value.clone();
        self.dirty = false;
        self.touched = false;
    }

    pub(super) fn revert(&mut self) {
        self.value = self.initial_value.clone();
        self.dirty = false;
        self.touched = false;
    }
}
