use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    Text,
    Textarea,
    Password,
    Email,
    Number,
    Checkbox,
    Toggle,
    Select,
    SelectMulti,
    Tags,
    Attributes,
    Team,
    Date,
    Hidden,
    Json,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Representation {
    Text,
    Number,
    Boolean,
    Scalar,
    List,
    Map,
    Team,
    Raw,
}

impl FieldKind {
    fn representation(self) -> Representation {
        match self {
            FieldKind::Text
            | FieldKind::Textarea
            | FieldKind::Password
            | FieldKind::Email
            | FieldKind::Date => Representation::Text,
            FieldKind::Number => Representation::Number,
            FieldKind::Checkbox | FieldKind::Toggle => Representation::Boolean,
            FieldKind::Select => Representation::Scalar,
            FieldKind::SelectMulti | FieldKind::Tags => Representation::List,
            FieldKind::Attributes => Representation::Map,
            FieldKind::Team => Representation::Team,
            FieldKind::Hidden | FieldKind::Json => Representation::Raw,
        }
    }

    /// Kinds whose value is free-form text typed by the user; only these take a pattern.
    pub fn is_plain_text(self) -> bool {
        matches!(
            self,
            FieldKind::Text | FieldKind::Textarea | FieldKind::Password | FieldKind::Email
        )
    }

    pub fn default_value(self) -> FieldValue {
        match self.representation() {
            Representation::Text => FieldValue::Text(String::new()),
            Representation::Boolean => FieldValue::Bool(false),
            Representation::List => FieldValue::List(Vec::new()),
            Representation::Map => FieldValue::Map(BTreeMap::new()),
            Representation::Number
            | Representation::Scalar
            | Representation::Team
            | Representation::Raw => FieldValue::Null,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum FieldValue {
    #[default]
    Null,
    Bool(bool),
    Number(Decimal),
    Text(String),
    List(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(text) => text.is_empty(),
            FieldValue::List(items) => items.is_empty(),
            FieldValue::Map(entries) => entries.is_empty(),
            FieldValue::Bool(_) | FieldValue::Number(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            FieldValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, FieldValue>> {
        match self {
            FieldValue::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(value) => Value::Bool(*value),
            FieldValue::Number(value) => decimal_to_json(*value),
            FieldValue::Text(text) => Value::String(text.clone()),
            FieldValue::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            FieldValue::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

/// Coerces an author-supplied value into the representation dictated by `kind`.
/// A missing value yields the kind's default.
pub fn initialize_value(kind: FieldKind, value: Option<FieldValue>) -> FieldValue {
    let Some(value) = value else {
        return kind.default_value();
    };

    match kind.representation() {
        Representation::Text => match value {
            FieldValue::Text(text) => FieldValue::Text(text),
            FieldValue::Number(number) => FieldValue::Text(number.to_string()),
            FieldValue::Bool(flag) => FieldValue::Text(flag.to_string()),
            _ => FieldValue::Text(String::new()),
        },
        Representation::Number => match value {
            FieldValue::Number(number) => FieldValue::Number(number),
            FieldValue::Text(text) => Decimal::from_str(text.trim())
                .map(FieldValue::Number)
                .unwrap_or(FieldValue::Null),
            _ => FieldValue::Null,
        },
        Representation::Boolean => match value {
            FieldValue::Bool(flag) => FieldValue::Bool(flag),
            FieldValue::Text(text) => match text.trim() {
                "true" => FieldValue::Bool(true),
                "false" => FieldValue::Bool(false),
                other => FieldValue::Bool(!other.is_empty()),
            },
            FieldValue::Number(number) => FieldValue::Bool(!number.is_zero()),
            other => FieldValue::Bool(!other.is_empty()),
        },
        Representation::Scalar => match value {
            FieldValue::List(_) | FieldValue::Map(_) => FieldValue::Null,
            scalar => scalar,
        },
        Representation::List => match value {
            FieldValue::List(items) => FieldValue::List(items),
            FieldValue::Map(_) => FieldValue::List(Vec::new()),
            scalar if scalar.is_empty() => FieldValue::List(Vec::new()),
            scalar => FieldValue::List(vec![scalar]),
        },
        Representation::Map => match value {
            FieldValue::Map(entries) => FieldValue::Map(entries),
            _ => FieldValue::Map(BTreeMap::new()),
        },
        Representation::Team => match value {
            FieldValue::Text(text) if text.is_empty() => FieldValue::Null,
            FieldValue::Text(text) => FieldValue::Text(text),
            FieldValue::Map(entries) => FieldValue::Map(entries),
            _ => FieldValue::Null,
        },
        Representation::Raw => value,
    }
}

fn decimal_to_json(value: Decimal) -> Value {
    if value.fract().is_zero() {
        if let Some(integer) = value.to_i64() {
            return Value::from(integer);
        }
    }
    value
        .to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn decimal_from_json(number: &serde_json::Number) -> Option<Decimal> {
    if let Some(integer) = number.as_i64() {
        return Some(Decimal::from(integer));
    }
    if let Some(integer) = number.as_u64() {
        return Some(Decimal::from(integer));
    }
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(flag) => FieldValue::Bool(flag),
            Value::Number(number) => decimal_from_json(&number)
                .map(FieldValue::Number)
                .unwrap_or(FieldValue::Null),
            Value::String(text) => FieldValue::Text(text),
            Value::Array(items) => FieldValue::List(items.into_iter().map(Self::from).collect()),
            Value::Object(entries) => FieldValue::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Self::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&FieldValue> for Value {
    fn from(value: &FieldValue) -> Self {
        value.to_json()
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(Decimal::from(value))
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Number(Decimal::from(value))
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        FieldValue::Number(value)
    }
}

impl<T> From<Vec<T>> for FieldValue
where
    T: Into<FieldValue>,
{
    fn from(values: Vec<T>) -> Self {
        FieldValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T> From<Option<T>> for FieldValue
where
    T: Into<FieldValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}
