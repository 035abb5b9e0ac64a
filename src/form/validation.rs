use super::field::FieldProps;
use super::value::{FieldKind, FieldValue};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Rule {
    Required,
    Pattern,
    Constraint,
}

/// Errors are always reported in this order.
pub const RULE_ORDER: [Rule; 3] = [Rule::Required, Rule::Pattern, Rule::Constraint];

impl Rule {
    pub fn check(self, kind: FieldKind, value: &FieldValue, props: &FieldProps) -> Option<String> {
        match self {
            Rule::Required => {
                (props.required && value.is_empty()).then(|| props.required_message.clone())
            }
            Rule::Pattern => {
                if !kind.is_plain_text() {
                    return None;
                }
                let text = value.as_str().filter(|text| !text.is_empty())?;
                let pattern = props.pattern.as_ref()?;
                (!pattern.is_match(text)).then(|| props.pattern_message.clone())
            }
            Rule::Constraint => (!props.constraint).then(|| props.constraint_message.clone()),
        }
    }
}

pub fn validate(kind: FieldKind, value: &FieldValue, props: &FieldProps) -> Vec<String> {
    RULE_ORDER
        .iter()
        .filter_map(|rule| rule.check(kind, value, props))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::field::Pattern;

    fn props() -> FieldProps {
        FieldProps {
            label: "Port".into(),
            enabled: true,
            required: false,
            required_message: "This field is required".into(),
            pattern: None,
            pattern_message: "Invalid format".into(),
            constraint: true,
            constraint_message: "Invalid value".into(),
            placeholder: String::new(),
            options: Vec::new(),
            search: false,
            visible: true,
            transient: false,
        }
    }

    #[test]
    fn required_fails_on_empty_values_of_any_shape() {
        let props = FieldProps {
            required: true,
            ..props()
        };
        for value in [
            FieldValue::Null,
            FieldValue::from(""),
            FieldValue::List(Vec::new()),
        ] {
            assert_eq!(
                validate(FieldKind::Text, &value, &props),
                vec!["This field is required"]
            );
        }
        assert!(validate(FieldKind::Text, &"8080".into(), &props).is_empty());
    }

    #[test]
    fn pattern_applies_only_to_non_empty_plain_text() {
        let props = FieldProps {
            pattern: Some(Pattern::new(r"^\d+$").expect("valid pattern")),
            ..props()
        };
        assert_eq!(
            validate(FieldKind::Text, &"80a".into(), &props),
            vec!["Invalid format"]
        );
        assert!(validate(FieldKind::Text, &"".into(), &props).is_empty());
        assert!(validate(FieldKind::Select, &"80a".into(), &props).is_empty());
    }

    #[test]
    fn errors_keep_required_pattern_constraint_order() {
        let props = FieldProps {
            required: true,
            pattern: Some(Pattern::new(r"^\d+$").expect("valid pattern")),
            constraint: false,
            ..props()
        };
        assert_eq!(
            validate(FieldKind::Text, &"abc".into(), &props),
            vec!["Invalid format", "Invalid value"]
        );
        assert_eq!(
            validate(FieldKind::Text, &"".into(), &props),
            vec!["This field is required", "Invalid value"]
        );
    }
}
