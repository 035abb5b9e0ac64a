use futures::FutureExt;

use super::binding::{Bindings, build_bindings};
use super::config::{
    EngineOptions, FieldErrors, FieldSet, SerializedValues, SubmitOptions, SubmitRejection,
};
use super::controller::{FormError, FormResult};
use super::reducer::{Action, Effect};
use super::state::FormState;
use super::store::FormSlot;
use crate::id::FormKey;

/// Names of the fields taking part in a submission, in field-set order. Names that do
/// not match a field are skipped.
pub(super) fn active_field_set(state: &FormState, field_set: &FieldSet) -> Vec<String> {
    field_set
        .resolve(state.field_names())
        .into_iter()
        .filter(|name| {
            let known = state.field(name).is_some();
            if !known {
                tracing::warn!(
                    form = %state.form_key,
                    field = %name,
                    "field set names an unknown field"
                );
            }
            known
        })
        .collect()
}

pub(super) fn serialize(
    slot: &FormSlot,
    bindings: &Bindings,
    active: &[String],
) -> SerializedValues {
    active
        .iter()
        .filter_map(|name| {
            let field = slot.state.field(name)?;
            if field.props.transient {
                return None;
            }
            let serializer = slot
                .definitions
                .as_ref()
                .and_then(|definitions| definitions.get(name))
                .and_then(|definition| definition.serialize.as_ref());
            let value = match serializer {
                Some(serialize) => serialize(bindings),
                None => field.value.to_json(),
            };
            Some((name.clone(), value))
        })
        .collect()
}

pub(super) fn collect_errors(state: &FormState, active: &[String]) -> FieldErrors {
    active
        .iter()
        .filter_map(|name| {
            let field = state.field(name)?;
            (!field.is_valid()).then(|| (name.clone(), field.errors.clone()))
        })
        .collect()
}

/// Serialized values of a form without submitting it.
pub(super) fn serialize_form(
    slot: &FormSlot,
    field_set: &FieldSet,
) -> FormResult<SerializedValues> {
    if slot.state.fields.is_none() {
        return Err(FormError::FieldsNotReady(slot.state.form_key.clone()));
    }
    let bindings = build_bindings(&slot.state);
    let active = active_field_set(&slot.state, field_set);
    Ok(serialize(slot, &bindings, &active))
}

pub(super) fn begin(slot: &mut FormSlot, submit_options: SubmitOptions) -> FormResult<Vec<Effect>> {
    let form_key = slot.state.form_key.clone();
    if slot.state.submitting {
        return Err(FormError::AlreadySubmitting(form_key));
    }
    if slot.state.fields.is_none() {
        return Err(FormError::FieldsNotReady(form_key));
    }
    let Some(handler) = slot.config.submit.clone() else {
        return Err(FormError::MissingSubmitHandler(form_key));
    };
    slot.state.submit_count = slot.state.submit_count.saturating_add(1);

    let bindings = build_bindings(&slot.state);
    let active = active_field_set(&slot.state, &submit_options.field_set);
    let errors = collect_errors(&slot.state, &active);
    if !errors.is_empty() {
        tracing::debug!(
            form = %form_key,
            invalid = errors.len(),
            "submission blocked by invalid fields"
        );
        let mut effects = vec![Effect::Dispatch(Action::SubmitFieldErrors {
            names: errors.keys().cloned().collect(),
        })];
        if let Some(on_invalid) = submit_options.on_invalid {
            effects.push(Effect::Callback(Box::new(move || on_invalid(&errors))));
        }
        return Ok(effects);
    }

    let values = serialize(slot, &bindings, &active);
    slot.state.submitting = true;
    let form_options = slot.state.options.clone();
    let task = async move {
        match handler(&form_options, values, &bindings).await {
            Ok(result) => Action::SubmitSuccess { result },
            Err(reason) => Action::SubmitError { reason },
        }
    }
    .boxed();
    Ok(vec![Effect::Spawn(task)])
}

/// User-facing message for a rejected submission. Unexpected failures are logged and
/// replaced with the generic message.
pub(super) fn rejection_message(
    form_key: &FormKey,
    reason: &SubmitRejection,
    options: &EngineOptions,
) -> String {
    match reason {
        SubmitRejection::Message(message) => message.clone(),
        SubmitRejection::Unexpected(error) => {
            tracing::error!(form = %form_key, %error, "unexpected submission failure");
            options.unexpected_error_message.clone()
        }
    }
}
