//! Fixed four-stage recomputation pass run after every state-changing action:
//! bindings, field initialization, field evaluation and validation, data-source
//! parameters. The order is fixed, so a data source's parameters only ever see data
//! resolved before this pass; anything resolved later is picked up by the digest
//! that the resolution itself triggers.

use indexmap::IndexMap;

use super::binding::{Bindings, build_bindings};
use super::config::EngineOptions;
use super::field::FieldState;
use super::store::FormSlot;
use super::validation::validate;
use super::value::initialize_value;

pub(super) fn digest(slot: &mut FormSlot, options: &EngineOptions) -> Bindings {
    let mut bindings = build_bindings(&slot.state);

    if slot.state.fields.is_none() {
        if !initialize_fields(slot, &bindings) {
            return bindings;
        }
        bindings = build_bindings(&slot.state);
    }

    evaluate_fields(slot, &bindings, options);
    evaluate_data_sources(slot, &bindings);
    bindings
}

fn initialize_fields(slot: &mut FormSlot, bindings: &Bindings) -> bool {
    let Some(resolved) = slot.config.resolve_fields(bindings) else {
        return false;
    };

    let mut fields = IndexMap::with_capacity(resolved.len());
    let mut definitions = IndexMap::with_capacity(resolved.len());
    for definition in resolved {
        let value = initialize_value(definition.kind, definition.evaluate_initial_value(bindings));
        let field = FieldState::new(&slot.state.form_key, &definition, value);
        fields.insert(definition.name.clone(), field);
        definitions.insert(definition.name.clone(), definition);
    }

    tracing::debug!(
        form = %slot.state.form_key,
        fields = fields.len(),
        "form fields initialized"
    );
    slot.state.fields = Some(fields);
    slot.definitions = Some(definitions);
    true
}

fn evaluate_fields(slot: &mut FormSlot, bindings: &Bindings, options: &EngineOptions) {
    let (Some(fields), Some(definitions)) =
        (slot.state.fields.as_mut(), slot.definitions.as_ref())
    else {
        return;
    };

    for (name, field) in fields.iter_mut() {
        let Some(definition) = definitions.get(name) else {
            continue;
        };
        field.props = definition.evaluate(bindings, options);
        field.errors = validate(field.kind, &field.value, &field.props);
    }
}

fn evaluate_data_sources(slot: &mut FormSlot, bindings: &Bindings) {
    for (name, source) in slot.state.data_sources.iter_mut() {
        let Some(definition) = slot.data_sources.get(name) else {
            continue;
        };
        if definition.is_dynamic() {
            source.params = definition.compute_params(bindings);
        }
    }
}
