use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use super::config::{EngineOptions, FormConfig, SubmitOptions, SubmitRejection};
use super::controller::{FormError, FormResult};
use super::data_source::{DataSourceStatus, FetchError, FetchTicket};
use super::digest::digest;
use super::field::{ChangeContext, FieldState};
use super::store::FormSlot;
use super::submit;
use super::value::{FieldValue, initialize_value};

/// Deferred work produced by a side-effecting action; resolves to the action that
/// feeds its outcome back into the reducer.
pub type Task = BoxFuture<'static, Action>;
pub type Callback = Box<dyn FnOnce() + Send>;

#[derive(Clone, Debug)]
pub enum Action {
    Configure(FormConfig),
    SetValue {
        name: String,
        value: FieldValue,
        trigger_change: bool,
    },
    Focus {
        name: String,
    },
    Blur {
        name: String,
    },
    CallDataSource {
        name: String,
    },
    ClearDataSource {
        name: String,
    },
    ResolveDataSource {
        name: String,
        data: Value,
        ticket: FetchTicket,
    },
    RejectDataSource {
        name: String,
        error: FetchError,
        ticket: FetchTicket,
    },
    Reset,
    Submit(SubmitOptions),
    SubmitSuccess {
        result: Value,
    },
    SubmitError {
        reason: SubmitRejection,
    },
    SubmitFieldErrors {
        names: Vec<String>,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Configure(_) => "configure",
            Action::SetValue { .. } => "set-value",
            Action::Focus { .. } => "focus",
            Action::Blur { .. } => "blur",
            Action::CallDataSource { .. } => "call-data-source",
            Action::ClearDataSource { .. } => "clear-data-source",
            Action::ResolveDataSource { .. } => "resolve-data-source",
            Action::RejectDataSource { .. } => "reject-data-source",
            Action::Reset => "reset",
            Action::Submit(_) => "submit",
            Action::SubmitSuccess { .. } => "submit-success",
            Action::SubmitError { .. } => "submit-error",
            Action::SubmitFieldErrors { .. } => "submit-field-errors",
        }
    }

    /// Actions after which the scheduler re-checks every data source.
    pub fn schedules_fetches(&self) -> bool {
        matches!(
            self,
            Action::Configure(_)
                | Action::ResolveDataSource { .. }
                | Action::RejectDataSource { .. }
                | Action::Reset
                | Action::SetValue { .. }
                | Action::SubmitSuccess { .. }
        )
    }
}

pub enum Effect {
    Dispatch(Action),
    Spawn(Task),
    Callback(Callback),
}

pub(super) fn reduce(
    slot: &mut FormSlot,
    action: Action,
    options: &EngineOptions,
) -> FormResult<Vec<Effect>> {
    match action {
        Action::Configure(_) => {
            digest(slot, options);
            Ok(Vec::new())
        }
        Action::SetValue {
            name,
            value,
            trigger_change,
        } => set_value(slot, name, value, trigger_change, options),
        Action::Focus { name } => {
            field_mut(slot, &name)?.focused = true;
            Ok(Vec::new())
        }
        Action::Blur { name } => {
            let field = field_mut(slot, &name)?;
            field.focused = false;
            field.touched = true;
            Ok(Vec::new())
        }
        Action::CallDataSource { name } => call_data_source(slot, name),
        Action::ClearDataSource { name } => {
            slot.data_source_mut(&name)?.clear();
            digest(slot, options);
            Ok(Vec::new())
        }
        Action::ResolveDataSource { name, data, ticket } => {
            if !accept_fetch_outcome(slot, &name, ticket, DataSourceStatus::Resolved, options)? {
                return Ok(Vec::new());
            }
            let source = slot.data_source_mut(&name)?;
            source.status = DataSourceStatus::Resolved;
            source.data = data;
            source.error = None;
            digest(slot, options);
            Ok(Vec::new())
        }
        Action::RejectDataSource {
            name,
            error,
            ticket,
        } => {
            if !accept_fetch_outcome(slot, &name, ticket, DataSourceStatus::Rejected, options)? {
                return Ok(Vec::new());
            }
            tracing::warn!(
                form = %slot.state.form_key,
                data_source = %name,
                %error,
                "data source fetch rejected"
            );
            let source = slot.data_source_mut(&name)?;
            source.status = DataSourceStatus::Rejected;
            source.error = Some(error.message().to_string());
            digest(slot, options);
            Ok(Vec::new())
        }
        Action::Reset => {
            if let Some(fields) = slot.state.fields.as_mut() {
                fields.values_mut().for_each(FieldState::revert);
            }
            digest(slot, options);
            Ok(Vec::new())
        }
        Action::Submit(submit_options) => submit::begin(slot, submit_options),
        Action::SubmitSuccess { result } => {
            slot.state.submitting = false;
            slot.state.error = None;
            if let Some(fields) = slot.state.fields.as_mut() {
                fields.values_mut().for_each(FieldState::commit);
            }
            digest(slot, options);

            let Some(on_save) = slot.config.on_save.clone() else {
                return Ok(Vec::new());
            };
            let form_options = slot.state.options.clone();
            Ok(vec![Effect::Callback(Box::new(move || {
                on_save(&form_options, &result)
            }))])
        }
        Action::SubmitError { reason } => {
            let message = submit::rejection_message(&slot.state.form_key, &reason, options);
            slot.state.submitting = false;
            slot.state.error = Some(message);

            let Some(on_error) = slot.config.on_error.clone() else {
                return Ok(Vec::new());
            };
            let form_options = slot.state.options.clone();
            Ok(vec![Effect::Callback(Box::new(move || {
                on_error(&form_options, &reason)
            }))])
        }
        Action::SubmitFieldErrors { names } => {
            slot.state.submitting = false;
            slot.state.error = Some(options.invalid_fields_message.clone());
            if let Some(fields) = slot.state.fields.as_mut() {
                for name in &names {
                    if let Some(field) = fields.get_mut(name) {
                        field.touched = true;
                    }
                }
            }
            Ok(Vec::new())
        }
    }
}

fn set_value(
    slot: &mut FormSlot,
    name: String,
    value: FieldValue,
    trigger_change: bool,
    options: &EngineOptions,
) -> FormResult<Vec<Effect>> {
    let field = field_mut(slot, &name)?;
    field.value = initialize_value(field.kind, Some(value));
    field.dirty = field.value != field.initial_value;
    field.touched = true;

    let bindings = digest(slot, options);
    if !trigger_change {
        return Ok(Vec::new());
    }

    let Some(on_change) = slot
        .definitions
        .as_ref()
        .and_then(|definitions| definitions.get(&name))
        .and_then(|definition| definition.on_change.clone())
    else {
        return Ok(Vec::new());
    };

    let mut context = ChangeContext::default();
    on_change(&bindings, &mut context);
    Ok(context
        .into_updates()
        .into_iter()
        .map(|(name, value)| {
            Effect::Dispatch(Action::SetValue {
                name,
                value,
                trigger_change: true,
            })
        })
        .collect())
}

fn call_data_source(slot: &mut FormSlot, name: String) -> FormResult<Vec<Effect>> {
    let definition = slot.data_source_definition(&name)?.clone();
    let form_key = slot.state.form_key.clone();
    let source = slot.data_source_mut(&name)?;
    let Some(params) = source.params.clone() else {
        return Ok(Vec::new());
    };
    if !source.status.can_transition_to(DataSourceStatus::Pending) {
        return Ok(Vec::new());
    }

    let ticket = source.begin_fetch(params.clone());

    tracing::debug!(
        form = %form_key,
        data_source = %name,
        ticket = ticket.0,
        "fetching data source"
    );
    let fetch = definition.start_fetch(params);
    let task = async move {
        match fetch.await {
            Ok(data) => Action::ResolveDataSource {
                name,
                data: definition.apply_transform(data),
                ticket,
            },
            Err(error) => Action::RejectDataSource {
                name,
                error,
                ticket,
            },
        }
    }
    .boxed();
    Ok(vec![Effect::Spawn(task)])
}

fn accept_fetch_outcome(
    slot: &mut FormSlot,
    name: &str,
    ticket: FetchTicket,
    next: DataSourceStatus,
    options: &EngineOptions,
) -> FormResult<bool> {
    let form_key = slot.state.form_key.clone();
    let source = slot.data_source_mut(name)?;
    let stale = if options.discard_stale_fetches {
        ticket != source.ticket
    } else {
        source.is_cleared_since(ticket)
    };
    if stale {
        tracing::debug!(
            form = %form_key,
            data_source = %name,
            ticket = ticket.0,
            latest = source.ticket.0,
            "discarding stale data source result"
        );
        return Ok(false);
    }
    if !source.status.can_transition_to(next) {
        tracing::warn!(
            form = %form_key,
            data_source = %name,
            from = ?source.status,
            to = ?next,
            "ignoring data source result outside the fetch lifecycle"
        );
        return Ok(false);
    }
    Ok(true)
}

fn field_mut<'a>(slot: &'a mut FormSlot, name: &str) -> FormResult<&'a mut FieldState> {
    let form_key = slot.state.form_key.clone();
    let fields = slot
        .state
        .fields
        .as_mut()
        .ok_or_else(|| FormError::FieldsNotReady(form_key.clone()))?;
    fields.get_mut(name).ok_or_else(|| FormError::UnknownField {
        form: form_key,
        field: name.to_string(),
    })
}
