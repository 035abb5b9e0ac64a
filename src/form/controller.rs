use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use thiserror::Error;

use super::binding::{Bindings, build_bindings};
use super::config::{EngineOptions, FieldSet, FormConfig, SerializedValues, SubmitOptions};
use super::data_source::DataSourceState;
use super::field::FieldState;
use super::reducer::{Action, Callback, Effect, Task};
use super::state::{FormLifecycle, FormState};
use super::store::FormStore;
use super::submit;
use super::value::FieldValue;
use crate::id::FormKey;

#[derive(Debug, Error)]
pub enum FormError {
    #[error("form state lock poisoned while {0}")]
    StatePoisoned(&'static str),
    #[error("form `{0}` is not mounted")]
    UnknownForm(FormKey),
    #[error("form `{0}` is mounted but not configured")]
    NotConfigured(FormKey),
    #[error("form `{0}` has no fields yet")]
    FieldsNotReady(FormKey),
    #[error("form `{form}` has no field `{field}`")]
    UnknownField { form: FormKey, field: String },
    #[error("form `{form}` has no data source `{data_source}`")]
    UnknownDataSource { form: FormKey, data_source: String },
    #[error("form `{0}` is already submitting")]
    AlreadySubmitting(FormKey),
    #[error("form `{0}` has no submit handler")]
    MissingSubmitHandler(FormKey),
    #[error("invalid field pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid engine options: {0}")]
    InvalidOptions(#[source] serde_json::Error),
}

pub type FormResult<T> = Result<T, FormError>;

/// Entry point for the rendering layer. Every mutation goes through [`FormEngine::dispatch`];
/// asynchronous work it starts is queued and driven by [`FormEngine::settle`].
#[derive(Clone, Default)]
pub struct FormEngine {
    store: FormStore,
    options: Arc<EngineOptions>,
    tasks: Arc<Mutex<Vec<(FormKey, Task)>>>,
}

impl FormEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self::with_store(FormStore::new(), options)
    }

    pub fn with_store(store: FormStore, options: EngineOptions) -> Self {
        Self {
            store,
            options: Arc::new(options),
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn store(&self) -> &FormStore {
        &self.store
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn mount(&self, form_key: impl Into<FormKey>) -> FormResult<()> {
        self.store.mount(form_key.into())
    }

    /// Drops the form and everything it holds. In-flight work for it is discarded when it
    /// completes.
    pub fn unmount(&self, form_key: &FormKey) -> FormResult<bool> {
        self.store.unmount(form_key)
    }

    pub fn configure(&self, config: FormConfig) -> FormResult<FormKey> {
        let form_key = config.form_key().clone();
        self.dispatch(&form_key, Action::Configure(config))?;
        Ok(form_key)
    }

    pub fn set_value(
        &self,
        form_key: &FormKey,
        name: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> FormResult<()> {
        self.set_value_with(form_key, name, value, true)
    }

    pub fn set_value_with(
        &self,
        form_key: &FormKey,
        name: impl Into<String>,
        value: impl Into<FieldValue>,
        trigger_change: bool,
    ) -> FormResult<()> {
        self.dispatch(
            form_key,
            Action::SetValue {
                name: name.into(),
                value: value.into(),
                trigger_change,
            },
        )
    }

    pub fn focus(&self, form_key: &FormKey, name: impl Into<String>) -> FormResult<()> {
        self.dispatch(form_key, Action::Focus { name: name.into() })
    }

    pub fn blur(&self, form_key: &FormKey, name: impl Into<String>) -> FormResult<()> {
        self.dispatch(form_key, Action::Blur { name: name.into() })
    }

    pub fn reset(&self, form_key: &FormKey) -> FormResult<()> {
        self.dispatch(form_key, Action::Reset)
    }

    pub fn submit(&self, form_key: &FormKey, options: SubmitOptions) -> FormResult<()> {
        self.dispatch(form_key, Action::Submit(options))
    }

    pub fn serialize(
        &self,
        form_key: &FormKey,
        field_set: &FieldSet,
    ) -> FormResult<SerializedValues> {
        self.store
            .read_slot(form_key, |slot| submit::serialize_form(slot, field_set))
    }

    pub fn lifecycle(&self, form_key: &FormKey) -> FormResult<FormLifecycle> {
        self.store.lifecycle(form_key)
    }

    pub fn form_state(&self, form_key: &FormKey) -> FormResult<Option<FormState>> {
        self.store.form_state(form_key)
    }

    pub fn field(&self, form_key: &FormKey, name: &str) -> FormResult<Option<FieldState>> {
        self.store
            .read_slot(form_key, |slot| Ok(slot.state.field(name).cloned()))
    }

    pub fn data_source(
        &self,
        form_key: &FormKey,
        name: &str,
    ) -> FormResult<Option<DataSourceState>> {
        self.store
            .read_slot(form_key, |slot| Ok(slot.state.data_sources.get(name).cloned()))
    }

    pub fn bindings(&self, form_key: &FormKey) -> FormResult<Bindings> {
        self.store
            .read_slot(form_key, |slot| Ok(build_bindings(&slot.state)))
    }

    pub fn pending_tasks(&self) -> FormResult<usize> {
        Ok(lock(&self.tasks, "counting pending tasks")?.len())
    }

    /// Runs `action` and every action it cascades into, in dispatch order. Tasks are
    /// queued for [`FormEngine::settle`]; callbacks run once the registry is released.
    ///
    /// Only a failure of `action` itself is returned. A cascaded action that fails is
    /// logged and skipped; the rest of the cascade still runs.
    pub fn dispatch(&self, form_key: &FormKey, action: Action) -> FormResult<()> {
        let mut queue = VecDeque::from([(action, false)]);
        let mut callbacks: Vec<Callback> = Vec::new();
        let mut cascaded = 0usize;

        while let Some((action, is_cascaded)) = queue.pop_front() {
            let name = action.name();
            tracing::debug!(form = %form_key, action = name, "dispatching form action");
            let effects = match self.store.apply(form_key, action, &self.options) {
                Ok(effects) => effects,
                Err(error @ FormError::StatePoisoned(_)) => return Err(error),
                Err(error) if is_cascaded => {
                    tracing::warn!(
                        form = %form_key,
                        action = name,
                        %error,
                        "skipping cascaded form action"
                    );
                    continue;
                }
                Err(error) => return Err(error),
            };
            for effect in effects {
                match effect {
                    Effect::Dispatch(next) => {
                        if matches!(next, Action::SetValue { .. }) {
                            if cascaded >= self.options.max_change_cascade {
                                tracing::warn!(
                                    form = %form_key,
                                    limit = self.options.max_change_cascade,
                                    "dropping change cascade past its limit"
                                );
                                continue;
                            }
                            cascaded += 1;
                        }
                        queue.push_back((next, true));
                    }
                    Effect::Spawn(task) => {
                        lock(&self.tasks, "queueing task")?.push((form_key.clone(), task));
                    }
                    Effect::Callback(callback) => callbacks.push(callback),
                }
            }
        }

        for callback in callbacks {
            callback();
        }
        Ok(())
    }

    /// Drives every queued task to completion, concurrently, feeding each outcome back
    /// through [`FormEngine::dispatch`]. Tasks started along the way are picked up too.
    /// Returns the number of completed tasks.
    pub async fn settle(&self) -> FormResult<usize> {
        let mut running = FuturesUnordered::new();
        let mut settled = 0;

        loop {
            let queued = std::mem::take(&mut *lock(&self.tasks, "taking queued tasks")?);
            for (form_key, task) in queued {
                running.push(task.map(move |action| (form_key, action)));
            }

            let Some((form_key, action)) = running.next().await else {
                break;
            };
            settled += 1;

            match self.dispatch(&form_key, action) {
                Ok(()) => {}
                Err(FormError::UnknownForm(_) | FormError::NotConfigured(_)) => {
                    tracing::debug!(form = %form_key, "dropping completion for unmounted form");
                }
                Err(error) => return Err(error),
            }
        }

        Ok(settled)
    }
}

pub(super) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(super) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}

fn lock<'a, T>(mutex: &'a Mutex<T>, context: &'static str) -> FormResult<MutexGuard<'a, T>> {
    mutex.lock().map_err(|_| FormError::StatePoisoned(context))
}
