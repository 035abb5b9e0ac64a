use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;

use super::config::{EngineOptions, FormConfig};
use super::controller::{FormError, FormResult, read_lock, write_lock};
use super::data_source::{DataSourceDefinition, DataSourceState};
use super::field::FieldDefinition;
use super::reducer::{Action, Effect, reduce};
use super::scheduler::schedule;
use super::state::{FormLifecycle, FormState};
use crate::id::FormKey;

/// Live form: its configuration, the definitions materialized from it, and its state.
pub(super) struct FormSlot {
    pub(super) config: FormConfig,
    pub(super) definitions: Option<IndexMap<String, FieldDefinition>>,
    pub(super) data_sources: IndexMap<String, DataSourceDefinition>,
    pub(super) state: FormState,
}

impl FormSlot {
    pub(super) fn new(config: FormConfig) -> Self {
        let data_sources = config.data_source_definitions();
        let mut state = FormState::new(config.form_key.clone(), config.options.clone());
        state.data_sources = data_sources
            .iter()
            .map(|(name, definition)| (name.clone(), DataSourceState::new(definition)))
            .collect();
        Self {
            config,
            definitions: None,
            data_sources,
            state,
        }
    }

    pub(super) fn data_source_definition(&self, name: &str) -> FormResult<&DataSourceDefinition> {
        self.data_sources
            .get(name)
            .ok_or_else(|| FormError::UnknownDataSource {
                form: self.state.form_key.clone(),
                data_source: name.to_string(),
            })
    }

    pub(super) fn data_source_mut(&mut self, name: &str) -> FormResult<&mut DataSourceState> {
        let form_key = self.state.form_key.clone();
        self.state
            .data_sources
            .get_mut(name)
            .ok_or_else(|| FormError::UnknownDataSource {
                form: form_key,
                data_source: name.to_string(),
            })
    }
}

pub(super) enum FormEntry {
    Mounted,
    Live(Box<FormSlot>),
}

/// Registry of every live form, keyed by form key. Only the reducer path writes to it;
/// everything else reads through the selectors.
#[derive(Clone, Default)]
pub struct FormStore {
    forms: Arc<RwLock<BTreeMap<FormKey, FormEntry>>>,
}

impl FormStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> FormResult<usize> {
        Ok(read_lock(&self.forms, "counting forms")?.len())
    }

    pub fn is_empty(&self) -> FormResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn contains(&self, form_key: &FormKey) -> FormResult<bool> {
        Ok(read_lock(&self.forms, "checking form presence")?.contains_key(form_key))
    }

    pub fn lifecycle(&self, form_key: &FormKey) -> FormResult<FormLifecycle> {
        let forms = read_lock(&self.forms, "reading form lifecycle")?;
        Ok(match forms.get(form_key) {
            None => FormLifecycle::Unmounted,
            Some(FormEntry::Mounted) => FormLifecycle::Unconfigured,
            Some(FormEntry::Live(slot)) => slot.state.lifecycle(),
        })
    }

    pub fn form_state(&self, form_key: &FormKey) -> FormResult<Option<FormState>> {
        let forms = read_lock(&self.forms, "reading form state")?;
        Ok(match forms.get(form_key) {
            Some(FormEntry::Live(slot)) => Some(slot.state.clone()),
            _ => None,
        })
    }

    pub(super) fn mount(&self, form_key: FormKey) -> FormResult<()> {
        let mut forms = write_lock(&self.forms, "mounting form")?;
        forms.entry(form_key).or_insert(FormEntry::Mounted);
        Ok(())
    }

    pub(super) fn unmount(&self, form_key: &FormKey) -> FormResult<bool> {
        let mut forms = write_lock(&self.forms, "unmounting form")?;
        Ok(forms.remove(form_key).is_some())
    }

    pub(super) fn read_slot<R>(
        &self,
        form_key: &FormKey,
        f: impl FnOnce(&FormSlot) -> FormResult<R>,
    ) -> FormResult<R> {
        let forms = read_lock(&self.forms, "reading form slot")?;
        match forms.get(form_key) {
            Some(FormEntry::Live(slot)) => f(slot),
            Some(FormEntry::Mounted) => Err(FormError::NotConfigured(form_key.clone())),
            None => Err(FormError::UnknownForm(form_key.clone())),
        }
    }

    /// Applies one action to one form, then lets the scheduler react if the action can
    /// change data-source parameters. Returns the effects for the caller to execute.
    pub(super) fn apply(
        &self,
        form_key: &FormKey,
        action: Action,
        options: &EngineOptions,
    ) -> FormResult<Vec<Effect>> {
        let mut forms = write_lock(&self.forms, "applying form action")?;

        let configured = match &action {
            Action::Configure(config) => Some(config.clone()),
            _ => None,
        };
        if let Some(config) = configured {
            let entry = forms.entry(form_key.clone()).or_insert(FormEntry::Mounted);
            if let FormEntry::Live(_) = entry {
                return Ok(Vec::new());
            }
            let mut slot = Box::new(FormSlot::new(config));
            let mut effects = reduce(&mut slot, action, options)?;
            effects.extend(schedule(&mut slot, options)?);
            *entry = FormEntry::Live(slot);
            return Ok(effects);
        }

        let slot = match forms.get_mut(form_key) {
            Some(FormEntry::Live(slot)) => slot,
            Some(FormEntry::Mounted) => return Err(FormError::NotConfigured(form_key.clone())),
            None => return Err(FormError::UnknownForm(form_key.clone())),
        };

        if matches!(action, Action::Reset) && slot.config.ephemeral {
            forms.remove(form_key);
            tracing::debug!(form = %form_key, "ephemeral form dropped on reset");
            return Ok(Vec::new());
        }

        let schedules = action.schedules_fetches();
        let mut effects = reduce(slot, action, options)?;
        if schedules {
            effects.extend(schedule(slot, options)?);
        }
        Ok(effects)
    }
}
