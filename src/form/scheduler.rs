use super::config::EngineOptions;
use super::controller::FormResult;
use super::data_source::{DataSourceDefinition, DataSourceState, DataSourceStatus};
use super::reducer::{Action, Effect, reduce};
use super::store::FormSlot;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum Decision {
    Fetch,
    Clear,
}

/// Static parameters fetch once, on first sight. Dynamic parameters fetch whenever
/// they differ from the ones last acted on, and clear the data when they stop being ready.
pub(super) fn decide(
    definition: &DataSourceDefinition,
    source: &DataSourceState,
) -> Option<Decision> {
    if !definition.is_dynamic() {
        let eligible =
            source.status == DataSourceStatus::Uninitialized && source.params.is_some();
        return eligible.then_some(Decision::Fetch);
    }
    if source.params == source.applied_params {
        return None;
    }
    Some(match source.params {
        Some(_) => Decision::Fetch,
        None => Decision::Clear,
    })
}

pub(super) fn plan(slot: &FormSlot) -> Vec<Action> {
    slot.state
        .data_sources
        .iter()
        .filter_map(|(name, source)| {
            let definition = slot.data_sources.get(name)?;
            let name = name.clone();
            decide(definition, source).map(|decision| match decision {
                Decision::Fetch => Action::CallDataSource { name },
                Decision::Clear => Action::ClearDataSource { name },
            })
        })
        .collect()
}

/// Applies every scheduling decision to the slot right away so that later actions in
/// the same dispatch see the data sources as already requested. Clearing a data source
/// digests again, which can change other parameters, so planning repeats until stable.
pub(super) fn schedule(slot: &mut FormSlot, options: &EngineOptions) -> FormResult<Vec<Effect>> {
    let mut effects = Vec::new();
    for _ in 0..=slot.data_sources.len() {
        let calls = plan(slot);
        if calls.is_empty() {
            break;
        }
        for call in calls {
            effects.extend(reduce(slot, call, options)?);
        }
    }
    Ok(effects)
}
