use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

use super::binding::Bindings;

pub type FetchFuture = BoxFuture<'static, Result<Value, FetchError>>;
pub type FetchFn = Arc<dyn Fn(Vec<Value>) -> FetchFuture + Send + Sync>;
pub type ParamsFn = Arc<dyn Fn(&Bindings) -> Option<Vec<Value>> + Send + Sync>;
pub type TransformFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{message}")]
pub struct FetchError {
    message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Argument list handed to the fetch function. A computed list returning `None`
/// means the data source is not ready to be fetched.
#[derive(Clone)]
pub enum Params {
    Static(Vec<Value>),
    Computed(ParamsFn),
}

#[derive(Clone)]
pub struct DataSourceDefinition {
    fetch: FetchFn,
    params: Params,
    transform: Option<TransformFn>,
}

impl DataSourceDefinition {
    pub fn new<F, Fut>(fetch: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, FetchError>> + Send + 'static,
    {
        Self {
            fetch: Arc::new(move |params| fetch(params).boxed()),
            params: Params::Static(Vec::new()),
            transform: None,
        }
    }

    pub fn params(mut self, params: Vec<Value>) -> Self {
        self.params = Params::Static(params);
        self
    }

    pub fn params_with(
        mut self,
        f: impl Fn(&Bindings) -> Option<Vec<Value>> + Send + Sync + 'static,
    ) -> Self {
        self.params = Params::Computed(Arc::new(f));
        self
    }

    pub fn transform(mut self, f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.transform = Some(Arc::new(f));
        self
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.params, Params::Computed(_))
    }

    pub(super) fn initial_params(&self) -> Option<Vec<Value>> {
        match &self.params {
            Params::Static(params) => Some(params.clone()),
            Params::Computed(_) => None,
        }
    }

    pub(super) fn compute_params(&self, bindings: &Bindings) -> Option<Vec<Value>> {
        match &self.params {
            Params::Static(params) => Some(params.clone()),
            Params::Computed(f) => f(bindings),
        }
    }

    pub(super) fn apply_transform(&self, raw: Value) -> Value {
        match &self.transform {
            Some(transform) => transform(raw),
            None => raw,
        }
    }

    pub(super) fn start_fetch(&self, params: Vec<Value>) -> FetchFuture {
        (self.fetch)(params)
    }
}

impl Debug for DataSourceDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSourceDefinition")
            .field("dynamic", &self.is_dynamic())
            .field("has_transform", &self.transform.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum DataSourceStatus {
    Uninitialized,
    Pending,
    Resolved,
    Rejected,
}

impl DataSourceStatus {
    pub fn can_transition_to(self, next: DataSourceStatus) -> bool {
        self == next
            || matches!(
                (self, next),
                (DataSourceStatus::Uninitialized, DataSourceStatus::Pending)
                    | (DataSourceStatus::Pending, DataSourceStatus::Resolved)
                    | (DataSourceStatus::Pending, DataSourceStatus::Rejected)
                    | (DataSourceStatus::Resolved, DataSourceStatus::Pending)
                    | (DataSourceStatus::Rejected, DataSourceStatus::Pending)
            )
    }
}

/// Identifies one fetch request of a data source; bumped on every `CallDataSource`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FetchTicket(pub u64);

impl FetchTicket {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DataSourceState {
    pub status: DataSourceStatus,
    pub data: Value,
    /// Parameters computed by the last digest.
    pub params: Option<Vec<Value>>,
    /// Parameters the scheduler last acted on (fetch or clear).
    pub applied_params: Option<Vec<Value>>,
    /// Arguments passed to the most recent fetch.
    pub requested_params: Option<Vec<Value>>,
    pub ticket: FetchTicket,
    /// Results of fetches issued before this ticket are always dropped.
    pub cleared_at: FetchTicket,
    pub error: Option<String>,
    /// Status to fall back to when the fetch in flight is abandoned.
    pub(super) settled: DataSourceStatus,
}

impl DataSourceState {
    pub(super) fn new(definition: &DataSourceDefinition) -> Self {
        Self {
            status: DataSourceStatus::Uninitialized,
            data: Value::Null,
            params: definition.initial_params(),
            applied_params: None,
            requested_params: None,
            ticket: FetchTicket::default(),
            cleared_at: FetchTicket::default(),
            error: None,
            settled: DataSourceStatus::Uninitialized,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.status == DataSourceStatus::Resolved
    }

    pub(super) fn begin_fetch(&mut self, params: Vec<Value>) -> FetchTicket {
        if self.status != DataSourceStatus::Pending {
            self.settled = self.status;
        }
        self.status = DataSourceStatus::Pending;
        self.ticket = self.ticket.next();
        self.applied_params = Some(params.clone());
        self.requested_params = Some(params);
        self.error = None;
        self.ticket
    }

    /// Forgets the data and every fetch issued so far. A source left pending by an
    /// abandoned fetch returns to the status it had before that fetch.
    pub(super) fn clear(&mut self) {
        self.data = Value::Null;
        self.applied_params = None;
        self.ticket = self.ticket.next();
        self.cleared_at = self.ticket;
        if self.status == DataSourceStatus::Pending {
            self.status = self.settled;
        }
    }

    pub(super) fn is_cleared_since(&self, ticket: FetchTicket) -> bool {
        ticket < self.cleared_at
    }
}
