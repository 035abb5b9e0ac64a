mod binding;
mod config;
mod controller;
mod data_source;
mod digest;
mod field;
mod reducer;
mod scheduler;
mod state;
mod store;
mod submit;
mod validation;
mod value;

#[cfg(test)]
mod tests;

pub use binding::Bindings;
pub use config::{
    AlterFieldFn, DataSourceFactory, DeriveFieldSetFn, EngineOptions, FieldErrors, FieldSet,
    FieldsFn, FormConfig, FormOptions, OnErrorFn, OnInvalidFn, OnSaveFn, SerializedValues,
    SubmitFn, SubmitFuture, SubmitOptions, SubmitRejection,
};
pub use controller::{FormEngine, FormError, FormResult};
pub use data_source::{
    DataSourceDefinition, DataSourceState, DataSourceStatus, FetchError, FetchFn, FetchFuture,
    FetchTicket, Params, ParamsFn, TransformFn,
};
pub use field::{
    ChangeContext, ComputedFn, Dynamic, FieldDefinition, FieldProps, FieldState, OnChangeFn,
    Pattern, SelectOption, SerializeFn,
};
pub use reducer::{Action, Callback, Effect, Task};
pub use state::{FormLifecycle, FormState};
pub use store::FormStore;
pub use validation::{Rule, validate};
pub use value::{FieldKind, FieldValue, initialize_value};
