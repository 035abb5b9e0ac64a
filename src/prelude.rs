pub use crate::form::{
    Action, Bindings, ChangeContext, DataSourceDefinition, DataSourceState, DataSourceStatus,
    Dynamic, EngineOptions, FetchError, FieldDefinition, FieldKind, FieldSet, FieldState,
    FieldValue, FormConfig, FormEngine, FormError, FormLifecycle, FormOptions, FormResult,
    FormState, SelectOption, SubmitOptions, SubmitRejection,
};
pub use crate::id::{FormKey, field_id};
