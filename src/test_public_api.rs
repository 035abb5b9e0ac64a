use futures::future;
use serde_json::json;

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn engine_and_store_are_shareable_across_threads() {
    assert_send_sync::<crate::form::FormEngine>();
    assert_send_sync::<crate::form::FormStore>();
    assert_send_sync::<crate::form::FormConfig>();
    assert_send_sync::<crate::form::FieldDefinition>();
    assert_send_sync::<crate::form::DataSourceDefinition>();
}

#[test]
fn prelude_smoke_builds_a_form() {
    use crate::prelude::*;

    let engine = FormEngine::new(EngineOptions::default());
    let config = FormConfig::new("smoke", |_options, bindings| {
        Some(vec![
            FieldDefinition::new("kind", FieldKind::Select)
                .options(vec![SelectOption::new("a").label("A")]),
            FieldDefinition::new("detail", FieldKind::Text)
                .visible(Dynamic::computed(|bindings: &Bindings| {
                    bindings.value("kind").as_str() == Some("a")
                }))
                .placeholder(
                    bindings
                        .data("hints")
                        .as_str()
                        .unwrap_or_default()
                        .to_string(),
                ),
        ])
    })
    .options(FormOptions::from_entries([("projectId", json!("p-1"))]))
    .data_source("hints", |_options| {
        DataSourceDefinition::new(|_params| future::ready(Ok(json!("type here"))))
    });

    let key: FormKey = engine.configure(config).expect("configure smoke form");
    assert_eq!(field_id(&key, "kind"), "smoke-kind");
    assert_eq!(engine.lifecycle(&key).expect("lifecycle"), FormLifecycle::Ready);
    engine.set_value(&key, "kind", "a").expect("set kind");

    let state: FormState = engine
        .form_state(&key)
        .expect("form state")
        .expect("live form");
    assert_eq!(state.options.get("projectId"), &json!("p-1"));
    let detail: &FieldState = state.field("detail").expect("detail field");
    assert!(detail.props.visible);
    assert_eq!(
        state.data_sources["hints"].status,
        DataSourceStatus::Pending
    );
    let busy: FormResult<()> = Err(FormError::AlreadySubmitting(key));
    assert_eq!(
        busy.expect_err("busy form").to_string(),
        "form `smoke` is already submitting"
    );
    assert_eq!(Action::Reset.name(), "reset");
    assert!(FieldValue::Null.is_empty());
    assert!(matches!(FieldSet::default(), FieldSet::All));
    assert!(SubmitOptions::new().on_invalid.is_none());
    assert_eq!(SubmitRejection::message("name taken").to_string(), "name taken");
    assert_eq!(FetchError::new("registry down").message(), "registry down");
}
