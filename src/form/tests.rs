use super::*;
use futures::executor::block_on;
use futures::future;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::id::FormKey;

fn engine() -> FormEngine {
    FormEngine::new(EngineOptions::default())
}

fn profile_fields(_options: &FormOptions, _bindings: &Bindings) -> Option<Vec<FieldDefinition>> {
    Some(vec![
        FieldDefinition::new("name", FieldKind::Text)
            .label("Name")
            .required(true),
        FieldDefinition::new("replicas", FieldKind::Number).initial_value("3"),
        FieldDefinition::new("labels", FieldKind::Attributes),
        FieldDefinition::new("owners", FieldKind::SelectMulti),
        FieldDefinition::new("enabled", FieldKind::Toggle),
    ])
}

fn field(engine: &FormEngine, key: &FormKey, name: &str) -> FieldState {
    engine
        .field(key, name)
        .expect("field selector")
        .expect("field must exist")
}

#[test]
fn configure_initializes_fields_with_kind_defaults() {
    let engine = engine();
    let key = engine
        .configure(FormConfig::new("profile", profile_fields))
        .expect("configure");

    assert_eq!(engine.lifecycle(&key).expect("lifecycle"), FormLifecycle::Ready);
    let replicas = field(&engine, &key, "replicas");
    assert_eq!(replicas.value, FieldValue::from(3));
    assert_eq!(replicas.id, "profile-replicas");
    assert_eq!(
        field(&engine, &key, "labels").value,
        FieldValue::Map(Default::default())
    );
    assert_eq!(
        field(&engine, &key, "owners").value,
        FieldValue::List(Vec::new())
    );
    assert_eq!(field(&engine, &key, "enabled").value, FieldValue::Bool(false));

    let name = field(&engine, &key, "name");
    assert_eq!(name.props.label, "Name");
    assert_eq!(name.errors, vec!["This field is required"]);
    assert!(!name.dirty && !name.touched);
}

#[test]
fn configure_twice_keeps_existing_state() {
    let engine = engine();
    let key = engine
        .configure(FormConfig::new("profile", profile_fields))
        .expect("configure");
    engine.set_value(&key, "name", "web").expect("set name");

    engine
        .configure(FormConfig::new("profile", profile_fields))
        .expect("configure again");
    assert_eq!(field(&engine, &key, "name").value, FieldValue::from("web"));
}

#[test]
fn lifecycle_tracks_mount_configure_and_unmount() {
    let engine = engine();
    let key = FormKey::new("profile");
    assert_eq!(engine.lifecycle(&key).expect("lifecycle"), FormLifecycle::Unmounted);

    engine.mount(key.clone()).expect("mount");
    assert_eq!(engine.lifecycle(&key).expect("lifecycle"), FormLifecycle::Unconfigured);
    assert!(matches!(
        engine.set_value(&key, "name", "x"),
        Err(FormError::NotConfigured(_))
    ));

    engine
        .configure(FormConfig::new(key.clone(), profile_fields))
        .expect("configure");
    assert_eq!(engine.lifecycle(&key).expect("lifecycle"), FormLifecycle::Ready);

    assert!(engine.unmount(&key).expect("unmount"));
    assert_eq!(engine.lifecycle(&key).expect("lifecycle"), FormLifecycle::Unmounted);
    assert!(matches!(
        engine.reset(&key),
        Err(FormError::UnknownForm(_))
    ));
}

#[test]
fn fields_wait_for_their_data_source() {
    let engine = engine();
    let config = FormConfig::new("cluster", |_options, bindings| {
        let clusters = bindings.data("clusters").as_array()?;
        let options = clusters
            .iter()
            .filter_map(Value::as_str)
            .map(SelectOption::new)
            .collect::<Vec<_>>();
        Some(vec![
            FieldDefinition::new("cluster", FieldKind::Select)
                .options(options)
                .required(true),
        ])
    })
    .data_source("clusters", |_options| {
        DataSourceDefinition::new(|_params| future::ready(Ok(json!(["east", "west"]))))
    });

    let key = engine.configure(config).expect("configure");
    assert_eq!(engine.lifecycle(&key).expect("lifecycle"), FormLifecycle::Configuring);
    assert!(matches!(
        engine.set_value(&key, "cluster", "east"),
        Err(FormError::FieldsNotReady(_))
    ));
    let source = engine
        .data_source(&key, "clusters")
        .expect("data source selector")
        .expect("data source");
    assert_eq!(source.status, DataSourceStatus::Pending);

    assert_eq!(block_on(engine.settle()).expect("settle"), 1);
    assert_eq!(engine.lifecycle(&key).expect("lifecycle"), FormLifecycle::Ready);
    let cluster = field(&engine, &key, "cluster");
    assert_eq!(cluster.props.options.len(), 2);
    assert_eq!(cluster.props.options[1].label, "west");
}

#[test]
fn computed_properties_fall_back_to_defaults() {
    let engine = engine();
    let config = FormConfig::new("exposure", |_options, _bindings| {
        Some(vec![
            FieldDefinition::new("public", FieldKind::Checkbox),
            FieldDefinition::new("hostname", FieldKind::Text)
                .visible(Dynamic::computed(|bindings| {
                    bindings.value("public").as_bool() == Some(true)
                }))
                .enabled(Dynamic::<bool>::partial(|_bindings| None))
                .placeholder(Dynamic::<String>::partial(|_bindings| None)),
        ])
    });
    let key = engine.configure(config).expect("configure");

    let hostname = field(&engine, &key, "hostname");
    assert!(!hostname.props.visible);
    assert!(hostname.props.enabled);
    assert_eq!(hostname.props.placeholder, "");

    engine.set_value(&key, "public", true).expect("set public");
    assert!(field(&engine, &key, "hostname").props.visible);
}

#[test]
fn set_value_coerces_and_tracks_dirty() {
    let engine = engine();
    let key = engine
        .configure(FormConfig::new("profile", profile_fields))
        .expect("configure");

    engine.set_value(&key, "replicas", "5").expect("set replicas");
    let replicas = field(&engine, &key, "replicas");
    assert_eq!(replicas.value, FieldValue::from(5));
    assert!(replicas.dirty && replicas.touched);

    engine.set_value(&key, "replicas", 3).expect("restore replicas");
    let replicas = field(&engine, &key, "replicas");
    assert!(!replicas.dirty);
    assert!(replicas.touched);

    assert!(matches!(
        engine.set_value(&key, "missing", "x"),
        Err(FormError::UnknownField { .. })
    ));
}

#[test]
fn focus_and_blur_only_touch_flags() {
    let engine = engine();
    let key = engine
        .configure(FormConfig::new("profile", profile_fields))
        .expect("configure");

    engine.focus(&key, "name").expect("focus");
    let name = field(&engine, &key, "name");
    assert!(name.focused && !name.touched);

    engine.blur(&key, "name").expect("blur");
    let name = field(&engine, &key, "name");
    assert!(!name.focused && name.touched && !name.dirty);
}

#[test]
fn change_cascade_stops_at_configured_limit() {
    let engine = FormEngine::new(EngineOptions {
        max_change_cascade: 4,
        ..EngineOptions::default()
    });
    let changes = Arc::new(AtomicUsize::new(0));
    let counter = changes.clone();
    let config = FormConfig::new("ping-pong", move |_options, _bindings| {
        let ping = counter.clone();
        let pong = counter.clone();
        Some(vec![
            FieldDefinition::new("ping", FieldKind::Number).on_change(move |bindings, change| {
                ping.fetch_add(1, Ordering::SeqCst);
                let next = bindings.value("ping").as_decimal().unwrap_or_default() + Decimal::ONE;
                change.set_value("pong", next);
            }),
            FieldDefinition::new("pong", FieldKind::Number).on_change(move |bindings, change| {
                pong.fetch_add(1, Ordering::SeqCst);
                let next = bindings.value("pong").as_decimal().unwrap_or_default() + Decimal::ONE;
                change.set_value("ping", next);
            }),
        ])
    });
    let key = engine.configure(config).expect("configure");

    engine.set_value(&key, "ping", 0).expect("set ping");
    assert_eq!(changes.load(Ordering::SeqCst), 5);
    assert_eq!(field(&engine, &key, "pong").value, FieldValue::from(3));
}

#[test]
fn additional_fields_default_to_transient_and_altered_fields_apply() {
    let engine = engine();
    let config = FormConfig::new("service", |_options, _bindings| {
        Some(vec![
            FieldDefinition::new("name", FieldKind::Text),
            FieldDefinition::new("port", FieldKind::Number).initial_value(80),
        ])
    })
    .additional_field(FieldDefinition::new("confirm", FieldKind::Checkbox))
    .additional_field(FieldDefinition::new("note", FieldKind::Text).transient(false))
    .alter_field("port", |field| field.initial_value(8080).required(true));
    let key = engine.configure(config).expect("configure");

    let state = engine
        .form_state(&key)
        .expect("form state selector")
        .expect("form state");
    assert_eq!(state.field_names(), vec!["name", "port", "confirm", "note"]);
    assert_eq!(field(&engine, &key, "port").value, FieldValue::from(8080));

    let values = engine.serialize(&key, &FieldSet::All).expect("serialize");
    assert_eq!(values.keys().collect::<Vec<_>>(), vec!["name", "port", "note"]);
}

#[test]
fn serialize_honors_field_set_and_serializers() {
    let engine = engine();
    let config = FormConfig::new("route", |_options, _bindings| {
        Some(vec![
            FieldDefinition::new("host", FieldKind::Text).initial_value("example.com"),
            FieldDefinition::new("path", FieldKind::Text).initial_value("/api"),
            FieldDefinition::new("url", FieldKind::Hidden).serialize_with(|bindings| {
                let host = bindings.value("host").as_str().unwrap_or_default();
                let path = bindings.value("path").as_str().unwrap_or_default();
                json!(format!("https://{host}{path}"))
            }),
        ])
    });
    let key = engine.configure(config).expect("configure");

    let values = engine
        .serialize(&key, &FieldSet::names(["url", "host", "missing"]))
        .expect("serialize");
    assert_eq!(values.keys().collect::<Vec<_>>(), vec!["url", "host"]);
    assert_eq!(values["url"], json!("https://example.com/api"));

    let values = engine
        .serialize(&key, &FieldSet::derived(|names| names.into_iter().skip(2).collect()))
        .expect("serialize derived");
    assert_eq!(values.len(), 1);
}

#[test]
fn submit_rejects_concurrent_submission() {
    let engine = engine();
    let config = FormConfig::new("slow", |_options, _bindings| {
        Some(vec![FieldDefinition::new("name", FieldKind::Text)])
    })
    .on_submit(|_options, _values, _bindings| future::pending::<Result<Value, SubmitRejection>>());
    let key = engine.configure(config).expect("configure");

    engine.submit(&key, SubmitOptions::new()).expect("first submit");
    assert_eq!(engine.lifecycle(&key).expect("lifecycle"), FormLifecycle::Submitting);
    assert!(matches!(
        engine.submit(&key, SubmitOptions::new()),
        Err(FormError::AlreadySubmitting(_))
    ));
    assert_eq!(engine.pending_tasks().expect("pending tasks"), 1);
}

#[test]
fn submit_without_handler_is_an_error() {
    let engine = engine();
    let key = engine
        .configure(FormConfig::new("profile", profile_fields))
        .expect("configure");
    assert!(matches!(
        engine.submit(&key, SubmitOptions::new()),
        Err(FormError::MissingSubmitHandler(_))
    ));
}

#[test]
fn submit_rejections_become_form_errors() {
    let engine = engine();
    let reasons = Arc::new(Mutex::new(Vec::new()));
    let seen = reasons.clone();
    let attempts = Arc::new(AtomicUsize::new(0));
    let config = FormConfig::new("deploy", |_options, _bindings| {
        Some(vec![FieldDefinition::new("image", FieldKind::Text)])
    })
    .on_submit(move |_options, _values, _bindings| {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst);
        future::ready(Err(if attempt == 0 {
            SubmitRejection::message("Image not found")
        } else {
            SubmitRejection::unexpected(std::io::Error::other("socket closed"))
        }))
    })
    .on_error(move |_options, reason| {
        seen.lock().expect("reasons lock").push(reason.to_string());
    });
    let key = engine.configure(config).expect("configure");

    engine.submit(&key, SubmitOptions::new()).expect("submit");
    block_on(engine.settle()).expect("settle");
    let state = engine.form_state(&key).expect("form state").expect("live form");
    assert_eq!(state.error.as_deref(), Some("Image not found"));
    assert!(!state.submitting);

    engine.submit(&key, SubmitOptions::new()).expect("retry");
    block_on(engine.settle()).expect("settle retry");
    let state = engine.form_state(&key).expect("form state").expect("live form");
    assert_eq!(state.error.as_deref(), Some("An unexpected error occurred"));
    assert_eq!(state.submit_count, 2);

    let reasons = reasons.lock().expect("reasons lock");
    assert_eq!(reasons.len(), 2);
    assert!(reasons[1].contains("socket closed"));
}

#[test]
fn submit_invokes_on_invalid_with_active_errors_only() {
    let engine = engine();
    let reported = Arc::new(Mutex::new(None));
    let sink = reported.clone();
    let config = FormConfig::new("account", |_options, _bindings| {
        Some(vec![
            FieldDefinition::new("email", FieldKind::Email).required(true),
            FieldDefinition::new("nickname", FieldKind::Text).required(true),
        ])
    })
    .on_submit(|_options, _values, _bindings| future::ready(Ok(Value::Null)));
    let key = engine.configure(config).expect("configure");

    engine
        .submit(
            &key,
            SubmitOptions::new()
                .field_set(FieldSet::names(["email"]))
                .on_invalid(move |errors| {
                    *sink.lock().expect("sink lock") = Some(errors.clone());
                }),
        )
        .expect("submit");

    let errors = reported
        .lock()
        .expect("reported lock")
        .clone()
        .expect("on_invalid called");
    assert_eq!(errors.keys().collect::<Vec<_>>(), vec!["email"]);
    assert!(field(&engine, &key, "email").touched);
    assert!(!field(&engine, &key, "nickname").touched);
    assert_eq!(engine.pending_tasks().expect("pending tasks"), 0);
}

#[test]
fn fetch_rejection_stays_on_the_data_source() {
    let engine = engine();
    let config = FormConfig::new("registry", |_options, _bindings| {
        Some(vec![FieldDefinition::new("image", FieldKind::Select)])
    })
    .data_source("images", |_options| {
        DataSourceDefinition::new(|_params| future::ready(Err(FetchError::new("registry down"))))
    });
    let key = engine.configure(config).expect("configure");
    block_on(engine.settle()).expect("settle");

    let source = engine
        .data_source(&key, "images")
        .expect("data source selector")
        .expect("data source");
    assert_eq!(source.status, DataSourceStatus::Rejected);
    assert_eq!(source.error.as_deref(), Some("registry down"));
    assert_eq!(source.data, Value::Null);
    let state = engine.form_state(&key).expect("form state").expect("live form");
    assert_eq!(state.error, None);
}

#[test]
fn transform_applies_before_data_is_stored() {
    let engine = engine();
    let config = FormConfig::new("nodes", |_options, _bindings| {
        Some(vec![FieldDefinition::new("node", FieldKind::Select)])
    })
    .data_source("nodes", |_options| {
        DataSourceDefinition::new(|_params| future::ready(Ok(json!({"items": ["n1", "n2"]}))))
            .transform(|raw| raw["items"].clone())
    });
    let key = engine.configure(config).expect("configure");
    block_on(engine.settle()).expect("settle");

    let bindings = engine.bindings(&key).expect("bindings");
    assert_eq!(bindings.data("nodes"), &json!(["n1", "n2"]));
}

#[test]
fn completions_for_unmounted_forms_are_dropped() {
    let engine = engine();
    let config = FormConfig::new("gone", |_options, _bindings| Some(Vec::new()))
        .data_source("things", |_options| {
            DataSourceDefinition::new(|_params| future::ready(Ok(json!([1, 2]))))
        });
    let key = engine.configure(config).expect("configure");
    assert!(engine.unmount(&key).expect("unmount"));

    assert_eq!(block_on(engine.settle()).expect("settle"), 1);
    assert!(engine.store().is_empty().expect("store is empty"));
}

#[test]
fn ephemeral_form_is_dropped_on_reset() {
    let engine = engine();
    let config = FormConfig::auto(profile_fields);
    assert!(config.is_ephemeral());
    let key = engine.configure(config).expect("configure");
    assert!(key.as_str().starts_with("auto-"));

    engine.reset(&key).expect("reset");
    assert_eq!(engine.lifecycle(&key).expect("lifecycle"), FormLifecycle::Unmounted);
}

#[test]
fn invalid_pattern_is_reported() {
    let error = Pattern::new("(unclosed").expect_err("pattern must fail");
    assert!(matches!(error, FormError::InvalidPattern { .. }));
    assert!(error.to_string().contains("(unclosed"));
}

#[test]
fn form_state_selectors_summarize_fields() {
    let engine = engine();
    let key = engine
        .configure(FormConfig::new("profile", profile_fields))
        .expect("configure");

    let state = engine.form_state(&key).expect("form state").expect("live form");
    assert!(!state.is_valid());
    assert!(!state.is_dirty());
    assert_eq!(state.first_invalid_field(), Some("name"));
    assert_eq!(state.field_errors().len(), 1);

    engine.set_value(&key, "name", "api").expect("set name");
    let state = engine.form_state(&key).expect("form state").expect("live form");
    assert!(state.is_valid());
    assert!(state.is_dirty());
    assert_eq!(state.first_invalid_field(), None);
}

#[test]
fn failing_cascaded_update_is_skipped() {
    let engine = engine();
    let config = FormConfig::new("cascade", |_options, _bindings| {
        Some(vec![
            FieldDefinition::new("a", FieldKind::Text).on_change(|_bindings, change| {
                change.set_value("ghost", "x");
                change.set_value("b", "set-by-a");
            }),
            FieldDefinition::new("b", FieldKind::Text),
        ])
    });
    let key = engine.configure(config).expect("configure");

    engine.set_value(&key, "a", "new").expect("set a");
    assert_eq!(field(&engine, &key, "a").value, FieldValue::from("new"));
    assert_eq!(field(&engine, &key, "b").value, FieldValue::from("set-by-a"));
}

#[test]
fn submit_handler_may_read_the_engine() {
    let engine = engine();
    let observer = engine.clone();
    let observed = Arc::new(Mutex::new(None));
    let sink = observed.clone();
    let config = FormConfig::new("reentrant", |_options, _bindings| {
        Some(vec![FieldDefinition::new("name", FieldKind::Text)])
    })
    .on_submit(move |_options, _values, _bindings| {
        let lifecycle = observer
            .lifecycle(&FormKey::new("reentrant"))
            .expect("lifecycle from submit handler");
        *sink.lock().expect("sink lock") = Some(lifecycle);
        future::ready(Ok(Value::Null))
    });
    let key = engine.configure(config).expect("configure");

    engine.submit(&key, SubmitOptions::new()).expect("submit");
    block_on(engine.settle()).expect("settle");

    assert_eq!(
        *observed.lock().expect("observed lock"),
        Some(FormLifecycle::Submitting)
    );
    assert_eq!(engine.lifecycle(&key).expect("lifecycle"), FormLifecycle::Ready);
}
