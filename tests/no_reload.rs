// tests/no_reload.rs

//! Registry behavior with `reload: false`: file edits stay invisible until
//! an explicit `reload`, and lookups keep serving the registered artifact.

use std::error::Error;

use serde_json::json;

use modreg::{EventKind, Registry, RegistryError, RegistryEvent, RegistryOptions};
use modreg_test_utils::builders::ModuleDirBuilder;
use modreg_test_utils::{event_log, init_tracing};

type TestResult = Result<(), Box<dyn Error>>;

fn fixture() -> ModuleDirBuilder {
    ModuleDirBuilder::new()
        .with_module("a", &json!({ "name": "I am A", "hello": "Hello, I am A" }))
        .with_module("b", &json!({ "name": "I am B", "hello": "Hello, I am B" }))
        .with_package("utils", "index.json", &json!({ "name": "utils", "version": 3 }))
}

fn registry_for(dir: &ModuleDirBuilder) -> Registry {
    Registry::new(RegistryOptions::new().root_path(dir.path()))
        .expect("failed to create registry")
}

#[tokio::test]
async fn get_module_and_properties() -> TestResult {
    init_tracing();
    let dir = fixture();
    let registry = registry_for(&dir);

    registry
        .register("a", "./a")?
        .register("b", "./b")?
        .register("utils", "utils")?;

    assert_eq!(registry.get_property("a", "name")?, json!("I am A"));
    assert_eq!(registry.get_property("b", "name")?, json!("I am B"));
    assert_eq!(registry.get_property("utils", "version")?, json!(3));

    // Whole-artifact lookup agrees with per-property lookup.
    let a = registry.get("a")?;
    assert_eq!(a.get("hello"), Some(&json!("Hello, I am A")));
    assert_eq!(
        registry.get_property("a", "hello")?,
        *a.get("hello").unwrap()
    );

    Ok(())
}

#[tokio::test]
async fn missing_property_and_missing_module() -> TestResult {
    init_tracing();
    let dir = fixture();
    let registry = registry_for(&dir);
    registry.register("a", "./a")?;

    assert!(matches!(
        registry.get_property("a", "ooxx"),
        Err(RegistryError::NoSuchProperty { .. })
    ));
    assert!(matches!(
        registry.get("c"),
        Err(RegistryError::NotFound(_))
    ));
    assert!(matches!(
        registry.get_property("c", "name"),
        Err(RegistryError::NotFound(_))
    ));

    Ok(())
}

#[tokio::test]
async fn property_lookup_on_non_object_artifact() -> TestResult {
    init_tracing();
    let dir = ModuleDirBuilder::new()
        .with_module("num", &json!(42))
        .with_module("nil", &json!(null));
    let registry = registry_for(&dir);
    registry.register("num", "./num")?.register("nil", "./nil")?;

    // A loaded artifact that happens to be a falsy scalar is still loaded.
    assert_eq!(*registry.get("num")?, json!(42));
    assert_eq!(*registry.get("nil")?, json!(null));

    // But it has no members.
    assert!(matches!(
        registry.get_property("num", "name"),
        Err(RegistryError::NoSuchProperty { .. })
    ));

    Ok(())
}

#[tokio::test]
async fn file_change_is_invisible_until_manual_reload() -> TestResult {
    init_tracing();
    let dir = fixture();
    let registry = registry_for(&dir);
    registry.register("a", "./a")?.register("b", "./b")?;

    let (log, listener) = event_log();
    registry.on(EventKind::Reload, listener)?;

    // Overwrite a's file with b's content.
    dir.write_module("a", &json!({ "name": "I am B", "hello": "Hello, I am B" }));
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    // reload is disabled: nothing changed, no events fired.
    assert_eq!(registry.get_property("a", "name")?, json!("I am A"));
    assert!(log.lock().unwrap().is_empty());

    registry.reload("a")?;

    assert_eq!(registry.get_property("a", "name")?, json!("I am B"));
    assert_eq!(registry.get_property("b", "name")?, json!("I am B"));

    let events = log.lock().unwrap();
    assert_eq!(events.len(), 1);
    match &events[0] {
        RegistryEvent::Reload { name, .. } => assert_eq!(name, "a"),
        other => panic!("unexpected event: {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn reload_of_unknown_name_fails() -> TestResult {
    init_tracing();
    let dir = fixture();
    let registry = registry_for(&dir);

    assert!(matches!(
        registry.reload("ghost"),
        Err(RegistryError::NotFound(_))
    ));

    Ok(())
}

#[tokio::test]
async fn unregister_removes_binding_and_is_idempotent() -> TestResult {
    init_tracing();
    let dir = fixture();
    let registry = registry_for(&dir);
    registry.register("a", "./a")?.register("b", "./b")?;

    let (log, listener) = event_log();
    registry.on(EventKind::Unregister, listener)?;

    registry.unregister("a")?;

    assert!(matches!(
        registry.get_property("a", "name"),
        Err(RegistryError::NotFound(_))
    ));
    assert_eq!(registry.get_property("b", "name")?, json!("I am B"));

    // The event carries a snapshot of the removed entry.
    {
        let events = log.lock().unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            RegistryEvent::Unregister { name, entry } => {
                assert_eq!(name, "a");
                assert_eq!(entry.name, "a");
                let artifact = entry.artifact.as_ref().expect("snapshot keeps artifact");
                assert_eq!(artifact.get("name"), Some(&json!("I am A")));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    // Unknown names are a no-op, and no extra event fires.
    registry.unregister("a")?.unregister("never-there")?;
    assert_eq!(log.lock().unwrap().len(), 1);

    // Re-registering after unregister is allowed.
    registry.register("a", "./a")?;
    assert_eq!(registry.get_property("a", "name")?, json!("I am A"));

    Ok(())
}
