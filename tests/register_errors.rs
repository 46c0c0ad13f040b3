// tests/register_errors.rs

//! Registration failure semantics: atomicity, retries, duplicate names
//! and source classification.

use std::error::Error;

use serde_json::json;

use modreg::{Registry, RegistryError, RegistryOptions};
use modreg_test_utils::builders::ModuleDirBuilder;
use modreg_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

fn registry_for(dir: &ModuleDirBuilder) -> Registry {
    Registry::new(RegistryOptions::new().root_path(dir.path()))
        .expect("failed to create registry")
}

#[tokio::test]
async fn missing_file_fails_and_leaves_no_entry() -> TestResult {
    init_tracing();
    let dir = ModuleDirBuilder::new();
    let registry = registry_for(&dir);

    assert!(matches!(
        registry.register("ghost", "./ghost"),
        Err(RegistryError::LoadFailed { .. })
    ));

    // The failed registration left nothing behind.
    assert!(matches!(
        registry.get("ghost"),
        Err(RegistryError::NotFound(_))
    ));

    Ok(())
}

#[tokio::test]
async fn unknown_package_fails_and_leaves_no_entry() -> TestResult {
    init_tracing();
    let dir = ModuleDirBuilder::new();
    let registry = registry_for(&dir);

    // No leading separator marker: classified as a package identifier.
    assert!(matches!(
        registry.register("utils", "some-unknown-package"),
        Err(RegistryError::LoadFailed { .. })
    ));
    assert!(matches!(
        registry.get("utils"),
        Err(RegistryError::NotFound(_))
    ));

    Ok(())
}

#[tokio::test]
async fn corrupt_module_document_fails() -> TestResult {
    init_tracing();
    let dir = ModuleDirBuilder::new();
    std::fs::write(dir.path().join("broken.json"), "{ not json")?;
    let registry = registry_for(&dir);

    assert!(matches!(
        registry.register("broken", "./broken"),
        Err(RegistryError::LoadFailed { .. })
    ));

    Ok(())
}

#[tokio::test]
async fn failed_register_can_be_retried() -> TestResult {
    init_tracing();
    let dir = ModuleDirBuilder::new();
    let registry = registry_for(&dir);

    assert!(registry.register("late", "./late").is_err());

    // The module appears on disk afterwards; the same name registers fine.
    dir.write_module("late", &json!({ "ready": true }));
    registry.register("late", "./late")?;
    assert_eq!(registry.get_property("late", "ready")?, json!(true));

    Ok(())
}

#[tokio::test]
async fn duplicate_name_is_rejected_without_touching_the_entry() -> TestResult {
    init_tracing();
    let dir = ModuleDirBuilder::new()
        .with_module("a", &json!({ "which": "first" }))
        .with_module("other", &json!({ "which": "second" }));
    let registry = registry_for(&dir);

    registry.register("a", "./a")?;
    assert!(matches!(
        registry.register("a", "./other"),
        Err(RegistryError::AlreadyRegistered(_))
    ));

    // The original binding is untouched.
    assert_eq!(registry.get_property("a", "which")?, json!("first"));

    // Unregister first, then the name is free again.
    registry.unregister("a")?.register("a", "./other")?;
    assert_eq!(registry.get_property("a", "which")?, json!("second"));

    Ok(())
}

#[tokio::test]
async fn relative_and_absolute_paths_resolve_against_root() -> TestResult {
    init_tracing();
    let dir = ModuleDirBuilder::new().with_module("a", &json!({ "ok": 1 }));
    let registry = registry_for(&dir);

    // "./a" resolves against the root path; an absolute path is used as-is.
    registry.register("rel", "./a")?;
    let abs = dir.path().join("a.json");
    registry.register("abs", abs.to_str().unwrap())?;

    assert_eq!(registry.get_property("rel", "ok")?, json!(1));
    assert_eq!(registry.get_property("abs", "ok")?, json!(1));

    Ok(())
}
