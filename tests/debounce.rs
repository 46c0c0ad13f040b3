// tests/debounce.rs

//! Deterministic coverage of the debounce/reload pipeline using the mock
//! loader and mock watch backend: coalescing, the notification policy,
//! stale-timer defusal and reload failure handling.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::sleep;

use modreg::loader::MockLoader;
use modreg::watch::{ChangeKind, MockBackend};
use modreg::{EventKind, Registry, RegistryError, RegistryEvent, RegistryOptions};
use modreg_test_utils::{event_log, init_tracing};

type TestResult = Result<(), Box<dyn Error>>;

const DELAY: Duration = Duration::from_millis(150);
const SETTLE: Duration = Duration::from_millis(450);

struct Harness {
    registry: Registry,
    loader: Arc<MockLoader>,
    backend: MockBackend,
}

fn module_path() -> PathBuf {
    PathBuf::from("/virtual/a.json")
}

fn harness() -> Harness {
    let loader = Arc::new(MockLoader::new());
    loader.insert_module(module_path(), json!({ "name": "one" }));

    let backend = MockBackend::new();
    let registry = Registry::with_backends(
        RegistryOptions::new()
            .root_path("/virtual")
            .reload(true)
            .delay(DELAY),
        loader.clone(),
        Arc::new(backend.clone()),
    )
    .expect("failed to create registry");

    Harness {
        registry,
        loader,
        backend,
    }
}

fn count_reloads(events: &[RegistryEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, RegistryEvent::Reload { .. }))
        .count()
}

#[tokio::test]
async fn burst_coalesces_into_one_reload() -> TestResult {
    init_tracing();
    let h = harness();
    h.registry.register("a", "/virtual/a.json")?;
    assert_eq!(h.loader.load_count(&module_path()), 1);

    let (log, listener) = event_log();
    h.registry.on(EventKind::Reload, listener)?;

    h.loader.insert_module(module_path(), json!({ "name": "two" }));
    for _ in 0..5 {
        assert_eq!(h.backend.fire(&module_path(), ChangeKind::Content), 1);
    }
    sleep(SETTLE).await;

    // Five notifications within the window: exactly one reload execution,
    // one re-resolve, one event.
    assert_eq!(h.registry.get_property("a", "name")?, json!("two"));
    assert_eq!(h.loader.load_count(&module_path()), 2);
    assert_eq!(h.loader.forgotten(), vec![module_path()]);
    assert_eq!(count_reloads(&log.lock().unwrap()), 1);

    Ok(())
}

#[tokio::test]
async fn lookups_stay_on_old_artifact_during_debounce_window() -> TestResult {
    init_tracing();
    let h = harness();
    h.registry.register("a", "/virtual/a.json")?;

    h.loader.insert_module(module_path(), json!({ "name": "two" }));
    h.backend.fire(&module_path(), ChangeKind::Content);

    // The timer is still pending; get never blocks on it and serves the
    // previous artifact.
    assert_eq!(h.registry.get_property("a", "name")?, json!("one"));

    sleep(SETTLE).await;
    assert_eq!(h.registry.get_property("a", "name")?, json!("two"));

    Ok(())
}

#[tokio::test]
async fn non_content_notifications_do_not_arm_the_timer() -> TestResult {
    init_tracing();
    let h = harness();
    h.registry.register("a", "/virtual/a.json")?;

    let (log, listener) = event_log();
    h.registry.on(EventKind::Reload, listener)?;

    h.backend.fire(&module_path(), ChangeKind::Removed);
    h.backend.fire(&module_path(), ChangeKind::Other);
    sleep(SETTLE).await;

    assert_eq!(h.loader.load_count(&module_path()), 1);
    assert!(h.loader.forgotten().is_empty());
    assert!(log.lock().unwrap().is_empty());

    Ok(())
}

#[tokio::test]
async fn unregister_defuses_a_pending_timer() -> TestResult {
    init_tracing();
    let h = harness();
    h.registry.register("a", "/virtual/a.json")?;

    let (log, listener) = event_log();
    h.registry.on(EventKind::Reload, listener)?;

    h.backend.fire(&module_path(), ChangeKind::Content);
    // Give the pipeline a moment to arm the timer, then tear down while
    // it is pending.
    sleep(Duration::from_millis(30)).await;
    h.registry.unregister("a")?;

    sleep(SETTLE).await;

    assert!(matches!(
        h.registry.get("a"),
        Err(RegistryError::NotFound(_))
    ));
    assert_eq!(h.loader.load_count(&module_path()), 1);
    assert!(log.lock().unwrap().is_empty());

    Ok(())
}

#[tokio::test]
async fn destroy_defuses_a_pending_timer() -> TestResult {
    init_tracing();
    let h = harness();
    h.registry.register("a", "/virtual/a.json")?;

    h.backend.fire(&module_path(), ChangeKind::Content);
    sleep(Duration::from_millis(30)).await;
    h.registry.destroy()?;

    sleep(SETTLE).await;

    // No reload executed after teardown.
    assert_eq!(h.loader.load_count(&module_path()), 1);
    Ok(())
}

#[tokio::test]
async fn notifications_after_unregister_are_dropped() -> TestResult {
    init_tracing();
    let h = harness();
    h.registry.register("a", "/virtual/a.json")?;
    h.registry.unregister("a")?;

    // The mock handle is closed, so nothing is delivered at all.
    assert_eq!(h.backend.fire(&module_path(), ChangeKind::Content), 0);
    sleep(SETTLE).await;
    assert_eq!(h.loader.load_count(&module_path()), 1);

    Ok(())
}

#[tokio::test]
async fn failed_scheduled_reload_keeps_last_artifact_and_reports() -> TestResult {
    init_tracing();
    let h = harness();
    h.registry.register("a", "/virtual/a.json")?;

    let (log, listener) = event_log();
    h.registry.on(EventKind::ReloadFailed, listener)?;

    h.loader.fail_loads_of(module_path());
    h.backend.fire(&module_path(), ChangeKind::Content);
    sleep(SETTLE).await;

    // Stale-but-good beats missing: the previous artifact survives.
    assert_eq!(h.registry.get_property("a", "name")?, json!("one"));
    {
        let events = log.lock().unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            RegistryEvent::ReloadFailed { name, path, error } => {
                assert_eq!(name, "a");
                assert_eq!(path, &module_path());
                assert!(error.contains("failed to load module \"a\""));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    // A later change retries with a fresh timer.
    h.loader.clear_failure(&module_path());
    h.loader.insert_module(module_path(), json!({ "name": "two" }));
    h.backend.fire(&module_path(), ChangeKind::Content);
    sleep(SETTLE).await;
    assert_eq!(h.registry.get_property("a", "name")?, json!("two"));

    Ok(())
}

#[tokio::test]
async fn manual_reload_races_pending_timer_without_corruption() -> TestResult {
    init_tracing();
    let h = harness();
    h.registry.register("a", "/virtual/a.json")?;

    let (log, listener) = event_log();
    h.registry.on(EventKind::Reload, listener)?;

    h.loader.insert_module(module_path(), json!({ "name": "two" }));
    h.backend.fire(&module_path(), ChangeKind::Content);
    h.registry.reload("a")?;

    // The manual reload already installed the new artifact; the timer may
    // fire again, which is tolerated and must land on the same content.
    assert_eq!(h.registry.get_property("a", "name")?, json!("two"));
    sleep(SETTLE).await;
    assert_eq!(h.registry.get_property("a", "name")?, json!("two"));

    let reloads = count_reloads(&log.lock().unwrap());
    assert!((1..=2).contains(&reloads), "got {reloads} reload events");

    Ok(())
}

#[tokio::test]
async fn package_changes_drop_the_whole_package_cache() -> TestResult {
    init_tracing();
    let loader = Arc::new(MockLoader::new());
    let pkg_root = PathBuf::from("/virtual/modules/widgets");
    let pkg_main = pkg_root.join("index.json");
    loader.insert_package("widgets", &pkg_root, &pkg_main, json!({ "kind": "widget" }));

    let backend = MockBackend::new();
    let registry = Registry::with_backends(
        RegistryOptions::new()
            .root_path("/virtual")
            .reload(true)
            .delay(DELAY),
        loader.clone(),
        Arc::new(backend.clone()),
    )?;

    registry.register("widgets", "widgets")?;

    // The manifest is the watched path for package registrations.
    let manifest = pkg_root.join("package.json");
    assert_eq!(backend.watched_paths(), vec![manifest.clone()]);

    loader.insert_module(&pkg_main, json!({ "kind": "gadget" }));
    backend.fire(&manifest, ChangeKind::Content);
    sleep(SETTLE).await;

    assert_eq!(registry.get_property("widgets", "kind")?, json!("gadget"));
    // Re-resolve dropped cached state for the whole package, not one file.
    assert_eq!(loader.forgotten_packages(), vec![pkg_root]);
    assert!(loader.forgotten().is_empty());

    Ok(())
}
