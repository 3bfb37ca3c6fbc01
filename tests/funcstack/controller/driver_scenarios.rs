use funcstack::funcstack::api::types::{
    ConditionReason, ConditionStatus, ConditionType, FunctionPlatform, FunctionPlatformSpec,
    PlatformState,
};
use funcstack::funcstack::config::ReconcileConfig;
use funcstack::funcstack::controller::reconcile::{ReconcileContext, Reconciler};
use funcstack::funcstack::k8s::event::{EventRegistry, EventSeverity};
use funcstack::funcstack::k8s::meta::ObjectMeta;
use funcstack::funcstack::k8s::store::{ClusterStore, PlatformRepository, StoreError};
use funcstack::funcstack::test_support::ScriptedApplier;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const NAMESPACE: &str = "default";
const PLATFORM_NAME: &str = "platform";

struct Harness {
    store: Arc<ClusterStore>,
    events: Arc<EventRegistry>,
    applier: Arc<ScriptedApplier>,
    config: ReconcileConfig,
    reconciler: Reconciler,
}

fn harness() -> Harness {
    let store = ClusterStore::new();
    let events = EventRegistry::new();
    let applier = Arc::new(ScriptedApplier::new());
    let config = ReconcileConfig::default();
    let reconciler = Reconciler::new(
        store.clone(),
        events.clone(),
        applier.clone(),
        config.clone(),
    );
    Harness {
        store,
        events,
        applier,
        config,
        reconciler,
    }
}

fn sample_spec() -> FunctionPlatformSpec {
    FunctionPlatformSpec {
        target_cpu_utilization_percentage: "50".to_string(),
        function_requeue_duration: "5m".to_string(),
        function_build_executor_args: "--insecure".to_string(),
        function_build_max_simultaneous_jobs: "5".to_string(),
        healthz_liveness_timeout: "10s".to_string(),
        function_request_body_limit_mb: "1".to_string(),
        function_timeout_sec: "180".to_string(),
        default_build_job_preset: "normal".to_string(),
        default_runtime_pod_preset: "M".to_string(),
        ..FunctionPlatformSpec::default()
    }
}

async fn seed_platform(h: &Harness, mutate: impl FnOnce(&mut FunctionPlatform)) -> FunctionPlatform {
    let mut instance = FunctionPlatform {
        metadata: ObjectMeta::named(NAMESPACE, PLATFORM_NAME),
        spec: sample_spec(),
        ..FunctionPlatform::default()
    };
    mutate(&mut instance);
    h.store.insert_platform(instance).await
}

fn configuration_events(rendered: &[String]) -> Vec<&String> {
    rendered
        .iter()
        .filter(|line| line.starts_with("Normal Configuration "))
        .collect()
}

#[tokio::test]
async fn full_pass_converges_to_ready() {
    let h = harness();
    let seeded = seed_platform(&h, |_| {}).await;

    let ctx = ReconcileContext::new();
    let outcome = h
        .reconciler
        .run(&ctx, seeded)
        .await
        .expect("pass must succeed");

    assert_eq!(outcome.status.state, PlatformState::Ready);
    assert_eq!(outcome.requeue_after, Some(h.config.requeue_interval));
    assert_eq!(h.applier.apply_calls(), 1);

    let stored = h
        .store
        .get(NAMESPACE, PLATFORM_NAME)
        .await
        .expect("stored instance");
    assert_eq!(stored.status, outcome.status);
    assert!(stored.metadata.has_finalizer(&h.config.finalizer));
    let installed = stored.condition(ConditionType::Installed).expect("Installed");
    assert_eq!(installed.status, ConditionStatus::True);
    assert_eq!(installed.reason, ConditionReason::Installed);

    let rendered = h.events.take_rendered();
    assert_eq!(
        configuration_events(&rendered).len(),
        9,
        "one event per resolved field: {rendered:?}"
    );
    assert_eq!(
        rendered[0],
        "Normal Configuration CPU utilization set from '' to '50'"
    );
}

#[tokio::test]
async fn converging_installation_polls_again_sooner() {
    let h = harness();
    h.applier.set_ready(false);
    let seeded = seed_platform(&h, |_| {}).await;

    let outcome = h
        .reconciler
        .run(&ReconcileContext::new(), seeded)
        .await
        .expect("pass must succeed");

    assert_eq!(outcome.status.state, PlatformState::Processing);
    assert_eq!(
        outcome.requeue_after,
        Some(h.config.installation_poll_interval)
    );
    let installed = outcome
        .status
        .conditions
        .iter()
        .find(|c| c.condition_type == ConditionType::Installed)
        .expect("Installed");
    assert_eq!(installed.status, ConditionStatus::Unknown);
    assert_eq!(installed.reason, ConditionReason::Installation);
}

#[tokio::test]
async fn apply_failure_translates_into_error_state() {
    let h = harness();
    h.applier.fail_apply(true);
    let seeded = seed_platform(&h, |_| {}).await;

    let outcome = h
        .reconciler
        .run(&ReconcileContext::new(), seeded)
        .await
        .expect("translated failure is not a process error");

    assert_eq!(outcome.status.state, PlatformState::Error);
    assert_eq!(outcome.requeue_after, Some(h.config.error_requeue_interval));

    let events = h.events.take();
    let warning = events
        .iter()
        .find(|e| e.severity == EventSeverity::Warning)
        .expect("a Warning event for the translated failure");
    assert_eq!(warning.reason, "Installation");
    assert!(
        warning.message.contains("scripted apply failure"),
        "warning must carry the applier failure: {}",
        warning.message
    );
}

#[tokio::test]
async fn stale_instance_surfaces_a_conflict() {
    let h = harness();
    let seeded = seed_platform(&h, |instance| {
        // Finalizer present so the first write is the driver's status persist.
        instance
            .metadata
            .add_finalizer("funcstack.io/deletion-hook");
    })
    .await;
    h.store.invalidate_platform(NAMESPACE, PLATFORM_NAME).await;

    let err = h
        .reconciler
        .run(&ReconcileContext::new(), seeded)
        .await
        .expect_err("stale write must fail the pass");

    let store_error = err
        .source
        .downcast_ref::<StoreError>()
        .expect("conflict must surface untranslated");
    assert!(store_error.is_conflict(), "got: {store_error}");
}

#[tokio::test]
async fn cancellation_aborts_before_any_dispatch() {
    let h = harness();
    let seeded = seed_platform(&h, |_| {}).await;
    let before = h
        .store
        .get(NAMESPACE, PLATFORM_NAME)
        .await
        .expect("seeded instance");

    let token = CancellationToken::new();
    token.cancel();
    let ctx = ReconcileContext::with_token(token);

    let err = h
        .reconciler
        .run(&ctx, seeded)
        .await
        .expect_err("cancelled pass must fail");
    assert!(err.to_string().contains("cancelled"), "got: {err}");

    let after = h
        .store
        .get(NAMESPACE, PLATFORM_NAME)
        .await
        .expect("instance still stored");
    assert_eq!(
        after.metadata.resource_version, before.metadata.resource_version,
        "no write may happen after cancellation"
    );
    assert_eq!(h.applier.apply_calls(), 0);
}

#[tokio::test]
async fn deletion_pass_uninstalls_and_releases_finalizer() {
    let h = harness();
    let seeded = seed_platform(&h, |instance| {
        instance.metadata.deletion_timestamp = Some("2025-06-01T12:00:00Z".to_string());
        instance
            .metadata
            .add_finalizer("funcstack.io/deletion-hook");
    })
    .await;

    let outcome = h
        .reconciler
        .run(&ReconcileContext::new(), seeded)
        .await
        .expect("deletion pass must succeed");

    assert_eq!(outcome.status.state, PlatformState::Deleting);
    assert!(outcome.requeue_after.is_none());
    assert_eq!(h.applier.uninstall_calls(), 1);

    let stored = h
        .store
        .get(NAMESPACE, PLATFORM_NAME)
        .await
        .expect("stored instance");
    assert!(
        !stored.metadata.has_finalizer(&h.config.finalizer),
        "finalizer must be released after cleanup"
    );
    let deleted = stored.condition(ConditionType::Deleted).expect("Deleted");
    assert_eq!(deleted.status, ConditionStatus::True);
}

#[tokio::test]
async fn failed_uninstall_stays_observable_and_keeps_finalizer() {
    let h = harness();
    h.applier.fail_uninstall(true);
    let seeded = seed_platform(&h, |instance| {
        instance.metadata.deletion_timestamp = Some("2025-06-01T12:00:00Z".to_string());
        instance
            .metadata
            .add_finalizer("funcstack.io/deletion-hook");
    })
    .await;

    let outcome = h
        .reconciler
        .run(&ReconcileContext::new(), seeded)
        .await
        .expect("cleanup failure is retried externally, not surfaced");

    let deleted = outcome
        .status
        .conditions
        .iter()
        .find(|c| c.condition_type == ConditionType::Deleted)
        .expect("Deleted");
    assert_eq!(deleted.status, ConditionStatus::False);
    assert_eq!(deleted.reason, ConditionReason::DeletionErr);

    let stored = h
        .store
        .get(NAMESPACE, PLATFORM_NAME)
        .await
        .expect("stored instance");
    assert!(stored.metadata.has_finalizer(&h.config.finalizer));

    let events = h.events.take();
    assert!(
        events
            .iter()
            .any(|e| e.severity == EventSeverity::Warning && e.reason == "Deletion"),
        "cleanup failure must leave an audit event"
    );
}

#[tokio::test]
async fn repeated_pass_with_unchanged_spec_emits_nothing() {
    let h = harness();
    let seeded = seed_platform(&h, |_| {}).await;

    h.reconciler
        .run(&ReconcileContext::new(), seeded)
        .await
        .expect("first pass");
    h.events.take();

    let current = h
        .store
        .get(NAMESPACE, PLATFORM_NAME)
        .await
        .expect("stored instance");
    let outcome = h
        .reconciler
        .run(&ReconcileContext::new(), current)
        .await
        .expect("second pass");

    assert_eq!(outcome.status.state, PlatformState::Ready);
    let rendered = h.events.take_rendered();
    assert!(
        configuration_events(&rendered).is_empty(),
        "an unchanged spec must not re-emit configuration events: {rendered:?}"
    );
}
