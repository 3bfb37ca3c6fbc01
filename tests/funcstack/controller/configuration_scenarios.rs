use funcstack::funcstack::api::types::{
    ConditionReason, ConditionStatus, ConditionType, DockerRegistrySpec, EndpointSpec,
    FunctionPlatform, FunctionPlatformSpec, FunctionPlatformStatus, PlatformCondition,
    PlatformState, ENDPOINT_DISABLED,
};
use funcstack::funcstack::config::ReconcileConfig;
use funcstack::funcstack::controller::reconcile::{ReconcileContext, Reconciler, Stage};
use funcstack::funcstack::controller::system_state::{emit_configuration_events, SystemState};
use funcstack::funcstack::k8s::event::EventRegistry;
use funcstack::funcstack::k8s::meta::ObjectMeta;
use funcstack::funcstack::k8s::secret::Secret;
use funcstack::funcstack::k8s::store::ClusterStore;
use funcstack::funcstack::test_support::ScriptedApplier;
use std::sync::Arc;

const NAMESPACE: &str = "default";
const PLATFORM_NAME: &str = "platform";
const CONFIGURATION_READY_MSG: &str = "Configuration ready";

struct Harness {
    store: Arc<ClusterStore>,
    events: Arc<EventRegistry>,
    reconciler: Reconciler,
}

fn harness() -> Harness {
    let store = ClusterStore::new();
    let events = EventRegistry::new();
    let applier = Arc::new(ScriptedApplier::new());
    let reconciler = Reconciler::new(
        store.clone(),
        events.clone(),
        applier,
        ReconcileConfig::default(),
    );
    Harness {
        store,
        events,
        reconciler,
    }
}

fn sample_spec() -> FunctionPlatformSpec {
    FunctionPlatformSpec {
        target_cpu_utilization_percentage: "test-CPU-utilization-percentage".to_string(),
        function_requeue_duration: "test-requeue-duration".to_string(),
        function_build_executor_args: "test-build-executor-args".to_string(),
        function_build_max_simultaneous_jobs: "test-max-simultaneous-jobs".to_string(),
        healthz_liveness_timeout: "test-healthz-liveness-timeout".to_string(),
        function_request_body_limit_mb: "test-request-body-limit-mb".to_string(),
        function_timeout_sec: "test-timeout-sec".to_string(),
        default_build_job_preset: "test-default-build-job-preset".to_string(),
        default_runtime_pod_preset: "test-default-runtime-pod-preset".to_string(),
        ..FunctionPlatformSpec::default()
    }
}

fn platform_with_spec(spec: FunctionPlatformSpec) -> FunctionPlatform {
    FunctionPlatform {
        metadata: ObjectMeta::named(NAMESPACE, PLATFORM_NAME),
        spec,
        ..FunctionPlatform::default()
    }
}

fn require_condition(
    instance: &FunctionPlatform,
    kind: ConditionType,
    status: ConditionStatus,
    reason: ConditionReason,
    message: &str,
) {
    let condition = instance
        .condition(kind)
        .unwrap_or_else(|| panic!("condition {kind} missing"));
    assert_eq!(condition.status, status, "unexpected status for {kind}");
    assert_eq!(condition.reason, reason, "unexpected reason for {kind}");
    assert_eq!(condition.message, message, "unexpected message for {kind}");
}

#[tokio::test]
async fn scenario_configuration_resolves_spec_into_status() {
    let h = harness();
    let ctx = ReconcileContext::new();
    let mut state = SystemState::new(platform_with_spec(sample_spec()));

    let result = h
        .reconciler
        .step(Stage::ControllerConfiguration, &ctx, &mut state)
        .await
        .expect("stage must not fail");

    assert_eq!(result.next, Some(Stage::ApplyResources));
    assert!(result.requeue_after.is_none());

    let status = &state.instance.status;
    assert_eq!(status.cpu_utilization_percentage, "test-CPU-utilization-percentage");
    assert_eq!(status.requeue_duration, "test-requeue-duration");
    assert_eq!(status.build_executor_args, "test-build-executor-args");
    assert_eq!(status.build_max_simultaneous_jobs, "test-max-simultaneous-jobs");
    assert_eq!(status.healthz_liveness_timeout, "test-healthz-liveness-timeout");
    assert_eq!(status.request_body_limit_mb, "test-request-body-limit-mb");
    assert_eq!(status.timeout_sec, "test-timeout-sec");
    assert_eq!(status.default_build_job_preset, "test-default-build-job-preset");
    assert_eq!(status.default_runtime_pod_preset, "test-default-runtime-pod-preset");
    assert_eq!(status.state, PlatformState::Processing);
    require_condition(
        &state.instance,
        ConditionType::Configured,
        ConditionStatus::True,
        ConditionReason::Configured,
        CONFIGURATION_READY_MSG,
    );

    emit_configuration_events(&state.snapshot, &state.instance.status, h.events.as_ref());
    let expected = vec![
        "Normal Configuration CPU utilization set from '' to 'test-CPU-utilization-percentage'",
        "Normal Configuration Function requeue duration set from '' to 'test-requeue-duration'",
        "Normal Configuration Function build executor args set from '' to 'test-build-executor-args'",
        "Normal Configuration Max number of simultaneous jobs set from '' to 'test-max-simultaneous-jobs'",
        "Normal Configuration Duration of health check set from '' to 'test-healthz-liveness-timeout'",
        "Normal Configuration Max size of request body set from '' to 'test-request-body-limit-mb'",
        "Normal Configuration Timeout set from '' to 'test-timeout-sec'",
        "Normal Configuration Default build job preset set from '' to 'test-default-build-job-preset'",
        "Normal Configuration Default runtime pod preset set from '' to 'test-default-runtime-pod-preset'",
    ];
    assert_eq!(h.events.take_rendered(), expected);
}

#[tokio::test]
async fn scenario_configuration_recovers_from_configuration_error() {
    let h = harness();
    h.store
        .insert_secret(Secret::new(NAMESPACE, "boo"))
        .await;

    let mut spec = sample_spec();
    spec.eventing = Some(EndpointSpec {
        endpoint: "test-event-URL".to_string(),
    });
    spec.tracing = Some(EndpointSpec {
        endpoint: ENDPOINT_DISABLED.to_string(),
    });
    spec.docker_registry = Some(DockerRegistrySpec {
        enable_internal: Some(false),
        secret_name: Some("boo".to_string()),
    });

    let mut instance = platform_with_spec(spec);
    instance.status = FunctionPlatformStatus {
        eventing_endpoint: "test-event-URL".to_string(),
        tracing_endpoint: ENDPOINT_DISABLED.to_string(),
        state: PlatformState::Error,
        conditions: vec![
            PlatformCondition {
                condition_type: ConditionType::Configured,
                status: ConditionStatus::False,
                reason: ConditionReason::ConfigurationErr,
                message: "registry secret 'default/boo' not found".to_string(),
                last_transition_time: None,
            },
            PlatformCondition {
                condition_type: ConditionType::Installed,
                status: ConditionStatus::True,
                reason: ConditionReason::Installation,
                message: String::new(),
                last_transition_time: None,
            },
        ],
        ..FunctionPlatformStatus::default()
    };

    let ctx = ReconcileContext::new();
    let mut state = SystemState::new(instance);
    let result = h
        .reconciler
        .step(Stage::ControllerConfiguration, &ctx, &mut state)
        .await
        .expect("stage must not fail");

    assert_eq!(result.next, Some(Stage::ApplyResources));
    assert!(result.requeue_after.is_none());
    require_condition(
        &state.instance,
        ConditionType::Configured,
        ConditionStatus::True,
        ConditionReason::Configured,
        CONFIGURATION_READY_MSG,
    );
    assert_eq!(state.instance.status.state, PlatformState::Processing);
    // The ledger keeps the Configured entry in its original slot.
    assert_eq!(
        state.instance.status.conditions[0].condition_type,
        ConditionType::Configured
    );
}

#[tokio::test]
async fn scenario_configuration_missing_secret_blocks_advance() {
    let h = harness();
    // No secret seeded: it was deleted between passes.

    let mut spec = sample_spec();
    spec.docker_registry = Some(DockerRegistrySpec {
        enable_internal: Some(false),
        secret_name: Some("boo".to_string()),
    });
    let mut instance = platform_with_spec(spec);
    instance.upsert_condition(
        ConditionType::Configured,
        ConditionStatus::True,
        ConditionReason::Configured,
        CONFIGURATION_READY_MSG,
    );

    let ctx = ReconcileContext::new();
    let mut state = SystemState::new(instance);
    let result = h
        .reconciler
        .step(Stage::ControllerConfiguration, &ctx, &mut state)
        .await
        .expect("recoverable failure must not surface as an error");

    assert_eq!(result.next, None, "the pass must not advance");
    assert!(result.requeue_after.is_none());
    assert_eq!(state.instance.status.state, PlatformState::Error);
    require_condition(
        &state.instance,
        ConditionType::Configured,
        ConditionStatus::False,
        ConditionReason::ConfigurationErr,
        "registry secret 'default/boo' not found",
    );
}

#[tokio::test]
async fn second_identical_pass_is_silent_and_leaves_ledger_untouched() {
    let h = harness();
    let ctx = ReconcileContext::new();
    let mut state = SystemState::new(platform_with_spec(sample_spec()));

    h.reconciler
        .step(Stage::ControllerConfiguration, &ctx, &mut state)
        .await
        .expect("first pass");
    emit_configuration_events(&state.snapshot, &state.instance.status, h.events.as_ref());
    assert_eq!(h.events.take().len(), 9);
    state.save_snapshot();
    let ledger = state.instance.status.conditions.clone();

    h.reconciler
        .step(Stage::ControllerConfiguration, &ctx, &mut state)
        .await
        .expect("second pass");
    emit_configuration_events(&state.snapshot, &state.instance.status, h.events.as_ref());

    assert!(h.events.take().is_empty(), "unchanged spec must be silent");
    assert_eq!(
        state.instance.status.conditions, ledger,
        "ledger must be byte-identical after an idempotent pass"
    );
}

#[tokio::test]
async fn internal_registry_skips_secret_lookup() {
    let h = harness();
    let mut spec = sample_spec();
    spec.docker_registry = Some(DockerRegistrySpec {
        enable_internal: Some(true),
        secret_name: None,
    });

    let ctx = ReconcileContext::new();
    let mut state = SystemState::new(platform_with_spec(spec));
    let result = h
        .reconciler
        .step(Stage::ControllerConfiguration, &ctx, &mut state)
        .await
        .expect("stage must not fail");

    assert_eq!(result.next, Some(Stage::ApplyResources));
    assert_eq!(state.instance.status.docker_registry, "internal");
    let flags = state.flags.build();
    assert_eq!(flags["dockerRegistry.enableInternal"], true);
}

#[tokio::test]
async fn registry_secret_provides_server_address() {
    let h = harness();
    h.store
        .insert_secret(
            Secret::new(NAMESPACE, "registry-credentials")
                .with_entry("serverAddress", "registry.example.com:5000"),
        )
        .await;

    let mut spec = sample_spec();
    spec.docker_registry = Some(DockerRegistrySpec {
        enable_internal: None,
        secret_name: Some("registry-credentials".to_string()),
    });

    let ctx = ReconcileContext::new();
    let mut state = SystemState::new(platform_with_spec(spec));
    h.reconciler
        .step(Stage::ControllerConfiguration, &ctx, &mut state)
        .await
        .expect("stage must not fail");

    assert_eq!(
        state.instance.status.docker_registry,
        "registry.example.com:5000"
    );
    let flags = state.flags.build();
    assert_eq!(flags["dockerRegistry.secretName"], "registry-credentials");
    assert_eq!(
        flags["dockerRegistry.serverAddress"],
        "registry.example.com:5000"
    );
}
