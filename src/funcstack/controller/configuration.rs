/*
 * Copyright (C) 2025 The Funcstack Authors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 * http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use crate::funcstack::api::types::{
    ConditionReason, ConditionStatus, ConditionType, DockerRegistrySpec, FunctionPlatformSpec,
    FunctionPlatformStatus,
};
use crate::funcstack::controller::reconcile::{
    BoxError, ReconcileContext, Reconciler, Stage, StageResult,
};
use crate::funcstack::controller::system_state::SystemState;
use crate::funcstack::k8s::meta::normalize_namespace;
use crate::funcstack::logger::log_warn;

const COMPONENT: &str = "controller-configuration";
const CONFIGURATION_READY_MESSAGE: &str = "Configuration ready";
const INTERNAL_REGISTRY_ADDRESS: &str = "internal";
const REGISTRY_ADDRESS_KEY: &str = "serverAddress";

type SpecField = for<'a> fn(&'a FunctionPlatformSpec) -> &'a str;
type StatusSlot = for<'a> fn(&'a mut FunctionPlatformStatus) -> &'a mut String;

/// Declared spec→status copy table. Values arrive with spec-level defaults
/// already resolved, so each is mirrored unconditionally.
const SPEC_TO_STATUS: &[(SpecField, StatusSlot, &str)] = &[
    (
        |spec| spec.target_cpu_utilization_percentage.as_str(),
        |status| &mut status.cpu_utilization_percentage,
        "CPU utilization",
    ),
    (
        |spec| spec.function_requeue_duration.as_str(),
        |status| &mut status.requeue_duration,
        "Function requeue duration",
    ),
    (
        |spec| spec.function_build_executor_args.as_str(),
        |status| &mut status.build_executor_args,
        "Function build executor args",
    ),
    (
        |spec| spec.function_build_max_simultaneous_jobs.as_str(),
        |status| &mut status.build_max_simultaneous_jobs,
        "Max number of simultaneous jobs",
    ),
    (
        |spec| spec.healthz_liveness_timeout.as_str(),
        |status| &mut status.healthz_liveness_timeout,
        "Duration of health check",
    ),
    (
        |spec| spec.function_request_body_limit_mb.as_str(),
        |status| &mut status.request_body_limit_mb,
        "Max size of request body",
    ),
    (
        |spec| spec.function_timeout_sec.as_str(),
        |status| &mut status.timeout_sec,
        "Timeout",
    ),
    (
        |spec| spec.default_build_job_preset.as_str(),
        |status| &mut status.default_build_job_preset,
        "Default build job preset",
    ),
    (
        |spec| spec.default_runtime_pod_preset.as_str(),
        |status| &mut status.default_runtime_pod_preset,
        "Default runtime pod preset",
    ),
];

/// Resolves the desired operational parameters from the spec (and, for
/// registry credentials, from the named secret-like object) into status,
/// then marks configuration as validated. Recovery from an earlier
/// `ConfigurationErr` is this exact path: a later successful pass flips the
/// condition back to `True` and advances.
pub(super) async fn run(
    r: &Reconciler,
    ctx: &ReconcileContext,
    state: &mut SystemState,
) -> Result<StageResult, BoxError> {
    copy_spec_configuration(state);
    resolve_optional_endpoints(state);

    if let Some(registry) = state.instance.spec.docker_registry.clone() {
        if let Some(message) = resolve_registry(r, ctx, state, &registry).await? {
            // Recoverable: encoded in the ledger, never returned as an
            // error. The external queue schedules the retry.
            log_warn(
                COMPONENT,
                "registry configuration failed",
                &[
                    (
                        "platform",
                        state.instance.metadata.name.as_deref().unwrap_or("<unnamed>"),
                    ),
                    ("error", message.as_str()),
                ],
            );
            state.instance.upsert_condition(
                ConditionType::Configured,
                ConditionStatus::False,
                ConditionReason::ConfigurationErr,
                message,
            );
            return Ok(StageResult::stop());
        }
    }

    populate_flags(state);

    state.instance.upsert_condition(
        ConditionType::Configured,
        ConditionStatus::True,
        ConditionReason::Configured,
        CONFIGURATION_READY_MESSAGE,
    );

    Ok(StageResult::advance(Stage::ApplyResources))
}

fn copy_spec_configuration(state: &mut SystemState) {
    let spec = state.instance.spec.clone();
    for (field, slot, _label) in SPEC_TO_STATUS {
        *slot(&mut state.instance.status) = field(&spec).to_string();
    }
}

/// Endpoint overrides are copied only when declared; an absent block leaves
/// the previously observed endpoint untouched.
fn resolve_optional_endpoints(state: &mut SystemState) {
    if let Some(eventing) = state.instance.spec.eventing.clone() {
        state.instance.status.eventing_endpoint = eventing.endpoint;
    }
    if let Some(tracing) = state.instance.spec.tracing.clone() {
        state.instance.status.tracing_endpoint = tracing.endpoint;
    }
}

/// Resolves registry status fields. Returns `Ok(Some(message))` for a
/// recoverable configuration failure (missing or unreadable secret) and
/// `Ok(None)` on success; only cancellation propagates as a hard error.
async fn resolve_registry(
    r: &Reconciler,
    ctx: &ReconcileContext,
    state: &mut SystemState,
    registry: &DockerRegistrySpec,
) -> Result<Option<String>, BoxError> {
    if registry.enable_internal.unwrap_or(false) {
        state.instance.status.docker_registry = INTERNAL_REGISTRY_ADDRESS.to_string();
        state.flags.with_registry(true, INTERNAL_REGISTRY_ADDRESS);
        return Ok(None);
    }

    let Some(secret_name) = registry.secret_name.as_deref() else {
        let address = r.config().default_registry_address.clone();
        state.flags.with_registry(false, &address);
        state.instance.status.docker_registry = address;
        return Ok(None);
    };

    ctx.ensure_active()?;
    let namespace = normalize_namespace(state.instance.metadata.namespace.as_deref());
    let secret = match r.repository().get_secret(&namespace, secret_name).await {
        Ok(Some(secret)) => secret,
        Ok(None) => {
            return Ok(Some(format!(
                "registry secret '{namespace}/{secret_name}' not found"
            )));
        }
        Err(err) => {
            if ctx.is_cancelled() {
                return Err(Box::new(err));
            }
            return Ok(Some(format!(
                "registry secret '{namespace}/{secret_name}' unreadable: {err}"
            )));
        }
    };

    let address = match secret.decode(REGISTRY_ADDRESS_KEY) {
        Ok(Some(address)) => address,
        Ok(None) => secret_name.to_string(),
        Err(err) => {
            return Ok(Some(format!(
                "registry secret '{namespace}/{secret_name}' unreadable: {err}"
            )));
        }
    };

    state.flags.with_registry(false, &address);
    state.flags.with_registry_credentials(secret_name);
    state.instance.status.docker_registry = address;
    Ok(None)
}

fn populate_flags(state: &mut SystemState) {
    let status = state.instance.status.clone();
    state.flags.with_controller_configuration(
        &status.cpu_utilization_percentage,
        &status.requeue_duration,
        &status.build_executor_args,
        &status.build_max_simultaneous_jobs,
        &status.healthz_liveness_timeout,
        &status.request_body_limit_mb,
        &status.timeout_sec,
    );
    state
        .flags
        .with_default_presets(&status.default_build_job_preset, &status.default_runtime_pod_preset);
}
