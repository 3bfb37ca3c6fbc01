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

use crate::funcstack::k8s::meta::ObjectMeta;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Sentinel endpoint value meaning "integration intentionally switched off".
pub const ENDPOINT_DISABLED: &str = "disabled";

/// Managed custom resource describing a deployable function platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionPlatform {
    #[serde(rename = "apiVersion", default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: FunctionPlatformSpec,
    #[serde(default)]
    pub status: FunctionPlatformStatus,
}

/// Desired operational parameters. Values already carry spec-level defaults
/// resolved before the instance reaches the pipeline, so the configuration
/// stage copies them verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionPlatformSpec {
    #[serde(
        rename = "targetCPUUtilizationPercentage",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub target_cpu_utilization_percentage: String,
    #[serde(
        rename = "functionRequeueDuration",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub function_requeue_duration: String,
    #[serde(
        rename = "functionBuildExecutorArgs",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub function_build_executor_args: String,
    #[serde(
        rename = "functionBuildMaxSimultaneousJobs",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub function_build_max_simultaneous_jobs: String,
    #[serde(
        rename = "healthzLivenessTimeout",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub healthz_liveness_timeout: String,
    #[serde(
        rename = "functionRequestBodyLimitMb",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub function_request_body_limit_mb: String,
    #[serde(
        rename = "functionTimeoutSec",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub function_timeout_sec: String,
    #[serde(
        rename = "defaultBuildJobPreset",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub default_build_job_preset: String,
    #[serde(
        rename = "defaultRuntimePodPreset",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub default_runtime_pod_preset: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eventing: Option<EndpointSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracing: Option<EndpointSpec>,
    #[serde(
        rename = "dockerRegistry",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub docker_registry: Option<DockerRegistrySpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointSpec {
    pub endpoint: String,
}

/// Registry configuration; credentials live in a named secret-like object
/// owned by the persistence layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockerRegistrySpec {
    #[serde(
        rename = "enableInternal",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub enable_internal: Option<bool>,
    #[serde(
        rename = "secretName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub secret_name: Option<String>,
}

/// Observed configuration mirrored from the spec by the configuration stage.
/// Every field renders as its textual form so the diff emitter compares plain
/// strings; an unset previous value renders as the empty string.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionPlatformStatus {
    #[serde(
        rename = "cpuUtilizationPercentage",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub cpu_utilization_percentage: String,
    #[serde(
        rename = "requeueDuration",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub requeue_duration: String,
    #[serde(
        rename = "buildExecutorArgs",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub build_executor_args: String,
    #[serde(
        rename = "buildMaxSimultaneousJobs",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub build_max_simultaneous_jobs: String,
    #[serde(
        rename = "healthzLivenessTimeout",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub healthz_liveness_timeout: String,
    #[serde(
        rename = "requestBodyLimitMb",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub request_body_limit_mb: String,
    #[serde(rename = "timeoutSec", default, skip_serializing_if = "String::is_empty")]
    pub timeout_sec: String,
    #[serde(
        rename = "defaultBuildJobPreset",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub default_build_job_preset: String,
    #[serde(
        rename = "defaultRuntimePodPreset",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub default_runtime_pod_preset: String,
    #[serde(
        rename = "eventingEndpoint",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub eventing_endpoint: String,
    #[serde(
        rename = "tracingEndpoint",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub tracing_endpoint: String,
    #[serde(
        rename = "dockerRegistry",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub docker_registry: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<PlatformCondition>,
    #[serde(default)]
    pub state: PlatformState,
}

/// Discrete summary of the instance, derived from the condition ledger and
/// never settable on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlatformState {
    #[default]
    Processing,
    Error,
    Ready,
    Deleting,
}

impl PlatformState {
    /// Recomputes the discrete state from the full ledger.
    ///
    /// `Error` wins whenever `Configured` or `Installed` is `False`,
    /// regardless of deletion progress.
    pub fn derive(conditions: &[PlatformCondition], deleting: bool) -> PlatformState {
        let has = |kind: ConditionType, status: ConditionStatus| {
            conditions
                .iter()
                .any(|c| c.condition_type == kind && c.status == status)
        };

        if has(ConditionType::Configured, ConditionStatus::False)
            || has(ConditionType::Installed, ConditionStatus::False)
        {
            PlatformState::Error
        } else if deleting {
            PlatformState::Deleting
        } else if has(ConditionType::Configured, ConditionStatus::True)
            && has(ConditionType::Installed, ConditionStatus::True)
        {
            PlatformState::Ready
        } else {
            PlatformState::Processing
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            PlatformState::Processing => "Processing",
            PlatformState::Error => "Error",
            PlatformState::Ready => "Ready",
            PlatformState::Deleting => "Deleting",
        }
    }
}

impl Display for PlatformState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionType {
    Configured,
    Installed,
    Deleted,
}

impl ConditionType {
    pub const fn as_str(self) -> &'static str {
        match self {
            ConditionType::Configured => "Configured",
            ConditionType::Installed => "Installed",
            ConditionType::Deleted => "Deleted",
        }
    }
}

impl Display for ConditionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable reasons recorded with each condition transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionReason {
    Configured,
    ConfigurationErr,
    Installation,
    Installed,
    InstallationErr,
    Deletion,
    DeletionErr,
}

impl ConditionReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            ConditionReason::Configured => "Configured",
            ConditionReason::ConfigurationErr => "ConfigurationErr",
            ConditionReason::Installation => "Installation",
            ConditionReason::Installed => "Installed",
            ConditionReason::InstallationErr => "InstallationErr",
            ConditionReason::Deletion => "Deletion",
            ConditionReason::DeletionErr => "DeletionErr",
        }
    }
}

impl Display for ConditionReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single ledger entry mirroring Kubernetes condition conventions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatformCondition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub status: ConditionStatus,
    pub reason: ConditionReason,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(rename = "lastTransitionTime", skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

impl FunctionPlatform {
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    pub fn condition(&self, kind: ConditionType) -> Option<&PlatformCondition> {
        self.status
            .conditions
            .iter()
            .find(|c| c.condition_type == kind)
    }

    /// Replaces the entry of matching type in place (keeping its position in
    /// the ledger) or appends a new one. The transition time is refreshed
    /// only when the tri-state status actually changes; reason- or
    /// message-only updates keep the previous timestamp.
    ///
    /// The discrete state is recomputed from the full ledger after every
    /// upsert so it can never drift from the conditions.
    pub fn upsert_condition(
        &mut self,
        kind: ConditionType,
        status: ConditionStatus,
        reason: ConditionReason,
        message: impl Into<String>,
    ) {
        let message = message.into();
        match self
            .status
            .conditions
            .iter_mut()
            .find(|c| c.condition_type == kind)
        {
            Some(existing) => {
                if existing.status != status {
                    existing.last_transition_time = Some(now_timestamp());
                }
                existing.status = status;
                existing.reason = reason;
                existing.message = message;
            }
            None => self.status.conditions.push(PlatformCondition {
                condition_type: kind,
                status,
                reason,
                message,
                last_transition_time: Some(now_timestamp()),
            }),
        }

        self.status.state = PlatformState::derive(&self.status.conditions, self.is_deleting());
    }
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
