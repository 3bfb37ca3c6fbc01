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

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::error::Error;
use std::future::Future;
use std::pin::Pin;

pub type ApplyFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, Box<dyn Error + Send + Sync>>> + Send + 'a>>;

/// Staging area for rendering parameters. Stages contribute values as they
/// resolve configuration; the resource-application collaborator consumes the
/// built mapping once. No validation happens here.
#[derive(Debug, Clone, Default)]
pub struct FlagsBuilder {
    values: BTreeMap<String, Value>,
}

impl FlagsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn with_controller_configuration(
        &mut self,
        cpu_utilization: &str,
        requeue_duration: &str,
        executor_args: &str,
        max_simultaneous_jobs: &str,
        healthz_liveness_timeout: &str,
        request_body_limit_mb: &str,
        timeout_sec: &str,
    ) -> &mut Self {
        self.set("containers.manager.configuration.data.targetCPUUtilizationPercentage", cpu_utilization)
            .set("containers.manager.configuration.data.functionRequeueDuration", requeue_duration)
            .set("containers.manager.configuration.data.functionBuildExecutorArgs", executor_args)
            .set("containers.manager.configuration.data.functionBuildMaxSimultaneousJobs", max_simultaneous_jobs)
            .set("containers.manager.configuration.data.healthzLivenessTimeout", healthz_liveness_timeout)
            .set("containers.manager.configuration.data.functionRequestBodyLimitMb", request_body_limit_mb)
            .set("containers.manager.configuration.data.functionTimeoutSec", timeout_sec)
    }

    pub fn with_default_presets(&mut self, build_job: &str, runtime_pod: &str) -> &mut Self {
        self.set("containers.manager.configuration.data.defaultBuildJobPreset", build_job)
            .set("containers.manager.configuration.data.defaultRuntimePodPreset", runtime_pod)
    }

    pub fn with_registry(&mut self, enable_internal: bool, server_address: &str) -> &mut Self {
        self.set("dockerRegistry.enableInternal", enable_internal)
            .set("dockerRegistry.serverAddress", server_address)
    }

    pub fn with_registry_credentials(&mut self, secret_name: &str) -> &mut Self {
        self.set("dockerRegistry.secretName", secret_name)
    }

    /// Builds the accumulated mapping. Deterministic key order (the builder
    /// stores flags in a BTreeMap) keeps rendered manifests diffable.
    pub fn build(&self) -> Value {
        let mut flags = Map::new();
        for (name, value) in &self.values {
            flags.insert(name.clone(), value.clone());
        }
        Value::Object(flags)
    }
}

/// Boundary to the chart/manifest rendering collaborator. The pipeline only
/// hands over the built flags and asks for readiness; how manifests are
/// rendered and applied is out of scope here.
pub trait ResourceApplier: Send + Sync {
    /// Renders and applies platform resources using the accumulated flags.
    fn apply<'a>(&'a self, flags: &'a Value) -> ApplyFuture<'a, ()>;

    /// Reports whether previously applied workloads are ready.
    fn verify(&self) -> ApplyFuture<'_, bool>;

    /// Removes applied platform resources.
    fn uninstall(&self) -> ApplyFuture<'_, ()>;
}
