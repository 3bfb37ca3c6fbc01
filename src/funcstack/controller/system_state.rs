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

use crate::funcstack::api::types::{FunctionPlatform, FunctionPlatformStatus};
use crate::funcstack::chart::FlagsBuilder;
use crate::funcstack::k8s::event::{EventRecorder, EventSeverity};

pub const EVENT_REASON_CONFIGURATION: &str = "Configuration";

type StatusField = for<'a> fn(&'a FunctionPlatformStatus) -> &'a str;

/// Declared diff table covering every status field the configuration stage
/// can set. Emission follows this order, not the order fields happened to
/// change, so event sequences stay deterministic.
const CONFIGURATION_FIELDS: &[(&str, StatusField)] = &[
    ("CPU utilization", |s| s.cpu_utilization_percentage.as_str()),
    ("Function requeue duration", |s| s.requeue_duration.as_str()),
    ("Function build executor args", |s| {
        s.build_executor_args.as_str()
    }),
    ("Max number of simultaneous jobs", |s| {
        s.build_max_simultaneous_jobs.as_str()
    }),
    ("Duration of health check", |s| {
        s.healthz_liveness_timeout.as_str()
    }),
    ("Max size of request body", |s| s.request_body_limit_mb.as_str()),
    ("Timeout", |s| s.timeout_sec.as_str()),
    ("Default build job preset", |s| {
        s.default_build_job_preset.as_str()
    }),
    ("Default runtime pod preset", |s| {
        s.default_runtime_pod_preset.as_str()
    }),
    ("Eventing endpoint", |s| s.eventing_endpoint.as_str()),
    ("Tracing endpoint", |s| s.tracing_endpoint.as_str()),
    ("Docker registry", |s| s.docker_registry.as_str()),
];

/// Per-pass working aggregate: the live instance, the status snapshot the
/// diff emitter compares against, the flags staged for resource application,
/// and the failure message a stage may leave for error recovery. Built fresh
/// for every pass and discarded at its end.
pub struct SystemState {
    pub instance: FunctionPlatform,
    pub snapshot: FunctionPlatformStatus,
    pub flags: FlagsBuilder,
    pub failure: Option<String>,
}

impl SystemState {
    pub fn new(instance: FunctionPlatform) -> Self {
        let snapshot = instance.status.clone();
        Self {
            instance,
            snapshot,
            flags: FlagsBuilder::new(),
            failure: None,
        }
    }

    /// Retakes the diff baseline. Exactly one snapshot is current at any
    /// point in a pass; the driver calls this after emitting events for a
    /// stage boundary.
    pub fn save_snapshot(&mut self) {
        self.snapshot = self.instance.status.clone();
    }
}

/// Emits one `Normal`/`Configuration` event per declared field whose
/// canonical rendering changed between the snapshot and the fresh status.
/// Unchanged fields emit nothing, so a pass over an already-converged status
/// is silent.
pub fn emit_configuration_events(
    previous: &FunctionPlatformStatus,
    current: &FunctionPlatformStatus,
    recorder: &dyn EventRecorder,
) {
    for (label, field) in CONFIGURATION_FIELDS {
        let before = field(previous);
        let after = field(current);
        if before != after {
            recorder.record(
                EventSeverity::Normal,
                EVENT_REASON_CONFIGURATION,
                &format!("{label} set from '{before}' to '{after}'"),
            );
        }
    }
}
