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

use std::time::Duration;

/// Immutable reconciler settings, passed explicitly to the driver. The core
/// never sleeps on these itself; they are reported upward as requeue hints
/// for the external work queue.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Steady-state re-check hint once the platform is Ready.
    pub requeue_interval: Duration,
    /// Poll hint while installation is still converging.
    pub installation_poll_interval: Duration,
    /// Retry hint after a translated installation failure.
    pub error_requeue_interval: Duration,
    /// Registry address used when the spec declares a registry block without
    /// credentials or the internal toggle.
    pub default_registry_address: String,
    /// Finalizer guarding resource cleanup.
    pub finalizer: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            requeue_interval: Duration::from_secs(10 * 60),
            installation_poll_interval: Duration::from_secs(15),
            error_requeue_interval: Duration::from_secs(60),
            default_registry_address: "registry.localhost:5000".to_string(),
            finalizer: "funcstack.io/deletion-hook".to_string(),
        }
    }
}
