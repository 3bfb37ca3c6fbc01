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

use crate::funcstack::api::types::{ConditionReason, ConditionStatus, ConditionType};
use crate::funcstack::controller::reconcile::{BoxError, Reconciler, StageResult};
use crate::funcstack::controller::system_state::SystemState;
use crate::funcstack::k8s::event::EventSeverity;
use crate::funcstack::logger::log_warn;

const COMPONENT: &str = "error-recovery";
const EVENT_REASON_INSTALLATION: &str = "Installation";

/// Translates a failure left behind by an earlier stage into observable
/// ledger state: one Warning event plus `Installed=False`, which drives the
/// derived state to `Error`. The pass then ends with a retry hint; no
/// process error is returned for a translated failure.
pub(super) fn run(r: &Reconciler, state: &mut SystemState) -> Result<StageResult, BoxError> {
    let message = state
        .failure
        .take()
        .unwrap_or_else(|| "reconciliation failed".to_string());

    log_warn(
        COMPONENT,
        "entering error state",
        &[
            (
                "platform",
                state.instance.metadata.name.as_deref().unwrap_or("<unnamed>"),
            ),
            ("error", message.as_str()),
        ],
    );
    r.recorder()
        .record(EventSeverity::Warning, EVENT_REASON_INSTALLATION, &message);

    state.instance.upsert_condition(
        ConditionType::Installed,
        ConditionStatus::False,
        ConditionReason::InstallationErr,
        message,
    );

    Ok(StageResult::requeue(r.config().error_requeue_interval))
}
