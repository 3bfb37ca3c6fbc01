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
use crate::funcstack::controller::reconcile::{
    BoxError, ReconcileContext, Reconciler, StageResult,
};
use crate::funcstack::controller::system_state::SystemState;
use crate::funcstack::k8s::event::EventSeverity;
use crate::funcstack::logger::{log_info, log_warn};

const COMPONENT: &str = "deletion";
const EVENT_REASON_DELETION: &str = "Deletion";

/// Tears down applied resources for an instance under deletion and releases
/// the finalizer once cleanup succeeded. Cleanup failures stay observable in
/// the ledger and are retried by the external queue.
pub(super) async fn run(
    r: &Reconciler,
    ctx: &ReconcileContext,
    state: &mut SystemState,
) -> Result<StageResult, BoxError> {
    let name = state
        .instance
        .metadata
        .name
        .clone()
        .unwrap_or_else(|| "<unnamed>".to_string());

    state.instance.upsert_condition(
        ConditionType::Deleted,
        ConditionStatus::Unknown,
        ConditionReason::Deletion,
        "Uninstalling platform resources",
    );

    ctx.ensure_active()?;
    match r.applier().uninstall().await {
        Ok(()) => {}
        Err(err) if ctx.is_cancelled() => return Err(err),
        Err(err) => {
            let message = format!("resource removal failed: {err}");
            log_warn(
                COMPONENT,
                "uninstall failed",
                &[("platform", name.as_str()), ("error", message.as_str())],
            );
            r.recorder()
                .record(EventSeverity::Warning, EVENT_REASON_DELETION, &message);
            state.instance.upsert_condition(
                ConditionType::Deleted,
                ConditionStatus::False,
                ConditionReason::DeletionErr,
                message,
            );
            return Ok(StageResult::stop());
        }
    }

    state.instance.upsert_condition(
        ConditionType::Deleted,
        ConditionStatus::True,
        ConditionReason::Deletion,
        "Platform resources removed",
    );

    let finalizer = r.config().finalizer.clone();
    if state.instance.metadata.has_finalizer(&finalizer) {
        state.instance.metadata.remove_finalizer(&finalizer);
        let updated = r
            .repository()
            .update(state.instance.clone())
            .await
            .map_err(|err| Box::new(err) as BoxError)?;
        state.instance.metadata.resource_version = updated.metadata.resource_version;
    }

    log_info(COMPONENT, "platform resources removed", &[("platform", name.as_str())]);
    Ok(StageResult::stop())
}
