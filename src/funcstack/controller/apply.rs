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
    BoxError, ReconcileContext, Reconciler, Stage, StageResult,
};
use crate::funcstack::controller::system_state::SystemState;
use crate::funcstack::logger::log_debug;

const COMPONENT: &str = "apply-resources";

/// Hands the accumulated flags to the resource-application collaborator.
/// An apply failure is recoverable: it is recorded in working state and
/// routed to error recovery rather than returned as a process error.
pub(super) async fn run(
    r: &Reconciler,
    ctx: &ReconcileContext,
    state: &mut SystemState,
) -> Result<StageResult, BoxError> {
    state.instance.upsert_condition(
        ConditionType::Installed,
        ConditionStatus::Unknown,
        ConditionReason::Installation,
        "Applying platform resources",
    );

    ctx.ensure_active()?;
    let flags = state.flags.build();
    log_debug(
        COMPONENT,
        "applying platform resources",
        &[(
            "platform",
            state.instance.metadata.name.as_deref().unwrap_or("<unnamed>"),
        )],
    );

    match r.applier().apply(&flags).await {
        Ok(()) => Ok(StageResult::advance(Stage::CheckInstallation)),
        Err(err) if ctx.is_cancelled() => Err(err),
        Err(err) => {
            state.failure = Some(format!("resource apply failed: {err}"));
            Ok(StageResult::advance(Stage::ErrorRecovery))
        }
    }
}
