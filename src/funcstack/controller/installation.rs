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

const INSTALLED_MESSAGE: &str = "Platform installed";
const INSTALLING_MESSAGE: &str = "Installation in progress";

/// Probes the applied workloads for readiness. Both outcomes end the pass
/// with a requeue hint: a ready platform re-checks at the steady-state
/// interval, a converging one polls sooner.
pub(super) async fn run(
    r: &Reconciler,
    ctx: &ReconcileContext,
    state: &mut SystemState,
) -> Result<StageResult, BoxError> {
    ctx.ensure_active()?;

    match r.applier().verify().await {
        Ok(true) => {
            state.instance.upsert_condition(
                ConditionType::Installed,
                ConditionStatus::True,
                ConditionReason::Installed,
                INSTALLED_MESSAGE,
            );
            Ok(StageResult::requeue(r.config().requeue_interval))
        }
        Ok(false) => {
            state.instance.upsert_condition(
                ConditionType::Installed,
                ConditionStatus::Unknown,
                ConditionReason::Installation,
                INSTALLING_MESSAGE,
            );
            Ok(StageResult::requeue(r.config().installation_poll_interval))
        }
        Err(err) if ctx.is_cancelled() => Err(err),
        Err(err) => {
            state.failure = Some(format!("installation check failed: {err}"));
            Ok(StageResult::advance(Stage::ErrorRecovery))
        }
    }
}
