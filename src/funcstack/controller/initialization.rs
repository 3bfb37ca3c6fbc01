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

use crate::funcstack::api::types::PlatformState;
use crate::funcstack::controller::reconcile::{
    BoxError, ReconcileContext, Reconciler, Stage, StageResult,
};
use crate::funcstack::controller::system_state::SystemState;
use crate::funcstack::logger::log_debug;

const COMPONENT: &str = "initialization";

/// Entry stage of every pass: routes instances under deletion to cleanup and
/// makes sure live instances carry the cleanup finalizer before any resource
/// is materialized on their behalf.
pub(super) async fn run(
    r: &Reconciler,
    ctx: &ReconcileContext,
    state: &mut SystemState,
) -> Result<StageResult, BoxError> {
    // A deletion timestamp can appear between passes; resync the derived
    // state with the ledger before any stage reads it.
    state.instance.status.state = PlatformState::derive(
        &state.instance.status.conditions,
        state.instance.is_deleting(),
    );

    if state.instance.is_deleting() {
        return Ok(StageResult::advance(Stage::Deletion));
    }

    let finalizer = r.config().finalizer.clone();
    if !state.instance.metadata.has_finalizer(&finalizer) {
        ctx.ensure_active()?;
        state.instance.metadata.add_finalizer(&finalizer);
        let updated = r
            .repository()
            .update(state.instance.clone())
            .await
            .map_err(|err| Box::new(err) as BoxError)?;
        state.instance.metadata.resource_version = updated.metadata.resource_version;
        log_debug(
            COMPONENT,
            "finalizer attached",
            &[(
                "platform",
                state.instance.metadata.name.as_deref().unwrap_or("<unnamed>"),
            )],
        );
    }

    Ok(StageResult::advance(Stage::ControllerConfiguration))
}
