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

use crate::funcstack::api::types::{FunctionPlatform, FunctionPlatformStatus, PlatformState};
use crate::funcstack::chart::ResourceApplier;
use crate::funcstack::config::ReconcileConfig;
use crate::funcstack::controller::system_state::{emit_configuration_events, SystemState};
use crate::funcstack::controller::{
    apply, configuration, deletion, error_recovery, initialization, installation,
};
use crate::funcstack::k8s::event::EventRecorder;
use crate::funcstack::k8s::store::PlatformRepository;
use crate::funcstack::logger::{log_debug, log_info, log_warn};
use crate::funcstack::util::error::new_error;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const COMPONENT: &str = "platform-reconciler";

pub type BoxError = Box<dyn Error + Send + Sync>;

/// Tag identifying a pipeline stage. The driver dispatches through a
/// tag→handler match instead of holding live function values, which keeps
/// the pipeline inspectable in logs and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Initialization,
    ControllerConfiguration,
    ApplyResources,
    CheckInstallation,
    ErrorRecovery,
    Deletion,
}

impl Stage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Stage::Initialization => "Initialization",
            Stage::ControllerConfiguration => "ControllerConfiguration",
            Stage::ApplyResources => "ApplyResources",
            Stage::CheckInstallation => "CheckInstallation",
            Stage::ErrorRecovery => "ErrorRecovery",
            Stage::Deletion => "Deletion",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a stage hands back to the driver: the successor to run, or nothing
/// when the pipeline is complete for this pass, plus an optional requeue
/// hint. A set hint always stops the loop; scheduling the future pass is the
/// external work queue's job.
#[derive(Debug)]
pub struct StageResult {
    pub next: Option<Stage>,
    pub requeue_after: Option<Duration>,
}

impl StageResult {
    pub fn advance(stage: Stage) -> Self {
        Self {
            next: Some(stage),
            requeue_after: None,
        }
    }

    pub fn stop() -> Self {
        Self {
            next: None,
            requeue_after: None,
        }
    }

    pub fn requeue(delay: Duration) -> Self {
        Self {
            next: None,
            requeue_after: Some(delay),
        }
    }
}

/// Ambient execution context threaded through every stage invocation. Stages
/// consult the cancellation token before blocking calls and return promptly
/// once it fires.
#[derive(Clone, Default)]
pub struct ReconcileContext {
    cancellation: CancellationToken,
}

impl ReconcileContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(cancellation: CancellationToken) -> Self {
        Self { cancellation }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn ensure_active(&self) -> Result<(), BoxError> {
        if self.is_cancelled() {
            return Err(new_error("reconciliation cancelled"));
        }
        Ok(())
    }
}

/// Successful pass outcome: the final status and an optional hint that the
/// external queue should schedule another pass after the given delay.
#[derive(Debug)]
pub struct PassOutcome {
    pub status: FunctionPlatformStatus,
    pub requeue_after: Option<Duration>,
}

/// Failed pass. Carries the status exactly as the failing step left it; the
/// failing stage is responsible for leaving status self-consistent, and the
/// driver performs no rollback.
#[derive(Debug)]
pub struct PassError {
    pub status: FunctionPlatformStatus,
    pub source: BoxError,
}

impl Display for PassError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "reconciliation pass failed: {}", self.source)
    }
}

impl Error for PassError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Drives one instance through the stage pipeline. Holds the ambient
/// dependencies every stage works against; per-pass state lives in
/// `SystemState`, never here, so passes for different instances can run in
/// independent contexts.
pub struct Reconciler {
    repository: Arc<dyn PlatformRepository>,
    recorder: Arc<dyn EventRecorder>,
    applier: Arc<dyn ResourceApplier>,
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(
        repository: Arc<dyn PlatformRepository>,
        recorder: Arc<dyn EventRecorder>,
        applier: Arc<dyn ResourceApplier>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            repository,
            recorder,
            applier,
            config,
        }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub(super) fn repository(&self) -> &dyn PlatformRepository {
        self.repository.as_ref()
    }

    pub(super) fn recorder(&self) -> &dyn EventRecorder {
        self.recorder.as_ref()
    }

    pub(super) fn applier(&self) -> &dyn ResourceApplier {
        self.applier.as_ref()
    }

    /// Runs one full pass: build working state, trampoline through stages
    /// until one stops the pipeline, persisting status and emitting diff
    /// events at every stage boundary.
    pub async fn run(
        &self,
        ctx: &ReconcileContext,
        instance: FunctionPlatform,
    ) -> Result<PassOutcome, PassError> {
        let name = instance
            .metadata
            .name
            .clone()
            .unwrap_or_else(|| "<unnamed>".to_string());
        let mut state = SystemState::new(instance);
        let mut stage = Stage::Initialization;

        loop {
            if let Err(source) = ctx.ensure_active() {
                log_warn(
                    COMPONENT,
                    "pass cancelled before stage dispatch",
                    &[("platform", name.as_str()), ("stage", stage.as_str())],
                );
                return Err(PassError {
                    status: state.instance.status.clone(),
                    source,
                });
            }

            log_debug(
                COMPONENT,
                "dispatching stage",
                &[("platform", name.as_str()), ("stage", stage.as_str())],
            );

            let result = match self.step(stage, ctx, &mut state).await {
                Ok(result) => result,
                Err(source) => {
                    log_warn(
                        COMPONENT,
                        "stage failed",
                        &[
                            ("platform", name.as_str()),
                            ("stage", stage.as_str()),
                            ("error", source.to_string().as_str()),
                        ],
                    );
                    return Err(PassError {
                        status: state.instance.status.clone(),
                        source,
                    });
                }
            };

            // A state that disagrees with its own ledger is a defect, not a
            // runtime condition.
            debug_assert_eq!(
                state.instance.status.state,
                PlatformState::derive(
                    &state.instance.status.conditions,
                    state.instance.is_deleting()
                ),
                "discrete state drifted from the condition ledger"
            );

            // The only status write happens here, at the stage boundary.
            match self.repository.update_status(state.instance.clone()).await {
                Ok(persisted) => {
                    state.instance.metadata.resource_version =
                        persisted.metadata.resource_version;
                }
                Err(err) => {
                    return Err(PassError {
                        status: state.instance.status.clone(),
                        source: Box::new(err),
                    });
                }
            }

            emit_configuration_events(
                &state.snapshot,
                &state.instance.status,
                self.recorder.as_ref(),
            );
            state.save_snapshot();

            if let Some(delay) = result.requeue_after {
                log_info(
                    COMPONENT,
                    "pass complete, requeue requested",
                    &[
                        ("platform", name.as_str()),
                        ("stage", stage.as_str()),
                        ("state", state.instance.status.state.as_str()),
                        ("delay_secs", delay.as_secs().to_string().as_str()),
                    ],
                );
                return Ok(PassOutcome {
                    status: state.instance.status.clone(),
                    requeue_after: Some(delay),
                });
            }

            match result.next {
                Some(next) => stage = next,
                None => {
                    log_info(
                        COMPONENT,
                        "pass complete",
                        &[
                            ("platform", name.as_str()),
                            ("stage", stage.as_str()),
                            ("state", state.instance.status.state.as_str()),
                        ],
                    );
                    return Ok(PassOutcome {
                        status: state.instance.status.clone(),
                        requeue_after: None,
                    });
                }
            }
        }
    }

    /// Invokes a single stage against the working state. `run` is the
    /// trampoline over this; exposing the single step keeps each stage
    /// individually exercisable.
    pub async fn step(
        &self,
        stage: Stage,
        ctx: &ReconcileContext,
        state: &mut SystemState,
    ) -> Result<StageResult, BoxError> {
        match stage {
            Stage::Initialization => initialization::run(self, ctx, state).await,
            Stage::ControllerConfiguration => configuration::run(self, ctx, state).await,
            Stage::ApplyResources => apply::run(self, ctx, state).await,
            Stage::CheckInstallation => installation::run(self, ctx, state).await,
            Stage::ErrorRecovery => error_recovery::run(self, state),
            Stage::Deletion => deletion::run(self, ctx, state).await,
        }
    }
}
