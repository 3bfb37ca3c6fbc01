#![allow(dead_code)]

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

use crate::funcstack::chart::{ApplyFuture, ResourceApplier};
use crate::funcstack::util::error::new_error;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Scriptable stand-in for the chart/manifest collaborator. Tests flip the
/// switches to drive the pipeline down specific branches and inspect the
/// flags handed over by the apply stage.
#[derive(Default)]
pub struct ScriptedApplier {
    fail_apply: AtomicBool,
    fail_verify: AtomicBool,
    fail_uninstall: AtomicBool,
    ready: AtomicBool,
    apply_calls: AtomicUsize,
    uninstall_calls: AtomicUsize,
    last_flags: Mutex<Option<Value>>,
}

impl ScriptedApplier {
    pub fn new() -> Self {
        let applier = Self::default();
        applier.ready.store(true, Ordering::Relaxed);
        applier
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Relaxed);
    }

    pub fn fail_apply(&self, fail: bool) {
        self.fail_apply.store(fail, Ordering::Relaxed);
    }

    pub fn fail_verify(&self, fail: bool) {
        self.fail_verify.store(fail, Ordering::Relaxed);
    }

    pub fn fail_uninstall(&self, fail: bool) {
        self.fail_uninstall.store(fail, Ordering::Relaxed);
    }

    pub fn apply_calls(&self) -> usize {
        self.apply_calls.load(Ordering::Relaxed)
    }

    pub fn uninstall_calls(&self) -> usize {
        self.uninstall_calls.load(Ordering::Relaxed)
    }

    pub fn last_flags(&self) -> Option<Value> {
        self.last_flags.lock().expect("applier poisoned").clone()
    }
}

impl ResourceApplier for ScriptedApplier {
    fn apply<'a>(&'a self, flags: &'a Value) -> ApplyFuture<'a, ()> {
        Box::pin(async move {
            self.apply_calls.fetch_add(1, Ordering::Relaxed);
            *self.last_flags.lock().expect("applier poisoned") = Some(flags.clone());
            if self.fail_apply.load(Ordering::Relaxed) {
                return Err(new_error("scripted apply failure"));
            }
            Ok(())
        })
    }

    fn verify(&self) -> ApplyFuture<'_, bool> {
        Box::pin(async move {
            if self.fail_verify.load(Ordering::Relaxed) {
                return Err(new_error("scripted verify failure"));
            }
            Ok(self.ready.load(Ordering::Relaxed))
        })
    }

    fn uninstall(&self) -> ApplyFuture<'_, ()> {
        Box::pin(async move {
            self.uninstall_calls.fetch_add(1, Ordering::Relaxed);
            if self.fail_uninstall.load(Ordering::Relaxed) {
                return Err(new_error("scripted uninstall failure"));
            }
            Ok(())
        })
    }
}
