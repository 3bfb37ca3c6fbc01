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

use chrono::{SecondsFormat, Utc};
use std::collections::VecDeque;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};

const DEFAULT_EVENT_RETENTION: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSeverity {
    Normal,
    Warning,
}

impl EventSeverity {
    pub const fn as_str(self) -> &'static str {
        match self {
            EventSeverity::Normal => "Normal",
            EventSeverity::Warning => "Warning",
        }
    }
}

impl Display for EventSeverity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded audit entry. `render` matches the conventional
/// `<severity> <reason> <message>` line operators grep for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub severity: EventSeverity,
    pub reason: String,
    pub message: String,
    pub timestamp: String,
}

impl RecordedEvent {
    pub fn render(&self) -> String {
        format!("{} {} {}", self.severity, self.reason, self.message)
    }
}

/// Sink for the audit trail of reconciliation effects.
pub trait EventRecorder: Send + Sync {
    fn record(&self, severity: EventSeverity, reason: &str, message: &str);
}

/// Bounded in-memory event log. Oldest entries roll off once the retention
/// capacity is reached.
pub struct EventRegistry {
    records: Mutex<VecDeque<RecordedEvent>>,
    capacity: usize,
}

impl EventRegistry {
    pub fn new() -> Arc<Self> {
        Self::with_capacity(DEFAULT_EVENT_RETENTION)
    }

    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            capacity: capacity.max(1),
        })
    }

    /// Drains every retained event, oldest first.
    pub fn take(&self) -> Vec<RecordedEvent> {
        let mut guard = self.records.lock().expect("event registry poisoned");
        guard.drain(..).collect()
    }

    /// Drains retained events as rendered `<severity> <reason> <message>` lines.
    pub fn take_rendered(&self) -> Vec<String> {
        self.take().iter().map(RecordedEvent::render).collect()
    }
}

impl EventRecorder for EventRegistry {
    fn record(&self, severity: EventSeverity, reason: &str, message: &str) {
        let event = RecordedEvent {
            severity,
            reason: reason.to_string(),
            message: message.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        let mut guard = self.records.lock().expect("event registry poisoned");
        if guard.len() == self.capacity {
            guard.pop_front();
        }
        guard.push_back(event);
    }
}
