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

use crate::funcstack::k8s::meta::ObjectMeta;
use crate::funcstack::util::error::with_context;
use base64::engine::general_purpose::STANDARD as BASE64_ENGINE;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;

/// Secret-like object: opaque key/value payload with base64-encoded values,
/// matching the Kubernetes wire convention.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Secret {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

impl Secret {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            metadata: ObjectMeta::named(namespace, name),
            data: BTreeMap::new(),
        }
    }

    pub fn with_entry(mut self, key: &str, plaintext: &str) -> Self {
        self.data
            .insert(key.to_string(), BASE64_ENGINE.encode(plaintext));
        self
    }

    /// Decodes the entry stored under `key`, returning `None` when absent.
    pub fn decode(&self, key: &str) -> Result<Option<String>, Box<dyn Error + Send + Sync>> {
        let Some(encoded) = self.data.get(key) else {
            return Ok(None);
        };
        let raw = BASE64_ENGINE
            .decode(encoded)
            .map_err(|e| with_context(e, format!("Failed to decode secret entry '{key}'")))?;
        let value = String::from_utf8(raw)
            .map_err(|e| with_context(e, format!("Secret entry '{key}' is not valid UTF-8")))?;
        Ok(Some(value))
    }
}
