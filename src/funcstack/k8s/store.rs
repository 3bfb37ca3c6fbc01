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

use crate::funcstack::api::types::FunctionPlatform;
use crate::funcstack::k8s::meta::normalize_namespace;
use crate::funcstack::k8s::secret::Secret;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Persistence failures the pipeline must distinguish. A `Conflict` means a
/// stale write was rejected by the optimistic resource-version check and the
/// whole pass should be retried by the external scheduler.
#[derive(Debug)]
pub enum StoreError {
    Conflict { key: String },
    NotFound { key: String },
    Transient(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Conflict { key } => {
                write!(f, "write conflict on '{key}': stale resourceVersion")
            }
            StoreError::NotFound { key } => write!(f, "object '{key}' not found"),
            StoreError::Transient(message) => write!(f, "transient store failure: {message}"),
        }
    }
}

impl Error for StoreError {}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Boundary to the persistence collaborator. Spec writes (`update`) and
/// status writes (`update_status`) are separate calls because the pipeline
/// persists status only at stage boundaries while finalizer changes touch
/// the spec side of the object.
pub trait PlatformRepository: Send + Sync {
    fn get<'a>(&'a self, namespace: &'a str, name: &'a str) -> StoreFuture<'a, FunctionPlatform>;

    fn update(&self, instance: FunctionPlatform) -> StoreFuture<'_, FunctionPlatform>;

    fn update_status(&self, instance: FunctionPlatform) -> StoreFuture<'_, FunctionPlatform>;

    fn get_secret<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
    ) -> StoreFuture<'a, Option<Secret>>;
}

/// In-memory cluster state with monotonic resource versions, mirroring the
/// optimistic-concurrency behavior of a real API server. Backs tests and
/// standalone wiring.
pub struct ClusterStore {
    platforms: RwLock<HashMap<String, FunctionPlatform>>,
    secrets: RwLock<HashMap<String, Secret>>,
    resource_counter: AtomicU64,
}

impl ClusterStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            platforms: RwLock::new(HashMap::new()),
            secrets: RwLock::new(HashMap::new()),
            resource_counter: AtomicU64::new(1),
        })
    }

    fn object_key(namespace: Option<&str>, name: Option<&str>) -> String {
        format!(
            "{}/{}",
            normalize_namespace(namespace),
            name.unwrap_or("<unnamed>")
        )
    }

    fn next_resource_version(&self) -> String {
        self.resource_counter.fetch_add(1, Ordering::SeqCst).to_string()
    }

    /// Seeds an instance, assigning its first resource version.
    pub async fn insert_platform(&self, mut instance: FunctionPlatform) -> FunctionPlatform {
        instance.metadata.resource_version = Some(self.next_resource_version());
        let key = Self::object_key(
            instance.metadata.namespace.as_deref(),
            instance.metadata.name.as_deref(),
        );
        let mut platforms = self.platforms.write().await;
        platforms.insert(key, instance.clone());
        instance
    }

    pub async fn insert_secret(&self, secret: Secret) {
        let key = Self::object_key(
            secret.metadata.namespace.as_deref(),
            secret.metadata.name.as_deref(),
        );
        let mut secrets = self.secrets.write().await;
        secrets.insert(key, secret);
    }

    pub async fn remove_secret(&self, namespace: &str, name: &str) {
        let key = Self::object_key(Some(namespace), Some(name));
        let mut secrets = self.secrets.write().await;
        secrets.remove(&key);
    }

    /// Bumps the stored resource version without going through an update,
    /// making any in-flight writer stale. Test hook for conflict scenarios.
    pub async fn invalidate_platform(&self, namespace: &str, name: &str) {
        let key = Self::object_key(Some(namespace), Some(name));
        let next = self.next_resource_version();
        let mut platforms = self.platforms.write().await;
        if let Some(stored) = platforms.get_mut(&key) {
            stored.metadata.resource_version = Some(next);
        }
    }

    fn check_resource_version(
        stored: &FunctionPlatform,
        incoming: &FunctionPlatform,
        key: &str,
    ) -> Result<(), StoreError> {
        let stored_rv = stored.metadata.resource_version.as_deref();
        let incoming_rv = incoming.metadata.resource_version.as_deref();
        if stored_rv != incoming_rv {
            return Err(StoreError::Conflict {
                key: key.to_string(),
            });
        }
        Ok(())
    }
}

impl PlatformRepository for ClusterStore {
    fn get<'a>(&'a self, namespace: &'a str, name: &'a str) -> StoreFuture<'a, FunctionPlatform> {
        Box::pin(async move {
            let key = Self::object_key(Some(namespace), Some(name));
            let platforms = self.platforms.read().await;
            platforms
                .get(&key)
                .cloned()
                .ok_or(StoreError::NotFound { key })
        })
    }

    fn update(&self, instance: FunctionPlatform) -> StoreFuture<'_, FunctionPlatform> {
        Box::pin(async move {
            let key = Self::object_key(
                instance.metadata.namespace.as_deref(),
                instance.metadata.name.as_deref(),
            );
            let next = self.next_resource_version();
            let mut platforms = self.platforms.write().await;
            let stored = platforms
                .get_mut(&key)
                .ok_or_else(|| StoreError::NotFound { key: key.clone() })?;
            Self::check_resource_version(stored, &instance, &key)?;

            // Spec writes leave the status subresource untouched.
            let mut updated = instance;
            updated.status = stored.status.clone();
            updated.metadata.resource_version = Some(next);
            *stored = updated.clone();
            Ok(updated)
        })
    }

    fn update_status(&self, instance: FunctionPlatform) -> StoreFuture<'_, FunctionPlatform> {
        Box::pin(async move {
            let key = Self::object_key(
                instance.metadata.namespace.as_deref(),
                instance.metadata.name.as_deref(),
            );
            let next = self.next_resource_version();
            let mut platforms = self.platforms.write().await;
            let stored = platforms
                .get_mut(&key)
                .ok_or_else(|| StoreError::NotFound { key: key.clone() })?;
            Self::check_resource_version(stored, &instance, &key)?;

            stored.status = instance.status;
            stored.metadata.resource_version = Some(next);
            Ok(stored.clone())
        })
    }

    fn get_secret<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
    ) -> StoreFuture<'a, Option<Secret>> {
        Box::pin(async move {
            let key = Self::object_key(Some(namespace), Some(name));
            let secrets = self.secrets.read().await;
            Ok(secrets.get(&key).cloned())
        })
    }
}
