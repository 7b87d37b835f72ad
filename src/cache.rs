//! Process-lifetime cache of application GUID to application name.
//!
//! Entries are created on the first successful remote lookup and never evicted.
//! Failed lookups are not cached, so an id that cannot be resolved now may still
//! resolve on a later encounter. The map lock is held only for the read and the
//! write, never across the remote call; two concurrent misses for the same id can
//! both reach the resolver, and the first write wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::debug;

use crate::app::ports::AppNameResolver;
use crate::error::NozzleError;
use crate::observability::metrics;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("app name resolver must be initialized before use")]
    NotInitialized,

    #[error("failed to retrieve name: {0}")]
    Lookup(#[source] NozzleError),
}

pub struct AppNameCache {
    resolver: Option<Arc<dyn AppNameResolver>>,
    contents: Mutex<HashMap<String, String>>,
}

impl AppNameCache {
    pub fn new(resolver: Arc<dyn AppNameResolver>) -> Self {
        Self {
            resolver: Some(resolver),
            contents: Mutex::new(HashMap::new()),
        }
    }

    /// A cache with no resolver; every lookup fails with `NotInitialized`.
    /// Deployments that authenticate with a bare token exchange run this way.
    pub fn uninitialized() -> Self {
        Self {
            resolver: None,
            contents: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.resolver.is_some()
    }

    pub async fn resolve(&self, app_guid: &str) -> Result<String, CacheError> {
        let resolver = self.resolver.as_ref().ok_or(CacheError::NotInitialized)?;

        let cached = self.lock().get(app_guid).cloned();
        if let Some(name) = cached {
            metrics::cache::hit();
            return Ok(name);
        }
        metrics::cache::miss();

        let name = match resolver.app_name(app_guid).await {
            Ok(name) => name,
            Err(e) => {
                metrics::cache::lookup_failed();
                return Err(CacheError::Lookup(e));
            }
        };

        let mut contents = self.lock();
        let stored = contents.entry(app_guid.to_string()).or_insert(name);
        debug!(app_guid, app_name = %stored, "cached app name");
        Ok(stored.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.contents.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
