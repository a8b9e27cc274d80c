//! The host context an integration is set up against
//!
//! A [`Hub`] owns the shared data store integrations stash their state in, the
//! tasks they schedule and the loader used to bring up dependent platforms.
use std::{
    any::Any,
    collections::HashMap,
    fmt,
    future::Future,
    mem,
    sync::{Arc, Mutex, MutexGuard, RwLock},
};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::HubConfig;

/// Platforms an integration can ask the hub to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    MediaPlayer,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::MediaPlayer => "media_player",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loads a platform on behalf of the integration that discovered it.
#[async_trait]
pub trait PlatformLoader: Send + Sync {
    async fn load_platform(
        &self,
        hub: Hub,
        platform: Platform,
        domain: &'static str,
        discovery_info: serde_json::Value,
        config: Arc<HubConfig>,
    );
}

type Entry = Arc<dyn Any + Send + Sync>;

/// Typed key/value store shared by everything running on the hub.
#[derive(Default)]
pub struct DataStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl DataStore {
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let entries = self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.get(key).cloned().and_then(|entry| entry.downcast::<T>().ok())
    }

    /// Store `value` under `key`, replacing whatever was there.
    pub fn insert<T: Any + Send + Sync>(&self, key: &str, value: T) -> Arc<T> {
        let value = Arc::new(value);
        let mut entries = self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(key.to_string(), value.clone());
        value
    }

    /// The value under `key`, created by `init` when missing or of another type.
    pub fn get_or_insert_with<T, F>(&self, key: &str, init: F) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        let mut entries = self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(existing) = entries.get(key).cloned().and_then(|entry| entry.downcast::<T>().ok()) {
            return existing;
        }
        let value = Arc::new(init());
        entries.insert(key.to_string(), value.clone());
        value
    }

    pub fn contains_key(&self, key: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.contains_key(key)
    }

    pub fn remove(&self, key: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.remove(key).is_some()
    }
}

struct Inner {
    data: DataStore,
    loader: Arc<dyn PlatformLoader>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Cheaply clonable handle to the host context.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<Inner>,
}

impl Hub {
    pub fn new(loader: Arc<dyn PlatformLoader>) -> Hub {
        Hub {
            inner: Arc::new(Inner {
                data: DataStore::default(),
                loader,
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn data(&self) -> &DataStore {
        &self.inner.data
    }

    /// Spawn `future` on the runtime without waiting for it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn create_task<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        let mut tasks = self.tasks();
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    /// Schedule loading of `platform` for the integration `domain`.
    pub fn load_platform(
        &self,
        platform: Platform,
        domain: &'static str,
        discovery_info: serde_json::Value,
        config: Arc<HubConfig>,
    ) {
        debug!("Scheduling {} platform for {}", platform, domain);
        let hub = self.clone();
        let loader = self.inner.loader.clone();
        self.create_task(async move {
            loader
                .load_platform(hub, platform, domain, discovery_info, config)
                .await
        });
    }

    /// Number of scheduled tasks that have not completed yet.
    pub fn pending_tasks(&self) -> usize {
        self.tasks().iter().filter(|task| !task.is_finished()).count()
    }

    /// Wait until every scheduled task, including ones scheduled meanwhile, is done.
    pub async fn block_till_done(&self) {
        loop {
            let tasks = mem::take(&mut *self.tasks());
            if tasks.is_empty() {
                break;
            }
            for task in tasks {
                if let Err(err) = task.await {
                    warn!("Scheduled task failed: {}", err);
                }
            }
        }
    }

    fn tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.inner.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Hub")
            .field("pending_tasks", &self.pending_tasks())
            .finish()
    }
}
