//! Watch driven informer delivering add, update and delete callbacks.

use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use kube::api::Api;
use kube::runtime::reflector::store::Writer;
use kube::runtime::reflector::{Lookup, ObjectRef, Store};
use kube::runtime::{WatchStreamExt, watcher};
use kube::Resource;
use serde::de::DeserializeOwned;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

#[async_trait]
pub trait ResourceEventHandler<K>: Send + Sync
where
    K: Send + Sync,
{
    async fn on_add(&self, obj: &K);

    async fn on_update(&self, old: &K, new: &K);

    async fn on_delete(&self, obj: &K);
}

/// Translates raw watcher events into handler callbacks, keeping the cache the update and
/// relist detection is based on.
pub struct EventDispatcher<K, H>
where
    K: Resource + Lookup + Clone + 'static,
    <K as Lookup>::DynamicType: Eq + Hash + Clone,
{
    dyntype: <K as Lookup>::DynamicType,
    writer: Writer<K>,
    store: Store<K>,
    /// Objects seen since the last `Init`, while a relist is in progress
    relisted: Option<HashSet<ObjectRef<K>>>,
    handler: Arc<H>,
}

impl<K, H> EventDispatcher<K, H>
where
    K: Resource + Lookup + Clone + Send + Sync + 'static,
    <K as Lookup>::DynamicType: Eq + Hash + Clone + Send + Sync,
    H: ResourceEventHandler<K>,
{
    pub fn new(dyntype: <K as Lookup>::DynamicType, handler: Arc<H>) -> Self {
        let writer = Writer::new(dyntype.clone());
        let store = writer.as_reader();
        Self {
            dyntype,
            writer,
            store,
            relisted: None,
            handler,
        }
    }

    pub fn store(&self) -> &Store<K> {
        &self.store
    }

    fn key(&self, obj: &K) -> ObjectRef<K> {
        ObjectRef::from_obj_with(obj, self.dyntype.clone())
    }

    pub async fn dispatch(&mut self, event: watcher::Event<K>) {
        let previous = match &event {
            watcher::Event::Apply(obj) | watcher::Event::InitApply(obj) => {
                self.store.get(&self.key(obj))
            }
            _ => None,
        };

        let vanished = match &event {
            watcher::Event::Init => {
                self.relisted = Some(HashSet::new());
                Vec::new()
            }
            watcher::Event::InitApply(obj) => {
                let key = self.key(obj);
                self.relisted.get_or_insert_with(HashSet::new).insert(key);
                Vec::new()
            }
            watcher::Event::InitDone => {
                let relisted = self.relisted.take().unwrap_or_default();
                self.store
                    .state()
                    .into_iter()
                    .filter(|obj| !relisted.contains(&self.key(obj)))
                    .collect()
            }
            _ => Vec::new(),
        };

        self.writer.apply_watcher_event(&event);

        match event {
            watcher::Event::Apply(obj) | watcher::Event::InitApply(obj) => {
                self.applied(previous, &obj).await
            }
            watcher::Event::Delete(obj) => self.handler.on_delete(&obj).await,
            watcher::Event::Init => trace!(msg = "relist started"),
            watcher::Event::InitDone => {
                trace!(msg = "relist done", vanished = vanished.len());
                for obj in vanished {
                    self.handler.on_delete(&obj).await;
                }
            }
        }
    }

    async fn applied(&self, previous: Option<Arc<K>>, obj: &K) {
        match previous {
            Some(old) if old.resource_version() != obj.resource_version() => {
                self.handler.on_update(&old, obj).await
            }
            _ => self.handler.on_add(obj).await,
        }
    }

    /// Redelivers `on_add` for every cached object
    pub async fn resync(&self) {
        for obj in self.store.state() {
            self.handler.on_add(&obj).await;
        }
    }
}

/// One watch loop over one kind and API version
pub struct Informer<K, H>
where
    K: Resource + Lookup + Clone + 'static,
    <K as Lookup>::DynamicType: Eq + Hash + Clone,
{
    name: String,
    api: Api<K>,
    config: watcher::Config,
    resync_period: Duration,
    dispatcher: EventDispatcher<K, H>,
}

impl<K, H> Informer<K, H>
where
    K: Resource + Lookup + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    <K as Lookup>::DynamicType: Eq + Hash + Clone + Send + Sync,
    H: ResourceEventHandler<K>,
{
    pub fn new(
        name: String,
        api: Api<K>,
        config: watcher::Config,
        dyntype: <K as Lookup>::DynamicType,
        resync_period: Duration,
        handler: Arc<H>,
    ) -> Self {
        Self {
            name,
            api,
            config,
            resync_period,
            dispatcher: EventDispatcher::new(dyntype, handler),
        }
    }

    pub async fn run(mut self, token: CancellationToken) {
        info!(msg = "starting watch", informer = %self.name);
        let stream = watcher(self.api.clone(), self.config.clone()).default_backoff();
        let mut stream = std::pin::pin!(stream);

        let mut resync =
            tokio::time::interval_at(Instant::now() + self.resync_period, self.resync_period);
        resync.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let completed = tokio::select! {
                _ = token.cancelled() => false,
                _ = resync.tick() => {
                    debug!(
                        msg = "resync",
                        informer = %self.name,
                        objects = self.dispatcher.store().state().len()
                    );
                    until_cancelled(&token, self.dispatcher.resync()).await
                }
                event = stream.next() => match event {
                    Some(Ok(event)) => {
                        until_cancelled(&token, self.dispatcher.dispatch(event)).await
                    }
                    Some(Err(e)) => {
                        error!(msg = "watch stream error", informer = %self.name, %e);
                        true
                    }
                    None => {
                        warn!(msg = "watch stream ended", informer = %self.name);
                        break;
                    }
                },
            };
            if !completed {
                info!(msg = "stopping watch", informer = %self.name);
                break;
            }
        }
    }
}

/// Drives `callbacks` unless the token is cancelled first. Returns false on cancellation.
async fn until_cancelled<F>(token: &CancellationToken, callbacks: F) -> bool
where
    F: Future<Output = ()>,
{
    tokio::select! {
        _ = token.cancelled() => false,
        _ = callbacks => true,
    }
}
