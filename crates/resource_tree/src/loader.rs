use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Instant,
};

use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use shared::{
    domain::NodeId,
    protocol::{ConnectionDescriptor, ResourceDescriptor},
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    error::LoadError,
    tree::{NodeKind, SharedTree},
    NodeSnapshot, ResourceConnector, TreeEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSuccess {
    Cached,
    Fetched { children: usize },
}

pub type LoadResult = Result<LoadSuccess, LoadError>;

type PendingLoad = Shared<BoxFuture<'static, LoadResult>>;
type InflightMap = Arc<Mutex<HashMap<NodeId, PendingLoad>>>;

/// Fetches children on demand with at most one outstanding fetch per node.
///
/// Fetches run on spawned tasks, so a caller that stops awaiting `request_load` does not
/// cancel the fetch: the result is still installed into the tree for later navigation.
pub struct LoadOrchestrator {
    tree: SharedTree,
    connector: Arc<dyn ResourceConnector>,
    inflight: InflightMap,
    events: broadcast::Sender<TreeEvent>,
}

impl LoadOrchestrator {
    pub fn new(
        tree: SharedTree,
        connector: Arc<dyn ResourceConnector>,
        events: broadcast::Sender<TreeEvent>,
    ) -> Self {
        Self {
            tree,
            connector,
            inflight: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    pub fn is_loading(&self, node_id: NodeId) -> bool {
        lock_inflight(&self.inflight).contains_key(&node_id)
    }

    pub fn in_flight(&self) -> usize {
        lock_inflight(&self.inflight).len()
    }

    pub async fn request_load(&self, node_id: NodeId) -> LoadResult {
        let pending = {
            // The inflight lock is taken before the tree is read; a fetch installs its
            // children before it releases its inflight entry, so a missing entry with
            // unloaded children always means no fetch is running.
            let mut inflight = lock_inflight(&self.inflight);
            if let Some(existing) = inflight.get(&node_id) {
                debug!(node_id = node_id.0, "load: joining in-flight request");
                existing.clone()
            } else {
                let target = {
                    let tree = self.tree.read();
                    let node = tree.get(node_id)?;
                    if node.is_children_loaded() {
                        debug!(node_id = node_id.0, "load: children already known");
                        return Ok(LoadSuccess::Cached);
                    }
                    if !node.kind().is_container() {
                        return Err(LoadError::NotLoadable { node_id });
                    }
                    NodeSnapshot {
                        id: node.id(),
                        name: node.name().to_string(),
                        remote_id: node.remote_id(),
                        kind: node.kind(),
                        connection: tree.connection_of(node_id).map(|c| c.remote_id()),
                    }
                };
                let pending = self.dispatch(target);
                inflight.insert(node_id, pending.clone());
                pending
            }
        };
        pending.await
    }

    pub fn install_connection(&self, connection: ConnectionDescriptor) -> NodeId {
        let id = self.tree.write().push_connection(connection);
        info!(node_id = id.0, "load: connection registered");
        let _ = self.events.send(TreeEvent::TreeChanged);
        id
    }

    fn dispatch(&self, target: NodeSnapshot) -> PendingLoad {
        let node_id = target.id;
        info!(
            node_id = node_id.0,
            kind = ?target.kind,
            name = %target.name,
            "load: dispatching fetch"
        );
        let _ = self.events.send(TreeEvent::LoadStarted { node_id });

        let task = tokio::spawn(run_fetch(
            FetchContext {
                tree: self.tree.clone(),
                connector: Arc::clone(&self.connector),
                inflight: Arc::clone(&self.inflight),
                events: self.events.clone(),
            },
            target,
        ));

        let events = self.events.clone();
        async move {
            match task.await {
                Ok(result) => result,
                Err(join_error) => {
                    // run_fetch never reached its own LoadFailed branch.
                    let err = LoadError::Interrupted {
                        node_id,
                        message: join_error.to_string(),
                    };
                    warn!(node_id = node_id.0, error = %err, "load: fetch task aborted");
                    let _ = events.send(TreeEvent::LoadFailed {
                        node_id,
                        notice: err.notice(),
                    });
                    Err(err)
                }
            }
        }
        .boxed()
        .shared()
    }
}

struct FetchContext {
    tree: SharedTree,
    connector: Arc<dyn ResourceConnector>,
    inflight: InflightMap,
    events: broadcast::Sender<TreeEvent>,
}

struct InflightEntry {
    inflight: InflightMap,
    node_id: NodeId,
}

impl Drop for InflightEntry {
    fn drop(&mut self) {
        lock_inflight(&self.inflight).remove(&self.node_id);
    }
}

async fn run_fetch(ctx: FetchContext, target: NodeSnapshot) -> LoadResult {
    let entry = InflightEntry {
        inflight: Arc::clone(&ctx.inflight),
        node_id: target.id,
    };
    let started = Instant::now();

    let result = match fetch_children(ctx.connector.as_ref(), &target).await {
        Ok((connected, children)) => install(&ctx.tree, &target, connected, children),
        Err(err) => Err(err),
    };
    drop(entry);

    match &result {
        Ok(success) => {
            info!(
                node_id = target.id.0,
                outcome = ?success,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "load: fetch completed"
            );
            let _ = ctx.events.send(TreeEvent::TreeChanged);
        }
        Err(err) => {
            warn!(node_id = target.id.0, error = %err, "load: fetch failed");
            let _ = ctx.events.send(TreeEvent::LoadFailed {
                node_id: target.id,
                notice: err.notice(),
            });
        }
    }
    result
}

async fn fetch_children(
    connector: &dyn ResourceConnector,
    target: &NodeSnapshot,
) -> Result<(bool, Vec<ResourceDescriptor>), LoadError> {
    let needs_connect = matches!(target.kind, NodeKind::Connection { connected: false });
    if needs_connect {
        connector
            .connect(target)
            .await
            .map_err(|err| LoadError::Connect {
                node_id: target.id,
                name: target.name.clone(),
                message: format!("{err:#}"),
            })?;
        debug!(node_id = target.id.0, "load: connected");
    }

    let children = connector
        .load_children(target)
        .await
        .map_err(|err| LoadError::Load {
            node_id: target.id,
            name: target.name.clone(),
            message: format!("{err:#}"),
        })?;
    Ok((needs_connect, children))
}

fn install(
    tree: &SharedTree,
    target: &NodeSnapshot,
    connected: bool,
    children: Vec<ResourceDescriptor>,
) -> LoadResult {
    let mut tree = tree.write();
    let installed = tree.set_children(target.id, children)?;
    if connected {
        tree.set_connected(target.id, true)?;
    }
    Ok(LoadSuccess::Fetched {
        children: installed.len(),
    })
}

fn lock_inflight(inflight: &InflightMap) -> MutexGuard<'_, HashMap<NodeId, PendingLoad>> {
    inflight.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "tests/loader_tests.rs"]
mod tests;
