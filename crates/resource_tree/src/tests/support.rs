use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{domain::RemoteId, protocol::ResourceDescriptor};
use tokio::sync::{Mutex, Semaphore};

use crate::{NodeSnapshot, ResourceConnector};

/// Connector double keyed by remote id. When gated, every `load_children` call waits for
/// a permit so tests can hold a load in flight.
#[derive(Default)]
pub(crate) struct ScriptedConnector {
    children: HashMap<RemoteId, Vec<ResourceDescriptor>>,
    connect_failures: Mutex<HashSet<RemoteId>>,
    load_failures: Mutex<HashSet<RemoteId>>,
    connect_calls: Arc<Mutex<u32>>,
    load_calls: Arc<Mutex<u32>>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_children(mut self, remote_id: i64, children: Vec<ResourceDescriptor>) -> Self {
        self.children.insert(RemoteId(remote_id), children);
        self
    }

    pub(crate) fn failing_connect(mut self, remote_id: i64) -> Self {
        self.connect_failures.get_mut().insert(RemoteId(remote_id));
        self
    }

    pub(crate) fn failing_load(mut self, remote_id: i64) -> Self {
        self.load_failures.get_mut().insert(RemoteId(remote_id));
        self
    }

    pub(crate) fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    pub(crate) async fn heal(&self, remote_id: i64) {
        self.connect_failures.lock().await.remove(&RemoteId(remote_id));
        self.load_failures.lock().await.remove(&RemoteId(remote_id));
    }

    pub(crate) async fn connect_calls(&self) -> u32 {
        *self.connect_calls.lock().await
    }

    pub(crate) async fn load_calls(&self) -> u32 {
        *self.load_calls.lock().await
    }
}

#[async_trait]
impl ResourceConnector for ScriptedConnector {
    async fn connect(&self, connection: &NodeSnapshot) -> Result<()> {
        *self.connect_calls.lock().await += 1;
        if self
            .connect_failures
            .lock()
            .await
            .contains(&connection.remote_id)
        {
            return Err(anyhow!("connection refused by {}", connection.name));
        }
        Ok(())
    }

    async fn load_children(&self, node: &NodeSnapshot) -> Result<Vec<ResourceDescriptor>> {
        *self.load_calls.lock().await += 1;
        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }
        if self.load_failures.lock().await.contains(&node.remote_id) {
            return Err(anyhow!("server returned 500 for resource {}", node.remote_id.0));
        }
        Ok(self
            .children
            .get(&node.remote_id)
            .cloned()
            .unwrap_or_default())
    }
}
