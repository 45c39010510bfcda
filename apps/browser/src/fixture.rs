//! JSON-backed connector used by the terminal browser.

use std::{collections::HashMap, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use resource_tree::{NodeKind, NodeSnapshot, ResourceConnector};
use serde::Deserialize;
use shared::{
    domain::{RemoteId, ResourceKind},
    protocol::{ConnectionDescriptor, ResourceDescriptor},
};
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
struct FixtureFile {
    connections: Vec<FixtureConnection>,
}

#[derive(Debug, Clone, Deserialize)]
struct FixtureConnection {
    name: String,
    remote_id: RemoteId,
    #[serde(default)]
    fail_connect: bool,
    #[serde(default)]
    resources: Vec<FixtureNode>,
}

#[derive(Debug, Clone, Deserialize)]
struct FixtureNode {
    name: String,
    remote_id: RemoteId,
    kind: ResourceKind,
    #[serde(default)]
    fail_load: bool,
    /// Deliver this node's children together with the node itself.
    #[serde(default)]
    preload: bool,
    #[serde(default)]
    children: Vec<FixtureNode>,
}

impl FixtureNode {
    fn descriptor(&self) -> ResourceDescriptor {
        let descriptor = ResourceDescriptor::new(self.name.clone(), self.remote_id.0, self.kind);
        if self.preload {
            descriptor.with_children(self.children.iter().map(FixtureNode::descriptor).collect())
        } else {
            descriptor
        }
    }

    fn find(&self, remote_id: RemoteId) -> Option<&FixtureNode> {
        if self.remote_id == remote_id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(remote_id))
    }

    fn validate(&self, connection: &str) -> Result<()> {
        if self.remote_id.is_synthetic() && !self.children.is_empty() && !self.preload {
            bail!(
                "placeholder '{}' in connection '{connection}' must be preloaded",
                self.name
            );
        }
        self.children
            .iter()
            .try_for_each(|child| child.validate(connection))
    }
}

pub struct FixtureConnector {
    connections: HashMap<RemoteId, FixtureConnection>,
    order: Vec<RemoteId>,
    latency: Duration,
}

impl FixtureConnector {
    pub fn from_json(raw: &str) -> Result<Self> {
        let file: FixtureFile = serde_json::from_str(raw).context("failed to parse fixture")?;
        let mut connections = HashMap::new();
        let mut order = Vec::new();
        for connection in file.connections {
            for node in &connection.resources {
                node.validate(&connection.name)?;
            }
            order.push(connection.remote_id);
            if connections.insert(connection.remote_id, connection).is_some() {
                bail!("duplicate connection remote id in fixture");
            }
        }
        Ok(Self {
            connections,
            order,
            latency: Duration::ZERO,
        })
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn connection_descriptors(&self) -> Vec<ConnectionDescriptor> {
        self.order
            .iter()
            .filter_map(|remote_id| self.connections.get(remote_id))
            .map(|connection| ConnectionDescriptor::new(&connection.name, connection.remote_id.0))
            .collect()
    }

    fn connection(&self, remote_id: RemoteId) -> Result<&FixtureConnection> {
        self.connections
            .get(&remote_id)
            .ok_or_else(|| anyhow!("unknown connection {}", remote_id.0))
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl ResourceConnector for FixtureConnector {
    async fn connect(&self, connection: &NodeSnapshot) -> Result<()> {
        self.simulate_latency().await;
        let fixture = self.connection(connection.remote_id)?;
        if fixture.fail_connect {
            bail!("authentication failed for '{}'", fixture.name);
        }
        debug!(connection = %fixture.name, "fixture: connected");
        Ok(())
    }

    async fn load_children(&self, node: &NodeSnapshot) -> Result<Vec<ResourceDescriptor>> {
        self.simulate_latency().await;
        let connection_id = node
            .connection
            .ok_or_else(|| anyhow!("node {} does not belong to a connection", node.id))?;
        let connection = self.connection(connection_id)?;

        let children = match node.kind {
            NodeKind::Connection { .. } => &connection.resources,
            _ => {
                let found = connection
                    .resources
                    .iter()
                    .find_map(|root| root.find(node.remote_id))
                    .ok_or_else(|| anyhow!("resource {} not found", node.remote_id.0))?;
                if found.fail_load {
                    bail!("server error while listing '{}'", found.name);
                }
                &found.children
            }
        };
        Ok(children.iter().map(FixtureNode::descriptor).collect())
    }
}
