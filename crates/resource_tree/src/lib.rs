use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::{NodeId, RemoteId},
    error::Notice,
    protocol::ResourceDescriptor,
};

pub mod breadcrumb;
pub mod error;
pub mod loader;
pub mod navigation;
pub mod projection;
pub mod tree;

pub use breadcrumb::{Breadcrumb, Crumb};
pub use error::{LoadError, NavigationError, ProjectionError, TreeError};
pub use loader::{LoadOrchestrator, LoadResult, LoadSuccess};
pub use navigation::{NavigationController, NavigationOutcome};
pub use projection::{ListProjection, Row};
pub use tree::{NodeKind, ResourceNode, ResourceTree, SharedTree};

const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Copy of a node handed to the connector, taken so no tree lock is held while the
/// connector is awaited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub name: String,
    pub remote_id: RemoteId,
    pub kind: NodeKind,
    pub connection: Option<RemoteId>,
}

/// Remote side of the tree. Both calls may be retried after a failure.
#[async_trait]
pub trait ResourceConnector: Send + Sync {
    async fn connect(&self, connection: &NodeSnapshot) -> Result<()>;
    async fn load_children(&self, node: &NodeSnapshot) -> Result<Vec<ResourceDescriptor>>;
}

pub struct MissingResourceConnector;

#[async_trait]
impl ResourceConnector for MissingResourceConnector {
    async fn connect(&self, connection: &NodeSnapshot) -> Result<()> {
        Err(anyhow!(
            "no resource connector configured for connection '{}'",
            connection.name
        ))
    }

    async fn load_children(&self, node: &NodeSnapshot) -> Result<Vec<ResourceDescriptor>> {
        Err(anyhow!(
            "no resource connector configured to load node {}",
            node.id
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    /// Tree contents, the current node or the loading state changed; rows and breadcrumb
    /// should be derived again.
    TreeChanged,
    LoadStarted {
        node_id: NodeId,
    },
    LoadFailed {
        node_id: NodeId,
        notice: Notice,
    },
    AddRootRequested,
    ResourceSelected {
        node_id: NodeId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrowserOptions {
    pub event_capacity: usize,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
