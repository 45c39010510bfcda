use serde::{Deserialize, Serialize};

use crate::domain::{RemoteId, ResourceKind};

/// A child node returned by a connector. Local ids are assigned by the tree on install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub name: String,
    pub remote_id: RemoteId,
    pub kind: ResourceKind,
    /// Children already known to the connector. When present the node is installed as
    /// loaded and never fetched on its own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<ResourceDescriptor>>,
}

impl ResourceDescriptor {
    pub fn new(name: impl Into<String>, remote_id: i64, kind: ResourceKind) -> Self {
        Self {
            name: name.into(),
            remote_id: RemoteId(remote_id),
            kind,
            children: None,
        }
    }

    pub fn group(name: impl Into<String>, remote_id: i64) -> Self {
        Self::new(name, remote_id, ResourceKind::ResourceGroup)
    }

    pub fn resource(name: impl Into<String>, remote_id: i64) -> Self {
        Self::new(name, remote_id, ResourceKind::Resource)
    }

    pub fn with_children(mut self, children: Vec<ResourceDescriptor>) -> Self {
        self.children = Some(children);
        self
    }
}

/// A connection (account) registered under the connections root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    pub name: String,
    pub remote_id: RemoteId,
    #[serde(default)]
    pub connected: bool,
}

impl ConnectionDescriptor {
    pub fn new(name: impl Into<String>, remote_id: i64) -> Self {
        Self {
            name: name.into(),
            remote_id: RemoteId(remote_id),
            connected: false,
        }
    }
}
