//! Arena-backed resource tree. Nodes are owned by the arena and reference each other by id.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use shared::{
    domain::{NodeId, RemoteId, ResourceKind},
    protocol::{ConnectionDescriptor, ResourceDescriptor},
};

use crate::error::TreeError;

const ROOT_NAME: &str = "Connections";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    ConnectionsRoot,
    Connection { connected: bool },
    ResourceGroup,
    Resource,
}

impl NodeKind {
    fn from_resource(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::ResourceGroup => NodeKind::ResourceGroup,
            ResourceKind::Resource => NodeKind::Resource,
        }
    }

    pub fn is_container(self) -> bool {
        match self {
            NodeKind::ConnectionsRoot | NodeKind::Connection { .. } | NodeKind::ResourceGroup => {
                true
            }
            NodeKind::Resource => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResourceNode {
    id: NodeId,
    name: String,
    remote_id: RemoteId,
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    children_loaded: bool,
}

impl ResourceNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn remote_id(&self) -> RemoteId {
        self.remote_id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn is_children_loaded(&self) -> bool {
        self.children_loaded
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.kind, NodeKind::Connection { connected: true })
    }

    /// Placeholder nodes have no remote identity and are skipped when walking ancestors.
    /// The connections root is the walk's terminus and never counts as one.
    pub fn is_synthetic(&self) -> bool {
        self.kind != NodeKind::ConnectionsRoot && self.remote_id.is_synthetic()
    }

    pub fn child_count(&self) -> Option<usize> {
        self.children_loaded.then_some(self.children.len())
    }

    pub fn child_ids(&self) -> Option<&[NodeId]> {
        self.children_loaded.then_some(self.children.as_slice())
    }

    pub fn child_at(&self, index: usize) -> Result<NodeId, TreeError> {
        if !self.children_loaded {
            return Err(TreeError::ChildrenNotLoaded(self.id));
        }
        self.children
            .get(index)
            .copied()
            .ok_or(TreeError::InvalidIndex {
                node_id: self.id,
                index,
                len: self.children.len(),
            })
    }
}

#[derive(Debug, Clone)]
pub struct ResourceTree {
    nodes: HashMap<NodeId, ResourceNode>,
    root: NodeId,
    next_id: i64,
}

impl ResourceTree {
    pub fn new(connections: impl IntoIterator<Item = ConnectionDescriptor>) -> Self {
        let root = NodeId(1);
        let mut tree = Self {
            nodes: HashMap::new(),
            root,
            next_id: root.0 + 1,
        };
        tree.nodes.insert(
            root,
            ResourceNode {
                id: root,
                name: ROOT_NAME.to_string(),
                remote_id: RemoteId::SYNTHETIC,
                kind: NodeKind::ConnectionsRoot,
                parent: None,
                children: Vec::new(),
                children_loaded: true,
            },
        );
        for connection in connections {
            tree.push_connection(connection);
        }
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&ResourceNode> {
        self.nodes.get(&id)
    }

    pub fn get(&self, id: NodeId) -> Result<&ResourceNode, TreeError> {
        self.nodes.get(&id).ok_or(TreeError::UnknownNode(id))
    }

    pub fn child_of(&self, parent: NodeId, index: usize) -> Result<&ResourceNode, TreeError> {
        let child = self.get(parent)?.child_at(index)?;
        self.get(child)
    }

    pub fn connection_of(&self, id: NodeId) -> Option<&ResourceNode> {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = self.nodes.get(&current)?;
            if matches!(node.kind, NodeKind::Connection { .. }) {
                return Some(node);
            }
            cursor = node.parent;
        }
        None
    }

    pub(crate) fn push_connection(&mut self, connection: ConnectionDescriptor) -> NodeId {
        let id = self.allocate_id();
        self.nodes.insert(
            id,
            ResourceNode {
                id,
                name: connection.name,
                remote_id: connection.remote_id,
                kind: NodeKind::Connection {
                    connected: connection.connected,
                },
                parent: Some(self.root),
                children: Vec::new(),
                children_loaded: false,
            },
        );
        if let Some(root) = self.nodes.get_mut(&self.root) {
            root.children.push(id);
        }
        id
    }

    pub(crate) fn set_children(
        &mut self,
        id: NodeId,
        children: Vec<ResourceDescriptor>,
    ) -> Result<Vec<NodeId>, TreeError> {
        let node = self.nodes.get_mut(&id).ok_or(TreeError::UnknownNode(id))?;
        let previous = std::mem::take(&mut node.children);
        for child in previous {
            self.remove_subtree(child);
        }

        let installed = children
            .into_iter()
            .map(|descriptor| self.insert_descriptor(id, descriptor))
            .collect::<Vec<_>>();

        let node = self.nodes.get_mut(&id).ok_or(TreeError::UnknownNode(id))?;
        node.children = installed.clone();
        node.children_loaded = true;
        Ok(installed)
    }

    pub(crate) fn set_connected(&mut self, id: NodeId, connected: bool) -> Result<(), TreeError> {
        let node = self.nodes.get_mut(&id).ok_or(TreeError::UnknownNode(id))?;
        match &mut node.kind {
            NodeKind::Connection { connected: state } => {
                *state = connected;
                Ok(())
            }
            _ => Err(TreeError::NotAConnection(id)),
        }
    }

    fn insert_descriptor(&mut self, parent: NodeId, descriptor: ResourceDescriptor) -> NodeId {
        let id = self.allocate_id();
        let preloaded = descriptor.children;
        self.nodes.insert(
            id,
            ResourceNode {
                id,
                name: descriptor.name,
                remote_id: descriptor.remote_id,
                kind: NodeKind::from_resource(descriptor.kind),
                parent: Some(parent),
                children: Vec::new(),
                children_loaded: false,
            },
        );

        if let Some(children) = preloaded {
            let installed = children
                .into_iter()
                .map(|child| self.insert_descriptor(id, child))
                .collect::<Vec<_>>();
            if let Some(node) = self.nodes.get_mut(&id) {
                node.children = installed;
                node.children_loaded = true;
            }
        }
        id
    }

    fn remove_subtree(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                pending.extend(node.children);
            }
        }
    }

    fn allocate_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }
}

#[derive(Debug, Clone)]
pub struct SharedTree(Arc<RwLock<ResourceTree>>);

impl SharedTree {
    pub fn new(tree: ResourceTree) -> Self {
        Self(Arc::new(RwLock::new(tree)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, ResourceTree> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, ResourceTree> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "tests/tree_tests.rs"]
mod tests;
