use shared::{
    domain::NodeId,
    error::{Notice, NoticeCode},
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("invalid child index {index} for node {node_id} with {len} children")]
    InvalidIndex {
        node_id: NodeId,
        index: usize,
        len: usize,
    },
    #[error("children of node {0} are not loaded")]
    ChildrenNotLoaded(NodeId),
    #[error("node {0} is not a connection")]
    NotAConnection(NodeId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    #[error("row index {index} out of bounds for {len} rows")]
    IndexOutOfBounds { index: usize, len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("failed to connect to '{name}': {message}")]
    Connect {
        node_id: NodeId,
        name: String,
        message: String,
    },
    #[error("failed to load children of '{name}': {message}")]
    Load {
        node_id: NodeId,
        name: String,
        message: String,
    },
    #[error("load of node {node_id} was interrupted: {message}")]
    Interrupted { node_id: NodeId, message: String },
    #[error("node {node_id} has no children to load")]
    NotLoadable { node_id: NodeId },
    #[error(transparent)]
    Tree(#[from] TreeError),
}

impl LoadError {
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            LoadError::Connect { node_id, .. }
            | LoadError::Load { node_id, .. }
            | LoadError::Interrupted { node_id, .. }
            | LoadError::NotLoadable { node_id } => Some(*node_id),
            LoadError::Tree(_) => None,
        }
    }

    pub fn notice(&self) -> Notice {
        let code = match self {
            LoadError::Connect { .. } => NoticeCode::ConnectFailed,
            LoadError::Load { .. } => NoticeCode::LoadFailed,
            LoadError::Interrupted { .. } => NoticeCode::Interrupted,
            LoadError::NotLoadable { .. } | LoadError::Tree(_) => NoticeCode::Internal,
        };
        Notice::new(code, self.to_string())
    }
}

#[derive(Debug, Error)]
pub enum NavigationError {
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("node {0} is a structural placeholder and cannot be opened directly")]
    SyntheticNode(NodeId),
    #[error("node {0} has not been loaded yet")]
    NotLoaded(NodeId),
}
