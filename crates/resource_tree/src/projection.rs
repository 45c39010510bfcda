//! Rows shown for the current node. Row 0 of a non-root listing is always "up"; the root
//! listing ends with "add account".

use shared::domain::NodeId;

use crate::{
    error::{ProjectionError, TreeError},
    tree::{NodeKind, ResourceTree},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    Up,
    AddConnection,
    Loading,
    Node {
        id: NodeId,
        name: String,
        kind: NodeKind,
    },
}

impl Row {
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            Row::Node { id, .. } => Some(*id),
            Row::Up | Row::AddConnection | Row::Loading => None,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Row::Up => "..",
            Row::AddConnection => "Add account",
            Row::Loading => "Loading...",
            Row::Node { name, .. } => name,
        }
    }

    pub fn subtitle(&self) -> &'static str {
        match self {
            Row::Up => "Up",
            Row::AddConnection => "Register a new remote account",
            Row::Loading => "",
            Row::Node { kind, .. } => match kind {
                NodeKind::ConnectionsRoot => "Accounts",
                NodeKind::Connection { connected: true } => "Account (connected)",
                NodeKind::Connection { connected: false } => "Account",
                NodeKind::ResourceGroup => "Resource group",
                NodeKind::Resource => "Resource",
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListProjection {
    rows: Vec<Row>,
}

impl ListProjection {
    /// Children whose state is unknown are rendered like an in-flight load, never as an
    /// empty listing.
    pub fn project(
        tree: &ResourceTree,
        current: NodeId,
        loading: bool,
    ) -> Result<Self, TreeError> {
        let node = tree.get(current)?;
        let action = match node.kind() {
            NodeKind::ConnectionsRoot => Row::AddConnection,
            NodeKind::Connection { .. } | NodeKind::ResourceGroup | NodeKind::Resource => Row::Up,
        };

        let Some(children) = node.child_ids().filter(|_| !loading) else {
            return Ok(Self {
                rows: vec![action, Row::Loading],
            });
        };

        let mut rows = Vec::with_capacity(children.len() + 1);
        for child in children {
            let child = tree.get(*child)?;
            rows.push(Row::Node {
                id: child.id(),
                name: child.name().to_string(),
                kind: child.kind(),
            });
        }
        match action {
            Row::AddConnection => rows.push(action),
            _ => rows.insert(0, action),
        }
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_at(&self, index: usize) -> Result<&Row, ProjectionError> {
        self.rows.get(index).ok_or(ProjectionError::IndexOutOfBounds {
            index,
            len: self.rows.len(),
        })
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    pub fn is_loading(&self) -> bool {
        self.rows.iter().any(|row| *row == Row::Loading)
    }
}
