//! Breadcrumb path and "up" target derivation over parent links.

use std::fmt;

use shared::domain::NodeId;

use crate::{
    error::TreeError,
    tree::{NodeKind, ResourceNode, ResourceTree},
};

const SEPARATOR: &str = " > ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crumb {
    pub id: NodeId,
    pub name: String,
}

/// Walks from a node up to the root, starting with the node itself. Cloning restarts the
/// walk from the same node.
#[derive(Debug, Clone)]
pub struct Ancestors<'a> {
    tree: &'a ResourceTree,
    next: Option<NodeId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a ResourceNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.tree.node(self.next?)?;
        self.next = node.parent();
        Some(node)
    }
}

pub fn ancestors(tree: &ResourceTree, id: NodeId) -> Ancestors<'_> {
    Ancestors {
        tree,
        next: Some(id),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Breadcrumb(Vec<Crumb>);

impl Breadcrumb {
    pub fn crumbs(&self) -> &[Crumb] {
        &self.0
    }

    pub fn ids(&self) -> Vec<NodeId> {
        self.0.iter().map(|crumb| crumb.id).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Crumb> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a Breadcrumb {
    type Item = &'a Crumb;
    type IntoIter = std::slice::Iter<'a, Crumb>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Breadcrumb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, crumb) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(SEPARATOR)?;
            }
            f.write_str(&crumb.name)?;
        }
        Ok(())
    }
}

pub fn derive(tree: &ResourceTree, id: NodeId) -> Breadcrumb {
    let mut crumbs = ancestors(tree, id)
        .filter(|node| node.kind() != NodeKind::ConnectionsRoot && !node.is_synthetic())
        .map(|node| Crumb {
            id: node.id(),
            name: node.name().to_string(),
        })
        .collect::<Vec<_>>();
    crumbs.reverse();
    Breadcrumb(crumbs)
}

/// Target of an "up" step from `id`: its parent, skipping placeholder ancestors. The root
/// is its own up target.
pub fn up_target(tree: &ResourceTree, id: NodeId) -> Result<NodeId, TreeError> {
    let node = tree.get(id)?;
    let Some(parent) = node.parent() else {
        return Ok(id);
    };
    let landing = ancestors(tree, parent)
        .find(|node| !node.is_synthetic())
        .map(ResourceNode::id);
    Ok(landing.unwrap_or_else(|| tree.root()))
}

#[cfg(test)]
mod tests {
    use shared::protocol::{ConnectionDescriptor, ResourceDescriptor};

    use super::*;

    /// Root -> A(5) -> B(0, synthetic) -> C(9)
    fn chain() -> (ResourceTree, NodeId, NodeId, NodeId) {
        let mut tree = ResourceTree::new(vec![ConnectionDescriptor::new("A", 5)]);
        let a = tree.get(tree.root()).expect("root").child_at(0).expect("A");
        let b = tree
            .set_children(
                a,
                vec![ResourceDescriptor::group("B", 0)
                    .with_children(vec![ResourceDescriptor::group("C", 9)])],
            )
            .expect("install")[0];
        let c = tree.get(b).expect("B").child_at(0).expect("C");
        (tree, a, b, c)
    }

    #[test]
    fn breadcrumb_skips_synthetic_nodes_and_root() {
        let (tree, a, _, c) = chain();
        let breadcrumb = derive(&tree, c);
        assert_eq!(breadcrumb.ids(), vec![a, c]);
        assert_eq!(breadcrumb.to_string(), "A > C");
    }

    #[test]
    fn breadcrumb_of_root_is_empty() {
        let (tree, ..) = chain();
        assert!(derive(&tree, tree.root()).is_empty());
    }

    #[test]
    fn up_skips_synthetic_parent() {
        let (tree, a, b, c) = chain();
        assert_eq!(up_target(&tree, c), Ok(a));
        assert_eq!(up_target(&tree, b), Ok(a));
        assert_eq!(up_target(&tree, a), Ok(tree.root()));
        assert_eq!(up_target(&tree, tree.root()), Ok(tree.root()));
    }

    #[test]
    fn ancestors_walk_is_restartable() {
        let (tree, _, _, c) = chain();
        let walk = ancestors(&tree, c);
        let first = walk.clone().map(ResourceNode::name).collect::<Vec<_>>();
        let second = walk.map(ResourceNode::name).collect::<Vec<_>>();
        assert_eq!(first, vec!["C", "B", "A", "Connections"]);
        assert_eq!(first, second);
    }

    #[test]
    fn derivation_reflects_the_tree_at_call_time() {
        let (mut tree, a, _, c) = chain();
        assert_eq!(derive(&tree, c).to_string(), "A > C");
        let root = tree.root();
        tree.set_children(root, vec![]).expect("drop connections");
        assert!(tree.node(a).is_none());
        assert!(derive(&tree, c).is_empty());
    }
}
