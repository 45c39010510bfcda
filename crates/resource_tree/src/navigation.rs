//! Navigation state machine over the shared tree.
//!
//! The controller is `Idle` while `loading` is `None` and `Loading` while a fetch for the
//! node being entered is outstanding. Only `ascend` and `jump_to` are accepted while
//! loading; they move the current node, and the outstanding load then completes without
//! moving it again.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shared::{domain::NodeId, protocol::ConnectionDescriptor};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    breadcrumb::{self, Breadcrumb},
    error::NavigationError,
    loader::LoadOrchestrator,
    projection::{ListProjection, Row},
    tree::{NodeKind, ResourceTree, SharedTree},
    BrowserOptions, ResourceConnector, TreeEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    Moved(NodeId),
    Selected(NodeId),
    AddRootRequested,
    /// The node finished loading after navigation had already moved elsewhere.
    Superseded(NodeId),
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationState {
    pub current: NodeId,
    pub loading: Option<NodeId>,
    generation: u64,
}

impl NavigationState {
    fn move_to(&mut self, node_id: NodeId) {
        self.current = node_id;
        self.generation += 1;
    }

    fn clear_loading(&mut self, node_id: NodeId) {
        if self.loading == Some(node_id) {
            self.loading = None;
        }
    }
}

enum Step {
    Moved(NodeId),
    AddRoot,
    Select(NodeId),
    Load { target: NodeId, generation: u64 },
    Ignore,
}

pub struct NavigationController {
    tree: SharedTree,
    loader: LoadOrchestrator,
    state: Mutex<NavigationState>,
    events: broadcast::Sender<TreeEvent>,
}

impl NavigationController {
    pub fn new(
        connections: impl IntoIterator<Item = ConnectionDescriptor>,
        connector: Arc<dyn ResourceConnector>,
    ) -> Self {
        Self::with_options(
            ResourceTree::new(connections),
            connector,
            BrowserOptions::default(),
        )
    }

    pub fn with_options(
        tree: ResourceTree,
        connector: Arc<dyn ResourceConnector>,
        options: BrowserOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(options.event_capacity.max(1));
        let root = tree.root();
        let tree = SharedTree::new(tree);
        let loader = LoadOrchestrator::new(tree.clone(), connector, events.clone());
        Self {
            tree,
            loader,
            state: Mutex::new(NavigationState {
                current: root,
                loading: None,
                generation: 0,
            }),
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<TreeEvent> {
        self.events.subscribe()
    }

    pub fn tree(&self) -> &SharedTree {
        &self.tree
    }

    pub fn loader(&self) -> &LoadOrchestrator {
        &self.loader
    }

    pub fn state(&self) -> NavigationState {
        *self.lock_state()
    }

    pub fn current_node(&self) -> NodeId {
        self.lock_state().current
    }

    pub fn is_loading(&self) -> bool {
        self.lock_state().loading.is_some()
    }

    pub fn rows(&self) -> Result<ListProjection, NavigationError> {
        let state = self.state();
        let tree = self.tree.read();
        Ok(ListProjection::project(
            &tree,
            state.current,
            state.loading.is_some(),
        )?)
    }

    pub fn breadcrumb(&self) -> Breadcrumb {
        let current = self.current_node();
        breadcrumb::derive(&self.tree.read(), current)
    }

    pub async fn descend_to(&self, row_index: usize) -> Result<NavigationOutcome, NavigationError> {
        let step = {
            let mut state = self.lock_state();
            if let Some(pending) = state.loading {
                debug!(
                    pending = pending.0,
                    row_index, "navigation: descend ignored while loading"
                );
                return Ok(NavigationOutcome::Ignored);
            }

            let tree = self.tree.read();
            let rows = ListProjection::project(&tree, state.current, false)?;
            match rows.row_at(row_index)? {
                Row::Up => {
                    let target = breadcrumb::up_target(&tree, state.current)?;
                    state.move_to(target);
                    Step::Moved(target)
                }
                Row::AddConnection => Step::AddRoot,
                Row::Loading => Step::Ignore,
                Row::Node {
                    id,
                    kind: NodeKind::Resource,
                    ..
                } => Step::Select(*id),
                Row::Node { id, .. } => {
                    if tree.get(*id)?.is_children_loaded() {
                        state.move_to(*id);
                        Step::Moved(*id)
                    } else {
                        state.loading = Some(*id);
                        Step::Load {
                            target: *id,
                            generation: state.generation,
                        }
                    }
                }
            }
        };

        match step {
            Step::Moved(target) => {
                debug!(node_id = target.0, "navigation: moved");
                self.notify(TreeEvent::TreeChanged);
                Ok(NavigationOutcome::Moved(target))
            }
            Step::AddRoot => Ok(self.request_add_root()),
            Step::Select(node_id) => {
                info!(node_id = node_id.0, "navigation: resource selected");
                self.notify(TreeEvent::ResourceSelected { node_id });
                Ok(NavigationOutcome::Selected(node_id))
            }
            Step::Ignore => Ok(NavigationOutcome::Ignored),
            Step::Load { target, generation } => self.load_into(target, generation).await,
        }
    }

    pub fn ascend(&self) -> Result<NodeId, NavigationError> {
        let target = {
            let mut state = self.lock_state();
            let tree = self.tree.read();
            let target = breadcrumb::up_target(&tree, state.current)?;
            state.move_to(target);
            target
        };
        debug!(node_id = target.0, "navigation: ascended");
        self.notify(TreeEvent::TreeChanged);
        Ok(target)
    }

    /// Moves straight to a breadcrumb entry. Placeholders and nodes whose children are
    /// unknown are rejected, since a jump never loads.
    pub fn jump_to(&self, node_id: NodeId) -> Result<NodeId, NavigationError> {
        {
            let mut state = self.lock_state();
            let tree = self.tree.read();
            let node = tree.get(node_id)?;
            if node.is_synthetic() {
                warn!(node_id = node_id.0, "navigation: refusing jump to placeholder");
                return Err(NavigationError::SyntheticNode(node_id));
            }
            if !node.is_children_loaded() {
                return Err(NavigationError::NotLoaded(node_id));
            }
            state.move_to(node_id);
        }
        debug!(node_id = node_id.0, "navigation: jumped");
        self.notify(TreeEvent::TreeChanged);
        Ok(node_id)
    }

    pub fn add_root(&self) -> NavigationOutcome {
        if let Some(pending) = self.lock_state().loading {
            debug!(pending = pending.0, "navigation: add account ignored while loading");
            return NavigationOutcome::Ignored;
        }
        self.request_add_root()
    }

    pub fn register_connection(&self, connection: ConnectionDescriptor) -> NodeId {
        self.loader.install_connection(connection)
    }

    async fn load_into(
        &self,
        target: NodeId,
        generation: u64,
    ) -> Result<NavigationOutcome, NavigationError> {
        self.notify(TreeEvent::TreeChanged);
        let pending = PendingNavigation {
            state: &self.state,
            events: &self.events,
            target,
            armed: true,
        };

        let result = self.loader.request_load(target).await;

        let moved = {
            let mut state = pending.finish();
            let moved = result.is_ok() && state.generation == generation;
            if moved {
                state.move_to(target);
            }
            moved
        };
        self.notify(TreeEvent::TreeChanged);

        match result {
            Ok(_) if moved => {
                info!(node_id = target.0, "navigation: entered after load");
                Ok(NavigationOutcome::Moved(target))
            }
            Ok(_) => {
                info!(
                    node_id = target.0,
                    "navigation: load finished after navigation moved on"
                );
                Ok(NavigationOutcome::Superseded(target))
            }
            Err(err) => {
                warn!(node_id = target.0, error = %err, "navigation: staying on previous node");
                Err(err.into())
            }
        }
    }

    fn request_add_root(&self) -> NavigationOutcome {
        info!("navigation: add account requested");
        self.notify(TreeEvent::AddRootRequested);
        NavigationOutcome::AddRootRequested
    }

    fn notify(&self, event: TreeEvent) {
        let _ = self.events.send(event);
    }

    fn lock_state(&self) -> MutexGuard<'_, NavigationState> {
        lock_state(&self.state)
    }
}

/// Clears the loading flag if the caller stops awaiting a descend before it resolves.
struct PendingNavigation<'a> {
    state: &'a Mutex<NavigationState>,
    events: &'a broadcast::Sender<TreeEvent>,
    target: NodeId,
    armed: bool,
}

impl<'a> PendingNavigation<'a> {
    fn finish(mut self) -> MutexGuard<'a, NavigationState> {
        self.armed = false;
        let mut state = lock_state(self.state);
        state.clear_loading(self.target);
        state
    }
}

impl Drop for PendingNavigation<'_> {
    fn drop(&mut self) {
        if self.armed {
            lock_state(self.state).clear_loading(self.target);
            let _ = self.events.send(TreeEvent::TreeChanged);
        }
    }
}

fn lock_state(state: &Mutex<NavigationState>) -> MutexGuard<'_, NavigationState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "tests/navigation_tests.rs"]
mod tests;
