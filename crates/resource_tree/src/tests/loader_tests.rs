use super::*;
use crate::{error::TreeError, test_support::ScriptedConnector, tree::ResourceTree};
use shared::error::NoticeCode;

fn orchestrator_with(
    connector: Arc<ScriptedConnector>,
) -> (
    LoadOrchestrator,
    SharedTree,
    NodeId,
    broadcast::Receiver<TreeEvent>,
) {
    let tree = SharedTree::new(ResourceTree::new(vec![ConnectionDescriptor::new(
        "conn1", 1,
    )]));
    let conn1 = {
        let guard = tree.read();
        guard
            .get(guard.root())
            .expect("root")
            .child_at(0)
            .expect("conn1")
    };
    let (events, rx) = broadcast::channel(64);
    (
        LoadOrchestrator::new(tree.clone(), connector, events),
        tree,
        conn1,
        rx,
    )
}

fn groups() -> Vec<ResourceDescriptor> {
    vec![
        ResourceDescriptor::group("g1", 10),
        ResourceDescriptor::group("g2", 11),
    ]
}

#[tokio::test]
async fn loaded_node_resolves_from_cache_without_connector_calls() {
    let connector = Arc::new(ScriptedConnector::new());
    let (orchestrator, tree, _, _rx) = orchestrator_with(Arc::clone(&connector));
    let root = tree.read().root();

    assert_eq!(orchestrator.request_load(root).await, Ok(LoadSuccess::Cached));
    assert_eq!(connector.connect_calls().await, 0);
    assert_eq!(connector.load_calls().await, 0);
}

#[tokio::test]
async fn connection_is_connected_before_children_are_installed() {
    let connector = Arc::new(ScriptedConnector::new().with_children(1, groups()));
    let (orchestrator, tree, conn1, _rx) = orchestrator_with(Arc::clone(&connector));

    let result = orchestrator.request_load(conn1).await;
    assert_eq!(result, Ok(LoadSuccess::Fetched { children: 2 }));

    let guard = tree.read();
    let node = guard.get(conn1).expect("conn1");
    assert!(node.is_connected());
    assert!(node.is_children_loaded());
    assert_eq!(guard.child_of(conn1, 1).expect("g2").name(), "g2");
    drop(guard);

    assert_eq!(connector.connect_calls().await, 1);
    assert_eq!(connector.load_calls().await, 1);
    assert_eq!(orchestrator.in_flight(), 0);
}

#[tokio::test]
async fn concurrent_requests_share_a_single_fetch() {
    let (connector, gate) = ScriptedConnector::new().with_children(1, groups()).gated();
    let connector = Arc::new(connector);
    let (orchestrator, _tree, conn1, _rx) = orchestrator_with(Arc::clone(&connector));

    let (first, second, _) = tokio::join!(
        orchestrator.request_load(conn1),
        orchestrator.request_load(conn1),
        async {
            tokio::task::yield_now().await;
            assert!(orchestrator.is_loading(conn1));
            assert_eq!(orchestrator.in_flight(), 1);
            gate.add_permits(1);
        }
    );

    assert_eq!(first, Ok(LoadSuccess::Fetched { children: 2 }));
    assert_eq!(first, second);
    assert_eq!(connector.load_calls().await, 1);
    assert_eq!(connector.connect_calls().await, 1);
}

#[tokio::test]
async fn reentering_a_loaded_node_makes_no_further_calls() {
    let connector = Arc::new(ScriptedConnector::new().with_children(1, groups()));
    let (orchestrator, _tree, conn1, _rx) = orchestrator_with(Arc::clone(&connector));

    orchestrator.request_load(conn1).await.expect("first load");
    assert_eq!(
        orchestrator.request_load(conn1).await,
        Ok(LoadSuccess::Cached)
    );
    assert_eq!(connector.load_calls().await, 1);
}

#[tokio::test]
async fn failed_load_leaves_node_untouched_and_can_be_retried() {
    let connector = Arc::new(
        ScriptedConnector::new()
            .with_children(1, groups())
            .failing_load(1),
    );
    let (orchestrator, tree, conn1, mut rx) = orchestrator_with(Arc::clone(&connector));

    let err = orchestrator
        .request_load(conn1)
        .await
        .expect_err("load should fail");
    assert!(matches!(err, LoadError::Load { node_id, .. } if node_id == conn1));
    assert!(err.to_string().contains("server returned 500"));

    {
        let guard = tree.read();
        let node = guard.get(conn1).expect("conn1");
        assert!(!node.is_children_loaded());
        assert!(!node.is_connected());
    }
    assert_eq!(orchestrator.in_flight(), 0);

    assert_eq!(
        rx.recv().await.expect("started"),
        TreeEvent::LoadStarted { node_id: conn1 }
    );
    match rx.recv().await.expect("failed") {
        TreeEvent::LoadFailed { node_id, notice } => {
            assert_eq!(node_id, conn1);
            assert_eq!(notice.code, NoticeCode::LoadFailed);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    connector.heal(1).await;
    assert_eq!(
        orchestrator.request_load(conn1).await,
        Ok(LoadSuccess::Fetched { children: 2 })
    );
    assert_eq!(connector.load_calls().await, 2);
}

#[tokio::test]
async fn connect_failure_skips_loading_children() {
    let connector = Arc::new(
        ScriptedConnector::new()
            .with_children(1, groups())
            .failing_connect(1),
    );
    let (orchestrator, tree, conn1, _rx) = orchestrator_with(Arc::clone(&connector));

    let err = orchestrator
        .request_load(conn1)
        .await
        .expect_err("connect should fail");
    assert!(matches!(err, LoadError::Connect { .. }));
    assert_eq!(err.notice().code, NoticeCode::ConnectFailed);
    assert_eq!(connector.load_calls().await, 0);
    assert!(!tree.read().get(conn1).expect("conn1").is_children_loaded());
}

#[tokio::test]
async fn abandoned_request_still_completes_the_fetch() {
    let (connector, gate) = ScriptedConnector::new().with_children(1, groups()).gated();
    let connector = Arc::new(connector);
    let (orchestrator, tree, conn1, mut rx) = orchestrator_with(Arc::clone(&connector));

    tokio::select! {
        _ = orchestrator.request_load(conn1) => panic!("load cannot finish while gated"),
        _ = tokio::task::yield_now() => {}
    }
    assert!(orchestrator.is_loading(conn1));

    gate.add_permits(1);
    loop {
        if rx.recv().await.expect("event") == TreeEvent::TreeChanged {
            break;
        }
    }

    assert!(tree.read().get(conn1).expect("conn1").is_children_loaded());
    assert_eq!(orchestrator.in_flight(), 0);
    assert_eq!(
        orchestrator.request_load(conn1).await,
        Ok(LoadSuccess::Cached)
    );
}

#[tokio::test]
async fn leaf_resources_are_not_loadable() {
    let connector = Arc::new(
        ScriptedConnector::new().with_children(1, vec![ResourceDescriptor::resource("layer", 3)]),
    );
    let (orchestrator, tree, conn1, _rx) = orchestrator_with(connector);
    orchestrator.request_load(conn1).await.expect("load");
    let layer = tree.read().get(conn1).expect("conn1").child_at(0).expect("layer");

    assert_eq!(
        orchestrator.request_load(layer).await,
        Err(LoadError::NotLoadable { node_id: layer })
    );
}

#[tokio::test]
async fn unknown_node_is_reported_as_tree_error() {
    let (orchestrator, _tree, _, _rx) = orchestrator_with(Arc::new(ScriptedConnector::new()));
    assert_eq!(
        orchestrator.request_load(NodeId(999)).await,
        Err(LoadError::Tree(TreeError::UnknownNode(NodeId(999))))
    );
}

#[tokio::test]
async fn registered_connection_is_appended_under_root() {
    let (orchestrator, tree, conn1, mut rx) =
        orchestrator_with(Arc::new(ScriptedConnector::new()));
    let added = orchestrator.install_connection(ConnectionDescriptor::new("conn2", 2));

    let guard = tree.read();
    let root = guard.get(guard.root()).expect("root");
    assert_eq!(root.child_ids(), Some(&[conn1, added][..]));
    drop(guard);
    assert_eq!(rx.recv().await.expect("event"), TreeEvent::TreeChanged);
}

struct PanickingConnector;

#[async_trait::async_trait]
impl ResourceConnector for PanickingConnector {
    async fn connect(&self, _connection: &NodeSnapshot) -> anyhow::Result<()> {
        Ok(())
    }

    async fn load_children(&self, _node: &NodeSnapshot) -> anyhow::Result<Vec<ResourceDescriptor>> {
        panic!("connector bug");
    }
}

#[tokio::test]
async fn panicking_fetch_is_reported_once_as_interrupted() {
    let tree = SharedTree::new(ResourceTree::new(vec![ConnectionDescriptor::new(
        "conn1", 1,
    )]));
    let conn1 = {
        let guard = tree.read();
        guard.child_of(guard.root(), 0).expect("conn1").id()
    };
    let (events, mut rx) = broadcast::channel(64);
    let orchestrator = LoadOrchestrator::new(tree.clone(), Arc::new(PanickingConnector), events);

    let (first, second) = tokio::join!(
        orchestrator.request_load(conn1),
        orchestrator.request_load(conn1)
    );
    assert!(matches!(first, Err(LoadError::Interrupted { node_id, .. }) if node_id == conn1));
    assert_eq!(first, second);
    assert_eq!(orchestrator.in_flight(), 0);
    assert!(!tree.read().get(conn1).expect("conn1").is_children_loaded());

    let mut failures = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let TreeEvent::LoadFailed { node_id, notice } = event {
            failures.push((node_id, notice.code));
        }
    }
    assert_eq!(failures, vec![(conn1, NoticeCode::Interrupted)]);
}
