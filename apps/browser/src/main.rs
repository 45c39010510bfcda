mod commands;
mod config;
mod fixture;
mod render;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use commands::{BrowserCommand, HELP};
use fixture::FixtureConnector;
use resource_tree::{
    BrowserOptions, NavigationController, NavigationError, NavigationOutcome, ResourceTree,
    TreeEvent,
};
use shared::protocol::ConnectionDescriptor;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[arg(long)]
    fixture: Option<PathBuf>,
    #[arg(long)]
    latency_ms: Option<u64>,
    #[arg(long)]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = config::load_settings(&args.config)?;
    if let Some(fixture) = args.fixture {
        settings.fixture_path = fixture;
    }
    if let Some(latency_ms) = args.latency_ms {
        settings.latency_ms = latency_ms;
    }
    if let Some(log_filter) = args.log_filter {
        settings.log_filter = log_filter;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&settings.log_filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let raw = tokio::fs::read_to_string(&settings.fixture_path)
        .await
        .with_context(|| format!("failed to read fixture '{}'", settings.fixture_path.display()))?;
    let connector = FixtureConnector::from_json(&raw)?
        .with_latency(Duration::from_millis(settings.latency_ms));
    let tree = ResourceTree::new(connector.connection_descriptors());
    info!(
        fixture = %settings.fixture_path.display(),
        connections = tree.len() - 1,
        "browser: starting"
    );

    let controller = Arc::new(NavigationController::with_options(
        tree,
        Arc::new(connector),
        BrowserOptions {
            event_capacity: settings.event_capacity,
        },
    ));
    let renderer = tokio::spawn(render_loop(Arc::clone(&controller)));
    print_frame(&controller);
    println!("type 'help' for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match BrowserCommand::parse(&line) {
            Ok(BrowserCommand::Quit) => break,
            Ok(command) => {
                tokio::spawn(dispatch(Arc::clone(&controller), command));
            }
            Err(commands::CommandError::Empty) => {}
            Err(err) => println!("{err}"),
        }
    }

    renderer.abort();
    Ok(())
}

/// Runs off the input loop so commands typed during a load reach the controller.
async fn dispatch(controller: Arc<NavigationController>, command: BrowserCommand) {
    let result = match command {
        BrowserCommand::Open { row } => match controller.descend_to(row).await {
            Ok(NavigationOutcome::Ignored) => {
                println!("still loading, try again in a moment");
                Ok(())
            }
            Ok(NavigationOutcome::Superseded(node_id)) => {
                debug!(node_id = %node_id, "browser: load finished after navigating away");
                Ok(())
            }
            Ok(_) => Ok(()),
            // Reported through TreeEvent::LoadFailed.
            Err(NavigationError::Load(_)) => Ok(()),
            Err(err) => Err(err),
        },
        BrowserCommand::Up => controller.ascend().map(|_| ()),
        BrowserCommand::Jump { node_id } => controller.jump_to(node_id).map(|_| ()),
        BrowserCommand::AddAccount { name, remote_id } => {
            if controller.add_root() == NavigationOutcome::AddRootRequested {
                controller.register_connection(ConnectionDescriptor::new(name, remote_id));
            } else {
                println!("still loading, try again in a moment");
            }
            Ok(())
        }
        BrowserCommand::List => {
            print_frame(&controller);
            Ok(())
        }
        BrowserCommand::Help => {
            println!("{HELP}");
            Ok(())
        }
        BrowserCommand::Quit => Ok(()),
    };
    if let Err(err) = result {
        println!("error: {err}");
    }
}

async fn render_loop(controller: Arc<NavigationController>) {
    let mut events = controller.subscribe_events();
    loop {
        match events.recv().await {
            Ok(TreeEvent::TreeChanged) => print_frame(&controller),
            Ok(TreeEvent::LoadStarted { node_id }) => debug!(node_id = %node_id, "browser: loading"),
            Ok(TreeEvent::LoadFailed { notice, .. }) => println!("! {}", notice.message),
            Ok(TreeEvent::AddRootRequested) => println!("registering a new account"),
            Ok(TreeEvent::ResourceSelected { node_id }) => {
                let tree = controller.tree().read();
                if let Ok(node) = tree.get(node_id) {
                    println!("selected {} (remote id {})", node.name(), node.remote_id().0);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "browser: render loop lagged behind tree events");
                print_frame(&controller);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_frame(controller: &NavigationController) {
    match controller.rows() {
        Ok(rows) => print!("{}", render::render_frame(&controller.breadcrumb(), &rows)),
        Err(err) => warn!(error = %err, "browser: failed to project rows"),
    }
}
