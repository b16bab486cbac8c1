//! CLI command implementations

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use wikigraph_core::{
    CorpusRoot, GraphExport, GraphOption, LinkIndex, WorkspaceConfig, apply_search_filter,
    global_view, local_view,
};
use wikigraph_indexer::Indexer;
use wikigraph_server::{ServerConfig, WikigraphServer};
use wikigraph_watcher::{ChangeCoalescer, WatcherService};

fn load_config(root: &Path) -> anyhow::Result<WorkspaceConfig> {
    WorkspaceConfig::load(root).with_context(|| format!("failed to load configuration from {}", root.display()))
}

/// Open the corpus and index every document in it.
async fn build_index(root: &Path, config: &WorkspaceConfig) -> anyhow::Result<Arc<Indexer>> {
    let indexer = Indexer::open(root, config).with_context(|| format!("cannot open corpus {}", root.display()))?;
    let event = indexer.rebuild().await.context("initial scan failed")?;
    tracing::info!("Initial scan complete: {:?}", event);
    Ok(Arc::new(indexer))
}

pub async fn serve(root: PathBuf, host: Option<String>, port: Option<u16>, open: bool) -> anyhow::Result<()> {
    let config = load_config(&root)?;
    let server_config = ServerConfig {
        host: host.unwrap_or(config.server.host.clone()),
        port: port.unwrap_or(config.server.port),
    };
    tracing::info!("Starting Wikigraph server on {}", server_config.address());

    let indexer = build_index(&root, &config).await?;
    let server = WikigraphServer::new(Arc::clone(&indexer), server_config.clone()).await;

    // Start file watcher in background task
    let coalescer = Arc::new(ChangeCoalescer::new(config.debounce(), indexer.clone()));
    let watcher_root = CorpusRoot::open(&root)?;
    let watcher_coalescer = Arc::clone(&coalescer);
    tokio::spawn(async move {
        if let Err(e) = run_watcher(watcher_root, watcher_coalescer).await {
            tracing::error!("File watcher error: {:#}", e);
        }
    });

    if open {
        let url = format!("http://{}/api/graph", server_config.address());
        if let Err(e) = open::that(&url) {
            tracing::warn!("Could not open browser at {}: {}", url, e);
        }
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
    };
    let result = server.start_with_shutdown(shutdown).await;
    coalescer.shutdown();
    result
}

/// Run the file watcher, feeding changes to the coalescer
async fn run_watcher(root: CorpusRoot, coalescer: Arc<ChangeCoalescer>) -> anyhow::Result<()> {
    tracing::info!("Starting file watcher for: {}", root.path().display());

    let watcher = WatcherService::new(root, coalescer)?;
    watcher.start_watching().await?;

    // Process events (this runs indefinitely)
    watcher.process_events().await?;

    Ok(())
}

/// What `export` should produce.
#[derive(Debug, Clone, Default)]
pub struct ExportRequest {
    pub local: Option<String>,
    pub search: Option<String>,
    pub forward_links: bool,
    pub backward_links: bool,
}

impl ExportRequest {
    fn option(&self) -> GraphOption {
        GraphOption {
            forward_links: self.forward_links,
            backward_links: self.backward_links,
        }
    }

    fn render(&self, index: &LinkIndex) -> anyhow::Result<GraphExport> {
        let view = match &self.local {
            Some(path) => local_view(index, path, self.option())?,
            None => global_view(index, self.option()),
        };
        let view = match &self.search {
            Some(query) => apply_search_filter(&view, query),
            None => view,
        };
        Ok(view.to_export())
    }
}

pub async fn export(root: PathBuf, request: ExportRequest, output: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(&root)?;
    let indexer = build_index(&root, &config).await?;

    let export = {
        let index = indexer.index();
        let index = index.read().await;
        request.render(&index)?
    };
    let json = serde_json::to_string_pretty(&export)?;

    match output {
        Some(path) => {
            tokio::fs::write(&path, json)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!("Wrote graph export to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

pub async fn check(root: PathBuf) -> anyhow::Result<()> {
    let config = load_config(&root)?;
    let started = std::time::Instant::now();
    let indexer = build_index(&root, &config).await?;
    let index = indexer.index();
    let index = index.read().await;

    print!("{}", check_report(&index, started.elapsed()));
    Ok(())
}

fn check_report(index: &LinkIndex, elapsed: Duration) -> String {
    let stats = index.stats();
    let mut report = format!(
        "{} documents, {} links ({} unresolved), {} virtual targets, indexed in {:.2?}\n",
        stats.tracked, stats.links, stats.unresolved_links, stats.virtual_targets, elapsed
    );

    let ambiguous = index.ambiguous_names();
    if !ambiguous.is_empty() {
        report.push_str("\nAmbiguous names:\n");
        for (name, candidates) in ambiguous {
            let candidates: Vec<&str> = candidates.iter().map(|c| c.as_str()).collect();
            report.push_str(&format!("  {} -> {}\n", name, candidates.join(", ")));
        }
    }

    let dangling = index.dangling_links();
    if !dangling.is_empty() {
        report.push_str("\nUnresolved links:\n");
        for (source, targets) in dangling {
            report.push_str(&format!("  {}: {}\n", source, targets.join(", ")));
        }
    }
    report
}
