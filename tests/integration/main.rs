//! Integration tests for Wikigraph
//!
//! These tests verify that multiple systems work together correctly.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::{sleep, timeout};
use wikigraph_core::{CorpusRoot, DocPath, WorkspaceConfig};
use wikigraph_indexer::Indexer;
use wikigraph_server::ServerState;
use wikigraph_watcher::{ChangeCoalescer, WatcherService};

fn corpus(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (path, content) in files {
        let full = dir.path().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, content).unwrap();
    }
    dir
}

fn wikigraph(root: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_wikigraph"))
        .arg("--root")
        .arg(root)
        .args(args)
        .output()
        .expect("Failed to execute wikigraph")
}

async fn open_indexer(root: &Path) -> Arc<Indexer> {
    let indexer = Indexer::open(root, &WorkspaceConfig::default()).unwrap();
    indexer.rebuild().await.unwrap();
    Arc::new(indexer)
}

/// Poll until `check` holds or the deadline passes.
async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

#[test]
fn test_cli_invocation() {
    let output = Command::new(env!("CARGO_BIN_EXE_wikigraph"))
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("wikigraph"));
    assert!(stdout.contains("Live link graph"));
}

#[test]
fn test_export_command() {
    let dir = corpus(&[("A.md", "[[B]] and [[Missing]]"), ("B.md", "back to [[A]]")]);
    let output = wikigraph(dir.path(), &["export"]);
    assert!(output.status.success());

    let export: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let graph = &export["results"][0]["data"][0]["graph"];
    assert_eq!(graph["nodes"].as_array().unwrap().len(), 3);

    let relationship = graph["relationships"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["startNode"] == "/A.md" && r["endNode"] == "/B.md")
        .unwrap();
    assert_eq!(relationship["type"], "LINKS_TO");
    assert_eq!(relationship["properties"]["linkCategory"], "bidirectional");
}

#[test]
fn test_export_local_to_file() {
    let dir = corpus(&[("A.md", "[[B]]"), ("B.md", ""), ("C.md", "[[D]]"), ("D.md", "")]);
    let out = dir.path().join("out.json");
    let output = wikigraph(
        dir.path(),
        &["export", "--local", "B", "--no-forward", "--output", out.to_str().unwrap()],
    );
    assert!(output.status.success());

    let export: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    let ids: Vec<&str> = export["results"][0]["data"][0]["graph"]["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["/B.md", "/A.md"]);

    let missing = wikigraph(dir.path(), &["export", "--local", "/Nope.md"]);
    assert!(!missing.status.success());
}

#[test]
fn test_check_command() {
    let dir = corpus(&[
        ("A.md", "[[Gone]]"),
        ("x/Same.md", ""),
        ("y/Same.md", ""),
        ("wikigraph.toml", "ambiguity = \"first\"\n"),
    ]);
    let output = wikigraph(dir.path(), &["check"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("3 documents, 1 links (1 unresolved)"));
    assert!(stdout.contains("Same.md -> /x/Same.md, /y/Same.md"));
    assert!(stdout.contains("/A.md: Gone"));
}

#[test]
fn test_missing_root_fails() {
    let output = wikigraph(Path::new("/definitely/not/a/corpus"), &["check"]);
    assert!(!output.status.success());
}

/// A document created after the scan repairs links that were waiting for it.
#[tokio::test]
async fn test_coalesced_creation_updates_server_clients() {
    let dir = corpus(&[("A.md", "[[Later]]")]);
    let indexer = open_indexer(dir.path()).await;
    let state = ServerState::new(Arc::clone(&indexer)).await;
    let mut rx = state.events_tx.subscribe();

    let coalescer = ChangeCoalescer::new(Duration::from_millis(20), indexer.clone());
    std::fs::write(dir.path().join("Later.md"), "").unwrap();
    coalescer.notify(DocPath::new("/Later.md"));

    let message = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
    let message: serde_json::Value = serde_json::from_str(&message).unwrap();
    assert_eq!(message["type"], "graph_changed");
    assert_eq!(message["event"]["kind"], "added");

    let index = indexer.index();
    let index = index.read().await;
    assert!(index.links_to(&DocPath::new("/A.md"), &DocPath::new("/Later.md")));
    assert_eq!(index.back_links(&DocPath::new("/Later.md")), &[DocPath::new("/A.md")]);
}

/// Edits on disk reach the index through the watcher and coalescer.
#[tokio::test]
async fn test_watcher_feeds_index() {
    let dir = corpus(&[("A.md", "[[B]]"), ("B.md", "")]);
    let indexer = open_indexer(dir.path()).await;
    let coalescer = Arc::new(ChangeCoalescer::new(Duration::from_millis(20), indexer.clone()));
    let service = Arc::new(WatcherService::new(CorpusRoot::open(dir.path()).unwrap(), coalescer).unwrap());
    service.start_watching().await.unwrap();

    let processor = Arc::clone(&service);
    let handle = tokio::spawn(async move { processor.process_events().await });

    std::fs::write(dir.path().join("C.md"), "[[A]]").unwrap();
    let index = indexer.index();
    assert!(
        eventually(|| {
            let index = Arc::clone(&index);
            async move { index.read().await.links_to(&DocPath::new("/C.md"), &DocPath::new("/A.md")) }
        })
        .await
    );

    std::fs::remove_file(dir.path().join("B.md")).unwrap();
    assert!(
        eventually(|| {
            let index = Arc::clone(&index);
            async move { !index.read().await.is_tracked(&DocPath::new("/B.md")) }
        })
        .await
    );

    handle.abort();
}
