//! Test utilities for wikigraph-indexer

use std::fs;

use tempfile::TempDir;

/// Create a temporary corpus with the given `(relative path, content)` files.
pub fn create_corpus(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    for (path, content) in files {
        let full = temp_dir.path().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, content).unwrap();
    }
    temp_dir
}

/// The three-note corpus used across tests: A links to B, C links to a missing note.
pub fn create_sample_corpus() -> TempDir {
    create_corpus(&[
        ("A.md", "# A\n\nSee [[B]].\n"),
        ("B.md", "# B\n"),
        ("C.md", "# C\n\nDangling: [[Missing]]\n"),
        ("assets/diagram.png", "not markdown"),
        ("node_modules/pkg/README.md", "[[A]]"),
    ])
}
