use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use jwalk::WalkDir;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::tree::Hierarchy;

/// One file or directory of a finished scan.
#[derive(Debug)]
pub struct FileNode {
    pub name: String,
    pub path: PathBuf,
    /// Bytes, including everything below a directory.
    pub size: u64,
    pub is_dir: bool,
    pub children: Vec<Arc<FileNode>>,
}

impl Hierarchy for FileNode {
    fn children(&self) -> &[Arc<Self>] {
        &self.children
    }

    /// Only files carry weight; directories are the sum of their contents.
    fn value(&self) -> f64 {
        if self.is_dir {
            0.0
        } else {
            self.size as f64
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub struct ScanProgress {
    pub files_scanned: AtomicU64,
    pub bytes_scanned: AtomicU64,
    pub cancel: AtomicBool,
    pub scan_start: Instant,
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self {
            files_scanned: AtomicU64::new(0),
            bytes_scanned: AtomicU64::new(0),
            cancel: AtomicBool::new(false),
            scan_start: Instant::now(),
        }
    }
}

impl ScanProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

// Directories that only ever fail with access errors.
fn is_skipped(name: &OsStr) -> bool {
    name == "System Volume Information" || name == "$Recycle.Bin"
}

struct Entry {
    path: PathBuf,
    is_dir: bool,
    size: u64,
}

/// Walk `root` in parallel and build its file tree.
/// Unreadable entries are skipped; empty directories are dropped.
pub fn scan_directory(root: &Path, progress: Arc<ScanProgress>) -> Result<Arc<FileNode>> {
    if !root.is_dir() {
        return Err(Error::Scan {
            path: root.to_path_buf(),
            reason: "not a directory".into(),
        });
    }

    let walker = WalkDir::new(root)
        .skip_hidden(false)
        .follow_links(false)
        .sort(true)
        .process_read_dir(|_, _, _, children| {
            children.retain(|entry| entry.as_ref().map_or(true, |e| !is_skipped(&e.file_name)));
        });

    let mut entries = Vec::new();
    let mut by_parent: HashMap<PathBuf, Vec<usize>> = HashMap::new();
    for entry in walker {
        if progress.cancel.load(Ordering::Relaxed) {
            return Err(Error::Cancelled);
        }
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                warn!(%err, "skipping unreadable entry");
                continue;
            }
        };
        if entry.depth == 0 {
            continue;
        }

        let is_dir = entry.file_type().is_dir();
        let size = if is_dir {
            0
        } else {
            match entry.metadata() {
                Ok(m) => m.len(),
                Err(_) => continue,
            }
        };
        if !is_dir {
            progress.files_scanned.fetch_add(1, Ordering::Relaxed);
            progress.bytes_scanned.fetch_add(size, Ordering::Relaxed);
        }

        by_parent
            .entry(entry.parent_path().to_path_buf())
            .or_default()
            .push(entries.len());
        entries.push(Entry {
            path: entry.path(),
            is_dir,
            size,
        });
    }

    let tree = assemble(root, true, 0, &entries, &by_parent);
    debug!(
        entries = entries.len(),
        bytes = tree.size,
        elapsed_ms = progress.scan_start.elapsed().as_millis() as u64,
        "scan finished"
    );
    Ok(Arc::new(tree))
}

fn assemble(
    path: &Path,
    is_dir: bool,
    size: u64,
    entries: &[Entry],
    by_parent: &HashMap<PathBuf, Vec<usize>>,
) -> FileNode {
    let mut node = FileNode {
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string()),
        path: path.to_path_buf(),
        size,
        is_dir,
        children: Vec::new(),
    };
    if !is_dir {
        return node;
    }

    for &i in by_parent.get(path).map(Vec::as_slice).unwrap_or_default() {
        let e = &entries[i];
        let child = assemble(&e.path, e.is_dir, e.size, entries, by_parent);
        if child.is_dir && child.size == 0 {
            continue;
        }
        node.size += child.size;
        node.children.push(Arc::new(child));
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_tree(tag: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("icicle-scan-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(root.join("sub/empty")).unwrap();
        fs::write(root.join("a.bin"), vec![0u8; 100]).unwrap();
        fs::write(root.join("sub/b.bin"), vec![0u8; 50]).unwrap();
        root
    }

    #[test]
    fn builds_sized_tree() {
        let root = temp_tree("sized");
        let progress = Arc::new(ScanProgress::new());
        let tree = scan_directory(&root, Arc::clone(&progress)).unwrap();

        assert_eq!(tree.size, 150);
        assert_eq!(progress.files_scanned.load(Ordering::Relaxed), 2);
        let names: Vec<_> = tree.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["a.bin", "sub"]);
        // Empty directories are dropped.
        assert_eq!(tree.children[1].children.len(), 1);
        assert_eq!(tree.children[1].value(), 0.0);
        fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn cancelled_scan_returns_error() {
        let root = temp_tree("cancel");
        let progress = Arc::new(ScanProgress::new());
        progress.cancel.store(true, Ordering::Relaxed);
        assert!(matches!(scan_directory(&root, progress), Err(Error::Cancelled)));
        fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn file_root_is_rejected() {
        let root = temp_tree("file");
        let err = scan_directory(&root.join("a.bin"), Arc::new(ScanProgress::new())).unwrap_err();
        assert!(matches!(err, Error::Scan { .. }));
        fs::remove_dir_all(root).unwrap();
    }
}
