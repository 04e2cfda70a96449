use crate::paths::{entry_name, millis_since_epoch};
use crate::security::ResolvedPath;
use crate::tree::node::{DirectoryNode, FileNode, TreeNode};
use std::fs::{self, File, Metadata};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TraversalError {
    #[error("directory tree deeper than {limit} levels")]
    DepthExceeded { limit: usize },
    #[error("directory cycle at {}", path.display())]
    CycleDetected { path: PathBuf },
    #[error("directory tree has more than {limit} entries")]
    TooManyEntries { limit: usize },
    #[error("walk cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy)]
pub struct TreeLimits {
    pub max_depth: usize,
    pub max_entries: usize,
}

impl Default for TreeLimits {
    fn default() -> Self {
        Self { max_depth: 64, max_entries: 200_000 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct TreeBuilder {
    limits: TreeLimits,
    sort_children: bool,
}

impl TreeBuilder {
    pub fn new(limits: TreeLimits, sort_children: bool) -> Self {
        Self { limits, sort_children }
    }

    pub fn build(
        &self,
        path: &ResolvedPath,
        cancel: &CancelFlag,
    ) -> Result<Option<TreeNode>, TraversalError> {
        Walk::new(self, cancel).node(path.as_path(), 0)
    }
}

struct Walk<'a> {
    builder: &'a TreeBuilder,
    cancel: &'a CancelFlag,
    entries: usize,
    // (dev, ino) of every directory on the current descent path
    ancestors: Vec<(u64, u64)>,
}

impl<'a> Walk<'a> {
    fn new(builder: &'a TreeBuilder, cancel: &'a CancelFlag) -> Self {
        Self { builder, cancel, entries: 0, ancestors: Vec::new() }
    }

    fn node(&mut self, path: &Path, depth: usize) -> Result<Option<TreeNode>, TraversalError> {
        if self.cancel.is_cancelled() {
            return Err(TraversalError::Cancelled);
        }
        // Symlinks are never followed here, only during verification, so a link
        // planted under the root cannot pull outside content into a listing.
        let meta = match fs::symlink_metadata(path) {
            Ok(m) => m,
            Err(e) => {
                trace!(path = %path.display(), error = %e, "skipping unreadable entry");
                return Ok(None);
            }
        };
        let ft = meta.file_type();
        if !ft.is_file() && !ft.is_dir() {
            trace!(path = %path.display(), "skipping special entry");
            return Ok(None);
        }
        if depth > self.builder.limits.max_depth {
            return Err(TraversalError::DepthExceeded { limit: self.builder.limits.max_depth });
        }
        if ft.is_file() {
            if let Err(e) = File::open(path) {
                trace!(path = %path.display(), error = %e, "skipping unreadable file");
                return Ok(None);
            }
            self.count()?;
            return Ok(Some(TreeNode::File(FileNode {
                name: entry_name(path),
                size: meta.len(),
                modified: modified_millis(&meta),
            })));
        }
        self.directory(path, &meta, depth)
    }

    fn directory(
        &mut self,
        path: &Path,
        meta: &Metadata,
        depth: usize,
    ) -> Result<Option<TreeNode>, TraversalError> {
        let id = (meta.dev(), meta.ino());
        if self.ancestors.contains(&id) {
            return Err(TraversalError::CycleDetected { path: path.to_path_buf() });
        }
        // the handle is released before recursing
        let entries: Vec<PathBuf> = match fs::read_dir(path) {
            Ok(rd) => rd.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(e) => {
                trace!(path = %path.display(), error = %e, "skipping unreadable directory");
                return Ok(None);
            }
        };
        self.count()?;

        self.ancestors.push(id);
        let mut children = Vec::with_capacity(entries.len());
        for child in &entries {
            match self.node(child, depth + 1) {
                Ok(Some(n)) => children.push(n),
                Ok(None) => {}
                Err(e) => {
                    self.ancestors.pop();
                    return Err(e);
                }
            }
        }
        self.ancestors.pop();

        if self.builder.sort_children {
            children.sort_by(|a, b| a.name().cmp(b.name()));
        }
        Ok(Some(TreeNode::Directory(DirectoryNode {
            name: entry_name(path),
            modified: modified_millis(meta),
            children,
        })))
    }

    fn count(&mut self) -> Result<(), TraversalError> {
        self.entries += 1;
        if self.entries > self.builder.limits.max_entries {
            return Err(TraversalError::TooManyEntries { limit: self.builder.limits.max_entries });
        }
        Ok(())
    }
}

fn modified_millis(meta: &Metadata) -> i64 {
    match meta.modified() {
        Ok(t) => millis_since_epoch(t),
        Err(_) => meta.mtime() * 1000 + meta.mtime_nsec() / 1_000_000,
    }
}
