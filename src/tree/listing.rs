use crate::errors::{AppError, AppResult};
use crate::paths::display_relative;
use crate::security::{ResolvedPath, ScopeVerifier};
use crate::tree::builder::{CancelFlag, TraversalError, TreeBuilder, TreeLimits};
use crate::tree::node::TreeNode;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct TreeConfig {
    pub root: PathBuf,
    pub limits: TreeLimits,
    pub sort_children: bool,
    pub request_timeout: Duration,
}

#[derive(Debug)]
pub struct FileTree {
    verifier: ScopeVerifier,
    builder: TreeBuilder,
    request_timeout: Duration,
}

impl FileTree {
    pub fn new(cfg: &TreeConfig) -> anyhow::Result<Self> {
        Ok(Self {
            verifier: ScopeVerifier::new(&cfg.root)?,
            builder: TreeBuilder::new(cfg.limits, cfg.sort_children),
            request_timeout: cfg.request_timeout,
        })
    }

    pub fn root(&self) -> &Path {
        self.verifier.root()
    }

    pub fn list_tree(&self, relative: &str, cancel: &CancelFlag) -> AppResult<Vec<TreeNode>> {
        let (_, node) = self.resolve_and_build(relative, cancel)?;
        Ok(match node {
            None => Vec::new(),
            Some(TreeNode::Directory(d)) => d.children,
            Some(file) => vec![file],
        })
    }

    pub fn list_paths(&self, relative: &str, cancel: &CancelFlag) -> AppResult<Vec<String>> {
        let (resolved, node) = self.resolve_and_build(relative, cancel)?;
        let here = display_relative(self.root(), resolved.as_path());
        let mut out = Vec::new();
        match node {
            None => {}
            Some(TreeNode::Directory(d)) => {
                for child in &d.children {
                    child.flatten_into(&here, &mut out);
                }
            }
            Some(TreeNode::File(_)) => out.push(here),
        }
        Ok(out)
    }

    pub async fn list_tree_async(self: &Arc<Self>, relative: String) -> AppResult<Vec<TreeNode>> {
        self.run_blocking(move |tree, cancel| tree.list_tree(&relative, cancel)).await
    }

    pub async fn list_paths_async(self: &Arc<Self>, relative: String) -> AppResult<Vec<String>> {
        self.run_blocking(move |tree, cancel| tree.list_paths(&relative, cancel)).await
    }

    fn resolve_and_build(
        &self,
        relative: &str,
        cancel: &CancelFlag,
    ) -> AppResult<(ResolvedPath, Option<TreeNode>)> {
        let resolved = self.verifier.verify(relative).map_err(|f| {
            debug!(requested = %f.requested, reason = %f.reason, "path rejected");
            AppError::from(f)
        })?;
        let node = self.builder.build(&resolved, cancel).map_err(|e| {
            if e != TraversalError::Cancelled {
                warn!(
                    root = %self.root().display(),
                    path = %resolved.as_path().display(),
                    error = %e,
                    "tree walk aborted"
                );
            }
            AppError::from(e)
        })?;
        Ok((resolved, node))
    }

    // cancel flag is raised on deadline and when this future is dropped
    async fn run_blocking<T, F>(self: &Arc<Self>, f: F) -> AppResult<T>
    where
        F: FnOnce(&FileTree, &CancelFlag) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let cancel = CancelFlag::new();
        let _guard = CancelOnDrop(cancel.clone());
        let tree = Arc::clone(self);
        let flag = cancel.clone();
        let task = tokio::task::spawn_blocking(move || f(&tree, &flag));
        match tokio::time::timeout(self.request_timeout, task).await {
            Ok(Ok(res)) => res,
            Ok(Err(join)) => Err(AppError::Internal(join.to_string())),
            Err(_) => {
                cancel.cancel();
                warn!(
                    root = %self.root().display(),
                    timeout_ms = u64::try_from(self.request_timeout.as_millis()).unwrap_or(u64::MAX),
                    "tree walk timed out"
                );
                Err(AppError::Timeout)
            }
        }
    }
}

struct CancelOnDrop(CancelFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}
