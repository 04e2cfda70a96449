use crate::paths::join_under;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForbiddenReason {
    InvalidInput,
    Unresolvable,
    OutsideRoot,
}

impl fmt::Display for ForbiddenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ForbiddenReason::InvalidInput => "invalid input",
            ForbiddenReason::Unresolvable => "unresolvable",
            ForbiddenReason::OutsideRoot => "outside root",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
#[error("forbidden path {requested:?}: {reason}")]
pub struct Forbidden {
    pub reason: ForbiddenReason,
    pub requested: String,
}

impl Forbidden {
    pub fn new(reason: ForbiddenReason, requested: impl Into<String>) -> Self {
        Self { reason, requested: requested.into() }
    }
}

// only ScopeVerifier::verify constructs these
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath(PathBuf);

impl ResolvedPath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct ScopeVerifier {
    root: PathBuf,
}

impl ScopeVerifier {
    pub fn new(root: &Path) -> anyhow::Result<Self> {
        let root = dunce::canonicalize(root)?;
        if !root.is_dir() {
            anyhow::bail!("root is not a directory: {}", root.display());
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn verify(&self, requested: &str) -> Result<ResolvedPath, Forbidden> {
        let candidate = join_under(&self.root, requested)
            .ok_or_else(|| Forbidden::new(ForbiddenReason::InvalidInput, requested))?;
        let resolved = dunce::canonicalize(&candidate)
            .map_err(|_| Forbidden::new(ForbiddenReason::Unresolvable, requested))?;

        // Resolve first, then walk the canonical ancestors up to `/`. Comparing
        // text prefixes would accept `/srv/files-evil` for root `/srv/files`.
        // Each step drops one component, so the walk is bounded.
        if resolved.ancestors().any(|a| a == self.root) {
            Ok(ResolvedPath(resolved))
        } else {
            Err(Forbidden::new(ForbiddenReason::OutsideRoot, requested))
        }
    }
}
