//! Git repository detection and shared helpers

use std::path::{Component, Path, PathBuf};

use git2::{Repository, Signature, Tree};

use crate::config::RepoConfig;
use crate::{Error, Result};

use super::lock::WorkingTreeLock;

/// Branch naming and trunk settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchOptions {
    /// Trunk branch that suggestion branches start from and merge back into
    pub trunk: String,
    /// Prefix shared by every suggestion branch
    pub prefix: String,
    /// Maximum slug length
    pub slug_len: usize,
}

impl Default for BranchOptions {
    fn default() -> Self {
        Self {
            trunk: "main".to_string(),
            prefix: "suggestion-".to_string(),
            slug_len: 30,
        }
    }
}

impl From<&RepoConfig> for BranchOptions {
    fn from(config: &RepoConfig) -> Self {
        Self {
            trunk: config.trunk.clone(),
            prefix: config.branch_prefix.clone(),
            slug_len: config.slug_len,
        }
    }
}

/// A git working tree driven by the suggestion workflow
pub struct GitRepo {
    repo: Repository,
    root: PathBuf,
    options: BranchOptions,
}

impl std::fmt::Debug for GitRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepo")
            .field("root", &self.root)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl GitRepo {
    /// Open a git repository at the given path
    ///
    /// This will search upward from the given path to find the repository root.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let repo = Repository::discover(path).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                Error::Config(format!(
                    "Not a git repository: {}. Run 'git init' first or navigate to a git repository.",
                    path.display()
                ))
            } else {
                Error::Git(e)
            }
        })?;

        let root = repo
            .workdir()
            .ok_or_else(|| Error::Config("Bare repositories are not supported".to_string()))?
            .to_path_buf();

        Ok(Self {
            repo,
            root,
            options: BranchOptions::default(),
        })
    }

    /// Use non-default branch settings
    pub fn with_options(mut self, options: BranchOptions) -> Self {
        self.options = options;
        self
    }

    /// Get the repository root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Branch settings in effect
    pub fn options(&self) -> &BranchOptions {
        &self.options
    }

    /// Get access to the underlying git2 repository
    pub fn inner(&self) -> &Repository {
        &self.repo
    }

    /// Take the single-writer lock on this working tree
    pub fn lock(&self) -> Result<WorkingTreeLock> {
        WorkingTreeLock::acquire(self.repo.path())
    }

    /// Get the current branch name
    ///
    /// Returns the target branch for an unborn HEAD and `None` when detached.
    pub fn current_branch(&self) -> Result<Option<String>> {
        let head = match self.repo.head() {
            Ok(h) => h,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => {
                let head_ref = self.repo.find_reference("HEAD")?;
                return Ok(head_ref
                    .symbolic_target()
                    .and_then(|t| t.strip_prefix("refs/heads/"))
                    .map(|s| s.to_string()));
            }
            Err(e) => return Err(Error::Git(e)),
        };

        if head.is_branch() {
            Ok(head.shorthand().map(|s| s.to_string()))
        } else {
            Ok(None)
        }
    }

    /// Tree of the HEAD commit, or `None` when no commit exists yet
    pub(crate) fn head_tree(&self) -> Result<Option<Tree<'_>>> {
        match self.repo.head() {
            Ok(head) => Ok(Some(head.peel_to_tree()?)),
            Err(e)
                if e.code() == git2::ErrorCode::UnbornBranch
                    || e.code() == git2::ErrorCode::NotFound =>
            {
                Ok(None)
            }
            Err(e) => Err(Error::Git(e)),
        }
    }

    /// Signature for commits made by the workflow
    pub(crate) fn signature(&self) -> Result<Signature<'static>> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig.to_owned()),
            Err(_) => Ok(Signature::now("sprout", "sprout@localhost")?),
        }
    }

    /// Paths tracked in the index, sorted, at most `limit`
    pub fn tracked_files(&self, limit: usize) -> Result<Vec<String>> {
        let index = self.repo.index()?;
        let mut files: Vec<String> = index
            .iter()
            .map(|entry| String::from_utf8_lossy(&entry.path).to_string())
            .collect();
        files.sort();
        files.dedup();
        files.truncate(limit);
        Ok(files)
    }
}

/// Check that `path` stays inside the working tree
///
/// Rejects absolute paths, `..` components and any `.git` component.
pub fn is_safe_relative_path(path: &str) -> bool {
    let path = Path::new(path);
    if path.as_os_str().is_empty() {
        return false;
    }

    path.components().all(|c| match c {
        Component::Normal(part) => part != ".git",
        Component::CurDir => true,
        _ => false,
    })
}
