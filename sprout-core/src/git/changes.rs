//! Writing, staging, committing and diffing file changes

use std::collections::BTreeMap;
use std::path::Path;

use git2::{Diff, DiffFormat, DiffOptions, IndexAddOption, ResetType};

use super::repo::{is_safe_relative_path, GitRepo};
use crate::{Error, Result};

/// Proposed replacement content keyed by repository-relative path
pub type ChangeSet = BTreeMap<String, String>;

/// Render a diff as unified patch text
fn patch_text(diff: &Diff<'_>) -> Result<String> {
    let mut out = String::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        if matches!(line.origin(), '+' | '-' | ' ') {
            out.push(line.origin());
        }
        out.push_str(&String::from_utf8_lossy(line.content()));
        true
    })?;
    Ok(out)
}

impl GitRepo {
    /// Write every file in `changes` and stage it
    ///
    /// Parent directories are created as needed. A path that cannot be
    /// written (or escapes the working tree) is logged and skipped. Returns
    /// the paths that were written.
    pub fn apply_changes(&self, changes: &ChangeSet) -> Result<Vec<String>> {
        let mut written = Vec::new();

        for (rel, content) in changes {
            if !is_safe_relative_path(rel) {
                tracing::warn!(path = %rel, "Refusing to write outside the working tree");
                continue;
            }

            let full = self.root().join(rel);
            let result = full
                .parent()
                .map(std::fs::create_dir_all)
                .unwrap_or(Ok(()))
                .and_then(|_| std::fs::write(&full, content));

            match result {
                Ok(()) => {
                    tracing::info!(path = %rel, bytes = content.len(), "Wrote file");
                    written.push(rel.clone());
                }
                Err(e) => {
                    tracing::error!(path = %rel, error = %e, "Failed to write file");
                }
            }
        }

        if !written.is_empty() {
            let mut index = self.inner().index()?;
            for rel in &written {
                index.add_path(Path::new(rel))?;
            }
            index.write()?;
        }

        Ok(written)
    }

    /// Commit `paths` (or every change in the tree when empty) on the current branch
    ///
    /// Returns the new commit id.
    pub fn commit_changes(&self, message: &str, paths: &[String]) -> Result<String> {
        let repo = self.inner();
        let mut index = repo.index()?;

        if paths.is_empty() {
            index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
            index.update_all(["*"].iter(), None)?;
        } else {
            for rel in paths {
                index.add_path(Path::new(rel))?;
            }
        }
        index.write()?;

        let tree = repo.find_tree(index.write_tree()?)?;
        let sig = self.signature()?;

        let parent = match repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(e)
                if e.code() == git2::ErrorCode::UnbornBranch
                    || e.code() == git2::ErrorCode::NotFound =>
            {
                None
            }
            Err(e) => return Err(Error::Git(e)),
        };
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        let oid = repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
        tracing::info!(commit = %oid, message, "Committed changes");

        Ok(oid.to_string())
    }

    /// Diff of the working tree (including staged changes) against HEAD
    ///
    /// Scoped to `path` when given. In a repository with no commits yet the
    /// staged content is diffed against an empty tree instead.
    pub fn get_diff(&self, path: Option<&str>) -> Result<String> {
        let repo = self.inner();
        let mut opts = DiffOptions::new();
        if let Some(p) = path {
            opts.pathspec(p);
        }

        let diff = match self.head_tree()? {
            Some(tree) => repo.diff_tree_to_workdir_with_index(Some(&tree), Some(&mut opts))?,
            None => repo.diff_tree_to_index(None, None, Some(&mut opts))?,
        };

        patch_text(&diff)
    }

    /// What `branch` changes relative to where it left trunk
    pub fn diff_against_trunk(&self, branch: &str) -> Result<String> {
        let repo = self.inner();
        let trunk = &self.options().trunk;

        let trunk_commit = repo
            .find_branch(trunk, git2::BranchType::Local)?
            .get()
            .peel_to_commit()?;
        let branch_commit = repo
            .find_branch(branch, git2::BranchType::Local)?
            .get()
            .peel_to_commit()?;

        let base = repo.merge_base(trunk_commit.id(), branch_commit.id())?;
        let base_tree = repo.find_commit(base)?.tree()?;
        let branch_tree = branch_commit.tree()?;

        let diff = repo.diff_tree_to_tree(Some(&base_tree), Some(&branch_tree), None)?;
        patch_text(&diff)
    }

    /// Throw away uncommitted changes on the current branch
    ///
    /// Resets index and working tree to HEAD; files staged but never
    /// committed are removed.
    pub fn discard_changes(&self) -> Result<()> {
        let repo = self.inner();
        let head = repo.head()?.peel_to_commit()?;
        repo.reset(head.as_object(), ResetType::Hard, None)?;
        tracing::info!(commit = %head.id(), "Discarded uncommitted changes");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{init_repo, init_repo_with_commit};
    use tempfile::TempDir;

    fn changes(entries: &[(&str, &str)]) -> ChangeSet {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_apply_then_diff_on_fresh_repo() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        let repo = GitRepo::open(dir.path()).unwrap();

        let written = repo
            .apply_changes(&changes(&[("src/Title.tsx", "export default Title;\n")]))
            .unwrap();
        assert_eq!(written, vec!["src/Title.tsx"]);

        let diff = repo.get_diff(None).unwrap();
        assert!(!diff.is_empty());
        assert!(diff.contains("src/Title.tsx"));
        assert!(diff.contains("+export default Title;"));
    }

    #[test]
    fn test_apply_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        init_repo_with_commit(dir.path(), &[("README.md", "hi\n")]);
        let repo = GitRepo::open(dir.path()).unwrap();

        repo.apply_changes(&changes(&[("a/b/c/deep.ts", "x\n")]))
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a/b/c/deep.ts")).unwrap(),
            "x\n"
        );
    }

    #[test]
    fn test_apply_skips_bad_paths() {
        let dir = TempDir::new().unwrap();
        init_repo_with_commit(dir.path(), &[("README.md", "hi\n")]);
        let repo = GitRepo::open(dir.path()).unwrap();

        // A directory where a file should go cannot be written
        std::fs::create_dir(dir.path().join("blocked")).unwrap();

        let written = repo
            .apply_changes(&changes(&[
                ("../escape.txt", "no"),
                ("blocked", "no"),
                ("ok.txt", "yes\n"),
            ]))
            .unwrap();

        assert_eq!(written, vec!["ok.txt"]);
        assert!(!dir.path().parent().unwrap().join("escape.txt").exists());
    }

    #[test]
    fn test_diff_scoped_to_path() {
        let dir = TempDir::new().unwrap();
        init_repo_with_commit(dir.path(), &[("a.txt", "a\n"), ("b.txt", "b\n")]);
        let repo = GitRepo::open(dir.path()).unwrap();

        std::fs::write(dir.path().join("a.txt"), "a2\n").unwrap();
        std::fs::write(dir.path().join("b.txt"), "b2\n").unwrap();

        let diff = repo.get_diff(Some("a.txt")).unwrap();
        assert!(diff.contains("+a2"));
        assert!(!diff.contains("b2"));
    }

    #[test]
    fn test_commit_given_paths() {
        let dir = TempDir::new().unwrap();
        let raw = init_repo_with_commit(dir.path(), &[("README.md", "hi\n")]);
        let repo = GitRepo::open(dir.path()).unwrap();

        std::fs::write(dir.path().join("one.txt"), "1\n").unwrap();
        std::fs::write(dir.path().join("two.txt"), "2\n").unwrap();

        let oid = repo
            .commit_changes("Add one", &["one.txt".to_string()])
            .unwrap();

        let commit = raw.find_commit(git2::Oid::from_str(&oid).unwrap()).unwrap();
        assert_eq!(commit.message(), Some("Add one"));
        assert_eq!(commit.parent_count(), 1);
        let tree = commit.tree().unwrap();
        assert!(tree.get_name("one.txt").is_some());
        assert!(tree.get_name("two.txt").is_none());
    }

    #[test]
    fn test_commit_all_on_fresh_repo() {
        let dir = TempDir::new().unwrap();
        let raw = init_repo(dir.path());
        let repo = GitRepo::open(dir.path()).unwrap();

        std::fs::write(dir.path().join("first.txt"), "1\n").unwrap();
        let oid = repo.commit_changes("First", &[]).unwrap();

        let commit = raw.find_commit(git2::Oid::from_str(&oid).unwrap()).unwrap();
        assert_eq!(commit.parent_count(), 0);
        assert!(commit.tree().unwrap().get_name("first.txt").is_some());
        assert!(repo.get_diff(None).unwrap().is_empty());
    }

    #[test]
    fn test_discard_changes_removes_staged_files() {
        let dir = TempDir::new().unwrap();
        init_repo_with_commit(dir.path(), &[("README.md", "hi\n")]);
        let repo = GitRepo::open(dir.path()).unwrap();

        repo.apply_changes(&changes(&[("README.md", "changed\n"), ("new.txt", "new\n")]))
            .unwrap();
        repo.discard_changes().unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("README.md")).unwrap(),
            "hi\n"
        );
        assert!(!dir.path().join("new.txt").exists());
        assert!(repo.get_diff(None).unwrap().is_empty());
    }

    #[test]
    fn test_diff_against_trunk() {
        let dir = TempDir::new().unwrap();
        init_repo_with_commit(dir.path(), &[("README.md", "hi\n")]);
        let repo = GitRepo::open(dir.path()).unwrap();

        let branch = repo.create_branch(5, "footer").unwrap();
        repo.apply_changes(&changes(&[("Footer.tsx", "export default Footer;\n")]))
            .unwrap();
        repo.commit_changes("Suggestion #5", &[]).unwrap();
        repo.switch_to_main().unwrap();

        // Branch content is not in the trunk working tree...
        assert!(!dir.path().join("Footer.tsx").exists());
        // ...but the branch diff shows it
        let diff = repo.diff_against_trunk(&branch).unwrap();
        assert!(diff.contains("+export default Footer;"));
    }
}
