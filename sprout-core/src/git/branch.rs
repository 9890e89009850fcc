//! Suggestion branches: naming, creation, switching and merging

use git2::build::CheckoutBuilder;
use git2::{BranchType, MergeOptions, ResetType};

use super::repo::GitRepo;
use crate::{Error, Result};

/// A local branch created for a suggestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionBranch {
    /// Suggestion id parsed from the branch name
    pub id: i64,
    /// Full branch name
    pub name: String,
    /// Slug part of the name (may be empty)
    pub slug: String,
}

/// Sanitize free text into a branch-name slug
///
/// Lowercases ASCII, collapses every run of characters outside `[a-z0-9]`
/// into a single `-`, then truncates to `max_len`. Leading and trailing
/// separators are dropped.
pub fn slugify(text: &str, max_len: usize) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_sep = false;

    for c in text.chars().map(|c| c.to_ascii_lowercase()) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_sep && !slug.is_empty() {
                slug.push('-');
            }
            pending_sep = false;
            slug.push(c);
        } else {
            pending_sep = true;
        }
    }

    // Slug is pure ASCII, so byte truncation is char-safe
    slug.truncate(max_len);
    slug.trim_end_matches('-').to_string()
}

impl GitRepo {
    /// Deterministic branch name for a suggestion
    pub fn branch_name(&self, id: i64, description: &str) -> String {
        let options = self.options();
        let slug = slugify(description, options.slug_len);
        if slug.is_empty() {
            format!("{}{}", options.prefix, id)
        } else {
            format!("{}{}-{}", options.prefix, id, slug)
        }
    }

    /// Check out an existing local branch
    ///
    /// Uses a safe checkout, so uncommitted edits that would be overwritten
    /// make this fail instead of being lost.
    pub fn checkout_branch(&self, name: &str) -> Result<()> {
        let repo = self.inner();
        let refname = format!("refs/heads/{}", name);

        let target = repo.revparse_single(&refname).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                Error::Other(format!("Branch '{}' not found", name))
            } else {
                Error::Git(e)
            }
        })?;

        let mut checkout = CheckoutBuilder::new();
        checkout.safe();
        repo.checkout_tree(&target, Some(&mut checkout))?;
        repo.set_head(&refname)?;

        tracing::debug!(branch = name, "Checked out branch");
        Ok(())
    }

    /// Create (or reuse) the branch for a suggestion and check it out
    ///
    /// Trunk is checked out first so new branches always start from it.
    /// An existing branch with the same name is checked out as-is.
    pub fn create_branch(&self, id: i64, description: &str) -> Result<String> {
        let name = self.branch_name(id, description);
        let trunk = self.options().trunk.clone();

        self.checkout_branch(&trunk)?;

        let repo = self.inner();
        match repo.find_branch(&name, BranchType::Local) {
            Ok(_) => {
                tracing::info!(branch = %name, "Branch already exists, reusing it");
            }
            Err(e) if e.code() == git2::ErrorCode::NotFound => {
                let head = repo.head()?.peel_to_commit()?;
                repo.branch(&name, &head, false)?;
                tracing::info!(branch = %name, base = %trunk, "Created branch");
            }
            Err(e) => return Err(Error::Git(e)),
        }

        self.checkout_branch(&name)?;
        Ok(name)
    }

    /// Check out trunk
    pub fn switch_to_main(&self) -> Result<()> {
        let trunk = self.options().trunk.clone();
        self.checkout_branch(&trunk)?;
        tracing::info!(branch = %trunk, "Switched to trunk");
        Ok(())
    }

    /// List all local branches
    pub fn list_local_branches(&self) -> Result<Vec<String>> {
        let mut branches = Vec::new();

        for branch in self.inner().branches(Some(BranchType::Local))? {
            let (branch, _) = branch?;
            if let Some(name) = branch.name().ok().flatten() {
                branches.push(name.to_string());
            }
        }

        Ok(branches)
    }

    /// Parse a branch name into its suggestion parts
    pub fn parse_suggestion_branch(&self, name: &str) -> Option<SuggestionBranch> {
        let rest = name.strip_prefix(&self.options().prefix)?;
        let (id_part, slug) = match rest.split_once('-') {
            Some((id, slug)) => (id, slug),
            None => (rest, ""),
        };

        let id = id_part.parse::<i64>().ok()?;
        Some(SuggestionBranch {
            id,
            name: name.to_string(),
            slug: slug.to_string(),
        })
    }

    /// Suggestion branches awaiting review, ordered by suggestion id
    pub fn list_suggestion_branches(&self) -> Result<Vec<SuggestionBranch>> {
        let mut branches: Vec<SuggestionBranch> = self
            .list_local_branches()?
            .iter()
            .filter_map(|name| self.parse_suggestion_branch(name))
            .collect();
        branches.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.name.cmp(&b.name)));
        Ok(branches)
    }

    /// Find the branch created for suggestion `id`
    pub fn find_suggestion_branch(&self, id: i64) -> Result<Option<SuggestionBranch>> {
        Ok(self
            .list_suggestion_branches()?
            .into_iter()
            .find(|b| b.id == id))
    }

    /// Merge `branch` into trunk with an explicit merge commit
    ///
    /// Always records a two-parent commit, even when trunk could be
    /// fast-forwarded, so the branch stays visible in history. On conflict
    /// the merge is aborted and trunk is left untouched.
    pub fn merge_no_ff(&self, branch: &str) -> Result<String> {
        let repo = self.inner();
        let trunk = self.options().trunk.clone();

        self.checkout_branch(&trunk)?;

        let branch_ref = repo.find_branch(branch, BranchType::Local)?;
        let annotated = repo.reference_to_annotated_commit(branch_ref.get())?;

        let (analysis, _) = repo.merge_analysis(&[&annotated])?;
        if analysis.is_up_to_date() {
            let head = repo.head()?.peel_to_commit()?;
            tracing::info!(branch, "Branch already merged into trunk");
            return Ok(head.id().to_string());
        }

        let mut merge_opts = MergeOptions::new();
        let mut checkout = CheckoutBuilder::new();
        checkout.safe();
        repo.merge(&[&annotated], Some(&mut merge_opts), Some(&mut checkout))?;

        let mut index = repo.index()?;
        if index.has_conflicts() {
            let mut paths = Vec::new();
            for conflict in index.conflicts()? {
                let conflict = conflict?;
                if let Some(entry) = conflict.our.or(conflict.their).or(conflict.ancestor) {
                    paths.push(String::from_utf8_lossy(&entry.path).to_string());
                }
            }

            repo.cleanup_state()?;
            let head = repo.head()?.peel_to_commit()?;
            repo.reset(head.as_object(), ResetType::Hard, None)?;

            tracing::warn!(branch, ?paths, "Merge aborted on conflicts");
            return Err(Error::MergeConflict {
                branch: branch.to_string(),
                paths,
            });
        }

        let tree = repo.find_tree(index.write_tree()?)?;
        let sig = self.signature()?;
        let head_commit = repo.head()?.peel_to_commit()?;
        let branch_commit = repo.find_commit(annotated.id())?;
        let message = format!("Merge branch '{}' into {}", branch, trunk);

        let oid = repo.commit(
            Some("HEAD"),
            &sig,
            &sig,
            &message,
            &tree,
            &[&head_commit, &branch_commit],
        )?;
        repo.cleanup_state()?;

        tracing::info!(branch, commit = %oid, "Merged into trunk");
        Ok(oid.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::repo::BranchOptions;
    use crate::testing::init_repo_with_commit;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> GitRepo {
        GitRepo::open(dir.path()).unwrap()
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Add a welcome title", 30), "add-a-welcome-title");
        assert_eq!(slugify("  Dark MODE!!  toggle ", 30), "dark-mode-toggle");
        assert_eq!(slugify("Ünïcode café", 30), "n-code-caf");
        assert_eq!(slugify("!!!", 30), "");
    }

    #[test]
    fn test_slugify_truncates() {
        let slug = slugify("Add a really long suggestion title that keeps going", 30);
        assert!(slug.len() <= 30);
        assert_eq!(slug, "add-a-really-long-suggestion-t");

        // Truncation landing on a separator drops it
        assert_eq!(slugify("abcd efgh", 5), "abcd");
    }

    #[test]
    fn test_branch_name() {
        let dir = TempDir::new().unwrap();
        init_repo_with_commit(dir.path(), &[("README.md", "hi")]);
        let repo = open(&dir);

        assert_eq!(
            repo.branch_name(7, "Add a welcome title"),
            "suggestion-7-add-a-welcome-title"
        );
        assert_eq!(repo.branch_name(8, "???"), "suggestion-8");
    }

    #[test]
    fn test_create_branch_checks_it_out() {
        let dir = TempDir::new().unwrap();
        init_repo_with_commit(dir.path(), &[("README.md", "hi")]);
        let repo = open(&dir);

        let name = repo.create_branch(1, "Add a footer").unwrap();
        assert_eq!(name, "suggestion-1-add-a-footer");
        assert_eq!(repo.current_branch().unwrap(), Some(name));
    }

    #[test]
    fn test_create_branch_is_idempotent() {
        let dir = TempDir::new().unwrap();
        init_repo_with_commit(dir.path(), &[("README.md", "hi")]);
        let repo = open(&dir);

        let first = repo.create_branch(3, "Dark mode").unwrap();
        repo.switch_to_main().unwrap();
        let second = repo.create_branch(3, "Dark mode").unwrap();

        assert_eq!(first, second);
        assert_eq!(repo.current_branch().unwrap(), Some(second));
        assert_eq!(
            repo.list_local_branches()
                .unwrap()
                .iter()
                .filter(|b| b.starts_with("suggestion-3"))
                .count(),
            1
        );
    }

    #[test]
    fn test_create_branch_starts_from_trunk() {
        let dir = TempDir::new().unwrap();
        let raw = init_repo_with_commit(dir.path(), &[("README.md", "hi")]);
        let repo = open(&dir);

        let trunk_head = raw.head().unwrap().peel_to_commit().unwrap().id();

        // Leave HEAD on a different branch first
        repo.create_branch(1, "one").unwrap();
        repo.create_branch(2, "two").unwrap();

        let two = raw
            .find_branch("suggestion-2-two", BranchType::Local)
            .unwrap()
            .get()
            .peel_to_commit()
            .unwrap()
            .id();
        assert_eq!(two, trunk_head);
    }

    #[test]
    fn test_custom_trunk_and_prefix() {
        let dir = TempDir::new().unwrap();
        let raw = init_repo_with_commit(dir.path(), &[("README.md", "hi")]);
        let head = raw.head().unwrap().peel_to_commit().unwrap();
        raw.branch("develop", &head, false).unwrap();

        let repo = open(&dir).with_options(BranchOptions {
            trunk: "develop".to_string(),
            prefix: "idea/".to_string(),
            slug_len: 8,
        });

        let name = repo.create_branch(4, "Make it sparkle").unwrap();
        assert_eq!(name, "idea/4-make-it");
        repo.switch_to_main().unwrap();
        assert_eq!(repo.current_branch().unwrap(), Some("develop".to_string()));
    }

    #[test]
    fn test_list_suggestion_branches_parses_ids() {
        let dir = TempDir::new().unwrap();
        let raw = init_repo_with_commit(dir.path(), &[("README.md", "hi")]);
        let head = raw.head().unwrap().peel_to_commit().unwrap();
        for name in ["suggestion-12-footer", "suggestion-2-title", "feature-x", "suggestion-abc"] {
            raw.branch(name, &head, false).unwrap();
        }
        let repo = open(&dir);

        let branches = repo.list_suggestion_branches().unwrap();
        let ids: Vec<i64> = branches.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![2, 12]);
        assert_eq!(branches[1].slug, "footer");

        // Suggestion 1 must not match suggestion 12's branch
        assert!(repo.find_suggestion_branch(1).unwrap().is_none());
        assert_eq!(
            repo.find_suggestion_branch(12).unwrap().unwrap().name,
            "suggestion-12-footer"
        );
    }

    #[test]
    fn test_checkout_missing_branch() {
        let dir = TempDir::new().unwrap();
        init_repo_with_commit(dir.path(), &[("README.md", "hi")]);
        let repo = open(&dir);

        let err = repo.checkout_branch("nope").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
