//! Deployment of completed artifacts into the site's component directory

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sprout_db::{Suggestion, SuggestionRepo};

use crate::{Error, Result};

/// Component name for a deployed suggestion
pub fn component_name(id: i64) -> String {
    format!("Generated{}", id)
}

/// Writes artifacts to disk and keeps the deployment fields in step
pub struct Deployer {
    store: SuggestionRepo,
    target_dir: PathBuf,
}

impl Deployer {
    /// `target_dir` is the directory that receives `Generated{id}.tsx` files
    pub fn new(store: SuggestionRepo, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            target_dir: target_dir.into(),
        }
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    /// File a suggestion deploys to
    pub fn component_path(&self, id: i64) -> PathBuf {
        self.target_dir.join(format!("{}.tsx", component_name(id)))
    }

    /// Write the artifact and mark the record deployed
    ///
    /// Only `completed` suggestions with an artifact can be deployed. The file
    /// is removed again if the record cannot be updated.
    pub async fn deploy(&self, id: i64) -> Result<Suggestion> {
        let suggestion = self.store.get(id).await?;
        let code = match (&suggestion.generated_code, suggestion.is_deployable()) {
            (Some(code), true) => code,
            _ => {
                return Err(sprout_db::Error::NotDeployable(
                    id,
                    format!("status is {}", suggestion.status),
                )
                .into())
            }
        };

        let path = self.component_path(id);
        tokio::fs::create_dir_all(&self.target_dir).await?;
        tokio::fs::write(&path, code).await?;

        match self.store.set_deployed(id, &component_name(id)).await {
            Ok(updated) => {
                tracing::info!(suggestion_id = id, path = %path.display(), "Deployed component");
                Ok(updated)
            }
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(&path).await {
                    tracing::warn!(path = %path.display(), error = %rm, "Could not remove component file");
                }
                Err(Error::Store(e))
            }
        }
    }

    /// Remove the component file and clear the deployment fields
    ///
    /// A file that is already gone is not an error.
    pub async fn undeploy(&self, id: i64) -> Result<Suggestion> {
        // Surfaces NotFound before touching the filesystem
        self.store.get(id).await?;

        let path = self.component_path(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::info!(suggestion_id = id, path = %path.display(), "Removed component"),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(suggestion_id = id, "Component file already absent");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(self.store.clear_deployed(id).await?)
    }

    /// Currently deployed suggestions
    pub async fn deployed(&self) -> Result<Vec<Suggestion>> {
        Ok(self.store.deployed().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprout_db::{Database, NewSuggestion, SuggestionStatus};
    use tempfile::TempDir;

    const CODE: &str = "const Footer = () => <footer />;\n\nexport default Footer;";

    async fn setup() -> (TempDir, SuggestionRepo, Deployer) {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("test.db")).await.unwrap();
        let repo = db.suggestions();
        let deployer = Deployer::new(repo.clone(), dir.path().join("site/generated"));
        (dir, repo, deployer)
    }

    async fn completed(repo: &SuggestionRepo) -> Suggestion {
        let s = repo.create(&NewSuggestion::new("Add a footer").unwrap()).await.unwrap();
        repo.claim(s.id).await.unwrap();
        repo.complete(s.id, CODE).await.unwrap()
    }

    #[tokio::test]
    async fn test_deploy_writes_file_and_flags_record() {
        let (_dir, repo, deployer) = setup().await;
        let s = completed(&repo).await;

        let deployed = deployer.deploy(s.id).await.unwrap();
        assert!(deployed.deployed);
        assert_eq!(deployed.component_name, Some(format!("Generated{}", s.id)));

        let written = std::fs::read_to_string(deployer.component_path(s.id)).unwrap();
        assert_eq!(written, CODE);
        assert_eq!(deployer.deployed().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_deploy_requires_completed() {
        let (_dir, repo, deployer) = setup().await;
        let s = repo.create(&NewSuggestion::new("Pending one").unwrap()).await.unwrap();

        let err = deployer.deploy(s.id).await.unwrap_err();
        assert!(err.to_string().contains("cannot be deployed"));
        assert!(!deployer.component_path(s.id).exists());
        assert!(!repo.get(s.id).await.unwrap().deployed);
    }

    #[tokio::test]
    async fn test_failed_suggestion_is_not_deployable() {
        let (_dir, repo, deployer) = setup().await;
        let s = repo.create(&NewSuggestion::new("Bad one").unwrap()).await.unwrap();
        repo.claim(s.id).await.unwrap();
        repo.fail(s.id, "// Validation failed: no").await.unwrap();

        assert!(deployer.deploy(s.id).await.is_err());
        let record = repo.get(s.id).await.unwrap();
        assert_eq!(record.status, SuggestionStatus::Failed);
        assert!(!record.deployed);
    }

    #[tokio::test]
    async fn test_undeploy_clears_fields() {
        let (_dir, repo, deployer) = setup().await;
        let s = completed(&repo).await;
        deployer.deploy(s.id).await.unwrap();

        let cleared = deployer.undeploy(s.id).await.unwrap();
        assert!(!cleared.deployed);
        assert!(cleared.component_name.is_none());
        assert!(!deployer.component_path(s.id).exists());
        // Artifact survives undeploy
        assert_eq!(cleared.generated_code.as_deref(), Some(CODE));
    }

    #[tokio::test]
    async fn test_undeploy_tolerates_missing_file() {
        let (_dir, repo, deployer) = setup().await;
        let s = completed(&repo).await;
        deployer.deploy(s.id).await.unwrap();
        std::fs::remove_file(deployer.component_path(s.id)).unwrap();

        let cleared = deployer.undeploy(s.id).await.unwrap();
        assert!(!cleared.deployed);
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let (_dir, _repo, deployer) = setup().await;
        assert!(deployer.deploy(99).await.is_err());
        assert!(deployer.undeploy(99).await.is_err());
    }
}
