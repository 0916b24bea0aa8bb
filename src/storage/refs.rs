//! Branch and tag management.
//!
//! Git refs are the catalog's references:
//! - branches (`refs/heads/*`) are mutable and receive commits
//! - tags (`refs/tags/*`) are fixed
//! - HEAD names the default branch
//!
//! Branch updates are compare-and-swap against the hash the writer started
//! from, so a writer working from a stale view is rejected.

use git2::{BranchType, ErrorCode, Repository};

use crate::model::{Branch, Reference, Tag};
use crate::storage::error::{StoreResult, VersionStoreError};
use crate::storage::types::{CommitId, RefName};

/// Manages Git references (branches and tags).
pub struct RefManager;

impl RefManager {
    /// Resolve a branch name to its current commit ID.
    pub fn branch_tip(repo: &Repository, branch: &RefName) -> StoreResult<CommitId> {
        Self::peel(repo, &branch.branch_path())
            .ok_or_else(|| VersionStoreError::ReferenceNotFound(branch.to_string()))
    }

    fn peel(repo: &Repository, path: &str) -> Option<CommitId> {
        let reference = repo.find_reference(path).ok()?;
        let commit = reference.peel_to_commit().ok()?;
        Some(CommitId::new(commit.id()))
    }

    /// Resolve a short name to a branch, or failing that a tag.
    pub fn resolve(repo: &Repository, name: &str) -> StoreResult<Reference> {
        let ref_name = RefName::new(name)
            .map_err(|_| VersionStoreError::ReferenceNotFound(name.to_string()))?;

        if let Some(tip) = Self::peel(repo, &ref_name.branch_path()) {
            return Ok(Branch::new(name, tip.to_hash()).into());
        }
        if let Some(target) = Self::peel(repo, &ref_name.tag_path()) {
            return Ok(Tag::new(name, target.to_hash()).into());
        }

        Err(VersionStoreError::ReferenceNotFound(name.to_string()))
    }

    /// The branch HEAD points at.
    pub fn default_branch(repo: &Repository) -> StoreResult<Branch> {
        let head = repo.find_reference("HEAD")?;
        let target = head
            .symbolic_target()
            .ok_or_else(|| VersionStoreError::ReferenceNotFound("HEAD".to_string()))?;
        let name = RefName::from_branch_path(target)
            .ok_or_else(|| VersionStoreError::ReferenceNotFound(target.to_string()))?;

        let tip = Self::branch_tip(repo, &name)?;
        Ok(Branch::new(name.as_str(), tip.to_hash()))
    }

    /// Check if a branch exists.
    pub fn branch_exists(repo: &Repository, branch: &RefName) -> bool {
        repo.find_reference(&branch.branch_path()).is_ok()
    }

    /// Check if a tag exists.
    pub fn tag_exists(repo: &Repository, tag: &RefName) -> bool {
        repo.find_reference(&tag.tag_path()).is_ok()
    }

    /// Create a new branch pointing to the given commit.
    pub fn create_branch(repo: &Repository, branch: &RefName, target: CommitId) -> StoreResult<()> {
        if Self::branch_exists(repo, branch) || Self::tag_exists(repo, branch) {
            return Err(VersionStoreError::ReferenceAlreadyExists(branch.to_string()));
        }

        let commit = repo.find_commit(target.raw())?;
        repo.branch(branch.as_str(), &commit, false)?;

        Ok(())
    }

    /// Create a lightweight tag pointing to the given commit.
    pub fn create_tag(repo: &Repository, tag: &RefName, target: CommitId) -> StoreResult<()> {
        if Self::branch_exists(repo, tag) || Self::tag_exists(repo, tag) {
            return Err(VersionStoreError::ReferenceAlreadyExists(tag.to_string()));
        }

        let object = repo.find_object(target.raw(), None)?;
        repo.tag_lightweight(tag.as_str(), &object, false)?;

        Ok(())
    }

    /// Move a branch only if it still points to the expected commit.
    ///
    /// The check and the move happen in one libgit2 call, so a concurrent
    /// writer in another process cannot slip in between them.
    pub fn update_branch_if_unchanged(
        repo: &Repository,
        branch: &RefName,
        expected: CommitId,
        new_target: CommitId,
    ) -> StoreResult<()> {
        let current = Self::branch_tip(repo, branch)?;
        if current != expected {
            return Err(VersionStoreError::Conflict {
                reference: branch.to_string(),
                expected: expected.to_string(),
                actual: current.to_string(),
            });
        }

        let log_message = format!("gitcat: move to {}", new_target.short());
        match repo.reference_matching(
            &branch.branch_path(),
            new_target.raw(),
            true,
            expected.raw(),
            &log_message,
        ) {
            Ok(_) => Ok(()),
            Err(e) if e.code() == ErrorCode::Modified => {
                let actual = Self::branch_tip(repo, branch)?;
                Err(VersionStoreError::Conflict {
                    reference: branch.to_string(),
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a branch.
    pub fn delete_branch(repo: &Repository, branch: &RefName) -> StoreResult<()> {
        let mut git_branch = repo
            .find_branch(branch.as_str(), BranchType::Local)
            .map_err(|_| VersionStoreError::ReferenceNotFound(branch.to_string()))?;

        git_branch.delete()?;

        Ok(())
    }

    /// List all local branches.
    pub fn list_branches(repo: &Repository) -> StoreResult<Vec<RefName>> {
        let branches = repo.branches(Some(BranchType::Local))?;

        let mut result = Vec::new();
        for branch_result in branches {
            let (branch, _) = branch_result?;
            if let Some(name) = branch.name()? {
                if let Ok(ref_name) = RefName::new(name) {
                    result.push(ref_name);
                }
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::commit::{create_initial_commit, CommitBuilder};
    use crate::storage::tree::ContentTree;
    use crate::storage::types::GitSignature;
    use git2::RepositoryInitOptions;
    use tempfile::TempDir;

    fn setup_repo_with_commit() -> (TempDir, Repository, CommitId) {
        let dir = TempDir::new().unwrap();
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head(RefName::MAIN);
        let repo = Repository::init_opts(dir.path(), &opts).unwrap();
        let commit_id = create_initial_commit(&repo, &GitSignature::gitcat()).unwrap();
        (dir, repo, commit_id)
    }

    fn child_of(repo: &Repository, parent: CommitId) -> CommitId {
        let tree_id = ContentTree::empty().write(repo).unwrap();
        CommitBuilder::new(repo)
            .tree(tree_id)
            .parent(parent)
            .message("child")
            .commit()
            .unwrap()
    }

    #[test]
    fn test_default_branch() {
        let (_dir, repo, expected) = setup_repo_with_commit();
        let main = RefManager::default_branch(&repo).unwrap();
        assert_eq!(main.name(), "main");
        assert_eq!(main.hash(), &expected.to_hash());
    }

    #[test]
    fn test_resolve_branch_then_tag() {
        let (_dir, repo, base) = setup_repo_with_commit();
        let tag = RefName::new("v1").unwrap();
        RefManager::create_tag(&repo, &tag, base).unwrap();

        let branch = RefManager::resolve(&repo, "main").unwrap();
        assert!(branch.is_branch());

        let resolved = RefManager::resolve(&repo, "v1").unwrap();
        assert!(!resolved.is_branch());
        assert_eq!(resolved.hash(), &base.to_hash());

        let missing = RefManager::resolve(&repo, "nope");
        assert!(matches!(missing, Err(VersionStoreError::ReferenceNotFound(_))));
    }

    #[test]
    fn test_branch_lifecycle() {
        let (_dir, repo, base_commit) = setup_repo_with_commit();

        let branch = RefName::new("feature").unwrap();

        // Create
        assert!(!RefManager::branch_exists(&repo, &branch));
        RefManager::create_branch(&repo, &branch, base_commit).unwrap();
        assert!(RefManager::branch_exists(&repo, &branch));
        assert_eq!(RefManager::list_branches(&repo).unwrap().len(), 2);

        // Resolve
        let resolved = RefManager::branch_tip(&repo, &branch).unwrap();
        assert_eq!(resolved, base_commit);

        // Delete
        RefManager::delete_branch(&repo, &branch).unwrap();
        assert!(!RefManager::branch_exists(&repo, &branch));
    }

    #[test]
    fn test_duplicate_reference_error() {
        let (_dir, repo, base_commit) = setup_repo_with_commit();
        let name = RefName::new("feature").unwrap();

        RefManager::create_branch(&repo, &name, base_commit).unwrap();
        let result = RefManager::create_tag(&repo, &name, base_commit);

        assert!(matches!(result, Err(VersionStoreError::ReferenceAlreadyExists(_))));
    }

    #[test]
    fn test_update_branch_if_unchanged() {
        let (_dir, repo, commit1) = setup_repo_with_commit();
        let main = RefName::main();
        let commit2 = child_of(&repo, commit1);

        // Update should succeed
        RefManager::update_branch_if_unchanged(&repo, &main, commit1, commit2).unwrap();
        assert_eq!(RefManager::branch_tip(&repo, &main).unwrap(), commit2);

        // Update with wrong expected should fail and leave the branch alone
        let commit3 = child_of(&repo, commit1);
        let result = RefManager::update_branch_if_unchanged(&repo, &main, commit1, commit3);
        assert!(matches!(result, Err(VersionStoreError::Conflict { .. })));
        assert_eq!(RefManager::branch_tip(&repo, &main).unwrap(), commit2);
    }
}
