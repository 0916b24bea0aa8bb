//! Commit creation and history traversal
//!
//! every catalog change lands as exactly one commit on a branch. The commit
//! carries the catalog user as author and the time recorded in its
//! `CommitMeta`.

use chrono::{DateTime, TimeZone, Utc};
use git2::{Repository, Revwalk, Sort};

use crate::model::{CommitMeta, Namespace};
use crate::storage::error::{StoreResult, VersionStoreError};
use crate::storage::tree::ContentTree;
use crate::storage::types::{CommitId, GitSignature, TreeId};

/// information about a commit
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub id: CommitId,
    pub parent_ids: Vec<CommitId>,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub timestamp: DateTime<Utc>,
}

impl CommitInfo {
    /// create CommitInfo from a git2::Commit
    pub(crate) fn from_git2(commit: &git2::Commit<'_>) -> Self {
        let author = commit.author();
        let time = commit.time();
        let timestamp = Utc
            .timestamp_opt(time.seconds(), 0)
            .single()
            .unwrap_or_else(Utc::now);

        Self {
            id: CommitId::new(commit.id()),
            parent_ids: commit.parent_ids().map(CommitId::new).collect(),
            message: commit.message().unwrap_or("").to_string(),
            author_name: author.name().unwrap_or("unknown").to_string(),
            author_email: author.email().unwrap_or("unknown@localhost").to_string(),
            timestamp,
        }
    }

    /// get a short summary of the commit (first line of message)
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or(&self.message)
    }
}

/// builder for creating commits with a fluent interface
pub struct CommitBuilder<'a> {
    repo: &'a Repository,
    tree_id: Option<TreeId>,
    parents: Vec<CommitId>,
    message: String,
    signature: GitSignature,
    time: DateTime<Utc>,
    update_ref: Option<String>,
}

impl<'a> CommitBuilder<'a> {
    /// create a new CommitBuilder
    pub fn new(repo: &'a Repository) -> Self {
        Self {
            repo,
            tree_id: None,
            parents: Vec::new(),
            message: String::new(),
            signature: GitSignature::gitcat(),
            time: Utc::now(),
            update_ref: None,
        }
    }

    /// set the tree for this commit
    pub fn tree(mut self, tree_id: TreeId) -> Self {
        self.tree_id = Some(tree_id);
        self
    }

    /// add a parent commit
    pub fn parent(mut self, parent: CommitId) -> Self {
        self.parents.push(parent);
        self
    }

    /// set the commit message
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// set the author/committer signature
    pub fn signature(mut self, signature: GitSignature) -> Self {
        self.signature = signature;
        self
    }

    /// take author, message and time from catalog commit metadata
    pub fn meta(self, meta: &CommitMeta) -> Self {
        let mut builder = self
            .signature(GitSignature::for_author(&meta.author))
            .message(meta.message.clone());
        builder.time = meta.commit_time;
        builder
    }

    /// update a ref to point to this commit.
    ///
    /// Only used for the initial commit; catalog commits go through the
    /// compare-and-swap in `RefManager`.
    pub fn update_ref(mut self, refname: impl Into<String>) -> Self {
        self.update_ref = Some(refname.into());
        self
    }

    /// create the commit and return its ID
    pub fn commit(self) -> StoreResult<CommitId> {
        let tree_id = self
            .tree_id
            .ok_or_else(|| VersionStoreError::Internal("commit requires a tree".to_string()))?;

        let tree = self.repo.find_tree(tree_id.raw())?;
        let sig = self.signature.to_git2_signature(self.time)?;

        // collect parent commits
        let parent_commits: Vec<git2::Commit<'_>> = self
            .parents
            .iter()
            .map(|id| self.repo.find_commit(id.raw()))
            .collect::<Result<_, _>>()?;

        let parent_refs: Vec<&git2::Commit<'_>> = parent_commits.iter().collect();

        let oid = self.repo.commit(
            self.update_ref.as_deref(),
            &sig,
            &sig,
            &self.message,
            &tree,
            &parent_refs,
        )?;

        Ok(CommitId::new(oid))
    }
}

/// flatten the tree of a commit
pub fn tree_at_commit(repo: &Repository, commit_id: CommitId) -> StoreResult<ContentTree> {
    let commit = repo.find_commit(commit_id.raw())?;
    let tree = commit.tree()?;
    ContentTree::from_tree(&tree)
}

/// create the initial (empty) commit for a new repository
pub fn create_initial_commit(repo: &Repository, signature: &GitSignature) -> StoreResult<CommitId> {
    let tree_id = ContentTree::empty().write(repo)?;

    CommitBuilder::new(repo)
        .tree(tree_id)
        .message(CommitMessage::init())
        .signature(signature.clone())
        .update_ref("HEAD")
        .commit()
}

/// iterate over commit history starting from a commit
pub struct HistoryIterator<'repo> {
    repo: &'repo Repository,
    revwalk: Revwalk<'repo>,
}

impl<'repo> HistoryIterator<'repo> {
    /// create a new history iterator
    pub fn new(repo: &'repo Repository, start: CommitId) -> StoreResult<Self> {
        let mut revwalk = repo.revwalk()?;
        revwalk.push(start.raw())?;
        revwalk.set_sorting(Sort::TOPOLOGICAL)?;

        Ok(Self { repo, revwalk })
    }
}

impl<'repo> Iterator for HistoryIterator<'repo> {
    type Item = StoreResult<CommitInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.revwalk.next()? {
            Ok(oid) => match self.repo.find_commit(oid) {
                Ok(commit) => Some(Ok(CommitInfo::from_git2(&commit))),
                Err(e) => Some(Err(VersionStoreError::Git(e))),
            },
            Err(e) => Some(Err(VersionStoreError::Git(e))),
        }
    }
}

/// get history for a commit
pub fn history(repo: &Repository, start: CommitId) -> StoreResult<HistoryIterator<'_>> {
    HistoryIterator::new(repo, start)
}

/// message formatting for commits the store makes on its own behalf
pub struct CommitMessage;

impl CommitMessage {
    pub fn init() -> String {
        "[gitcat] Initialize repository".to_string()
    }

    pub fn create_namespace(namespace: &Namespace) -> String {
        format!("[CREATE NAMESPACE] {}", namespace)
    }

    pub fn delete_namespace(namespace: &Namespace) -> String {
        format!("[DROP NAMESPACE] {}", namespace)
    }
}
