//! Commit metadata attached to a build.

use serde::{Deserialize, Serialize};

use crate::git::GitCommit;
use crate::source::EnvSource;

/// Commit information for a build.
///
/// Explicit `GIT_*` environment variables win over values read from the
/// local repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitData {
    pub sha: Option<String>,
    pub branch: Option<String>,
    pub committed_at: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub committer_name: Option<String>,
    pub committer_email: Option<String>,
    pub message: Option<String>,
}

impl CommitData {
    /// Merge environment overrides with git-derived fields.
    ///
    /// `sha` and `branch` are already resolved by the caller; a missing
    /// `sha` falls back to the one git reported.
    pub fn merge(
        env: &dyn EnvSource,
        sha: Option<String>,
        branch: Option<String>,
        git: GitCommit,
    ) -> Self {
        Self {
            sha: sha.or(git.sha),
            branch,
            committed_at: env.var("GIT_COMMITTED_DATE").or(git.committed_date),
            author_name: env.var("GIT_AUTHOR_NAME").or(git.author_name),
            author_email: env.var("GIT_AUTHOR_EMAIL").or(git.author_email),
            committer_name: env.var("GIT_COMMITTER_NAME").or(git.committer_name),
            committer_email: env.var("GIT_COMMITTER_EMAIL").or(git.committer_email),
            message: env.var("GIT_COMMIT_MESSAGE").or(git.message),
        }
    }
}
