//! In-memory fakes for environment resolution (testing only)
//!
//! `StaticGit` answers git queries from fixed values so resolution can be
//! exercised without a repository on disk. Pair it with
//! [`MapEnv`](crate::source::MapEnv) for the environment side.

use std::collections::HashMap;

use crate::git::{is_safe_commit_ref, GitMetadata};

/// [`GitMetadata`] with canned answers. Unset answers read as absent.
#[derive(Debug, Clone, Default)]
pub struct StaticGit {
    branch: Option<String>,
    origin_url: Option<String>,
    commits: HashMap<String, String>,
}

impl StaticGit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_branch(mut self, branch: &str) -> Self {
        self.branch = Some(branch.to_string());
        self
    }

    pub fn with_origin_url(mut self, url: &str) -> Self {
        self.origin_url = Some(url.to_string());
        self
    }

    /// Canned `git show` output for `commit`.
    pub fn with_commit(mut self, commit: &str, raw_output: &str) -> Self {
        self.commits
            .insert(commit.to_string(), raw_output.to_string());
        self
    }
}

impl GitMetadata for StaticGit {
    fn current_branch(&self) -> Option<String> {
        self.branch.clone()
    }

    fn raw_commit(&self, commit: &str) -> Option<String> {
        // Same guard as the real CLI so fakes cannot hide an unsafe lookup.
        if !is_safe_commit_ref(commit) {
            return None;
        }
        self.commits.get(commit).cloned()
    }

    fn origin_url(&self) -> Option<String> {
        self.origin_url.clone()
    }
}
