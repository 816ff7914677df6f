//! Build environment resolution.
//!
//! [`Environment`] picks the CI provider once, when it is constructed. Each
//! field is then resolved on every call, in this order:
//!
//! 1. the explicit `PERCY_*` override variable,
//! 2. the detected CI provider's own variable,
//! 3. the local git repository (branch, commit details, origin remote),
//! 4. absent.
//!
//! Nothing is cached, so changes to the environment source are visible to
//! the next call.

use std::fmt;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::Serialize;
use tracing::warn;

use crate::commit::CommitData;
use crate::error::{EnvError, Result};
use crate::git::{GitCli, GitMetadata};
use crate::provider::{detect_provider, pull_request_from_raw, CiProvider};
use crate::source::{parse_count, EnvSource, ProcessEnv};

/// Resolved, read-only view of the build environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentSnapshot {
    pub current_ci: Option<CiProvider>,
    pub branch: Option<String>,
    pub target_branch: Option<String>,
    pub commit_sha: Option<String>,
    pub target_commit_sha: Option<String>,
    pub pull_request_number: Option<String>,
    pub repo_slug: String,
    pub parallel_nonce: Option<String>,
    pub parallel_total_shards: Option<u32>,
    pub commit_data: CommitData,
}

/// CI-aware resolver for build metadata.
#[derive(Clone)]
pub struct Environment {
    env: Arc<dyn EnvSource>,
    git: Arc<dyn GitMetadata>,
    provider: Option<CiProvider>,
}

impl Environment {
    /// Create a resolver over `env` and `git`, detecting the CI provider now.
    pub fn new(env: impl EnvSource + 'static, git: impl GitMetadata + 'static) -> Self {
        let env: Arc<dyn EnvSource> = Arc::new(env);
        let provider = detect_provider(env.as_ref());
        Self {
            env,
            git: Arc::new(git),
            provider,
        }
    }

    /// Resolver over the real process environment and the `git` CLI.
    pub fn from_process() -> Self {
        Self::new(ProcessEnv, GitCli::new())
    }

    /// The environment source this resolver reads from.
    pub fn source(&self) -> &dyn EnvSource {
        self.env.as_ref()
    }

    pub fn current_ci(&self) -> Option<CiProvider> {
        self.provider
    }

    pub fn target_branch(&self) -> Option<String> {
        self.env.var("PERCY_TARGET_BRANCH")
    }

    pub fn target_commit_sha(&self) -> Option<String> {
        self.env.var("PERCY_TARGET_COMMIT")
    }

    pub fn pull_request_number(&self) -> Option<String> {
        pull_request_from_raw(self.env.var("PERCY_PULL_REQUEST"))
            .or_else(|| self.provider?.pull_request_number(self.source()))
    }

    /// Branch being built.
    ///
    /// Falls back to the checked-out git branch, and to `None` with a
    /// warning when that is unavailable too.
    pub fn branch(&self) -> Option<String> {
        if let Some(branch) = self.env.var("PERCY_BRANCH") {
            return Some(branch);
        }
        if let Some(branch) = self.provider.and_then(|p| p.branch(self.source())) {
            return Some(branch);
        }
        if let Some(branch) = self.git.current_branch() {
            return Some(branch);
        }
        warn!("could not determine branch; set PERCY_BRANCH to fix this");
        None
    }

    /// Commit SHA reported by the override or the CI provider.
    ///
    /// Local git is consulted only when building [`CommitData`].
    pub fn commit_sha(&self) -> Option<String> {
        self.env
            .var("PERCY_COMMIT")
            .or_else(|| self.provider?.commit_sha(self.source()))
    }

    /// `owner/repo` slug of the repository being built.
    ///
    /// # Errors
    ///
    /// [`EnvError::RepoNotFound`] when neither the environment nor the
    /// `origin` remote identify the repository.
    pub fn repo_slug(&self) -> Result<String> {
        if let Some(slug) = self.env.var("PERCY_REPO_SLUG") {
            return Ok(slug);
        }
        if let Some(slug) = self.provider.and_then(|p| p.repo_slug(self.source())) {
            return Ok(slug);
        }

        let origin_url = self.git.origin_url().ok_or_else(|| {
            EnvError::RepoNotFound(
                "no local git repository found; set PERCY_REPO_SLUG to fix this".to_string(),
            )
        })?;
        slug_from_remote_url(&origin_url).ok_or_else(|| {
            EnvError::RepoNotFound(format!(
                "could not determine repository name from URL {origin_url:?}; set PERCY_REPO_SLUG to fix this"
            ))
        })
    }

    pub fn parallel_nonce(&self) -> Option<String> {
        self.env
            .var("PERCY_PARALLEL_NONCE")
            .or_else(|| self.provider?.parallel_nonce(self.source()))
    }

    pub fn parallel_total_shards(&self) -> Option<u32> {
        if let Some(raw) = self.env.var("PERCY_PARALLEL_TOTAL") {
            return parse_count(&raw);
        }
        self.provider?.parallel_total_shards(self.source())
    }

    /// Commit details, preferring env/CI values over local git.
    pub fn commit_data(&self) -> CommitData {
        let sha = self.commit_sha();
        let git_commit = self
            .git
            .read_commit(sha.as_deref().unwrap_or("HEAD"))
            .unwrap_or_default();
        CommitData::merge(self.source(), sha, self.branch(), git_commit)
    }

    /// Resolve every field at once.
    ///
    /// # Errors
    ///
    /// Fails only when the repo slug cannot be determined.
    pub fn snapshot(&self) -> Result<EnvironmentSnapshot> {
        let commit_data = self.commit_data();
        Ok(EnvironmentSnapshot {
            current_ci: self.current_ci(),
            branch: commit_data.branch.clone(),
            target_branch: self.target_branch(),
            commit_sha: commit_data.sha.clone(),
            target_commit_sha: self.target_commit_sha(),
            pull_request_number: self.pull_request_number(),
            repo_slug: self.repo_slug()?,
            parallel_nonce: self.parallel_nonce(),
            parallel_total_shards: self.parallel_total_shards(),
            commit_data,
        })
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("current_ci", &self.provider)
            .finish_non_exhaustive()
    }
}

fn remote_slug_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[:/]([^/]+/[^/]+?)(\.git)?$")
            .unwrap_or_else(|e| unreachable!("static regex: {e}"))
    })
}

/// Extract `owner/repo` from an SSH or HTTPS remote URL.
pub fn slug_from_remote_url(url: &str) -> Option<String> {
    remote_slug_regex()
        .captures(url.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::StaticGit;
    use crate::source::MapEnv;

    #[test]
    fn slug_from_ssh_and_https_remotes() {
        assert_eq!(
            slug_from_remote_url("git@github.com:owner/repo.git").as_deref(),
            Some("owner/repo")
        );
        assert_eq!(
            slug_from_remote_url("https://github.com/owner/repo").as_deref(),
            Some("owner/repo")
        );
        assert_eq!(
            slug_from_remote_url("https://github.com/owner/repo.git\n").as_deref(),
            Some("owner/repo")
        );
        assert_eq!(slug_from_remote_url("not-a-remote"), None);
    }

    #[test]
    fn repo_slug_from_origin_remote() {
        let git = StaticGit::default().with_origin_url("git@github.com:percy/example.git");
        let environment = Environment::new(MapEnv::new(), git);
        assert_eq!(environment.repo_slug().unwrap(), "percy/example");
    }

    #[test]
    fn repo_slug_without_remote_is_fatal() {
        let environment = Environment::new(MapEnv::new(), StaticGit::default());
        let err = environment.repo_slug().unwrap_err();
        assert!(matches!(err, EnvError::RepoNotFound(_)));
        assert!(err.to_string().contains("PERCY_REPO_SLUG"));
    }

    #[test]
    fn repo_slug_with_unparseable_remote_is_fatal() {
        let git = StaticGit::default().with_origin_url("origin");
        let environment = Environment::new(MapEnv::new(), git);
        let err = environment.repo_slug().unwrap_err();
        assert!(err.to_string().contains("\"origin\""));
    }

    #[test]
    fn branch_falls_back_to_git_then_absent() {
        let git = StaticGit::default().with_branch("local-branch");
        let environment = Environment::new(MapEnv::new(), git);
        assert_eq!(environment.branch().as_deref(), Some("local-branch"));

        let environment = Environment::new(MapEnv::new(), StaticGit::default());
        assert_eq!(environment.branch(), None);
    }

    #[test]
    fn commit_data_reads_git_for_resolved_sha() {
        let env = MapEnv::from_pairs([("PERCY_COMMIT", "abc123")]);
        let git = StaticGit::default().with_commit(
            "abc123",
            "COMMIT_SHA:abc123\nAUTHOR_NAME:Ada\nCOMMIT_MESSAGE:hello\n",
        );
        let data = Environment::new(env, git).commit_data();
        assert_eq!(data.sha.as_deref(), Some("abc123"));
        assert_eq!(data.author_name.as_deref(), Some("Ada"));
        assert_eq!(data.message.as_deref(), Some("hello"));
    }

    #[test]
    fn commit_data_uses_head_without_sha() {
        let git = StaticGit::default().with_commit("HEAD", "COMMIT_SHA:headsha\n");
        let data = Environment::new(MapEnv::new(), git).commit_data();
        assert_eq!(data.sha.as_deref(), Some("headsha"));
    }

    #[test]
    fn parallel_total_override_is_digit_guarded() {
        let env = MapEnv::from_pairs([("PERCY_PARALLEL_TOTAL", "abc")]);
        let environment = Environment::new(env.clone(), StaticGit::default());
        assert_eq!(environment.parallel_total_shards(), None);
        env.set("PERCY_PARALLEL_TOTAL", "5");
        assert_eq!(environment.parallel_total_shards(), Some(5));
    }

    #[test]
    fn snapshot_requires_repo_slug() {
        let env = MapEnv::from_pairs([("PERCY_BRANCH", "main")]);
        let environment = Environment::new(env.clone(), StaticGit::default());
        assert!(environment.snapshot().is_err());

        env.set("PERCY_REPO_SLUG", "owner/repo");
        let snapshot = environment.snapshot().unwrap();
        assert_eq!(snapshot.repo_slug, "owner/repo");
        assert_eq!(snapshot.branch.as_deref(), Some("main"));
        assert_eq!(snapshot.commit_data.branch.as_deref(), Some("main"));
    }

    #[test]
    fn snapshot_serializes_provider_tag() {
        let env = MapEnv::from_pairs([
            ("GITHUB_ACTIONS", "true"),
            ("GITHUB_REPOSITORY", "owner/repo"),
        ]);
        let snapshot = Environment::new(env, StaticGit::default()).snapshot().unwrap();
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["current_ci"], "github");
        assert_eq!(value["repo_slug"], "owner/repo");
        assert!(value["pull_request_number"].is_null());
    }
}
