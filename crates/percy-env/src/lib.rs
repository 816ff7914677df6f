//! Percy Env - CI environment resolution for Percy builds
//!
//! Works out which CI provider the process runs under and resolves the
//! metadata a build is tagged with:
//! - branch, commit SHA, pull request number, repo slug
//! - parallel nonce and shard count for split builds
//! - commit author/committer/message, merged from env vars and local git
//!
//! Every field follows the same precedence: `PERCY_*` override, then the CI
//! provider's own variables, then local git, then absent.

pub mod commit;
pub mod environment;
pub mod error;
pub mod fakes;
pub mod git;
pub mod provider;
pub mod source;

// Re-export key types
pub use commit::CommitData;
pub use environment::{slug_from_remote_url, Environment, EnvironmentSnapshot};
pub use error::{EnvError, Result};
pub use git::{is_safe_commit_ref, parse_commit_output, GitCli, GitCommit, GitMetadata};
pub use provider::{detect_provider, pull_request_from_raw, CiProvider};
pub use source::{parse_count, EnvSource, MapEnv, ProcessEnv};
