//! CI provider detection and per-provider field sources.
//!
//! Detection walks [`DETECTORS`] in order and stops at the first match.
//! Each provider knows where its own CI system keeps the branch, commit,
//! pull request, repo slug and parallelism variables; fields a provider
//! does not report resolve to `None` and fall through to the next source.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::source::{parse_count, EnvSource};

/// Supported CI providers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CiProvider {
    Travis,
    Jenkins,
    Circle,
    Codeship,
    Drone,
    Semaphore,
    Buildkite,
    Gitlab,
    Azure,
    Appveyor,
    Probo,
    Github,
}

/// Detection predicate for one provider.
type Detector = fn(&dyn EnvSource) -> bool;

fn is_travis(env: &dyn EnvSource) -> bool {
    env.is_set("TRAVIS_BUILD_ID")
}

fn is_jenkins(env: &dyn EnvSource) -> bool {
    env.is_set("JENKINS_URL")
}

fn is_circle(env: &dyn EnvSource) -> bool {
    env.is_set("CIRCLECI")
}

fn is_codeship(env: &dyn EnvSource) -> bool {
    env.equals("CI_NAME", "codeship")
}

fn is_drone(env: &dyn EnvSource) -> bool {
    env.equals("DRONE", "true")
}

fn is_semaphore(env: &dyn EnvSource) -> bool {
    env.equals("SEMAPHORE", "true")
}

fn is_buildkite(env: &dyn EnvSource) -> bool {
    env.equals("BUILDKITE", "true")
}

fn is_gitlab(env: &dyn EnvSource) -> bool {
    env.is_set("GITLAB_CI")
}

fn is_azure(env: &dyn EnvSource) -> bool {
    env.equals("TF_BUILD", "True")
}

fn is_appveyor(env: &dyn EnvSource) -> bool {
    env.equals("APPVEYOR", "True") || env.equals("APPVEYOR", "true")
}

fn is_probo(env: &dyn EnvSource) -> bool {
    env.equals("PROBO_ENVIRONMENT", "TRUE")
}

fn is_github(env: &dyn EnvSource) -> bool {
    env.equals("GITHUB_ACTIONS", "true")
}

/// Priority-ordered detection table. First match wins.
pub const DETECTORS: &[(Detector, CiProvider)] = &[
    (is_travis, CiProvider::Travis),
    (is_jenkins, CiProvider::Jenkins),
    (is_circle, CiProvider::Circle),
    (is_codeship, CiProvider::Codeship),
    (is_drone, CiProvider::Drone),
    (is_semaphore, CiProvider::Semaphore),
    (is_buildkite, CiProvider::Buildkite),
    (is_gitlab, CiProvider::Gitlab),
    (is_azure, CiProvider::Azure),
    (is_appveyor, CiProvider::Appveyor),
    (is_probo, CiProvider::Probo),
    (is_github, CiProvider::Github),
];

/// Detect the CI provider the process runs under, if any.
pub fn detect_provider(env: &dyn EnvSource) -> Option<CiProvider> {
    DETECTORS
        .iter()
        .find(|(matches, _)| matches(env))
        .map(|(_, provider)| *provider)
}

/// Translate a raw pull request value into a pull request number.
///
/// Several CI systems report `"false"` when the build is not for a pull
/// request. That sentinel, like an empty value, means "no pull request".
pub fn pull_request_from_raw(raw: Option<String>) -> Option<String> {
    raw.filter(|value| !value.is_empty() && value != "false")
}

/// Last `/`-separated segment of a URL, e.g. the number in a PR link.
fn last_path_segment(raw: &str) -> Option<String> {
    raw.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

impl CiProvider {
    /// Short tag reported to the API and in the user agent.
    pub fn name(&self) -> &'static str {
        match self {
            CiProvider::Travis => "travis",
            CiProvider::Jenkins => "jenkins",
            CiProvider::Circle => "circle",
            CiProvider::Codeship => "codeship",
            CiProvider::Drone => "drone",
            CiProvider::Semaphore => "semaphore",
            CiProvider::Buildkite => "buildkite",
            CiProvider::Gitlab => "gitlab",
            CiProvider::Azure => "azure",
            CiProvider::Appveyor => "appveyor",
            CiProvider::Probo => "probo",
            CiProvider::Github => "github",
        }
    }

    pub fn pull_request_number(&self, env: &dyn EnvSource) -> Option<String> {
        let raw = match self {
            CiProvider::Travis => env.var("TRAVIS_PULL_REQUEST"),
            CiProvider::Jenkins => env.var("ghprbPullId"),
            CiProvider::Circle => env
                .var("CI_PULL_REQUESTS")
                .and_then(|urls| urls.split(',').next().map(str::to_string))
                .or_else(|| env.var("CI_PULL_REQUEST"))
                .and_then(|url| last_path_segment(&url)),
            CiProvider::Codeship | CiProvider::Drone => env.var("CI_PULL_REQUEST"),
            CiProvider::Semaphore => env.var("PULL_REQUEST_NUMBER"),
            CiProvider::Buildkite => env.var("BUILDKITE_PULL_REQUEST"),
            CiProvider::Gitlab => env.var("CI_MERGE_REQUEST_IID"),
            CiProvider::Azure => env
                .var("SYSTEM_PULLREQUEST_PULLREQUESTID")
                .or_else(|| env.var("SYSTEM_PULLREQUEST_PULLREQUESTNUMBER")),
            CiProvider::Appveyor => env.var("APPVEYOR_PULL_REQUEST_NUMBER"),
            CiProvider::Probo => env
                .var("PULL_REQUEST_LINK")
                .and_then(|url| last_path_segment(&url)),
            CiProvider::Github => None,
        };
        pull_request_from_raw(raw)
    }

    pub fn branch(&self, env: &dyn EnvSource) -> Option<String> {
        match self {
            CiProvider::Travis => self
                .pull_request_override(env, "TRAVIS_PULL_REQUEST_BRANCH")
                .or_else(|| env.var("TRAVIS_BRANCH")),
            CiProvider::Jenkins => env.var("ghprbTargetBranch"),
            CiProvider::Circle => env.var("CIRCLE_BRANCH"),
            CiProvider::Codeship => env.var("CI_BRANCH"),
            CiProvider::Drone => env.var("DRONE_BRANCH"),
            CiProvider::Semaphore | CiProvider::Probo => env.var("BRANCH_NAME"),
            CiProvider::Buildkite => env.var("BUILDKITE_BRANCH"),
            CiProvider::Gitlab => env.var("CI_COMMIT_REF_NAME"),
            CiProvider::Azure => self
                .pull_request_override(env, "SYSTEM_PULLREQUEST_SOURCEBRANCH")
                .or_else(|| env.var("BUILD_SOURCEBRANCHNAME")),
            CiProvider::Appveyor => env
                .var("APPVEYOR_PULL_REQUEST_HEAD_REPO_BRANCH")
                .or_else(|| env.var("APPVEYOR_REPO_BRANCH")),
            CiProvider::Github => env.var("GITHUB_REF").map(|git_ref| {
                git_ref
                    .strip_prefix("refs/heads/")
                    .map(str::to_string)
                    .unwrap_or(git_ref)
            }),
        }
    }

    pub fn commit_sha(&self, env: &dyn EnvSource) -> Option<String> {
        match self {
            CiProvider::Travis => self
                .pull_request_override(env, "TRAVIS_PULL_REQUEST_SHA")
                .or_else(|| env.var("TRAVIS_COMMIT")),
            CiProvider::Jenkins => env
                .var("ghprbActualCommit")
                .or_else(|| env.var("GIT_COMMIT")),
            CiProvider::Circle => env.var("CIRCLE_SHA1"),
            CiProvider::Codeship => env.var("CI_COMMIT_ID"),
            CiProvider::Drone => env.var("DRONE_COMMIT"),
            CiProvider::Semaphore => env.var("REVISION"),
            // Buildkite reports the symbolic "HEAD" for builds started from the UI.
            CiProvider::Buildkite => env.var("BUILDKITE_COMMIT").filter(|sha| sha != "HEAD"),
            CiProvider::Gitlab => env.var("CI_COMMIT_SHA"),
            CiProvider::Azure => self
                .pull_request_override(env, "SYSTEM_PULLREQUEST_SOURCECOMMITID")
                .or_else(|| env.var("BUILD_SOURCEVERSION")),
            CiProvider::Appveyor => env
                .var("APPVEYOR_PULL_REQUEST_HEAD_COMMIT")
                .or_else(|| env.var("APPVEYOR_REPO_COMMIT")),
            CiProvider::Probo => env.var("COMMIT_REF"),
            CiProvider::Github => env.var("GITHUB_SHA"),
        }
    }

    pub fn repo_slug(&self, env: &dyn EnvSource) -> Option<String> {
        match self {
            CiProvider::Travis => env.var("TRAVIS_REPO_SLUG"),
            CiProvider::Circle => {
                let owner = env.var("CIRCLE_PROJECT_USERNAME")?;
                let name = env.var("CIRCLE_PROJECT_REPONAME")?;
                Some(format!("{owner}/{name}"))
            }
            CiProvider::Semaphore => env.var("SEMAPHORE_REPO_SLUG"),
            CiProvider::Gitlab => env.var("CI_PROJECT_PATH"),
            CiProvider::Appveyor => env.var("APPVEYOR_REPO_NAME"),
            CiProvider::Github => env.var("GITHUB_REPOSITORY"),
            _ => None,
        }
    }

    pub fn parallel_nonce(&self, env: &dyn EnvSource) -> Option<String> {
        match self {
            CiProvider::Travis => env.var("TRAVIS_BUILD_NUMBER"),
            CiProvider::Jenkins => env.var("BUILD_NUMBER"),
            CiProvider::Circle => env
                .var("CIRCLE_WORKFLOW_WORKSPACE_ID")
                .or_else(|| env.var("CIRCLE_BUILD_NUM")),
            CiProvider::Codeship => env.var("CI_BUILD_NUMBER"),
            CiProvider::Drone => env.var("DRONE_BUILD_NUMBER"),
            CiProvider::Semaphore => {
                let branch = env.var("BRANCH_NAME")?;
                let build = env.var("SEMAPHORE_BUILD_NUMBER")?;
                Some(format!("{branch}/{build}"))
            }
            CiProvider::Buildkite => env.var("BUILDKITE_BUILD_ID"),
            CiProvider::Gitlab => env.var("CI_PIPELINE_ID"),
            CiProvider::Azure => env.var("BUILD_BUILDID"),
            CiProvider::Appveyor => env.var("APPVEYOR_BUILD_ID"),
            CiProvider::Probo => env.var("BUILD_ID"),
            CiProvider::Github => env.var("GITHUB_RUN_ID"),
        }
    }

    pub fn parallel_total_shards(&self, env: &dyn EnvSource) -> Option<u32> {
        let raw = match self {
            CiProvider::Travis | CiProvider::Codeship | CiProvider::Gitlab => {
                env.var("CI_NODE_TOTAL")
            }
            CiProvider::Circle => env.var("CIRCLE_NODE_TOTAL"),
            CiProvider::Semaphore => env.var("SEMAPHORE_THREAD_COUNT"),
            CiProvider::Buildkite => env.var("BUILDKITE_PARALLEL_JOB_COUNT"),
            CiProvider::Azure => env.var("SYSTEM_TOTALJOBSINPHASE"),
            _ => None,
        }?;
        parse_count(&raw)
    }

    /// Value of `key`, but only while building a pull request.
    fn pull_request_override(&self, env: &dyn EnvSource, key: &str) -> Option<String> {
        self.pull_request_number(env)?;
        env.var(key)
    }
}

impl fmt::Display for CiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
