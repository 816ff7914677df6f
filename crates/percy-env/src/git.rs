//! Git integration for reading branch, commit and remote metadata.
//!
//! Every read is best effort: a missing `git` binary, a directory that is
//! not a repository, or a failing command all come back as `None`.

use std::path::PathBuf;
use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

/// Longest commit reference accepted by [`is_safe_commit_ref`].
pub const MAX_COMMIT_REF_LEN: usize = 100;

/// `git show` format producing one `NAME:value` line per field.
///
/// `COMMIT_MESSAGE` must stay last: the message body can span many lines
/// and is read to the end of the output.
const COMMIT_FORMAT: &str = "COMMIT_SHA:%H%nAUTHOR_NAME:%an%nAUTHOR_EMAIL:%ae%nCOMMITTER_NAME:%cn%nCOMMITTER_EMAIL:%ce%nCOMMITTED_DATE:%ai%nCOMMIT_MESSAGE:%B";

/// Source of local repository metadata.
pub trait GitMetadata: Send + Sync {
    /// Current branch name (`git rev-parse --abbrev-ref HEAD`).
    fn current_branch(&self) -> Option<String>;

    /// Raw formatted `git show` output for `commit`.
    fn raw_commit(&self, commit: &str) -> Option<String>;

    /// URL of the `origin` remote.
    fn origin_url(&self) -> Option<String>;

    /// Parsed commit record for `commit`.
    fn read_commit(&self, commit: &str) -> Option<GitCommit> {
        self.raw_commit(commit).map(|raw| parse_commit_output(&raw))
    }
}

/// Commit fields as reported by git. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitCommit {
    pub sha: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub committer_name: Option<String>,
    pub committer_email: Option<String>,
    pub committed_date: Option<String>,
    pub message: Option<String>,
}

/// Whether `commit` is safe to hand to git.
///
/// Commit references come from environment variables and are untrusted;
/// only ASCII alphanumerics up to [`MAX_COMMIT_REF_LEN`] characters pass,
/// which rules out option injection such as `--output=...`.
pub fn is_safe_commit_ref(commit: &str) -> bool {
    !commit.is_empty()
        && commit.len() <= MAX_COMMIT_REF_LEN
        && commit.bytes().all(|b| b.is_ascii_alphanumeric())
}

fn field_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^(COMMIT_SHA|AUTHOR_NAME|AUTHOR_EMAIL|COMMITTER_NAME|COMMITTER_EMAIL|COMMITTED_DATE):(.*)$")
            .unwrap_or_else(|e| unreachable!("static regex: {e}"))
    })
}

fn message_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?ms)^COMMIT_MESSAGE:(.*)\z")
            .unwrap_or_else(|e| unreachable!("static regex: {e}"))
    })
}

/// Parse output produced with [`COMMIT_FORMAT`].
pub fn parse_commit_output(raw: &str) -> GitCommit {
    let mut commit = GitCommit::default();

    // Single-line fields are only looked for before the message starts, so
    // a message line that happens to read "AUTHOR_NAME:..." is not picked up.
    let message = message_regex().captures(raw);
    let header_end = message
        .as_ref()
        .and_then(|caps| caps.get(0))
        .map(|m| m.start())
        .unwrap_or(raw.len());

    for caps in field_regex().captures_iter(&raw[..header_end]) {
        let value = non_empty(caps[2].trim_end_matches('\r'));
        match &caps[1] {
            "COMMIT_SHA" => commit.sha = value,
            "AUTHOR_NAME" => commit.author_name = value,
            "AUTHOR_EMAIL" => commit.author_email = value,
            "COMMITTER_NAME" => commit.committer_name = value,
            "COMMITTER_EMAIL" => commit.committer_email = value,
            "COMMITTED_DATE" => commit.committed_date = value,
            _ => {}
        }
    }

    commit.message = message
        .and_then(|caps| caps.get(1))
        .and_then(|m| non_empty(m.as_str().trim_end()));

    commit
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// [`GitMetadata`] backed by the `git` command line.
#[derive(Debug, Clone, Default)]
pub struct GitCli {
    repo_dir: Option<PathBuf>,
}

impl GitCli {
    /// Run git in the current working directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run git inside `repo_dir`.
    pub fn in_dir(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: Some(repo_dir.into()),
        }
    }

    /// Run `git <args>` and return trimmed-right stdout on success.
    fn run(&self, args: &[&str]) -> Option<String> {
        let mut command = Command::new("git");
        command.args(args);
        if let Some(dir) = &self.repo_dir {
            command.current_dir(dir);
        }

        let output = match command.output() {
            Ok(output) => output,
            Err(e) => {
                debug!(error = %e, "failed to run git");
                return None;
            }
        };

        if !output.status.success() {
            debug!(
                args = ?args,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "git command failed"
            );
            return None;
        }

        let stdout = String::from_utf8(output.stdout).ok()?;
        non_empty(stdout.trim_end())
    }
}

impl GitMetadata for GitCli {
    fn current_branch(&self) -> Option<String> {
        self.run(&["rev-parse", "--abbrev-ref", "HEAD"])
            .map(|branch| branch.trim().to_string())
    }

    fn raw_commit(&self, commit: &str) -> Option<String> {
        if !is_safe_commit_ref(commit) {
            debug!(commit = %commit, "refusing to pass unsafe commit reference to git");
            return None;
        }
        let format = format!("--format={COMMIT_FORMAT}");
        self.run(&["show", "--quiet", &format, commit])
    }

    fn origin_url(&self) -> Option<String> {
        self.run(&["config", "--get", "remote.origin.url"])
            .map(|url| url.trim().to_string())
    }
}
