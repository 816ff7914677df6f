//! Percy API client: one request builder per endpoint.
//!
//! Each method assembles a JSON:API body, posts it through the configured
//! [`Transport`], and returns the decoded response. Nothing here holds build
//! state; sequencing lives in [`Runner`](crate::runner::Runner).

use percy_env::{CommitData, Environment};
use serde_json::Value;

use crate::config::Config;
use crate::connection::{HttpConnection, Transport};
use crate::digest::{base64_encode, sha256_hex};
use crate::error::{PercyError, Result};
use crate::payload::{
    ApiDocument, BuildAttributes, BuildData, Document, Relationships, SnapshotAttributes,
    SnapshotData, UploadAttributes, UploadData,
};
use crate::resource::Resource;

/// Per-build overrides. Unset fields come from the [`Environment`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildOptions {
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub pull_request_number: Option<String>,
    pub parallel_nonce: Option<String>,
    pub parallel_total_shards: Option<u32>,
    pub commit_data: Option<CommitData>,
}

/// Per-snapshot options. Unset widths fall back to the configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotOptions {
    pub name: Option<String>,
    pub enable_javascript: Option<bool>,
    pub widths: Option<Vec<u32>>,
}

/// Client for the Percy build API.
pub struct PercyClient {
    config: Config,
    environment: Environment,
    transport: Box<dyn Transport>,
}

impl PercyClient {
    /// Client speaking HTTP to `config.api_url()`.
    pub fn new(config: Config, environment: Environment) -> Result<Self> {
        let connection = HttpConnection::new(config.clone(), environment.current_ci())?;
        Ok(Self::with_transport(config, environment, connection))
    }

    /// Client over a caller-supplied transport.
    pub fn with_transport(
        config: Config,
        environment: Environment,
        transport: impl Transport + 'static,
    ) -> Self {
        Self {
            config,
            environment,
            transport: Box::new(transport),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Create a build tagged with CI metadata, offering `resources`.
    ///
    /// # Errors
    ///
    /// [`PercyError::RepoNotFound`] when no repo slug is given and none can
    /// be resolved; otherwise any transport error.
    pub fn create_build(
        &self,
        options: &BuildOptions,
        resources: &[Resource],
    ) -> Result<ApiDocument> {
        let repo = match &options.repo {
            Some(repo) => repo.clone(),
            None => self.environment.repo_slug()?,
        };
        let attributes = self.build_attributes(options);
        let relationships = (!resources.is_empty()).then(|| {
            Relationships::resources(resources.iter().map(Resource::serialize).collect())
        });
        let body = Document {
            data: BuildData {
                kind: "builds",
                attributes,
                relationships,
            },
        };

        let url = format!("{}/repos/{repo}/builds/", self.config.api_url());
        let response = self.transport.post(&url, &serde_json::to_value(body)?)?;
        ApiDocument::from_value(response)
    }

    fn build_attributes(&self, options: &BuildOptions) -> BuildAttributes {
        let env = &self.environment;
        let mut parallel_nonce = options.parallel_nonce.clone().or_else(|| env.parallel_nonce());
        let mut parallel_total_shards = options
            .parallel_total_shards
            .or_else(|| env.parallel_total_shards());
        // Parallel builds need both halves; one alone would split the build.
        if parallel_nonce.is_none() || parallel_total_shards.is_none() {
            parallel_nonce = None;
            parallel_total_shards = None;
        }
        let commit = options.commit_data.clone().unwrap_or_else(|| env.commit_data());

        BuildAttributes {
            branch: options.branch.clone().or_else(|| commit.branch.clone()),
            target_branch: env.target_branch(),
            target_commit_sha: env.target_commit_sha(),
            commit_sha: commit.sha,
            commit_committed_at: commit.committed_at,
            commit_author_name: commit.author_name,
            commit_author_email: commit.author_email,
            commit_committer_name: commit.committer_name,
            commit_committer_email: commit.committer_email,
            commit_message: commit.message,
            pull_request_number: options
                .pull_request_number
                .clone()
                .or_else(|| env.pull_request_number()),
            parallel_nonce,
            parallel_total_shards,
        }
    }

    pub fn finalize_build(&self, build_id: &str) -> Result<Value> {
        let url = format!("{}/builds/{build_id}/finalize", self.config.api_url());
        self.transport.post(&url, &Value::Object(Default::default()))
    }

    /// Create a snapshot in `build_id` from `resources`.
    ///
    /// # Errors
    ///
    /// [`PercyError::InvalidArgument`] when `resources` is empty.
    pub fn create_snapshot(
        &self,
        build_id: &str,
        resources: &[Resource],
        options: &SnapshotOptions,
    ) -> Result<ApiDocument> {
        if resources.is_empty() {
            return Err(PercyError::InvalidArgument(
                "a snapshot needs at least one resource".to_string(),
            ));
        }
        let body = Document {
            data: SnapshotData {
                kind: "snapshots",
                attributes: SnapshotAttributes {
                    name: options.name.clone(),
                    enable_javascript: options.enable_javascript,
                    widths: options
                        .widths
                        .clone()
                        .unwrap_or_else(|| self.config.default_widths().to_vec()),
                },
                relationships: Relationships::resources(
                    resources.iter().map(Resource::serialize).collect(),
                ),
            },
        };

        let url = format!("{}/builds/{build_id}/snapshots/", self.config.api_url());
        let response = self.transport.post(&url, &serde_json::to_value(body)?)?;
        ApiDocument::from_value(response)
    }

    pub fn finalize_snapshot(&self, snapshot_id: &str) -> Result<Value> {
        let url = format!("{}/snapshots/{snapshot_id}/finalize", self.config.api_url());
        self.transport.post(&url, &Value::Object(Default::default()))
    }

    /// Upload `content` to `build_id`, addressed by its SHA-256.
    pub fn upload_resource(&self, build_id: &str, content: &[u8]) -> Result<Value> {
        let body = Document {
            data: UploadData {
                kind: "resources",
                id: sha256_hex(content),
                attributes: UploadAttributes {
                    base64_content: base64_encode(content),
                },
            },
        };
        let url = format!("{}/builds/{build_id}/resources/", self.config.api_url());
        self.transport.post(&url, &serde_json::to_value(body)?)
    }

    pub fn get_build(&self, build_id: &str) -> Result<Value> {
        let url = format!("{}/builds/{build_id}", self.config.api_url());
        self.transport.get(&url)
    }
}
