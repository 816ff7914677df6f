//! Build reconciliation workflow.
//!
//! A [`Runner`] drives one build at a time:
//!
//! 1. `initialize_build` offers every candidate resource, then uploads only
//!    the ones the server reports missing;
//! 2. `snapshot` creates a snapshot from the loader's root resource, uploads
//!    it if missing, and finalizes it;
//! 3. `finalize_build` closes the build.
//!
//! When Percy is disabled (`PERCY_ENABLE` other than `1`, or no token) every
//! operation is a silent no-op so test suites run unchanged outside CI.

use std::collections::HashMap;

use percy_env::CiProvider;

use crate::client::{BuildOptions, PercyClient, SnapshotOptions};
use crate::config::Config;
use crate::error::{PercyError, Result};
use crate::loader::ResourceLoader;
use crate::obs::{self, BuildSpan};
use crate::payload::ApiDocument;
use crate::resource::Resource;

/// Outcome of the one-time enablement check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activation {
    Enabled,
    /// Turned off by `PERCY_ENABLE`; stays quiet.
    Disabled,
    /// No token. Warn only when running under a CI provider.
    NoToken { warn_ci: Option<CiProvider> },
}

fn activation(config: &Config, ci: Option<CiProvider>) -> Activation {
    if !config.enabled() {
        Activation::Disabled
    } else if config.access_token().is_err() {
        Activation::NoToken { warn_ci: ci }
    } else {
        Activation::Enabled
    }
}

/// Stateful driver for the build → snapshot → finalize cycle.
pub struct Runner {
    client: PercyClient,
    loader: Option<Box<dyn ResourceLoader>>,
    current_build: Option<ApiDocument>,
    enabled: bool,
}

impl Runner {
    /// Create a runner, deciding once whether Percy is enabled.
    pub fn new(client: PercyClient, loader: Option<Box<dyn ResourceLoader>>) -> Self {
        let enabled = match activation(client.config(), client.environment().current_ci()) {
            Activation::Enabled => true,
            Activation::Disabled => false,
            Activation::NoToken { warn_ci } => {
                if let Some(ci) = warn_ci {
                    obs::emit_runner_disabled(ci.name());
                }
                false
            }
        };
        Self {
            client,
            loader,
            current_build: None,
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn client(&self) -> &PercyClient {
        &self.client
    }

    /// Id of the current build, or `None` when disabled.
    ///
    /// # Errors
    ///
    /// [`PercyError::UninitializedBuild`] when enabled but no build exists.
    pub fn build_id(&self) -> Result<Option<&str>> {
        if !self.enabled {
            return Ok(None);
        }
        self.current_build()
            .map(|build| Some(build.id()))
            .map_err(|_| {
                PercyError::UninitializedBuild(
                    "cannot get current build id before build is initialized".to_string(),
                )
            })
    }

    /// Create the build and upload the resources the server lacks.
    pub fn initialize_build(&mut self, options: &BuildOptions) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let resources = match &self.loader {
            Some(loader) => loader.build_resources()?,
            None => Vec::new(),
        };
        let by_sha: HashMap<&str, &Resource> = resources
            .iter()
            .map(|resource| (resource.sha(), resource))
            .collect();

        let build = self.client.create_build(options, &resources)?;
        let build_id = build.id().to_string();
        let _span = BuildSpan::enter(&build_id);
        let missing = build.missing_resource_shas();
        obs::emit_build_created(&build_id, resources.len(), missing.len());

        for sha in &missing {
            let Some(resource) = by_sha.get(sha.as_str()) else {
                obs::emit_missing_resource_unmatched(&build_id, sha);
                continue;
            };
            let content = resource.content_bytes()?;
            self.client.upload_resource(&build_id, &content)?;
            obs::emit_resource_uploaded(&build_id, sha, resource.resource_url());
        }

        self.current_build = Some(build);
        Ok(())
    }

    /// Snapshot the loader's current page into the current build.
    pub fn snapshot(&self, options: &SnapshotOptions) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let build_id = self
            .current_build()
            .map_err(|_| {
                PercyError::UninitializedBuild(
                    "cannot call snapshot before build is initialized".to_string(),
                )
            })?
            .id()
            .to_string();
        let _span = BuildSpan::enter(&build_id);

        let root = match &self.loader {
            Some(loader) => loader.snapshot_resources()?.into_iter().next(),
            None => None,
        }
        .ok_or_else(|| {
            PercyError::InvalidArgument("loader yielded no snapshot resources".to_string())
        })?;

        let snapshot = self
            .client
            .create_snapshot(&build_id, std::slice::from_ref(&root), options)?;

        // Only the root was offered, so anything missing is the root.
        let uploaded_root = !snapshot.missing_resource_shas().is_empty();
        if uploaded_root {
            self.client
                .upload_resource(&build_id, &root.content_bytes()?)?;
            obs::emit_resource_uploaded(&build_id, root.sha(), root.resource_url());
        }

        self.client.finalize_snapshot(snapshot.id())?;
        obs::emit_snapshot_finalized(&build_id, snapshot.id(), uploaded_root);
        Ok(())
    }

    /// Finalize the current build; it is cleared only if finalize succeeds.
    pub fn finalize_build(&mut self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let build_id = self
            .current_build()
            .map_err(|_| {
                PercyError::UninitializedBuild(
                    "cannot finalize_build before build is initialized".to_string(),
                )
            })?
            .id()
            .to_string();

        self.client.finalize_build(&build_id)?;
        obs::emit_build_finalized(&build_id);
        self.current_build = None;
        Ok(())
    }

    fn current_build(&self) -> Result<&ApiDocument> {
        self.current_build
            .as_ref()
            .ok_or_else(|| PercyError::UninitializedBuild("no current build".to_string()))
    }
}
