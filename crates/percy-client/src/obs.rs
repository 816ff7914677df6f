//! Structured observability hooks for Percy build lifecycle events.
//!
//! This module provides:
//! - Build-scoped tracing spans via the `BuildSpan` RAII guard
//! - Emission functions for build creation, uploads, snapshots and finalization
//!
//! Events are emitted at `info!` level; filter with `RUST_LOG`.

use tracing::{debug, info, warn};

/// RAII guard that enters a build-scoped tracing span.
///
/// # Example
///
/// ```ignore
/// let _span = BuildSpan::enter("123");
/// // All tracing calls are now associated with build_id = "123"
/// ```
pub struct BuildSpan {
    _span: tracing::span::EnteredSpan,
}

impl BuildSpan {
    /// Create and enter a span tagged with the build id.
    pub fn enter(build_id: &str) -> Self {
        let span = tracing::info_span!("percy.build", build_id = %build_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: build created, with candidate and missing resource counts.
pub fn emit_build_created(build_id: &str, resources: usize, missing: usize) {
    info!(
        event = "build.created",
        build_id = %build_id,
        resources = resources,
        missing = missing,
    );
}

/// Emit event: one resource uploaded.
pub fn emit_resource_uploaded(build_id: &str, sha: &str, resource_url: &str) {
    info!(
        event = "resource.uploaded",
        build_id = %build_id,
        sha = %sha,
        resource_url = %resource_url,
    );
}

/// Emit event: the server asked for a sha the client never offered.
pub fn emit_missing_resource_unmatched(build_id: &str, sha: &str) {
    debug!(event = "resource.unmatched", build_id = %build_id, sha = %sha);
}

/// Emit event: snapshot created and finalized.
pub fn emit_snapshot_finalized(build_id: &str, snapshot_id: &str, uploaded_root: bool) {
    info!(
        event = "snapshot.finalized",
        build_id = %build_id,
        snapshot_id = %snapshot_id,
        uploaded_root = uploaded_root,
    );
}

/// Emit event: build finalized.
pub fn emit_build_finalized(build_id: &str) {
    info!(event = "build.finalized", build_id = %build_id);
}

/// Emit event: uploads disabled because no token is configured (warning level).
pub fn emit_runner_disabled(ci: &str) {
    warn!(
        event = "runner.disabled",
        ci = %ci,
        "Percy is disabled, no PERCY_TOKEN set"
    );
}
