//! Content-addressed resources.
//!
//! A [`Resource`] is identified by the SHA-256 of its bytes. The bytes are
//! either held in memory or re-read from `local_path` when an upload needs
//! them, so a large build never keeps every file resident.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use crate::digest::sha256_hex;
use crate::error::{PercyError, Result};
use crate::payload::{ResourceAttributes, ResourceObject};

/// One artifact the server may need to store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    resource_url: String,
    sha: String,
    content: Option<Vec<u8>>,
    local_path: Option<PathBuf>,
    is_root: bool,
    mimetype: Option<String>,
}

impl Resource {
    /// Start building a resource served at `resource_url`.
    pub fn builder(resource_url: impl Into<String>) -> ResourceBuilder {
        ResourceBuilder::new(resource_url)
    }

    /// In-memory resource; the sha is computed from `content`.
    pub fn from_content(resource_url: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        let content = content.into();
        Self {
            resource_url: resource_url.into(),
            sha: sha256_hex(&content),
            content: Some(content),
            local_path: None,
            is_root: false,
            mimetype: None,
        }
    }

    /// Resource backed by a file whose sha is already known.
    pub fn from_local_path(
        resource_url: impl Into<String>,
        sha: impl Into<String>,
        local_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            resource_url: resource_url.into(),
            sha: sha.into(),
            content: None,
            local_path: Some(local_path.into()),
            is_root: false,
            mimetype: None,
        }
    }

    pub fn resource_url(&self) -> &str {
        &self.resource_url
    }

    pub fn sha(&self) -> &str {
        &self.sha
    }

    pub fn content(&self) -> Option<&[u8]> {
        self.content.as_deref()
    }

    pub fn local_path(&self) -> Option<&Path> {
        self.local_path.as_deref()
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub fn mimetype(&self) -> Option<&str> {
        self.mimetype.as_deref()
    }

    /// Bytes to upload: in-memory content, or `local_path` read now.
    ///
    /// # Errors
    ///
    /// [`PercyError::ResourceUnavailable`] when the backing file cannot be
    /// read, and [`PercyError::InvalidResource`] for a sha-only resource
    /// with nothing to read from.
    pub fn content_bytes(&self) -> Result<Cow<'_, [u8]>> {
        if let Some(content) = &self.content {
            return Ok(Cow::Borrowed(content));
        }
        match &self.local_path {
            Some(path) => fs::read(path)
                .map(Cow::Owned)
                .map_err(|source| PercyError::ResourceUnavailable {
                    path: path.clone(),
                    source,
                }),
            None => Err(PercyError::InvalidResource(format!(
                "resource {} has no content or local path",
                self.resource_url
            ))),
        }
    }

    /// JSON:API reference; content and local path are never included.
    pub fn serialize(&self) -> ResourceObject {
        ResourceObject {
            kind: "resources",
            id: self.sha.clone(),
            attributes: ResourceAttributes {
                resource_url: self.resource_url.clone(),
                mimetype: self.mimetype.clone(),
                is_root: self.is_root,
            },
        }
    }
}

/// Validating builder for [`Resource`].
#[derive(Debug, Clone, Default)]
pub struct ResourceBuilder {
    resource_url: String,
    sha: Option<String>,
    content: Option<Vec<u8>>,
    local_path: Option<PathBuf>,
    is_root: bool,
    mimetype: Option<String>,
}

impl ResourceBuilder {
    pub fn new(resource_url: impl Into<String>) -> Self {
        Self {
            resource_url: resource_url.into(),
            ..Self::default()
        }
    }

    pub fn sha(mut self, sha: impl Into<String>) -> Self {
        self.sha = Some(sha.into());
        self
    }

    pub fn content(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_path = Some(path.into());
        self
    }

    pub fn is_root(mut self, is_root: bool) -> Self {
        self.is_root = is_root;
        self
    }

    pub fn mimetype(mut self, mimetype: impl Into<String>) -> Self {
        self.mimetype = Some(mimetype.into());
        self
    }

    /// Validate and produce the resource.
    ///
    /// Exactly one of `content` or `sha` identifies the bytes. A trusted
    /// `sha` may come with a `local_path`; inline content may not.
    pub fn build(self) -> Result<Resource> {
        let sha = match (self.sha, &self.content) {
            (None, None) => {
                return Err(PercyError::InvalidResource(format!(
                    "either sha or content is required for {}",
                    self.resource_url
                )))
            }
            (Some(_), Some(_)) => {
                return Err(PercyError::InvalidResource(format!(
                    "sha and inline content are mutually exclusive for {}",
                    self.resource_url
                )))
            }
            (Some(sha), None) => sha,
            (None, Some(content)) => sha256_hex(content),
        };
        if self.content.is_some() && self.local_path.is_some() {
            return Err(PercyError::InvalidResource(format!(
                "content and local_path are mutually exclusive for {}",
                self.resource_url
            )));
        }
        Ok(Resource {
            resource_url: self.resource_url,
            sha,
            content: self.content,
            local_path: self.local_path,
            is_root: self.is_root,
            mimetype: self.mimetype,
        })
    }
}
