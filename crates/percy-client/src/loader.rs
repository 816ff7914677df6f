//! Sources of build and snapshot resources.
//!
//! [`DirectoryLoader`] offers every file under a static asset directory as a
//! build resource and the current page of a [`PageSource`] as the snapshot's
//! root resource.

use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};
use url::Url;

use crate::digest::Digest;
use crate::error::Result;
use crate::resource::Resource;

/// Files larger than this are never offered as build resources.
pub const MAX_FILESIZE_BYTES: u64 = 15 * 1024 * 1024;

/// Yields the resources for a build and for each snapshot.
pub trait ResourceLoader {
    /// Candidate resources offered when the build is created.
    fn build_resources(&self) -> Result<Vec<Resource>>;

    /// Resources for the next snapshot; the first one is its root document.
    fn snapshot_resources(&self) -> Result<Vec<Resource>>;
}

/// The page being snapshotted.
pub trait PageSource: Send + Sync {
    fn current_url(&self) -> String;

    fn page_source(&self) -> String;
}

/// A fixed page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticPage {
    url: String,
    html: String,
}

impl StaticPage {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }
}

impl PageSource for StaticPage {
    fn current_url(&self) -> String {
        self.url.clone()
    }

    fn page_source(&self) -> String {
        self.html.clone()
    }
}

/// Loader over a static asset directory served under `base_url`.
pub struct DirectoryLoader {
    root_dir: PathBuf,
    base_url: String,
    page: Option<Box<dyn PageSource>>,
}

impl DirectoryLoader {
    pub fn new(root_dir: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            root_dir: root_dir.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            page: None,
        }
    }

    /// Snapshot this page's HTML as the root resource.
    pub fn with_page(mut self, page: impl PageSource + 'static) -> Self {
        self.page = Some(Box::new(page));
        self
    }

    fn walk(
        &self,
        root: &Path,
        dir: &Path,
        ancestors: &mut HashSet<PathBuf>,
        out: &mut Vec<Resource>,
    ) -> Result<()> {
        // Symlinked directories are followed; only a link back into the
        // current ancestor chain is a cycle. Aliases are walked under each name.
        let canonical = fs::canonicalize(dir)?;
        if ancestors.contains(&canonical) {
            debug!(dir = %dir.display(), "skipping symlink cycle");
            return Ok(());
        }
        ancestors.insert(canonical.clone());

        let mut entries = fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort();

        for path in entries {
            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if metadata.is_dir() {
                self.walk(root, &path, ancestors, out)?;
            } else if metadata.is_file() {
                if metadata.len() > MAX_FILESIZE_BYTES {
                    debug!(
                        path = %path.display(),
                        size = metadata.len(),
                        "skipping file over size limit"
                    );
                    continue;
                }
                let sha = match File::open(&path).and_then(Digest::compute_reader) {
                    Ok(sha) => sha,
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "skipping unreadable file");
                        continue;
                    }
                };
                let resource_url = format!("{}{}", self.base_url, url_path(root, &path));
                out.push(Resource::from_local_path(resource_url, sha.to_hex(), path));
            }
        }

        ancestors.remove(&canonical);
        Ok(())
    }
}

impl ResourceLoader for DirectoryLoader {
    /// Every regular file under the root, sorted by URL.
    ///
    /// Resources carry a sha and an absolute local path only; file contents
    /// are read again at upload time.
    fn build_resources(&self) -> Result<Vec<Resource>> {
        let root = fs::canonicalize(&self.root_dir)?;
        let mut resources = Vec::new();
        self.walk(&root, &root, &mut HashSet::new(), &mut resources)?;
        resources.sort_by(|a, b| a.resource_url().cmp(b.resource_url()));
        Ok(resources)
    }

    fn snapshot_resources(&self) -> Result<Vec<Resource>> {
        let Some(page) = &self.page else {
            return Ok(Vec::new());
        };
        let root = Resource::builder(url_path_only(&page.current_url()))
            .content(page.page_source())
            .is_root(true)
            .mimetype("text/html")
            .build()?;
        Ok(vec![root])
    }
}

/// Percent-encoded `/`-rooted URL path of `path` relative to `root`.
fn url_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let segments: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    let mut scratch = match Url::parse("http://resource.invalid/") {
        Ok(url) => url,
        Err(_) => return format!("/{}", segments.join("/")),
    };
    if let Ok(mut path_segments) = scratch.path_segments_mut() {
        path_segments.clear().extend(&segments);
    }
    scratch.path().to_string()
}

/// Path component of `url`, or `url` itself when it does not parse.
fn url_path_only(url: &str) -> String {
    Url::parse(url)
        .map(|parsed| parsed.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}
