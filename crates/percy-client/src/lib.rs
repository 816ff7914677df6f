//! Percy Client - builds, snapshots and resource uploads for Percy
//!
//! Talks to the Percy visual-regression API:
//! - creates builds tagged with CI metadata from [`percy_env`]
//! - offers content-addressed resources and uploads only the missing ones
//! - creates and finalizes snapshots, then finalizes the build
//!
//! [`Runner`] sequences a whole build; [`PercyClient`] exposes the individual
//! requests.

pub mod client;
pub mod config;
pub mod connection;
pub mod digest;
pub mod error;
pub mod fakes;
pub mod loader;
pub mod obs;
pub mod payload;
pub mod resource;
pub mod runner;
pub mod user_agent;

// Re-export key types
pub use client::{BuildOptions, PercyClient, SnapshotOptions};
pub use config::{parse_widths, Config, DEFAULT_API_URL};
pub use connection::{HttpConnection, RetryPolicy, Transport, JSON_API_CONTENT_TYPE, RETRY_STATUSES};
pub use digest::{base64_encode, sha256_hex, Digest};
pub use error::{PercyError, Result};
pub use loader::{DirectoryLoader, PageSource, ResourceLoader, StaticPage, MAX_FILESIZE_BYTES};
pub use obs::BuildSpan;
pub use payload::ApiDocument;
pub use resource::{Resource, ResourceBuilder};
pub use runner::Runner;
pub use user_agent::user_agent;
