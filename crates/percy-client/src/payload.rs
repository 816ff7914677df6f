//! JSON:API request bodies and the parts of responses the client reads.
//!
//! Request structs serialize absent attributes as `null`; the API treats a
//! missing key and a `null` value alike, and the build payload always names
//! every attribute. Responses are kept mostly opaque: only the entity id and
//! the `missing-resources` relationship drive client behavior.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Top-level `{"data": ...}` envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document<T> {
    pub data: T,
}

/// Reference to a resource inside a build or snapshot relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceObject {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: String,
    pub attributes: ResourceAttributes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResourceAttributes {
    pub resource_url: String,
    pub mimetype: Option<String>,
    pub is_root: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relationships {
    pub resources: ResourceList,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceList {
    pub data: Vec<ResourceObject>,
}

impl Relationships {
    pub fn resources(data: Vec<ResourceObject>) -> Self {
        Self {
            resources: ResourceList { data },
        }
    }
}

/// Body of `POST /repos/{slug}/builds/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildData {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub attributes: BuildAttributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Relationships>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildAttributes {
    pub branch: Option<String>,
    pub target_branch: Option<String>,
    pub target_commit_sha: Option<String>,
    pub commit_sha: Option<String>,
    pub commit_committed_at: Option<String>,
    pub commit_author_name: Option<String>,
    pub commit_author_email: Option<String>,
    pub commit_committer_name: Option<String>,
    pub commit_committer_email: Option<String>,
    pub commit_message: Option<String>,
    pub pull_request_number: Option<String>,
    pub parallel_nonce: Option<String>,
    pub parallel_total_shards: Option<u32>,
}

/// Body of `POST /builds/{id}/snapshots/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotData {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub attributes: SnapshotAttributes,
    pub relationships: Relationships,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SnapshotAttributes {
    pub name: Option<String>,
    pub enable_javascript: Option<bool>,
    pub widths: Vec<u32>,
}

/// Body of `POST /builds/{id}/resources/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadData {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: String,
    pub attributes: UploadAttributes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct UploadAttributes {
    pub base64_content: String,
}

/// A build or snapshot as returned by the API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiDocument {
    pub data: ApiData,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiData {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    #[serde(default)]
    pub relationships: Map<String, Value>,
}

impl ApiDocument {
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn id(&self) -> &str {
        &self.data.id
    }

    /// Resource ids listed under `relationships.missing-resources.data`,
    /// each once, in first-listed order.
    ///
    /// An absent relationship means nothing is missing.
    pub fn missing_resource_shas(&self) -> Vec<String> {
        let Some(entries) = self
            .data
            .relationships
            .get("missing-resources")
            .and_then(|rel| rel.get("data"))
            .and_then(Value::as_array)
        else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        entries
            .iter()
            .filter_map(|entry| entry.get("id").and_then(Value::as_str))
            .filter(|sha| seen.insert(*sha))
            .map(str::to_string)
            .collect()
    }
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(id) => id,
        RawId::Number(id) => id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn build_attributes_serialize_nulls_in_kebab_case() {
        let data = BuildData {
            kind: "builds",
            attributes: BuildAttributes {
                branch: Some("main".to_string()),
                ..BuildAttributes::default()
            },
            relationships: None,
        };
        let value = serde_json::to_value(Document { data }).unwrap();

        assert_eq!(value["data"]["type"], "builds");
        assert_eq!(value["data"]["attributes"]["branch"], "main");
        assert!(value["data"]["attributes"]["parallel-total-shards"].is_null());
        assert!(value["data"]["attributes"]
            .as_object()
            .unwrap()
            .contains_key("commit-committer-email"));
        assert!(value["data"].get("relationships").is_none());
    }

    #[test]
    fn upload_payload_shape() {
        let data = UploadData {
            kind: "resources",
            id: "abc".to_string(),
            attributes: UploadAttributes {
                base64_content: "Zm9v".to_string(),
            },
        };
        assert_eq!(
            serde_json::to_value(Document { data }).unwrap(),
            json!({"data": {"type": "resources", "id": "abc", "attributes": {"base64-content": "Zm9v"}}})
        );
    }

    #[test]
    fn api_document_reads_numeric_id_and_missing_resources() {
        let doc = ApiDocument::from_value(json!({
            "data": {
                "type": "builds",
                "id": 123,
                "relationships": {
                    "missing-resources": {"data": [{"type": "resources", "id": "sha-1"}, {"id": "sha-2"}]}
                }
            }
        }))
        .unwrap();

        assert_eq!(doc.id(), "123");
        assert_eq!(doc.missing_resource_shas(), vec!["sha-1", "sha-2"]);
    }

    #[test]
    fn missing_resources_listed_twice_are_reported_once() {
        let doc = ApiDocument::from_value(json!({
            "data": {
                "id": "1",
                "relationships": {
                    "missing-resources": {"data": [{"id": "sha-1"}, {"id": "sha-2"}, {"id": "sha-1"}]}
                }
            }
        }))
        .unwrap();

        assert_eq!(doc.missing_resource_shas(), vec!["sha-1", "sha-2"]);
    }

    #[test]
    fn api_document_without_relationships_has_nothing_missing() {
        let doc = ApiDocument::from_value(json!({"data": {"id": "snap-1"}})).unwrap();
        assert_eq!(doc.id(), "snap-1");
        assert!(doc.missing_resource_shas().is_empty());
    }

    #[test]
    fn api_document_requires_id() {
        assert!(ApiDocument::from_value(json!({"data": {}})).is_err());
        assert!(ApiDocument::from_value(json!({})).is_err());
    }
}
