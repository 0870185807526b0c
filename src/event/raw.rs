use std::collections::HashMap;

use serde::{Deserialize, Deserializer};

/// Union of every build payload shape Cloud Build has published.
///
/// Every nested object defaults so that an absent (or `null`) section never
/// fails deserialization.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct RawBuild {
    #[serde(deserialize_with = "null_default")]
    pub(super) id: String,
    #[serde(deserialize_with = "null_default")]
    pub(super) project_id: String,
    #[serde(deserialize_with = "null_default")]
    pub(super) status: String,
    #[serde(deserialize_with = "non_null_items")]
    pub(super) images: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub(super) artifacts: RawArtifacts,
    #[serde(deserialize_with = "null_default")]
    pub(super) source_provenance: RawSourceProvenance,
    #[serde(deserialize_with = "null_default")]
    pub(super) substitutions: HashMap<String, String>,
    #[serde(deserialize_with = "null_default")]
    pub(super) build_trigger_id: String,
    #[serde(deserialize_with = "null_default")]
    pub(super) log_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct RawArtifacts {
    #[serde(deserialize_with = "non_null_items")]
    pub(super) images: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct RawSourceProvenance {
    pub(super) resolved_repo_source: Option<RawRepoSource>,
    pub(super) resolved_storage_source: Option<RawStorageSource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct RawRepoSource {
    #[serde(deserialize_with = "null_default")]
    pub(super) project_id: String,
    #[serde(deserialize_with = "null_default")]
    pub(super) repo_name: String,
    #[serde(deserialize_with = "null_default")]
    pub(super) commit_sha: String,
}

impl RawRepoSource {
    pub(super) fn is_empty(&self) -> bool {
        self.repo_name.is_empty() && self.commit_sha.is_empty()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct RawStorageSource {
    #[serde(deserialize_with = "null_default")]
    pub(super) bucket: String,
    #[serde(deserialize_with = "null_default")]
    pub(super) object: String,
}

impl RawStorageSource {
    pub(super) fn is_empty(&self) -> bool {
        self.bucket.is_empty()
    }
}

fn null_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A list whose entries may themselves be `null`; those entries are dropped.
fn non_null_items<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items: Vec<Option<String>> = null_default(deserializer)?;
    Ok(items.into_iter().flatten().collect())
}
