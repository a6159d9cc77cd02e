//! Ruleset catalog: remote listing and local cache reconciliation.
//!
//! The catalog maps remote object listings to [`Ruleset`] records and keeps
//! the local rule cache in step with the service by comparing ETags and
//! downloading only what changed.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::{Result, StoreError};
use crate::storage::StorageProvider;
use crate::store::{ObjectInfo, ObjectStore};
use crate::types::{Ruleset, RulesetType};

/// Top path below which the service publishes filter lists.
pub const FILTER_LISTS_PATH: &str = "/filter-lists";

/// Object-metadata key holding the JSON category blob.
pub(crate) const METADATA_BLOB: &str = "serviceblob";

/// Path segment reserved for alternate-platform rule formats. Listing
/// entries under it are never surfaced.
const ALTERNATE_PLATFORM_PATH: &str = "/apple/";

/// Shape of the JSON blob stored under [`METADATA_BLOB`].
#[derive(Deserialize)]
struct MetadataBlob {
    #[serde(rename = "categoryEnum")]
    category_enum: String,
}

/// Remote catalog of rule sets and the reconciliation logic that keeps the
/// local cache current.
pub(crate) struct RulesetCatalog {
    store: Arc<dyn ObjectStore>,
    storage: Arc<dyn StorageProvider>,
    list_path: String,
}

impl RulesetCatalog {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        storage: Arc<dyn StorageProvider>,
        list_path: impl Into<String>,
    ) -> Self {
        Self {
            store,
            storage,
            list_path: list_path.into(),
        }
    }

    /// Fetch the remote listing and map it to [`Ruleset`] records.
    ///
    /// Entries without a recognized category and entries under the reserved
    /// alternate-platform path are dropped.
    pub async fn list_rulesets(&self) -> Result<Vec<Ruleset>> {
        let objects = self.store.list(&self.list_path).await?;
        Ok(to_ruleset_list(objects))
    }

    /// Refresh the cached rules for the requested categories.
    ///
    /// For each category with a remote counterpart, the remote ETag is
    /// compared to the locally recorded one; on a mismatch (or no local
    /// ETag) the rules are downloaded and persisted, bytes first and ETag
    /// second, so an interruption between the two writes reads as stale on
    /// the next comparison. A missing remote object is logged and skipped.
    pub async fn update_rulesets(&self, kinds: &[RulesetType]) -> Result<()> {
        let requested: Vec<RulesetType> = kinds
            .iter()
            .copied()
            .filter(|kind| *kind != RulesetType::Unknown)
            .collect();
        if requested.is_empty() {
            return Ok(());
        }

        for ruleset in self.list_rulesets().await? {
            if !requested.contains(&ruleset.kind) {
                continue;
            }
            let (Some(sub_path), Some(file_name)) =
                (ruleset.kind.sub_path(), ruleset.kind.file_name())
            else {
                log::debug!("Unsupported ruleset {} requested", ruleset.kind);
                continue;
            };

            let local_e_tag = self.storage.read_file_etag(file_name)?;
            if local_e_tag.as_deref() == Some(ruleset.e_tag.as_str()) {
                log::debug!("Ruleset {} is up to date, skipping download", ruleset.kind);
                continue;
            }

            // The remote ETag differs from the local one, the rules have
            // been updated on the backend.
            let object_path = self.object_path(sub_path, file_name);
            match self.store.download(&object_path).await {
                Ok(bytes) => {
                    log::info!(
                        "Downloaded ruleset {}: {} bytes",
                        ruleset.kind,
                        bytes.len()
                    );
                    self.storage.write(file_name, &bytes)?;
                    self.storage.write_file_etag(file_name, &ruleset.e_tag)?;
                }
                Err(StoreError::NotFound(key)) => {
                    log::debug!("Ruleset not found: {key}");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn object_path(&self, sub_path: &str, file_name: &str) -> String {
        format!("{}/{}/{}", self.list_path, sub_path, file_name)
    }
}

/// Map a remote listing to [`Ruleset`] records, dropping entries without a
/// recognized category and entries under the reserved alternate-platform
/// path.
fn to_ruleset_list(objects: Vec<ObjectInfo>) -> Vec<Ruleset> {
    objects
        .into_iter()
        .filter(|info| !info.key.contains(ALTERNATE_PLATFORM_PATH))
        .filter_map(|info| {
            let kind = kind_from_metadata(&info.user_metadata);
            if kind == RulesetType::Unknown {
                return None;
            }
            Some(Ruleset {
                id: info.key,
                kind,
                e_tag: info.e_tag,
                updated_at: info.last_modified,
            })
        })
        .collect()
}

/// Extract the ruleset category from object metadata.
///
/// A missing blob, malformed JSON, or unrecognized category code all yield
/// [`RulesetType::Unknown`].
fn kind_from_metadata(user_metadata: &HashMap<String, String>) -> RulesetType {
    let Some(blob) = user_metadata.get(METADATA_BLOB) else {
        return RulesetType::Unknown;
    };
    match serde_json::from_str::<MetadataBlob>(blob) {
        Ok(meta) => RulesetType::from_category_code(&meta.category_enum),
        Err(_) => RulesetType::Unknown,
    }
}
