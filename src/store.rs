//! Remote object store interface.
//!
//! The service that hosts filter lists is modeled as a listing/download
//! capability. Implementations wrap whatever transport and authentication
//! the deployment uses; this crate only consumes the interface.

use std::collections::HashMap;
use std::time::SystemTime;

use async_trait::async_trait;

use crate::error::StoreError;

/// A single entry from a remote object listing.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    /// Object key, unique within the store
    pub key: String,
    /// Opaque version marker, changes whenever the content changes
    pub e_tag: String,
    /// When the object was last modified
    pub last_modified: SystemTime,
    /// User metadata attached to the object
    pub user_metadata: HashMap<String, String>,
}

/// Listing and download access to the remote rule service.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List the objects below `path`.
    async fn list(&self, path: &str) -> Result<Vec<ObjectInfo>, StoreError>;

    /// Download the object at `path`.
    ///
    /// A missing object fails with [`StoreError::NotFound`].
    async fn download(&self, path: &str) -> Result<Vec<u8>, StoreError>;
}
