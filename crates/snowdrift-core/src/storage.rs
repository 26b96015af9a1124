//! Object storage abstraction.
//!
//! A `StorageProvider` is rooted at a location given either as a local path
//! (optionally `file://`-prefixed) or as an object-store URL such as
//! `s3://bucket/prefix`, `gs://bucket/prefix` or `az://container/prefix`.
//! All paths passed to its methods are relative to that root.

use bytes::Bytes;
use futures::TryStreamExt;
use object_store::local::LocalFileSystem;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use snafu::prelude::*;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::error::{InvalidUrlSnafu, IoSnafu, ObjectStoreSnafu, StorageError};

/// A reference-counted storage provider.
pub type StorageProviderRef = Arc<StorageProvider>;

/// Storage rooted at a local directory or an object-store prefix.
#[derive(Clone)]
pub struct StorageProvider {
    object_store: Arc<dyn ObjectStore>,
    prefix: Option<Path>,
    canonical_url: String,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider<{}>", self.canonical_url)
    }
}

impl StorageProvider {
    /// Create a storage provider for the given URL or path.
    ///
    /// `options` are passed to the object-store builder (credentials, region
    /// and so on) and ignored for local paths.
    pub async fn for_url_with_options(
        url: &str,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        match url.split_once("://") {
            None => Self::local(url).await,
            Some(("file", path)) => Self::local(path).await,
            Some(_) => {
                let parsed = Url::parse(url).context(InvalidUrlSnafu { url })?;
                let (object_store, prefix) =
                    object_store::parse_url_opts(&parsed, options).context(ObjectStoreSnafu)?;

                let has_prefix = prefix.parts().next().is_some();

                debug!(url, "Created object store");
                Ok(Self {
                    object_store: Arc::from(object_store),
                    prefix: has_prefix.then_some(prefix),
                    canonical_url: url.to_string(),
                })
            }
        }
    }

    async fn local(path: &str) -> Result<Self, StorageError> {
        tokio::fs::create_dir_all(path).await.context(IoSnafu)?;

        let object_store: Arc<dyn ObjectStore> =
            Arc::new(LocalFileSystem::new_with_prefix(path).context(ObjectStoreSnafu)?);

        Ok(Self {
            object_store,
            prefix: None,
            canonical_url: format!("file://{path}"),
        })
    }

    /// The location this provider is rooted at.
    pub fn canonical_url(&self) -> &str {
        &self.canonical_url
    }

    /// Qualify a path with the configured prefix.
    pub fn qualify_path<'a>(&self, path: &'a Path) -> Cow<'a, Path> {
        match &self.prefix {
            Some(prefix) => Cow::Owned(prefix.parts().chain(path.parts()).collect()),
            None => Cow::Borrowed(path),
        }
    }

    /// Put a payload to a path, replacing any existing object.
    pub async fn put_payload(&self, path: &Path, payload: PutPayload) -> Result<(), StorageError> {
        self.object_store
            .put(&self.qualify_path(path), payload)
            .await
            .context(ObjectStoreSnafu)?;
        Ok(())
    }

    /// Get the contents of an object.
    pub async fn get(&self, path: &Path) -> Result<Bytes, StorageError> {
        self.object_store
            .get(&self.qualify_path(path))
            .await
            .context(ObjectStoreSnafu)?
            .bytes()
            .await
            .context(ObjectStoreSnafu)
    }

    /// List object paths below the root, relative to it.
    pub async fn list(&self) -> Result<Vec<Path>, StorageError> {
        let skip = self.prefix.as_ref().map_or(0, |p| p.parts().count());
        let metas: Vec<_> = self
            .object_store
            .list(self.prefix.as_ref())
            .try_collect()
            .await
            .context(ObjectStoreSnafu)?;

        let mut paths: Vec<Path> = metas
            .into_iter()
            .map(|meta| meta.location.parts().skip(skip).collect())
            .collect();
        paths.sort();
        Ok(paths)
    }
}
