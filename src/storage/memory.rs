//! In-memory object storage. Accounts are served from fixed pages and blobs
//! live in a map; every capability call is counted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{AccountPage, ResolvedAccount, StorageAccount, StorageClient, StorageError};

type BlobKey = (String, String, String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallCounts {
    pub list: usize,
    pub exists: usize,
    pub upload: usize,
    pub download: usize,
    pub delete: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.list + self.exists + self.upload + self.download + self.delete
    }
}

#[derive(Debug, Default)]
struct Blob {
    data: Vec<u8>,
    snapshots: Vec<Vec<u8>>,
}

#[derive(Debug, Default)]
struct Inner {
    pages: Vec<Vec<StorageAccount>>,
    fail_on_page: Option<usize>,
    blobs: Mutex<HashMap<BlobKey, Blob>>,
    list: AtomicUsize,
    exists: AtomicUsize,
    upload: AtomicUsize,
    download: AtomicUsize,
    delete: AtomicUsize,
}

/// Cloning shares the underlying store, so a test can keep a handle while
/// the state manager owns another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    inner: Arc<Inner>,
}

impl InMemoryStorage {
    pub fn new(pages: Vec<Vec<StorageAccount>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                pages,
                ..Default::default()
            }),
        }
    }

    /// Listing fails when it reaches page `index` (zero based).
    pub fn failing_on_page(pages: Vec<Vec<StorageAccount>>, index: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                pages,
                fail_on_page: Some(index),
                ..Default::default()
            }),
        }
    }

    pub fn put_blob(&self, account: &str, container: &str, key: &str, data: impl Into<Vec<u8>>) {
        self.blobs().insert(
            blob_key(account, container, key),
            Blob {
                data: data.into(),
                snapshots: Vec::new(),
            },
        );
    }

    pub fn blob(&self, account: &str, container: &str, key: &str) -> Option<Vec<u8>> {
        self.blobs()
            .get(&blob_key(account, container, key))
            .map(|b| b.data.clone())
    }

    /// Records a read-only copy of the current blob contents.
    pub fn snapshot_blob(&self, account: &str, container: &str, key: &str) -> bool {
        match self.blobs().get_mut(&blob_key(account, container, key)) {
            Some(blob) => {
                let copy = blob.data.clone();
                blob.snapshots.push(copy);
                true
            }
            None => false,
        }
    }

    pub fn snapshot_count(&self, account: &str, container: &str, key: &str) -> usize {
        self.blobs()
            .get(&blob_key(account, container, key))
            .map(|b| b.snapshots.len())
            .unwrap_or(0)
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            list: self.inner.list.load(Ordering::SeqCst),
            exists: self.inner.exists.load(Ordering::SeqCst),
            upload: self.inner.upload.load(Ordering::SeqCst),
            download: self.inner.download.load(Ordering::SeqCst),
            delete: self.inner.delete.load(Ordering::SeqCst),
        }
    }

    fn blobs(&self) -> MutexGuard<'_, HashMap<BlobKey, Blob>> {
        // A poisoned lock only means another test thread panicked mid-update.
        self.inner
            .blobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn blob_key(account: &str, container: &str, key: &str) -> BlobKey {
    (account.to_string(), container.to_string(), key.to_string())
}

#[async_trait]
impl StorageClient for InMemoryStorage {
    async fn list_accounts(
        &self,
        continuation: Option<String>,
    ) -> Result<AccountPage, StorageError> {
        self.inner.list.fetch_add(1, Ordering::SeqCst);

        let index = match continuation {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| StorageError::Unavailable(format!("bad continuation: {token}")))?,
            None => 0,
        };

        if self.inner.fail_on_page == Some(index) {
            return Err(StorageError::Unavailable(format!(
                "listing failed on page {index}"
            )));
        }

        let accounts = self.inner.pages.get(index).cloned().unwrap_or_default();
        let next = (index + 1 < self.inner.pages.len()).then(|| (index + 1).to_string());

        Ok(AccountPage { accounts, next })
    }

    async fn blob_exists(
        &self,
        account: &ResolvedAccount,
        container: &str,
        key: &str,
    ) -> Result<bool, StorageError> {
        self.inner.exists.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .blobs()
            .contains_key(&blob_key(&account.name, container, key)))
    }

    async fn upload_blob(
        &self,
        account: &ResolvedAccount,
        container: &str,
        key: &str,
        data: Vec<u8>,
    ) -> Result<(), StorageError> {
        self.inner.upload.fetch_add(1, Ordering::SeqCst);
        self.blobs()
            .entry(blob_key(&account.name, container, key))
            .or_default()
            .data = data;
        Ok(())
    }

    async fn download_blob(
        &self,
        account: &ResolvedAccount,
        container: &str,
        key: &str,
    ) -> Result<Vec<u8>, StorageError> {
        self.inner.download.fetch_add(1, Ordering::SeqCst);
        self.blobs()
            .get(&blob_key(&account.name, container, key))
            .map(|b| b.data.clone())
            .ok_or_else(|| StorageError::BlobNotFound {
                container: container.to_string(),
                key: key.to_string(),
            })
    }

    async fn delete_blob(
        &self,
        account: &ResolvedAccount,
        container: &str,
        key: &str,
        include_snapshots: bool,
    ) -> Result<(), StorageError> {
        self.inner.delete.fetch_add(1, Ordering::SeqCst);
        let mut blobs = self.blobs();
        let id = blob_key(&account.name, container, key);

        match blobs.get(&id) {
            None => Err(StorageError::BlobNotFound {
                container: container.to_string(),
                key: key.to_string(),
            }),
            Some(blob) if !blob.snapshots.is_empty() && !include_snapshots => Err(
                StorageError::Azure("blob has snapshots; include them to delete".to_string()),
            ),
            Some(_) => {
                blobs.remove(&id);
                Ok(())
            }
        }
    }
}
