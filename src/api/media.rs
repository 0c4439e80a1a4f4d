//! Media storage behind the upload and delete endpoints.
//!
//! Project galleries and announcements reference media by URL plus an opaque
//! key. Handlers only talk to the `MediaStore` trait; the deployment decides
//! whether keys live on the local disk or on an external host. The in-repo
//! implementation writes under the configured media root and the server
//! exposes that directory at `/media`.

use anyhow::{Context, Result, anyhow};
use std::{future::Future, path::PathBuf, pin::Pin};
use tracing::debug;
use ulid::Ulid;

/// Outcome of a successful upload: where the file is reachable and the key
/// needed to delete it later.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredMedia {
    pub url: String,
    pub key: String,
}

pub trait MediaStore: Send + Sync {
    /// Persist a file and return its public URL and deletion key.
    fn store<'a>(
        &'a self,
        filename: &'a str,
        content_type: &'a str,
        bytes: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<StoredMedia>> + Send + 'a>>;

    /// Remove a previously stored file. Deleting a key that is already gone
    /// is not an error; rows and media objects are cleaned up independently.
    fn delete<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Filesystem-backed store for single-host deployments.
pub struct LocalMediaStore {
    root: PathBuf,
    public_base: String,
}

impl LocalMediaStore {
    #[must_use]
    pub fn new(root: PathBuf, public_base: String) -> Self {
        Self {
            root,
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if !valid_key(key) {
            return Err(anyhow!("Invalid media key: {key}"));
        }
        Ok(self.root.join(key))
    }
}

impl MediaStore for LocalMediaStore {
    fn store<'a>(
        &'a self,
        filename: &'a str,
        content_type: &'a str,
        bytes: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<StoredMedia>> + Send + 'a>> {
        Box::pin(async move {
            let key = format!("{}-{}", Ulid::new(), sanitize_filename(filename));
            let path = self.path_for(&key)?;

            tokio::fs::create_dir_all(&self.root)
                .await
                .with_context(|| format!("Failed to create media root: {}", self.root.display()))?;
            tokio::fs::write(&path, bytes)
                .await
                .with_context(|| format!("Failed to write media file: {}", path.display()))?;

            debug!(key = %key, content_type = %content_type, "stored media file");

            Ok(StoredMedia {
                url: format!("{}/media/{key}", self.public_base),
                key,
            })
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let path = self.path_for(key)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(err) => {
                    Err(err).with_context(|| format!("Failed to delete media file: {key}"))
                }
            }
        })
    }
}

/// Keys are generated server-side; anything with a path separator or a parent
/// reference is rejected before touching the filesystem.
fn valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key.contains('/')
        && !key.contains('\\')
        && !key.contains("..")
}

fn sanitize_filename(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if safe.is_empty() {
        "upload".to_string()
    } else {
        safe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> LocalMediaStore {
        let root = std::env::temp_dir().join(format!("gbexo-media-{}", Ulid::new()));
        LocalMediaStore::new(root, "http://localhost:8080".to_string())
    }

    #[tokio::test]
    async fn store_writes_file_and_builds_url() -> Result<()> {
        let media = store();
        let stored = media
            .store("chantier photo.jpg", "image/jpeg", vec![1, 2, 3])
            .await?;

        assert!(stored.url.starts_with("http://localhost:8080/media/"));
        assert!(stored.key.ends_with("chantier_photo.jpg"));

        let on_disk = tokio::fs::read(media.root.join(&stored.key)).await?;
        assert_eq!(on_disk, vec![1, 2, 3]);
        Ok(())
    }

    #[tokio::test]
    async fn delete_removes_file_and_is_idempotent() -> Result<()> {
        let media = store();
        let stored = media.store("plan.pdf", "application/pdf", vec![7]).await?;

        media.delete(&stored.key).await?;
        assert!(!media.root.join(&stored.key).exists());

        // Second delete of the same key must not error.
        media.delete(&stored.key).await?;
        Ok(())
    }

    #[tokio::test]
    async fn delete_rejects_traversal_keys() {
        let media = store();
        assert!(media.delete("../etc/passwd").await.is_err());
        assert!(media.delete("a/b").await.is_err());
        assert!(media.delete("").await.is_err());
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_filename("façade nord.png"), "fa_ade_nord.png");
        assert_eq!(sanitize_filename(""), "upload");
    }
}
