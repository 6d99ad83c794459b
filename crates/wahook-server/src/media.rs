//! Local copies of inbound and outbound media.
//!
//! Files are stored flat under the media directory as `<uuid>.<ext>`. The
//! reference written into a message body is `media/<file name>`, which is
//! also the URL path that serves it back.

use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ServerError;

/// URL prefix (and message-body prefix) for stored media.
pub const MEDIA_ROUTE_PREFIX: &str = "media";

/// Verify that a resolved path stays within the expected base directory.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf, ServerError> {
    let mut resolved = base.to_path_buf();
    for component in target.strip_prefix(base).unwrap_or(target).components() {
        match component {
            Component::Normal(c) => resolved.push(c),
            Component::CurDir => {}
            _ => {
                return Err(ServerError::BadRequest(
                    "Path traversal detected".to_string(),
                ));
            }
        }
    }
    if !resolved.starts_with(base) {
        return Err(ServerError::BadRequest(
            "Path traversal detected".to_string(),
        ));
    }
    Ok(resolved)
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    base_path: PathBuf,
    max_size: usize,
}

impl MediaStore {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self, ServerError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ServerError::MediaStorage(format!(
                "Failed to create media directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Media store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    /// Write `data` and return the stored file name.
    pub async fn store(
        &self,
        data: &[u8],
        mime_type: Option<&str>,
        original_name: Option<&str>,
    ) -> Result<String, ServerError> {
        if data.is_empty() {
            return Err(ServerError::BadRequest("Empty file".to_string()));
        }
        if data.len() > self.max_size {
            return Err(ServerError::TooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let file_name = match extension_for(mime_type, original_name) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };
        let path = self.safe_path(&file_name)?;

        fs::write(&path, data).await.map_err(|e| {
            ServerError::MediaStorage(format!("Failed to write media {}: {}", file_name, e))
        })?;

        debug!(file = %file_name, size = data.len(), "Stored media");
        Ok(file_name)
    }

    pub async fn read(&self, file_name: &str) -> Result<Vec<u8>, ServerError> {
        let path = self.safe_path(file_name)?;

        if !path.is_file() {
            return Err(ServerError::NotFound(format!("media {file_name}")));
        }

        fs::read(&path).await.map_err(|e| {
            ServerError::MediaStorage(format!("Failed to read media {}: {}", file_name, e))
        })
    }

    /// Delete a stored file. Failures are logged, not returned.
    pub async fn remove(&self, file_name: &str) {
        let path = match self.safe_path(file_name) {
            Ok(path) => path,
            Err(e) => {
                warn!(file = %file_name, error = %e, "Refusing to remove media");
                return;
            }
        };
        match fs::remove_file(&path).await {
            Ok(()) => debug!(file = %file_name, "Removed media"),
            Err(e) => warn!(file = %file_name, error = %e, "Failed to remove media"),
        }
    }

    /// Path for a single flat file name; separators and `..` are refused.
    fn safe_path(&self, file_name: &str) -> Result<PathBuf, ServerError> {
        if file_name.is_empty()
            || file_name.contains('/')
            || file_name.contains('\\')
            || file_name.contains("..")
        {
            return Err(ServerError::BadRequest(
                "Path traversal detected".to_string(),
            ));
        }
        ensure_within(&self.base_path, &self.base_path.join(file_name))
    }
}

/// The message-body reference for a stored file.
pub fn media_reference(file_name: &str) -> String {
    format!("{MEDIA_ROUTE_PREFIX}/{file_name}")
}

/// File extension from the original name, else from the MIME type.
pub fn extension_for(mime_type: Option<&str>, original_name: Option<&str>) -> Option<String> {
    let from_name = original_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase());
    if from_name.is_some() {
        return from_name;
    }

    let base = mime_type?.split(';').next()?.trim().to_ascii_lowercase();
    let ext = match base.as_str() {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "video/mp4" => "mp4",
        "video/3gpp" => "3gp",
        "audio/ogg" => "ogg",
        "audio/mpeg" => "mp3",
        "audio/mp4" => "m4a",
        "audio/aac" => "aac",
        "audio/amr" => "amr",
        "application/pdf" => "pdf",
        "text/plain" => "txt",
        _ => return None,
    };
    Some(ext.to_string())
}

/// MIME type to send for a stored file, guessed from its extension.
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "mp4" => "video/mp4",
        "3gp" => "video/3gpp",
        "ogg" => "audio/ogg",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "amr" => "audio/amr",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store() -> (MediaStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = MediaStore::new(dir.path().to_path_buf(), 1024)
            .await
            .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_store_and_read() {
        let (store, _dir) = test_store().await;

        let name = store
            .store(b"jpeg-bytes", Some("image/jpeg"), None)
            .await
            .unwrap();
        assert!(name.ends_with(".jpg"));
        assert_eq!(store.read(&name).await.unwrap(), b"jpeg-bytes");
        assert_eq!(media_reference(&name), format!("media/{name}"));
    }

    #[tokio::test]
    async fn test_original_extension_wins() {
        let (store, _dir) = test_store().await;
        let name = store
            .store(b"%PDF", Some("application/octet-stream"), Some("Invoice.PDF"))
            .await
            .unwrap();
        assert!(name.ends_with(".pdf"));
    }

    #[tokio::test]
    async fn test_limits() {
        let (store, _dir) = test_store().await;
        assert!(store.store(b"", None, None).await.is_err());
        let big = vec![0u8; 2048];
        assert!(matches!(
            store.store(&big, None, None).await,
            Err(ServerError::TooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let (store, _dir) = test_store().await;
        assert!(matches!(
            store.read("../secret").await,
            Err(ServerError::BadRequest(_))
        ));
        assert!(matches!(
            store.read("nested/file").await,
            Err(ServerError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_remove() {
        let (store, dir) = test_store().await;
        let name = store.store(b"bytes", Some("image/png"), None).await.unwrap();
        store.remove(&name).await;
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());

        // Missing or unsafe names are only logged.
        store.remove(&name).await;
        store.remove("../outside").await;
    }

    #[tokio::test]
    async fn test_not_found() {
        let (store, _dir) = test_store().await;
        assert!(matches!(
            store.read("missing.jpg").await,
            Err(ServerError::NotFound(_))
        ));
    }

    #[test]
    fn test_extension_and_content_type() {
        assert_eq!(
            extension_for(Some("audio/ogg; codecs=opus"), None).as_deref(),
            Some("ogg")
        );
        assert_eq!(extension_for(Some("application/x-unknown"), None), None);
        assert_eq!(content_type_for("a.jpg"), "image/jpeg");
        assert_eq!(content_type_for("a"), "application/octet-stream");
    }
}
