use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use rusqlite::OptionalExtension;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{Settings, UploadBackend};
use crate::db::{format_timestamp, DbPool};

/// Image types accepted for check-in photos and avatars: (mime, extension)
const IMAGE_TYPES: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("Image must be PNG, JPEG, GIF or WebP")]
    UnsupportedType,
    #[error("Image is larger than {max_bytes} bytes")]
    TooLarge { max_bytes: usize },
}

/// An object read back from a store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMedia {
    pub mime: String,
    pub data: Vec<u8>,
}

/// Key/value storage for uploaded images
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn put(&self, key: &str, data: Vec<u8>, mime: &str) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<StoredMedia>>;
    /// Deleting a missing key is not an error
    async fn delete(&self, key: &str) -> Result<()>;
}

/// An accepted upload, ready to be stored under `key`
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub key: String,
    pub mime: &'static str,
    pub data: Vec<u8>,
}

/// Check an uploaded file and assign it a fresh key. Returns `Ok(None)` for an
/// empty file part, which forms send when no file was chosen.
pub fn accept_image(
    data: Vec<u8>,
    content_type: Option<&str>,
    filename: Option<&str>,
    max_bytes: usize,
) -> Result<Option<ImageUpload>, UploadError> {
    if data.is_empty() {
        return Ok(None);
    }
    if data.len() > max_bytes {
        return Err(UploadError::TooLarge { max_bytes });
    }
    let (mime, ext) = detect_image_type(content_type, filename).ok_or(UploadError::UnsupportedType)?;
    Ok(Some(ImageUpload {
        key: format!("{}.{}", Uuid::new_v4(), ext),
        mime,
        data,
    }))
}

/// Resolve the image type from the declared content type, falling back to the
/// file extension
pub fn detect_image_type(
    content_type: Option<&str>,
    filename: Option<&str>,
) -> Option<(&'static str, &'static str)> {
    let by_mime = content_type.and_then(|ct| {
        let ct = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        let ct = if ct == "image/jpg" { "image/jpeg".to_string() } else { ct };
        IMAGE_TYPES.iter().find(|(mime, _)| *mime == ct).copied()
    });
    by_mime.or_else(|| filename.and_then(mime_for_name))
}

fn mime_for_name(name: &str) -> Option<(&'static str, &'static str)> {
    let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
    let ext = if ext == "jpeg" { "jpg".to_string() } else { ext };
    IMAGE_TYPES.iter().find(|(_, e)| *e == ext).copied()
}

/// Content type to serve a key with, based on its extension
pub fn mime_for_key(key: &str) -> &'static str {
    mime_for_name(key)
        .map(|(mime, _)| mime)
        .unwrap_or("application/octet-stream")
}

/// Keys are server generated; anything that could address another path is refused
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty()
        || key.starts_with('.')
        || key.contains('/')
        || key.contains('\\')
        || key.contains("..")
    {
        return Err(anyhow!("Invalid media key: {:?}", key));
    }
    Ok(())
}

/// Stores media in the `media_blobs` table
pub struct DatabaseMediaStore {
    pool: DbPool,
}

impl DatabaseMediaStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MediaStore for DatabaseMediaStore {
    async fn put(&self, key: &str, data: Vec<u8>, mime: &str) -> Result<()> {
        validate_key(key)?;
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO media_blobs (key, mime, data, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET mime = excluded.mime, data = excluded.data",
            (key, mime, data, format_timestamp(Utc::now())),
        )
        .context("Failed to store media")?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredMedia>> {
        validate_key(key)?;
        let conn = self.pool.get()?;
        let media = conn
            .query_row(
                "SELECT mime, data FROM media_blobs WHERE key = ?1",
                [key],
                |row| {
                    Ok(StoredMedia {
                        mime: row.get(0)?,
                        data: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(media)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let conn = self.pool.get()?;
        conn.execute("DELETE FROM media_blobs WHERE key = ?1", [key])
            .context("Failed to delete media")?;
        Ok(())
    }
}

/// Stores media as files in one directory
pub struct DiskMediaStore {
    root: PathBuf,
}

impl DiskMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create upload directory {}", root.display()))?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl MediaStore for DiskMediaStore {
    async fn put(&self, key: &str, data: Vec<u8>, _mime: &str) -> Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredMedia>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(StoredMedia {
                mime: mime_for_key(key).to_string(),
                data,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", path.display())),
        }
    }
}

/// Stores media in an S3-compatible bucket
pub struct S3MediaStore {
    store: Box<dyn ObjectStore>,
}

impl S3MediaStore {
    pub fn new(settings: &crate::config::S3) -> Result<Self> {
        let bucket = settings
            .bucket
            .as_deref()
            .ok_or_else(|| anyhow!("S3_BUCKET must be set for the s3 upload backend"))?;

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
        if let Some(region) = &settings.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &settings.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }
        if let Some(key_id) = &settings.access_key_id {
            builder = builder.with_access_key_id(key_id);
        }
        if let Some(secret) = &settings.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }

        let store = builder.build().context("Failed to configure S3 media store")?;
        Ok(Self {
            store: Box::new(store),
        })
    }
}

#[async_trait]
impl MediaStore for S3MediaStore {
    async fn put(&self, key: &str, data: Vec<u8>, _mime: &str) -> Result<()> {
        validate_key(key)?;
        self.store
            .put(&ObjectPath::from(key), PutPayload::from(data))
            .await
            .with_context(|| format!("Failed to upload {}", key))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredMedia>> {
        validate_key(key)?;
        match self.store.get(&ObjectPath::from(key)).await {
            Ok(result) => {
                let bytes = result.bytes().await.context("Failed to read object body")?;
                Ok(Some(StoredMedia {
                    mime: mime_for_key(key).to_string(),
                    data: bytes.to_vec(),
                }))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to fetch {}", key)),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        match self.store.delete(&ObjectPath::from(key)).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", key)),
        }
    }
}

/// Build the store selected by `uploads.backend`
pub fn from_settings(settings: &Settings, pool: DbPool) -> Result<Arc<dyn MediaStore>> {
    let store: Arc<dyn MediaStore> = match settings.uploads.backend {
        UploadBackend::Database => Arc::new(DatabaseMediaStore::new(pool)),
        UploadBackend::Disk => Arc::new(DiskMediaStore::new(&settings.uploads.dir)?),
        UploadBackend::S3 => Arc::new(S3MediaStore::new(&settings.s3)?),
    };
    tracing::info!("Media storage backend: {:?}", settings.uploads.backend);
    Ok(store)
}

/// Remove media that is no longer referenced; failures are logged, not raised
pub async fn discard(store: &dyn MediaStore, key: &str) {
    if let Err(e) = store.delete(key).await {
        tracing::warn!("Failed to delete media {}: {:#}", key, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::setup_db;

    #[test]
    fn test_detect_by_content_type_then_extension() {
        assert_eq!(detect_image_type(Some("image/png"), None), Some(("image/png", "png")));
        assert_eq!(detect_image_type(Some("IMAGE/JPG"), None), Some(("image/jpeg", "jpg")));
        assert_eq!(
            detect_image_type(Some("application/octet-stream"), Some("run.JPEG")),
            Some(("image/jpeg", "jpg"))
        );
        assert_eq!(detect_image_type(None, Some("clip.webp")), Some(("image/webp", "webp")));
        assert_eq!(detect_image_type(Some("text/plain"), Some("notes.txt")), None);
        assert_eq!(detect_image_type(None, Some("noextension")), None);
    }

    #[test]
    fn test_accept_image() {
        assert_eq!(accept_image(Vec::new(), Some("image/png"), None, 10), Ok(None));
        assert_eq!(
            accept_image(vec![0; 11], Some("image/png"), None, 10),
            Err(UploadError::TooLarge { max_bytes: 10 })
        );
        assert_eq!(
            accept_image(vec![1, 2, 3], Some("application/pdf"), Some("doc.pdf"), 10),
            Err(UploadError::UnsupportedType)
        );

        let upload = accept_image(vec![1, 2, 3], Some("image/gif"), None, 10).unwrap().unwrap();
        assert_eq!(upload.mime, "image/gif");
        assert!(upload.key.ends_with(".gif"));
        assert!(validate_key(&upload.key).is_ok());
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("abc.png").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("a/b.png").is_err());
        assert!(validate_key("a\\b.png").is_err());
        assert!(validate_key(".hidden").is_err());
    }

    #[test]
    fn test_mime_for_key() {
        assert_eq!(mime_for_key("x.png"), "image/png");
        assert_eq!(mime_for_key("x.jpg"), "image/jpeg");
        assert_eq!(mime_for_key("x.bin"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_database_store_round_trip() {
        let db = setup_db();
        let store = DatabaseMediaStore::new(db.pool.clone());

        store.put("a.png", vec![1, 2, 3], "image/png").await.unwrap();
        let media = store.get("a.png").await.unwrap().unwrap();
        assert_eq!(media.mime, "image/png");
        assert_eq!(media.data, vec![1, 2, 3]);

        store.delete("a.png").await.unwrap();
        assert!(store.get("a.png").await.unwrap().is_none());
        store.delete("a.png").await.unwrap();
    }

    #[tokio::test]
    async fn test_disk_store_round_trip() {
        let dir = std::env::temp_dir().join(format!("fitlog-media-{}", Uuid::new_v4()));
        let store = DiskMediaStore::new(&dir).unwrap();

        store.put("b.webp", vec![9, 9], "image/webp").await.unwrap();
        let media = store.get("b.webp").await.unwrap().unwrap();
        assert_eq!(media.mime, "image/webp");
        assert_eq!(media.data, vec![9, 9]);

        store.delete("b.webp").await.unwrap();
        assert!(store.get("b.webp").await.unwrap().is_none());
        assert!(store.get("../b.webp").await.is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
