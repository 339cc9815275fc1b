//! Product images on local disk, served back under `/uploads`.

use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// URL prefix the uploads directory is mounted at.
pub const UPLOADS_URL_PREFIX: &str = "/uploads/";

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// 10 MB
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Writes an image under a fresh name and returns its public URL path,
/// e.g. `/uploads/1b4e28ba-2fa1-11d2-883f-0016d3cca427.png`.
pub async fn save_image(uploads_dir: &str, filename: &str, data: &[u8]) -> Result<String> {
    if data.is_empty() {
        return Err(AppError::BadRequest("Image is empty".to_string()));
    }
    if data.len() > MAX_IMAGE_BYTES {
        return Err(AppError::BadRequest("Image too large (max 10 MB)".to_string()));
    }

    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| {
            AppError::BadRequest(format!(
                "Invalid image type. Allowed: {}",
                ALLOWED_EXTENSIONS.join(", ")
            ))
        })?;

    fs::create_dir_all(uploads_dir).await.map_err(|e| {
        AppError::Internal(format!("Failed to create uploads directory: {}", e))
    })?;

    let stored_name = format!("{}.{}", Uuid::new_v4(), extension);
    let path = Path::new(uploads_dir).join(&stored_name);

    let mut file = fs::File::create(&path).await.map_err(|e| {
        AppError::Internal(format!("Failed to create {}: {}", path.display(), e))
    })?;
    file.write_all(data).await.map_err(|e| {
        AppError::Internal(format!("Failed to write {}: {}", path.display(), e))
    })?;
    file.flush().await.map_err(|e| {
        AppError::Internal(format!("Failed to write {}: {}", path.display(), e))
    })?;

    tracing::debug!("Stored image {} ({} bytes)", stored_name, data.len());
    Ok(format!("{}{}", UPLOADS_URL_PREFIX, stored_name))
}

/// Removes a previously saved image. URLs that point elsewhere are left alone.
pub async fn delete_image(uploads_dir: &str, image_url: &str) -> Result<()> {
    let Some(stored_name) = image_url.strip_prefix(UPLOADS_URL_PREFIX) else {
        return Ok(());
    };
    if stored_name.is_empty() || stored_name.contains(['/', '\\']) || stored_name.starts_with('.') {
        return Ok(());
    }

    match fs::remove_file(Path::new(uploads_dir).join(stored_name)).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AppError::Internal(format!("Failed to delete {}: {}", stored_name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> String {
        std::env::temp_dir()
            .join(format!("duka-uploads-{}", Uuid::new_v4()))
            .to_string_lossy()
            .into_owned()
    }

    #[tokio::test]
    async fn test_save_and_delete_image() {
        let dir = scratch_dir();

        let url = save_image(&dir, "Pump.PNG", b"\x89PNG").await.unwrap();
        assert!(url.starts_with("/uploads/"));
        assert!(url.ends_with(".png"));

        let on_disk = Path::new(&dir).join(url.trim_start_matches("/uploads/"));
        assert_eq!(std::fs::read(&on_disk).unwrap(), b"\x89PNG");

        delete_image(&dir, &url).await.unwrap();
        assert!(!on_disk.exists());
        // Already gone
        delete_image(&dir, &url).await.unwrap();

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_rejects_bad_images() {
        let dir = scratch_dir();

        for name in ["script.exe", "noextension", ""] {
            let result = save_image(&dir, name, b"data").await;
            assert!(matches!(result, Err(AppError::BadRequest(_))), "{}", name);
        }
        assert!(matches!(save_image(&dir, "empty.png", b"").await, Err(AppError::BadRequest(_))));

        let oversized = vec![0u8; MAX_IMAGE_BYTES + 1];
        assert!(matches!(
            save_image(&dir, "huge.jpg", &oversized).await,
            Err(AppError::BadRequest(_))
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_delete_ignores_foreign_urls() {
        let dir = scratch_dir();
        delete_image(&dir, "https://cdn.example.com/pump.png").await.unwrap();
        delete_image(&dir, "/uploads/../Cargo.toml").await.unwrap();
        delete_image(&dir, "").await.unwrap();
    }
}
