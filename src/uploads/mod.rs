//! Multipart upload storage.
//!
//! Uploaded files land under the configured upload root (optionally in a
//! subdirectory) with a unique filename, and are served back under the
//! `/uploads` static route.

use std::io;
use std::path::Path;

/// Extensions accepted for image uploads (profile pictures, issue photos,
/// disease scans)
const IMAGE_EXTENSIONS: [&str; 8] = ["jpeg", "jpg", "png", "gif", "webp", "bmp", "tiff", "tif"];

/// A stored upload: the on-disk filename and its public URL
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub filename: String,
    pub url: String,
}

/// Replace any path-hostile characters in a client-supplied filename
fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('_').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Check whether a filename carries a recognized image extension
pub fn is_image_filename(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Write an uploaded field to disk under `upload_root/subdir` and return the
/// stored filename plus its public URL. Pass an empty subdir for the root of
/// the upload tree.
pub async fn store_upload(
    upload_root: &Path,
    subdir: &str,
    original_name: &str,
    bytes: &[u8],
) -> io::Result<StoredFile> {
    let filename = format!(
        "{}-{}",
        uuid::Uuid::new_v4(),
        sanitize_filename(original_name)
    );

    let dir = if subdir.is_empty() {
        upload_root.to_path_buf()
    } else {
        upload_root.join(subdir)
    };
    tokio::fs::create_dir_all(&dir).await?;
    tokio::fs::write(dir.join(&filename), bytes).await?;

    let url = if subdir.is_empty() {
        format!("/uploads/{}", filename)
    } else {
        format!("/uploads/{}/{}", subdir, filename)
    };

    Ok(StoredFile { filename, url })
}
