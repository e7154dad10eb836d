//! Scratch files for audio passing through a request.
//!
//! Every file gets a UUID name so concurrent requests never collide, and is
//! owned by a `NamedTempFile` guard that deletes it when dropped, including
//! on early returns and errors.

use anyhow::{Context, Result};
use bytes::Bytes;
use std::path::Path;
use tempfile::{Builder, NamedTempFile};
use uuid::Uuid;

pub const UPLOAD_PREFIX: &str = "temp_audio_";
pub const RESPONSE_PREFIX: &str = "temp_response_";

fn create_unique(dir: &Path, prefix: &str, suffix: &str) -> Result<NamedTempFile> {
    Builder::new()
        .prefix(&format!("{prefix}{}", Uuid::new_v4()))
        .suffix(suffix)
        .rand_bytes(0)
        .tempfile_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))
}

/// Writes uploaded audio to a fresh `.wav` file in `dir`.
///
/// The file is removed when the returned handle is dropped.
pub async fn persist_upload(dir: &Path, audio: &[u8]) -> Result<NamedTempFile> {
    let file = create_unique(dir, UPLOAD_PREFIX, ".wav")?;
    tokio::fs::write(file.path(), audio)
        .await
        .context("Failed to write uploaded audio")?;
    Ok(file)
}

/// Stages synthesized audio in a fresh `.mp3` file and loads it back as a
/// response body. The file is gone by the time this returns.
pub async fn stage_response(dir: &Path, audio: &[u8]) -> Result<Bytes> {
    let file = create_unique(dir, RESPONSE_PREFIX, ".mp3")?;
    tokio::fs::write(file.path(), audio)
        .await
        .context("Failed to write synthesized audio")?;
    let body = tokio::fs::read(file.path())
        .await
        .context("Failed to read synthesized audio")?;
    Ok(Bytes::from(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_persist_upload_writes_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();

        let file = persist_upload(dir.path(), b"RIFF....").await.unwrap();
        let path = file.path().to_path_buf();
        let name = path.file_name().unwrap().to_string_lossy().to_string();

        assert!(name.starts_with(UPLOAD_PREFIX));
        assert!(name.ends_with(".wav"));
        assert_eq!(std::fs::read(&path).unwrap(), b"RIFF....");

        drop(file);
        assert!(!path.exists());
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_uploads_get_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let a = persist_upload(dir.path(), b"a").await.unwrap();
        let b = persist_upload(dir.path(), b"b").await.unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[tokio::test]
    async fn test_stage_response_returns_audio_and_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();

        let body = stage_response(dir.path(), b"ID3 mp3 data").await.unwrap();

        assert_eq!(&body[..], b"ID3 mp3 data");
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_error() {
        let result = persist_upload(Path::new("/definitely/not/a/dir"), b"a").await;
        assert!(result.is_err());
    }
}
